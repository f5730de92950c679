use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::constants;

/// Raw place record as produced by the crawler or read back from a raw artifact.
///
/// No shape is enforced: any field may be absent or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field value with JSON null folded into absence
    pub fn non_null(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Map an item of the scraping provider's dataset export into the raw record shape.
    pub fn from_provider_item(item: &Map<String, Value>) -> Self {
        let field = |key: &str| item.get(key).cloned().unwrap_or(Value::Null);

        let geometry = item
            .get("placeLocation")
            .filter(|v| !v.is_null())
            .or_else(|| item.get("location"))
            .cloned()
            .unwrap_or(Value::Null);

        let reviews: Vec<Value> = item
            .get("reviews")
            .and_then(Value::as_array)
            .map(|reviews| {
                reviews
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|rev| {
                        let rev_field = |key: &str| rev.get(key).cloned().unwrap_or(Value::Null);
                        let mut out = Map::new();
                        out.insert("author_name".to_string(), rev_field("name"));
                        out.insert("rating".to_string(), rev_field("stars"));
                        out.insert("text".to_string(), rev_field("text"));
                        out.insert("time".to_string(), rev_field("publishedAtDate"));
                        Value::Object(out)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut fields = Map::new();
        fields.insert(constants::PLACE_ID.to_string(), field("placeId"));
        fields.insert(constants::NAME.to_string(), field("title"));
        fields.insert(constants::RATING.to_string(), field("totalScore"));
        fields.insert(constants::USER_RATINGS_TOTAL.to_string(), field("reviewsCount"));
        fields.insert(constants::GEOMETRY.to_string(), geometry);
        fields.insert(constants::ADDRESS.to_string(), field("address"));
        fields.insert(constants::TYPES.to_string(), field("categories"));
        fields.insert("reviews".to_string(), Value::Array(reviews));
        Self(fields)
    }
}

/// Category value as the provider hands it out, resolved once during normalization
#[derive(Debug, Clone, PartialEq)]
pub enum Category {
    Single(String),
    List(Vec<String>),
    Unknown(Value),
}

impl Category {
    /// Resolve a raw category value. JSON null has no category.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::from_text(s)),
            Value::Array(items) => {
                let strings: Option<Vec<String>> = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect();
                Some(match strings {
                    Some(list) => Category::List(list),
                    None => Category::Unknown(value.clone()),
                })
            }
            other => Some(Category::Unknown(other.clone())),
        }
    }

    fn from_text(text: &str) -> Self {
        if text.trim_start().starts_with('[') {
            if let Ok(list) = serde_json::from_str::<Vec<String>>(text) {
                return Category::List(list);
            }
        }
        Category::Single(text.to_string())
    }

    /// Text written to the `types` column of the clean artifact
    pub fn to_cell(&self) -> String {
        match self {
            Category::Single(s) => s.clone(),
            Category::List(list) => Value::from(list.clone()).to_string(),
            Category::Unknown(raw) => raw.to_string(),
        }
    }
}

/// Fixed-shape place row after imputation and coordinate extraction
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub place_id: Option<String>,
    pub name: Option<String>,
    pub rating: f64,
    pub user_ratings_total: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub types: Option<Category>,
    /// Provider fields outside the fixed shape, kept for projection
    pub extra: BTreeMap<String, Value>,
}

impl NormalizedRecord {
    /// Cell text for `column`; `None` for nulls and unknown columns.
    pub fn cell(&self, column: &str) -> Option<String> {
        match column {
            constants::PLACE_ID => self.place_id.clone(),
            constants::NAME => self.name.clone(),
            constants::RATING => Some(self.rating.to_string()),
            constants::USER_RATINGS_TOTAL => Some(self.user_ratings_total.to_string()),
            constants::LATITUDE => self.latitude.map(|v| v.to_string()),
            constants::LONGITUDE => self.longitude.map(|v| v.to_string()),
            constants::ADDRESS => self.address.clone(),
            constants::TYPES => self.types.as_ref().map(Category::to_cell),
            other => self.extra.get(other).and_then(value_to_cell),
        }
    }
}

/// Render a JSON value as a CSV cell: strings verbatim, null as empty, the rest as JSON text
pub fn value_to_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// One row of the ranking result and of the ranked artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub place_id: Option<String>,
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<i64>,
    pub category: Option<String>,
    pub rating_rank: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_resolves_each_shape() {
        assert_eq!(
            Category::from_value(&json!("cafe")),
            Some(Category::Single("cafe".to_string()))
        );
        assert_eq!(
            Category::from_value(&json!(["cafe", "bar"])),
            Some(Category::List(vec!["cafe".to_string(), "bar".to_string()]))
        );
        assert_eq!(
            Category::from_value(&json!("[\"cafe\", \"bar\"]")),
            Some(Category::List(vec!["cafe".to_string(), "bar".to_string()]))
        );
        assert_eq!(
            Category::from_value(&json!([1, "bar"])),
            Some(Category::Unknown(json!([1, "bar"])))
        );
        assert_eq!(Category::from_value(&json!(null)), None);
    }

    #[test]
    fn bracketed_text_that_is_not_a_list_stays_single() {
        assert_eq!(
            Category::from_value(&json!("[closed] cafe")),
            Some(Category::Single("[closed] cafe".to_string()))
        );
    }

    #[test]
    fn list_category_is_written_as_compact_json() {
        let category = Category::List(vec!["cafe".to_string(), "bar".to_string()]);
        assert_eq!(category.to_cell(), r#"["cafe","bar"]"#);
    }

    #[test]
    fn provider_item_maps_to_raw_shape() {
        let item = json!({
            "placeId": "ChIJ1",
            "title": "Test Coffee Shop 3",
            "totalScore": null,
            "reviewsCount": null,
            "location": {"lat": 10.785622, "lng": 106.680172},
            "address": "789 Test Road",
            "categories": ["cafe", "bakery"],
            "reviews": [
                {"name": "Bob", "stars": 5, "text": "Excellent", "publishedAtDate": "2024-01-12T09:00:00Z"}
            ]
        });
        let raw = RawRecord::from_provider_item(item.as_object().unwrap());

        assert_eq!(raw.get("place_id"), Some(&json!("ChIJ1")));
        assert_eq!(raw.get("name"), Some(&json!("Test Coffee Shop 3")));
        assert_eq!(raw.non_null("rating"), None);
        assert_eq!(raw.get("geometry"), Some(&json!({"lat": 10.785622, "lng": 106.680172})));
        assert_eq!(raw.get("types"), Some(&json!(["cafe", "bakery"])));
        assert_eq!(
            raw.get("reviews"),
            Some(&json!([{"author_name": "Bob", "rating": 5, "text": "Excellent", "time": "2024-01-12T09:00:00Z"}]))
        );
    }

    #[test]
    fn provider_place_location_wins_over_location() {
        let item = json!({
            "placeLocation": {"lat": 1.0, "lng": 2.0},
            "location": {"lat": 3.0, "lng": 4.0}
        });
        let raw = RawRecord::from_provider_item(item.as_object().unwrap());
        assert_eq!(raw.get("geometry"), Some(&json!({"lat": 1.0, "lng": 2.0})));
    }

    #[test]
    fn extra_fields_render_as_json_text() {
        let mut extra = BTreeMap::new();
        extra.insert("reviews".to_string(), json!([]));
        let record = NormalizedRecord {
            place_id: None,
            name: Some("A".to_string()),
            rating: 4.0,
            user_ratings_total: 3,
            latitude: None,
            longitude: Some(106.5),
            address: None,
            types: None,
            extra,
        };
        assert_eq!(record.cell("reviews").as_deref(), Some("[]"));
        assert_eq!(record.cell("rating").as_deref(), Some("4"));
        assert_eq!(record.cell("longitude").as_deref(), Some("106.5"));
        assert_eq!(record.cell("place_id"), None);
        assert_eq!(record.cell("missing"), None);
    }
}
