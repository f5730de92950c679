/// Column names shared by the clean artifact, the places table and the ranking query

pub const PLACE_ID: &str = "place_id";
pub const NAME: &str = "name";
pub const RATING: &str = "rating";
pub const USER_RATINGS_TOTAL: &str = "user_ratings_total";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ADDRESS: &str = "address";
pub const TYPES: &str = "types";
pub const MAIN_TYPE: &str = "main_type";
pub const CATEGORY: &str = "category";
pub const RATING_RANK: &str = "rating_rank";

// Raw record keys that are not output columns
pub const GEOMETRY: &str = "geometry";
pub const LAT: &str = "lat";
pub const LNG: &str = "lng";

// Misspelled coordinate column written by an older export format
pub const LEGACY_LONGITUDE: &str = "longtitude";

/// Header of the ranked artifact, in output order
pub const RANKED_HEADER: [&str; 6] = [
    PLACE_ID,
    NAME,
    RATING,
    USER_RATINGS_TOTAL,
    CATEGORY,
    RATING_RANK,
];

/// Default projection when the configuration does not name one
pub fn default_columns_to_save() -> Vec<String> {
    [
        PLACE_ID,
        NAME,
        RATING,
        USER_RATINGS_TOTAL,
        LATITUDE,
        LONGITUDE,
        ADDRESS,
        TYPES,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

// Artifact defaults
pub const DEFAULT_RAW_DATA_DIR: &str = "data/raw";
pub const DEFAULT_CLEAN_DATA_DIR: &str = "data/clean";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_RAW_JSON: &str = "raw_places.json";
pub const DEFAULT_CLEAN_CSV: &str = "clean_places.csv";
pub const DEFAULT_DATABASE: &str = "places.db";
pub const DEFAULT_RANKED_CSV: &str = "ranked_places.csv";

pub const DEFAULT_PLACES_TABLE: &str = "places";
pub const DEFAULT_RANKING_TABLE: &str = "place_ranking";

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const CONFIG_ENV_VAR: &str = "PLACES_CONFIG";

/// UTF-8 byte-order marker written ahead of every CSV artifact
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
