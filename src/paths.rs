use std::path::{Path, PathBuf};

use crate::config::PathsConfig;

/// Resolve an artifact path.
///
/// Precedence: `explicit_path` verbatim, then `short_name` or `default_name`.
/// An absolute file name is returned unchanged, a relative one is joined onto `base_dir`.
pub fn resolve(
    base_dir: &Path,
    explicit_path: Option<&Path>,
    short_name: Option<&str>,
    default_name: &str,
) -> PathBuf {
    if let Some(explicit) = explicit_path {
        return explicit.to_path_buf();
    }

    let file_name = Path::new(short_name.unwrap_or(default_name));
    if file_name.is_absolute() {
        return file_name.to_path_buf();
    }

    base_dir.join(file_name)
}

/// Explicit paths and short names supplied by the caller for one artifact
#[derive(Debug, Clone, Default)]
pub struct ArtifactOverride {
    pub path: Option<PathBuf>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub raw: ArtifactOverride,
    pub clean: ArtifactOverride,
    pub database: ArtifactOverride,
    pub ranked: ArtifactOverride,
}

/// Final locations of every artifact one pipeline run touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: PathBuf,
    pub clean: PathBuf,
    pub database: PathBuf,
    pub ranked: PathBuf,
}

impl ArtifactPaths {
    pub fn resolve(config: &PathsConfig, overrides: &PathOverrides) -> Self {
        let pick = |base: &Path, o: &ArtifactOverride, default: &str| {
            resolve(base, o.path.as_deref(), o.name.as_deref(), default)
        };

        Self {
            raw: pick(&config.raw_data_dir, &overrides.raw, &config.default_raw_json),
            clean: pick(&config.clean_data_dir, &overrides.clean, &config.default_clean_csv),
            database: pick(&config.output_dir, &overrides.database, &config.default_database),
            ranked: pick(&config.output_dir, &overrides.ranked, &config.default_ranked_csv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let resolved = resolve(
            Path::new("data/raw"),
            Some(Path::new("elsewhere/raw.json")),
            Some("named.json"),
            "raw_places.json",
        );
        assert_eq!(resolved, PathBuf::from("elsewhere/raw.json"));
    }

    #[test]
    fn short_name_joins_base_dir() {
        let resolved = resolve(Path::new("data/raw"), None, Some("coffee.json"), "raw_places.json");
        assert_eq!(resolved, PathBuf::from("data/raw/coffee.json"));
    }

    #[test]
    fn default_name_joins_base_dir() {
        let resolved = resolve(Path::new("output"), None, None, "places.db");
        assert_eq!(resolved, PathBuf::from("output/places.db"));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_name_is_kept() {
        let resolved = resolve(Path::new("output"), None, Some("/tmp/ranked.csv"), "ranked.csv");
        assert_eq!(resolved, PathBuf::from("/tmp/ranked.csv"));
    }

    #[test]
    fn artifact_paths_share_output_dir() {
        let config = PathsConfig::default();
        let overrides = PathOverrides {
            clean: ArtifactOverride {
                path: None,
                name: Some("coffee_clean.csv".to_string()),
            },
            ..Default::default()
        };
        let paths = ArtifactPaths::resolve(&config, &overrides);

        assert_eq!(paths.raw, PathBuf::from("data/raw/raw_places.json"));
        assert_eq!(paths.clean, PathBuf::from("data/clean/coffee_clean.csv"));
        assert_eq!(paths.database, PathBuf::from("output/places.db"));
        assert_eq!(paths.ranked, PathBuf::from("output/ranked_places.csv"));
    }
}
