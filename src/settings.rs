use crate::error::ObserverError;
use crate::utils::default_store_dir;
use std::path::PathBuf;

pub const STORE_DIR_VAR: &str = "SEALEVEL_STORE_DIR";
pub const INFO_WEBHOOK_VAR: &str = "SEALEVEL_INFO_WEBHOOK_URL";
pub const ERROR_WEBHOOK_VAR: &str = "SEALEVEL_ERROR_WEBHOOK_URL";
pub const COMPRESSION_LEVEL_VAR: &str = "SEALEVEL_COMPRESSION_LEVEL";

/// Deployment settings: where tables are stored and where notifications go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_dir: PathBuf,
    pub info_webhook_url: Option<String>,
    pub error_webhook_url: Option<String>,
    /// Zstd level used when writing tables, `0` for the codec default.
    pub compression_level: i32,
}

impl Settings {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            info_webhook_url: None,
            error_webhook_url: None,
            compression_level: 0,
        }
    }

    /// Reads the `SEALEVEL_*` environment variables.
    pub fn from_env() -> Result<Self, ObserverError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Settings::from_env`], with variables resolved by `lookup`.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ObserverError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let store_dir = match var(STORE_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => default_store_dir()?,
        };
        let compression_level = match var(COMPRESSION_LEVEL_VAR) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ObserverError::InvalidSetting {
                    name: COMPRESSION_LEVEL_VAR,
                    value,
                })?,
            None => 0,
        };
        Ok(Self {
            store_dir,
            info_webhook_url: var(INFO_WEBHOOK_VAR),
            error_webhook_url: var(ERROR_WEBHOOK_VAR),
            compression_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let settings = Settings::from_lookup(lookup(&[
            (STORE_DIR_VAR, "/data/sealevel"),
            (INFO_WEBHOOK_VAR, "https://hooks.example.org/info"),
            (ERROR_WEBHOOK_VAR, ""),
            (COMPRESSION_LEVEL_VAR, " 9 "),
        ]))
        .unwrap();

        assert_eq!(settings.store_dir, PathBuf::from("/data/sealevel"));
        assert_eq!(
            settings.info_webhook_url.as_deref(),
            Some("https://hooks.example.org/info")
        );
        assert_eq!(settings.error_webhook_url, None);
        assert_eq!(settings.compression_level, 9);
    }

    #[test]
    fn test_invalid_compression_level() {
        let err = Settings::from_lookup(lookup(&[
            (STORE_DIR_VAR, "/data/sealevel"),
            (COMPRESSION_LEVEL_VAR, "max"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ObserverError::InvalidSetting { name: COMPRESSION_LEVEL_VAR, ref value } if value == "max"
        ));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::new("/tmp/store");
        assert_eq!(settings.compression_level, 0);
        assert!(settings.info_webhook_url.is_none());
    }
}
