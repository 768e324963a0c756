//! Load controller settings from JSON.

use crate::config::{validate_settings, ControllerSettings};
use crate::error::ConfigError;
use std::path::Path;

/// Parse and validate settings from a JSON document.
pub fn settings_from_json(json: &str) -> Result<ControllerSettings, ConfigError> {
    let settings: ControllerSettings = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Read settings from a JSON file.
pub async fn load_settings(path: impl AsRef<Path>) -> Result<ControllerSettings, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading controller settings");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    settings_from_json(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_validates() {
        let s = settings_from_json(r#"{ "sortable": ["name"], "rows": 2 }"#).unwrap();
        assert_eq!(s.rows, 2);
        assert!(matches!(settings_from_json(r#"{ "rows": 0 }"#), Err(ConfigError::Invalid { .. })));
        assert!(matches!(settings_from_json("not json"), Err(ConfigError::Load(_))));
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let err = load_settings("/nonexistent/settings.json").await.unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
