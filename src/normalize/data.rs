use super::Extractor;
use crate::error::{AdvisorError, Result};
use serde_json::Value as JsonValue;
use serde_yaml_ng::Value as YamlValue;

/// Serialized-object pretty-printing for JSON and YAML payloads.
/// Parsing doubles as validation: undecodable input is corrupt, not
/// passed through.
pub struct DataExtractor;

impl Extractor for DataExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "json" | "yaml" | "yml")
    }

    fn extract(&self, payload: &[u8], extension: &str) -> Result<String> {
        let source = String::from_utf8_lossy(payload);
        match extension {
            "json" => {
                let value: JsonValue = serde_json::from_str(&source)
                    .map_err(|e| AdvisorError::CorruptInput(format!("invalid JSON: {}", e)))?;
                serde_json::to_string_pretty(&value)
                    .map_err(|e| AdvisorError::CorruptInput(format!("JSON re-render: {}", e)))
            }
            _ => {
                let value: YamlValue = serde_yaml_ng::from_str(&source)
                    .map_err(|e| AdvisorError::CorruptInput(format!("invalid YAML: {}", e)))?;
                serde_yaml_ng::to_string(&value)
                    .map_err(|e| AdvisorError::CorruptInput(format!("YAML re-render: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_can_extract() {
        let extractor = DataExtractor;
        assert!(extractor.can_extract("json"));
        assert!(extractor.can_extract("yaml"));
        assert!(extractor.can_extract("yml"));
        assert!(!extractor.can_extract("toml"));
    }

    #[test]
    fn test_json_pretty_printed() {
        let extractor = DataExtractor;
        let text = extractor
            .extract(br#"{"phase":"foundation","inspections":3}"#, "json")
            .unwrap();
        assert!(text.contains("\"phase\": \"foundation\""));
        assert!(text.contains("\"inspections\": 3"));
        assert!(text.lines().count() > 1);
    }

    #[test]
    fn test_yaml_re_rendered() {
        let extractor = DataExtractor;
        let text = extractor
            .extract(b"phase: foundation\ninspections: 3\n", "yaml")
            .unwrap();
        assert!(text.contains("phase: foundation"));
        assert!(text.contains("inspections: 3"));
    }

    #[test]
    fn test_invalid_json_is_corrupt_input() {
        let extractor = DataExtractor;
        let err = extractor.extract(b"{broken", "json").unwrap_err();
        assert!(matches!(err, AdvisorError::CorruptInput(_)));
    }

    #[test]
    fn test_invalid_yaml_is_corrupt_input() {
        let extractor = DataExtractor;
        let err = extractor.extract(b"a: [unclosed", "yaml").unwrap_err();
        assert!(matches!(err, AdvisorError::CorruptInput(_)));
    }
}
