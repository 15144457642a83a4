//! Safe YAML loading for agent manifests.
//!
//! Manifests come from the least trusted edge of the system. Only plain
//! scalars, sequences, and mappings are accepted; any tagged node
//! (`!!python/object`, custom application tags, anything beyond the core
//! schema) fails the parse before deserialization into [`AgentManifest`] is
//! attempted.

use std::path::Path;

use crate::error::{CadenzaError, Result};
use crate::manifest::AgentManifest;

/// Label used for manifests parsed from in-memory sources.
const INLINE_LABEL: &str = "<inline>";

/// Load and validate an agent manifest from a YAML file.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<AgentManifest> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let source = std::fs::read_to_string(path)
        .map_err(|e| CadenzaError::parse(label.clone(), e.to_string()))?;
    parse_labeled(&source, &label)
}

/// Parse and validate an agent manifest from a YAML source string.
pub fn parse_manifest(source: &str) -> Result<AgentManifest> {
    parse_labeled(source, INLINE_LABEL)
}

fn parse_labeled(source: &str, label: &str) -> Result<AgentManifest> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(source).map_err(|e| CadenzaError::parse(label, e.to_string()))?;

    reject_tags(&document, label)?;

    if !matches!(document, serde_yaml::Value::Mapping(_)) {
        return Err(CadenzaError::parse(
            label,
            "manifest must be a top-level mapping",
        ));
    }

    let manifest: AgentManifest = serde_yaml::from_value(document)
        .map_err(|e| CadenzaError::parse(label, e.to_string()))?;

    manifest.validate()?;
    Ok(manifest)
}

/// Walk the document and fail on any tagged node, including mapping keys.
/// Tags are the YAML mechanism for requesting language-native object
/// construction and must never survive the parse.
fn reject_tags(value: &serde_yaml::Value, label: &str) -> Result<()> {
    match value {
        serde_yaml::Value::Tagged(tagged) => Err(CadenzaError::parse(
            label,
            format!("unsupported YAML tag '{}'", tagged.tag),
        )),
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                reject_tags(item, label)?;
            }
            Ok(())
        }
        serde_yaml::Value::Mapping(mapping) => {
            for (key, val) in mapping {
                reject_tags(key, label)?;
                reject_tags(val, label)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
metadata:
  name: "test-agent"
  version: "1.0"
workflow:
  - id: one
    type: llm
    config:
      messages: "$input.messages"
    result: out
"#;

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = parse_manifest(MINIMAL).unwrap();
        assert_eq!(manifest.metadata.name, "test-agent");
        assert_eq!(manifest.workflow.len(), 1);
        assert_eq!(manifest.workflow[0].step_type, "llm");
        assert_eq!(manifest.workflow[0].result.as_deref(), Some("out"));
        assert!(!manifest.observability_enabled());
    }

    #[test]
    fn test_parse_return_template_and_observability() {
        let yaml = r#"
metadata:
  name: "shaped"
  version: "2.0"
  observability:
    enabled: "true"
workflow:
  - id: s1
    type: output-generator
    config:
      template:
        ok: true
return:
  ok: true
  text: "$stepResult.s1.value"
"#;
        let manifest = parse_manifest(yaml).unwrap();
        assert!(manifest.observability_enabled());
        let template = manifest.return_template.unwrap();
        assert_eq!(template["ok"], serde_json::json!(true));
    }

    #[test]
    fn test_rejects_tagged_nodes() {
        let yaml = r#"
metadata:
  name: "evil"
  version: "1.0"
workflow:
  - id: s1
    type: llm
    config: !!python/object:os.system "rm -rf /"
"#;
        let err = parse_manifest(yaml).unwrap_err();
        assert!(matches!(err, CadenzaError::Parse { .. }));
        assert!(format!("{err}").contains("tag"));
    }

    #[test]
    fn test_rejects_custom_tag_anywhere() {
        let yaml = r#"
metadata:
  name: !custom "x"
  version: "1.0"
workflow:
  - id: s1
    type: llm
"#;
        assert!(parse_manifest(yaml).is_err());
    }

    #[test]
    fn test_rejects_non_mapping_document() {
        let err = parse_manifest("- just\n- a\n- list\n").unwrap_err();
        assert!(format!("{err}").contains("top-level mapping"));
    }

    #[test]
    fn test_rejects_empty_workflow() {
        let yaml = r#"
metadata:
  name: "empty"
  version: "1.0"
workflow: []
"#;
        let err = parse_manifest(yaml).unwrap_err();
        assert!(matches!(err, CadenzaError::Validation { .. }));
    }

    #[test]
    fn test_missing_metadata_is_a_parse_error() {
        let yaml = r#"
workflow:
  - id: s1
    type: llm
"#;
        let err = parse_manifest(yaml).unwrap_err();
        assert!(matches!(err, CadenzaError::Parse { .. }));
    }

    #[test]
    fn test_load_manifest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let manifest = load_manifest(file.path()).unwrap();
        assert_eq!(manifest.metadata.name, "test-agent");
    }

    #[test]
    fn test_load_manifest_missing_file_names_path() {
        let err = load_manifest("/definitely/not/here.yaml").unwrap_err();
        assert!(format!("{err}").contains("/definitely/not/here.yaml"));
    }
}
