//! Template file loader
//!
//! Load workflow templates from YAML files, validating on load.

use std::path::Path;

use super::template::{TemplateError, WorkflowTemplate};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("invalid template in {file}: {error}")]
    Invalid { file: String, error: TemplateError },
}

pub struct TemplateLoader;

impl TemplateLoader {
    pub fn load_directory(dir: &Path) -> Result<Vec<WorkflowTemplate>, LoadError> {
        let mut templates = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() {
                let ext = path.extension().and_then(|e| e.to_str());
                if ext == Some("yaml") || ext == Some("yml") {
                    templates.push(Self::load_file(&path)?);
                }
            }
        }

        Ok(templates)
    }

    pub fn load_file(path: &Path) -> Result<WorkflowTemplate, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let template: WorkflowTemplate =
            serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
                file: path.display().to_string(),
                error: e,
            })?;
        template.validate().map_err(|e| LoadError::Invalid {
            file: path.display().to_string(),
            error: e,
        })?;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const VALID_TEMPLATE: &str = r#"
id: tpl-review
tenant_id: acme
name: Document Review
steps:
  - id: review
    name: Peer Review
    kind: review
    order: 1
    assignees:
      - type: role
        role: reviewer
  - id: signoff
    name: Final Signoff
    kind: approval
    order: 2
    assignees:
      - type: user
        id: lead
"#;

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("review.yaml");
        fs::write(&path, VALID_TEMPLATE).unwrap();

        let template = TemplateLoader::load_file(&path).unwrap();
        assert_eq!(template.id, "tpl-review");
        assert_eq!(template.steps.len(), 2);
    }

    #[test]
    fn test_load_directory_skips_non_yaml() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("review.yaml"), VALID_TEMPLATE).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let templates = TemplateLoader::load_directory(dir.path()).unwrap();
        assert_eq!(templates.len(), 1);
    }

    #[test]
    fn test_load_rejects_invalid_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        fs::write(
            &path,
            r#"
id: tpl-empty
tenant_id: acme
name: Empty
steps: []
"#,
        )
        .unwrap();

        assert!(matches!(
            TemplateLoader::load_file(&path),
            Err(LoadError::Invalid { .. })
        ));
    }
}
