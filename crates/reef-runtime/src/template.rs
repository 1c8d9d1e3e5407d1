//! Infrastructure template rendering.
//!
//! The template file is submitted verbatim except for one literal marker
//! line, which is replaced by a rendered secrets block before submission.
//! No structured template engine is involved.

use crate::error::{OrchestratorError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The literal line the secrets block replaces.
pub const SECRETS_MARKER: &str = "          Secrets: #REEF_SECRETS#";

/// Reads the template and substitutes the secrets marker.
///
/// An empty secrets map renders the marker away entirely; the task
/// definition then carries no secret references.
pub fn render(path: &Path, secrets: &BTreeMap<String, String>) -> Result<String> {
    if !path.exists() {
        return Err(OrchestratorError::Validation(format!(
            "infrastructure template does not exist at '{}'",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        OrchestratorError::Validation(format!(
            "failed to read infrastructure template '{}': {e}",
            path.display()
        ))
    })?;

    Ok(contents.replace(SECRETS_MARKER, &secrets_block(secrets)))
}

fn secrets_block(secrets: &BTreeMap<String, String>) -> String {
    if secrets.is_empty() {
        return String::new();
    }

    let mut block = String::from("          Secrets:\n");
    for (name, arn) in secrets {
        block.push_str(&format!(
            "            - Name: {name}\n              ValueFrom: {arn}\n"
        ));
    }
    // Drop the trailing newline: the marker line's own newline survives
    // the replace.
    block.truncate(block.trim_end_matches('\n').len());
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEMPLATE: &str = "\
Resources:
  TaskDefinition:
    Properties:
      ContainerDefinitions:
        - Name: application
          Secrets: #REEF_SECRETS#
          Essential: true
";

    fn write_template() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEMPLATE.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_secrets_render_an_empty_block() {
        let file = write_template();
        let body = render(file.path(), &BTreeMap::new()).unwrap();
        assert!(!body.contains("#REEF_SECRETS#"));
        assert!(!body.contains("Secrets:"));
        assert!(body.contains("- Name: application\n\n          Essential: true"));
    }

    #[test]
    fn secrets_render_sorted_name_value_from_pairs() {
        let file = write_template();
        let secrets = BTreeMap::from([
            ("DB_HOST".to_string(), "arn:cloud:param/db-host".to_string()),
            ("APP_KEY".to_string(), "arn:cloud:param/app-key".to_string()),
        ]);
        let body = render(file.path(), &secrets).unwrap();
        let expected = "\
          Secrets:
            - Name: APP_KEY
              ValueFrom: arn:cloud:param/app-key
            - Name: DB_HOST
              ValueFrom: arn:cloud:param/db-host
          Essential: true";
        assert!(body.contains(expected), "body was:\n{body}");
    }

    #[test]
    fn missing_template_is_a_validation_error() {
        let err = render(Path::new("/nonexistent/template.yml"), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }
}
