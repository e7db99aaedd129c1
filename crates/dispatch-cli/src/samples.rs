use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load a JSON array of samples. Each element is passed to the dispatcher
/// untouched, so malformed samples are allowed and exercise the fallback.
pub fn load_samples(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read samples from {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&text)
        .with_context(|| format!("Samples file {} is not valid JSON", path.display()))?;
    match parsed {
        Value::Array(samples) => Ok(samples),
        other => bail!(
            "Samples file {} must contain a JSON array, found {}",
            path.display(),
            kind(&other)
        ),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loads_mixed_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(&path, r#"[[1, 2, 3], [], "oops", [1, "a"]]"#).unwrap();

        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[2], json!("oops"));
    }

    #[test]
    fn test_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(&path, r#"{"samples": []}"#).unwrap();

        let err = load_samples(&path).unwrap_err();
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_samples(Path::new("/no/such/samples.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read samples"));
    }
}
