//! # Configuration File Loading
//!
//! Loads the multi-site configuration document from a JSON file.

use crate::error::ConfigError;
use crate::site::SiteConfigSet;
use std::path::Path;

/// Load a site configuration document from a JSON file.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_file;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sites = load_from_file(Path::new("sites.json"))?;
///     let effective = sites.effective("RefArch")?;
///     println!("Batch size: {}", effective.batch_size);
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Returns `ConfigError` for:
/// - File not found, or unreadable (`Io`)
/// - Empty file, invalid JSON or a non-object document
pub fn load_from_file(path: &Path) -> Result<SiteConfigSet, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()),
        _ => ConfigError::Io(e),
    })?;

    SiteConfigSet::parse(&contents).ok_or(ConfigError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"_defaults": {{"batchSize": 20}}, "RefArch": {{}}}}"#).unwrap();

        let sites = load_from_file(file.path()).unwrap();
        assert_eq!(sites.effective("RefArch").unwrap().batch_size, 20);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_from_file(Path::new("/nonexistent/sites.json"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_non_object_document() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[]").unwrap();

        let result = load_from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Malformed)));
    }
}
