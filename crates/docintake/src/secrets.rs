//! Provider credential resolution.
//!
//! A credential can be supplied three ways, checked in this order:
//!
//! 1. **Direct value** in the config (`api_key`), handy for local runs
//! 2. **File** (`api_key_file`), for mounted secrets
//! 3. **Environment variable** (`api_key_env_var`)

use secrecy::SecretString;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// The three places a single credential may come from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn new(direct: Option<&'a str>, file_path: Option<&'a str>, env_var: Option<&'a str>) -> Self {
        Self {
            direct,
            file_path,
            env_var,
        }
    }

    pub fn resolve(&self) -> Result<SecretString> {
        resolve_secret(self.direct, self.file_path, self.env_var)
    }

    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        resolve_secret_optional(self.direct, self.file_path, self.env_var)
    }

    pub fn is_configured(&self) -> bool {
        has_secret_source(self.direct, self.file_path, self.env_var)
    }
}

/// Resolves a secret from the first non-empty source.
///
/// Whitespace around file and env values is trimmed.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = non_empty(direct) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = non_empty(file_path) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path: expanded });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = non_empty(env_var) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but "nothing configured" is `Ok(None)`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    non_empty(direct).is_some() || non_empty(file_path).is_some() || non_empty(env_var).is_some()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Expands a leading `~` or `~/` to the current user's home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_direct_value_wins() {
        let secret = resolve_secret(Some("direct"), Some("/nonexistent"), Some("NOPE")).unwrap();
        assert_eq!(secret.expose_secret(), "direct");
    }

    #[test]
    fn test_empty_direct_falls_through_to_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        let path = file.path().to_str().unwrap();

        let secret = resolve_secret(Some(""), Some(path), None).unwrap();
        assert_eq!(secret.expose_secret(), "from-file");
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = resolve_secret(None, Some("/nonexistent/key"), Some("IGNORED"));
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_blank_file_is_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let result = resolve_secret(None, Some(path), None);
        assert!(matches!(result, Err(SecretError::EmptyFile { .. })));
    }

    #[test]
    #[serial]
    fn test_env_var_source() {
        std::env::set_var("DOCINTAKE_TEST_SECRET", "env-value\n");
        let secret = resolve_secret(None, None, Some("DOCINTAKE_TEST_SECRET")).unwrap();
        assert_eq!(secret.expose_secret(), "env-value");
        std::env::remove_var("DOCINTAKE_TEST_SECRET");
    }

    #[test]
    #[serial]
    fn test_env_var_not_set() {
        std::env::remove_var("DOCINTAKE_TEST_MISSING");
        let result = resolve_secret(None, None, Some("DOCINTAKE_TEST_MISSING"));
        assert!(matches!(result, Err(SecretError::EnvVarNotSet { .. })));
    }

    #[test]
    fn test_no_source() {
        assert!(matches!(
            resolve_secret(None, Some(""), None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());
    }

    #[test]
    fn test_secret_source_struct() {
        let source = SecretSource::new(None, None, Some("X"));
        assert!(source.is_configured());
        assert!(!SecretSource::default().is_configured());
        assert!(SecretSource::default().resolve_optional().unwrap().is_none());
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/etc/key"), "/etc/key");
        assert_eq!(expand_home("~user/key"), "~user/key");
    }
}
