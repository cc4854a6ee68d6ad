//! Credential loading and runtime settings.
//!
//! The API credential comes from `ANTHROPIC_API_KEY`, either in the process
//! environment or in a `.env` file next to the executable or in the working
//! directory. A value found in a `.env` file takes precedence so that a stale
//! key exported in the shell cannot shadow the one the user just wrote down.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::DEFAULT_HOST;
use crate::model::providers::anthropic::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const MIN_KEY_LEN: usize = 20;

pub const DEFAULT_MCP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CLI_MAX_ITERATIONS: usize = 15;
pub const DEFAULT_REPORT_PATH: &str = "research_report.md";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY is not set")]
    CredentialMissing,
    #[error("ANTHROPIC_API_KEY is too short ({length} characters, at least 20 expected)")]
    CredentialInvalid { length: usize },
    #[error("invalid value for {name}: '{value}'")]
    InvalidSetting { name: String, value: String },
}

impl ConfigError {
    /// Human-readable steps to fix the problem.
    pub fn remediation(&self) -> Vec<&'static str> {
        match self {
            ConfigError::CredentialMissing => vec![
                "Option 1: create a .env file next to the binary or in the working directory",
                "          containing one line: ANTHROPIC_API_KEY=<your full key>",
                "Option 2: export ANTHROPIC_API_KEY=<your key> in the shell",
                "Get a key at https://console.anthropic.com",
            ],
            ConfigError::CredentialInvalid { .. } => vec![
                "Check the .env file: the line must be ANTHROPIC_API_KEY=<your full key>",
                "with no line break, quotes or spaces inside the key",
            ],
            ConfigError::InvalidSetting { .. } => vec!["Fix or unset the environment variable"],
        }
    }
}

// ============================================================================
// Credential
// ============================================================================

/// An API key. `Debug` and `Display` only ever show a masked preview.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First seven and last four characters, e.g. `sk-ant-...abcd`.
    pub fn preview(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 11 {
            return "***".to_string();
        }
        let head: String = chars[..7].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.preview()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview())
    }
}

/// Strip a BOM, surrounding whitespace and surrounding quotes. Characters
/// inside the key are left alone here; `.env` values have already been
/// through `dotenvy` by then (see [`read_env_file_key`]).
pub fn sanitize_key(raw: &str) -> String {
    raw.replace('\u{feff}', "")
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

/// `.env` locations searched in order: executable directory, then cwd.
pub fn default_env_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        files.push(dir.join(".env"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(".env");
        if !files.contains(&candidate) {
            files.push(candidate);
        }
    }
    files
}

/// Read `ANTHROPIC_API_KEY` from one `.env` file. Unreadable or malformed
/// files are skipped with a warning.
///
/// `dotenvy` expands `$VAR` and `${VAR}` in unquoted and double-quoted
/// values. A key containing `$` must be single-quoted in the file to be
/// read literally.
pub fn read_env_file_key(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };
    let contents = contents.trim_start_matches('\u{feff}');

    for item in dotenvy::from_read_iter(Cursor::new(contents.as_bytes())) {
        match item {
            Ok((key, value)) if key == API_KEY_VAR => {
                let value = sanitize_key(&value);
                return (!value.is_empty()).then_some(value);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Skipping malformed line in {}: {}", path.display(), e);
            }
        }
    }
    None
}

/// Resolve the credential from an environment value and candidate `.env`
/// files. The first file holding the key wins over the environment.
pub fn load_credential_from(
    env_value: Option<String>,
    env_files: &[PathBuf],
) -> Result<Credential, ConfigError> {
    let from_file = env_files
        .iter()
        .find_map(|path| read_env_file_key(path).map(|key| (key, path)));

    let key = match from_file {
        Some((key, path)) => {
            info!("Loaded {} from {}", API_KEY_VAR, path.display());
            key
        }
        None => {
            debug!("No .env with {} found (tried {:?}); using environment", API_KEY_VAR, env_files);
            env_value.as_deref().map(sanitize_key).unwrap_or_default()
        }
    };

    if key.is_empty() {
        return Err(ConfigError::CredentialMissing);
    }

    let credential = Credential(key);
    info!("API key length {}, preview {}", credential.len(), credential.preview());
    if credential.len() < MIN_KEY_LEN {
        return Err(ConfigError::CredentialInvalid {
            length: credential.len(),
        });
    }
    Ok(credential)
}

/// Resolve the credential from the process environment and the default
/// `.env` locations.
pub fn load_credential() -> Result<Credential, ConfigError> {
    load_credential_from(std::env::var(API_KEY_VAR).ok(), &default_env_files())
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub model: String,
    pub mcp_host: String,
    pub mcp_timeout: Duration,
    pub max_iterations: usize,
    pub report_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            mcp_host: DEFAULT_HOST.to_string(),
            mcp_timeout: Duration::from_secs(DEFAULT_MCP_TIMEOUT_SECS),
            max_iterations: DEFAULT_CLI_MAX_ITERATIONS,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Settings::default();

        if let Some(url) = get("ANTHROPIC_BASE_URL") {
            settings.base_url = url;
        }
        if let Some(model) = get("ANTHROPIC_MODEL") {
            settings.model = model;
        }
        if let Some(host) = get("SCHOLAR_MCP_HOST") {
            settings.mcp_host = host;
        }
        if let Some(secs) = get("SCHOLAR_MCP_TIMEOUT_SECS") {
            settings.mcp_timeout = Duration::from_secs(parse_positive("SCHOLAR_MCP_TIMEOUT_SECS", &secs)?);
        }
        if let Some(max) = get("SCHOLAR_MAX_ITERATIONS") {
            settings.max_iterations = parse_positive("SCHOLAR_MAX_ITERATIONS", &max)? as usize;
        }
        if let Some(path) = get("SCHOLAR_REPORT_PATH") {
            settings.report_path = PathBuf::from(path);
        }
        Ok(settings)
    }
}

fn parse_positive(name: &str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidSetting {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    const KEY: &str = "sk-ant-REDACTED";

    fn env_file(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(".env");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("\u{feff}  \"sk-ant-x\"\n"), "sk-ant-x");
        assert_eq!(sanitize_key("'sk ant'"), "sk ant");
        assert_eq!(sanitize_key("   "), "");
    }

    #[test]
    fn test_file_value_wins_over_environment() {
        let dir = TempDir::new().unwrap();
        let path = env_file(&dir, &format!("\u{feff}OTHER=1\nANTHROPIC_API_KEY=\"{KEY}\"\n"));

        let credential =
            load_credential_from(Some("sk-ant-old-environment-key".to_string()), &[path]).unwrap();
        assert_eq!(credential.expose(), KEY);
    }

    #[test]
    fn test_first_file_with_key_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let without_key = env_file(&first, "OTHER=value\n");
        let with_key = env_file(&second, &format!("ANTHROPIC_API_KEY={KEY}\n"));
        let missing = first.path().join("nope/.env");

        let credential = load_credential_from(None, &[missing, without_key, with_key]).unwrap();
        assert_eq!(credential.expose(), KEY);
    }

    #[test]
    fn test_single_quoted_key_is_literal() {
        let dir = TempDir::new().unwrap();
        let key = "sk-ant-api03-ab$cd${EF}gh-wxyz";
        let path = env_file(&dir, &format!("ANTHROPIC_API_KEY='{key}'\n"));

        assert_eq!(read_env_file_key(&path).as_deref(), Some(key));
    }

    #[test]
    fn test_environment_used_when_no_file() {
        let credential = load_credential_from(Some(format!("  {KEY} ")), &[]).unwrap();
        assert_eq!(credential.expose(), KEY);
    }

    #[test]
    fn test_missing_and_short_keys() {
        assert_eq!(load_credential_from(None, &[]), Err(ConfigError::CredentialMissing));
        assert_eq!(
            load_credential_from(Some("\"\"".to_string()), &[]),
            Err(ConfigError::CredentialMissing)
        );
        assert_eq!(
            load_credential_from(Some("sk-short".to_string()), &[]),
            Err(ConfigError::CredentialInvalid { length: 8 })
        );
    }

    #[test]
    fn test_credential_never_prints_secret() {
        let credential = load_credential_from(Some(KEY.to_string()), &[]).unwrap();
        assert_eq!(credential.preview(), "sk-ant-...wxyz");
        assert_eq!(format!("{credential:?}"), "Credential(\"sk-ant-...wxyz\")");
        assert!(!format!("{credential}").contains("abcdefghijklmnop"));
    }

    #[test]
    fn test_settings_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ANTHROPIC_MODEL", "claude-test"),
            ("SCHOLAR_MCP_HOST", "http://localhost"),
            ("SCHOLAR_MCP_TIMEOUT_SECS", "5"),
            ("SCHOLAR_REPORT_PATH", " "),
        ]);
        let settings = Settings::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.model, "claude-test");
        assert_eq!(settings.mcp_host, "http://localhost");
        assert_eq!(settings.mcp_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_iterations, DEFAULT_CLI_MAX_ITERATIONS);
        assert_eq!(settings.report_path, PathBuf::from(DEFAULT_REPORT_PATH));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_settings_reject_bad_numbers() {
        let err = Settings::from_lookup(|name| (name == "SCHOLAR_MAX_ITERATIONS").then(|| "zero".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidSetting {
                name: "SCHOLAR_MAX_ITERATIONS".to_string(),
                value: "zero".to_string(),
            }
        );
    }
}
