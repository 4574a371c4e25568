use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ENV_TOKEN_VAR: &str = "GHI_GITHUB_TOKEN";
pub const ENV_USERNAME_VAR: &str = "GHI_USERNAME";
pub const ENV_DB_PATH_VAR: &str = "GHI_DB_PATH";

/// Settings read from the environment, falling back to the env file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub username: Option<String>,
    pub db_path: Option<PathBuf>,
}

impl Credentials {
    /// Read the process environment and the env file at `env_file`.
    /// A variable set in the process environment wins.
    pub fn load(env_file: &Path) -> Result<Self> {
        let file = read_env_file(env_file)?;
        Ok(Self::resolve(|key| std::env::var(key).ok(), &file))
    }

    pub fn resolve(process_env: impl Fn(&str) -> Option<String>, file: &BTreeMap<String, String>) -> Self {
        let lookup = |key: &str| {
            process_env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or_else(|| file.get(key).cloned().filter(|v| !v.is_empty()))
        };
        Self {
            token: lookup(ENV_TOKEN_VAR),
            username: lookup(ENV_USERNAME_VAR),
            db_path: lookup(ENV_DB_PATH_VAR).map(PathBuf::from),
        }
    }
}

/// Get the env file path (~/.config/ghi/env)
pub fn get_env_file_path() -> Result<PathBuf> {
    Ok(crate::config::get_config_dir()?.join("env"))
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is allowed and surrounding quotes are stripped.
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Load the env file. A missing file is empty.
pub fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file at {}", path.display()))?;
    Ok(parse_env_file(&content))
}

/// Merge `updates` into the env file and rewrite it atomically.
/// Keys already in the file but not in `updates` are kept.
pub fn update_env_file(path: &Path, updates: &[(&str, String)]) -> Result<()> {
    let mut values = read_env_file(path)?;
    for (key, value) in updates {
        values.insert(key.to_string(), value.clone());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    // Restrict the temp file before any secret is written to it
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
    }
    writeln!(file, "# Written by ghi auth set")?;
    for (key, value) in &values {
        writeln!(file, "{}={}", key, value)?;
    }
    file.commit().context("Failed to save env file")?;

    Ok(())
}

/// Show only the first and last four characters of a secret
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(4));
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
