use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use toml::Value;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "icc.toml";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

fn default_timeout_secs() -> u64 {
    30
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub base_url_env: Option<String>,
    pub token: Option<String>,
    pub token_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            base_url_env: None,
            token: None,
            token_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Literal value first, then the named env var, then the local default.
    pub fn resolved_base_url(&self) -> String {
        resolve_string_field(Some(self.base_url.as_str()), self.base_url_env.as_deref())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn resolved_token(&self) -> Option<String> {
        resolve_string_field(self.token.as_deref(), self.token_env.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between the end of one poll and the start of the next.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
    pub project: ProjectConfig,
}

impl ConsoleConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        value
            .try_into()
            .map_err(|e| Error::config(format!("invalid configuration: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// The project to watch: explicit override, then `[project] id`.
    pub fn project_id(&self, cli_override: Option<&str>) -> Result<String> {
        let raw = cli_override
            .map(str::to_string)
            .or_else(|| self.project.id.clone())
            .ok_or_else(|| Error::config("no project id (use --project or [project] id)"))?;
        validate_project_id(&raw)
    }
}

static PROJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("project id pattern"));

/// Project ids end up in URL paths; keep them to a conservative charset.
pub fn validate_project_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() || id == "." || id == ".." || !PROJECT_ID_RE.is_match(id) {
        return Err(Error::config(format!("invalid project id '{raw}'")));
    }
    Ok(id.to_string())
}

fn resolve_env_ref(env_key: Option<&str>) -> Option<String> {
    env_key
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn resolve_string_field(literal: Option<&str>, env_key: Option<&str>) -> Option<String> {
    let direct = literal
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned);
    direct.or_else(|| resolve_env_ref(env_key))
}

/// Overlay `child` onto `base`, recursing into tables; everything else replaces.
pub fn merge(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::config(format!(
            "config extends cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::config(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(ext) = value.get("extends").and_then(Value::as_str) {
        let base_path = resolve_ref_path(path, ext);
        out = load_value_inner(&base_path, stack)?;
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
    }
    merge(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

/// Load a config file, following single-parent `extends` chains.
pub fn load(path: &Path) -> Result<ConsoleConfig> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    ConsoleConfig::from_value(value)
}

/// Explicit path must exist; without one, `icc.toml` is used when present.
pub fn load_or_default(path: Option<&Path>) -> Result<ConsoleConfig> {
    match path {
        Some(p) => load(p),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                load(fallback)
            } else {
                Ok(ConsoleConfig::default())
            }
        }
    }
}
