use std::{
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use shared::domain::DEFAULT_PAGE_SIZE;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub page_size: NonZeroUsize,
    pub step_delay: Duration,
    pub fetch_latency: Duration,
    pub fail_at_offset: Option<usize>,
    pub output: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            step_delay: Duration::from_millis(1000),
            fetch_latency: Duration::from_millis(100),
            fail_at_offset: None,
            output: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    page_size: Option<usize>,
    step_delay_ms: Option<u64>,
    fetch_latency_ms: Option<u64>,
    fail_at_offset: Option<usize>,
    output: Option<OutputFormat>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("{key} must be greater than zero")]
    ZeroPageSize { key: String },
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings =
                toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            settings.apply_file(file_cfg)?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    settings.apply_env(|key| std::env::var(key).ok())?;
    Ok(settings)
}

impl Settings {
    fn apply_file(&mut self, file_cfg: FileSettings) -> Result<(), ConfigError> {
        if let Some(v) = file_cfg.page_size {
            self.page_size = page_size("page_size", v)?;
        }
        if let Some(v) = file_cfg.step_delay_ms {
            self.step_delay = Duration::from_millis(v);
        }
        if let Some(v) = file_cfg.fetch_latency_ms {
            self.fetch_latency = Duration::from_millis(v);
        }
        if file_cfg.fail_at_offset.is_some() {
            self.fail_at_offset = file_cfg.fail_at_offset;
        }
        if let Some(v) = file_cfg.output {
            self.output = v;
        }
        Ok(())
    }

    /// Later keys win: `APP__PAGE_SIZE` overrides `PAGER_PAGE_SIZE`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        for key in ["PAGER_PAGE_SIZE", "APP__PAGE_SIZE"] {
            if let Some(v) = lookup(key) {
                self.page_size = page_size(key, parse(key, &v)?)?;
            }
        }
        if let Some(v) = lookup("APP__STEP_DELAY_MS") {
            self.step_delay = Duration::from_millis(parse("APP__STEP_DELAY_MS", &v)?);
        }
        if let Some(v) = lookup("APP__FETCH_LATENCY_MS") {
            self.fetch_latency = Duration::from_millis(parse("APP__FETCH_LATENCY_MS", &v)?);
        }
        if let Some(v) = lookup("APP__FAIL_AT_OFFSET") {
            self.fail_at_offset = Some(parse("APP__FAIL_AT_OFFSET", &v)?);
        }
        if let Some(v) = lookup("APP__OUTPUT") {
            self.output = match v.trim().to_ascii_lowercase().as_str() {
                "text" => OutputFormat::Text,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "APP__OUTPUT".into(),
                        value: v,
                    })
                }
            };
        }
        Ok(())
    }

    pub fn set_page_size(&mut self, value: usize) -> Result<(), ConfigError> {
        self.page_size = page_size("--page-size", value)?;
        Ok(())
    }
}

fn page_size(key: &str, value: usize) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or_else(|| ConfigError::ZeroPageSize { key: key.into() })
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
        })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
