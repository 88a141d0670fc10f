//! File configuration and merging with CLI arguments.
//!
//! The file is a flat list of `key = value` lines with `#` comments:
//!
//! ```text
//! api_key = "0123abcd"
//! directory = "/srv/videos"
//! quality = "high"
//! exclude_categories = ["Quick Look", "Giant Bombcast"]
//! backfill_days = 14
//! ```

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use catalog_sync_core::Quality;
use catalog_sync_core::catalog::DEFAULT_API_BASE_URL;
use catalog_sync_core::download::{CONNECT_TIMEOUT_SECS, IDLE_TIMEOUT_SECS};
use catalog_sync_core::session::DEFAULT_BACKFILL_DAYS;

use crate::cli::Args;

const APP_DIR: &str = "catalog-sync";
const CONFIG_FILE: &str = "config.toml";

/// Values read from the config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub directory: Option<PathBuf>,
    pub quality: Option<Quality>,
    pub backfill_days: Option<u32>,
    pub exclude_categories: Option<Vec<String>>,
    pub api_base_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("idle_timeout_secs", self.idle_timeout_secs)?;
        if let Some(days) = self.backfill_days
            && days > 3650
        {
            bail!("Invalid config value for `backfill_days`: {days}. Expected range: 0..=3650");
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Fully merged settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub api_key: String,
    pub directory: PathBuf,
    pub quality: Quality,
    pub excluded_categories: Vec<String>,
    pub backfill_days: u32,
    pub api_base_url: String,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/catalog-sync/config.toml`
/// 2. `$HOME/.config/catalog-sync/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the file config.
///
/// An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Merges CLI arguments over file values over built-in defaults.
pub fn merge(args: &Args, file: Option<FileConfig>) -> Result<RunSettings> {
    let file = file.unwrap_or_default();

    let Some(api_key) = args
        .api_key
        .clone()
        .or(file.api_key)
        .filter(|key| !key.trim().is_empty())
    else {
        bail!("missing API key: pass --api-key, set CATALOG_SYNC_API_KEY, or add api_key to the config file");
    };

    let quality = match args.quality.as_deref() {
        Some(raw) => raw
            .parse::<Quality>()
            .with_context(|| format!("Invalid --quality value '{raw}'"))?,
        None => file.quality.unwrap_or_default(),
    };

    let excluded_categories = if args.exclude.is_empty() {
        file.exclude_categories.unwrap_or_default()
    } else {
        args.exclude.clone()
    };

    Ok(RunSettings {
        api_key,
        directory: args
            .directory
            .clone()
            .or(file.directory)
            .unwrap_or_else(|| PathBuf::from(".")),
        quality,
        excluded_categories,
        backfill_days: args
            .backfill_days
            .or(file.backfill_days)
            .unwrap_or(DEFAULT_BACKFILL_DAYS),
        api_base_url: args
            .api_base_url
            .clone()
            .or(file.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        connect_timeout: Duration::from_secs(
            file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
        ),
        idle_timeout: Duration::from_secs(file.idle_timeout_secs.unwrap_or(IDLE_TIMEOUT_SECS)),
    })
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "api_key" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `api_key` value on line {line_no}"))?;
                cfg.api_key = Some(parsed);
            }
            "directory" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `directory` value on line {line_no}"))?;
                cfg.directory = Some(PathBuf::from(parsed));
            }
            "quality" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `quality` value on line {line_no}"))?;
                cfg.quality = Some(parsed.parse::<Quality>().with_context(|| {
                    format!("Invalid `quality` value '{parsed}' on line {line_no}")
                })?);
            }
            "backfill_days" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `backfill_days` value on line {line_no}"))?;
                let days = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("backfill_days out of range for u32"))?;
                cfg.backfill_days = Some(days);
            }
            "exclude_categories" => {
                let parsed = parse_string_array(value).with_context(|| {
                    format!("Invalid `exclude_categories` value on line {line_no}")
                })?;
                cfg.exclude_categories = Some(parsed);
            }
            "api_base_url" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `api_base_url` value on line {line_no}"))?;
                cfg.api_base_url = Some(parsed);
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_no}")
                })?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "idle_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `idle_timeout_secs` value on line {line_no}")
                })?;
                cfg.idle_timeout_secs = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    let inner = &raw_value[1..raw_value.len() - 1];
    if inner.contains('"') {
        bail!("Unexpected quote inside string");
    }
    Ok(inner.to_string())
}

fn parse_string_array(raw_value: &str) -> Result<Vec<String>> {
    let Some(inner) = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        bail!("Expected array of double-quoted strings");
    };

    let mut items = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (index, ch) in inner.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ',' if !in_string => {
                items.push(parse_string_literal(inner[start..index].trim())?);
                start = index + 1;
            }
            _ => {}
        }
    }
    if in_string {
        bail!("Unterminated string in array");
    }
    let last = inner[start..].trim();
    // A trailing comma leaves an empty final element.
    if !last.is_empty() {
        items.push(parse_string_literal(last)?);
    }
    Ok(items)
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["catalog-sync"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
# catalog-sync settings
api_key = "abc123"
directory = "/srv/videos"
quality = "low"
backfill_days = 30
exclude_categories = ["Quick Look", "Giant Bombcast"] # noisy shows
api_base_url = "http://localhost:8080/api"
connect_timeout_secs = 10
idle_timeout_secs = 120
"#,
        )
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("abc123"));
        assert_eq!(cfg.directory, Some(PathBuf::from("/srv/videos")));
        assert_eq!(cfg.quality, Some(Quality::Low));
        assert_eq!(cfg.backfill_days, Some(30));
        assert_eq!(
            cfg.exclude_categories,
            Some(vec!["Quick Look".to_string(), "Giant Bombcast".to_string()])
        );
        assert_eq!(cfg.api_base_url.as_deref(), Some("http://localhost:8080/api"));
        assert_eq!(cfg.connect_timeout_secs, Some(10));
        assert_eq!(cfg.idle_timeout_secs, Some(120));
    }

    #[test]
    fn test_parse_config_hash_inside_string_is_not_a_comment() {
        let cfg = parse_config_str(r##"exclude_categories = ["Show #1", "B, C"]"##).unwrap();
        assert_eq!(
            cfg.exclude_categories,
            Some(vec!["Show #1".to_string(), "B, C".to_string()])
        );
    }

    #[test]
    fn test_parse_config_empty_array() {
        let cfg = parse_config_str("exclude_categories = []").unwrap();
        assert_eq!(cfg.exclude_categories, Some(Vec::new()));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_array_item() {
        let err = parse_config_str("exclude_categories = [Quick Look]").unwrap_err();
        assert!(format!("{err:#}").contains("exclude_categories"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_quality() {
        let err = parse_config_str(r#"quality = "ultra""#).unwrap_err();
        assert!(format!("{err:#}").contains("quality"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("idle_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("idle_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("output_dir = \"x\"").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("output_dir"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("api_key").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_config_path_prefers_xdg() {
        let path = config_path_from(Some("/xdg".into()), Some("/home/u".into())).unwrap();
        assert_eq!(path, PathBuf::from("/xdg/catalog-sync/config.toml"));

        let path = config_path_from(None, Some("/home/u".into())).unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.config/catalog-sync/config.toml"));

        assert!(config_path_from(None, None).is_none());
    }

    #[test]
    fn test_merge_defaults() {
        let file = FileConfig {
            api_key: Some("from-file".to_string()),
            ..FileConfig::default()
        };
        let settings = merge(&args(&[]), Some(file)).unwrap();
        assert_eq!(settings.directory, PathBuf::from("."));
        assert_eq!(settings.quality, Quality::Hd);
        assert_eq!(settings.backfill_days, 7);
        assert!(settings.excluded_categories.is_empty());
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.idle_timeout, Duration::from_secs(IDLE_TIMEOUT_SECS));
    }

    #[test]
    fn test_merge_cli_overrides_file() {
        let file = FileConfig {
            api_key: Some("from-file".to_string()),
            directory: Some(PathBuf::from("/file")),
            quality: Some(Quality::High),
            backfill_days: Some(3),
            exclude_categories: Some(vec!["A".to_string()]),
            ..FileConfig::default()
        };
        let settings = merge(
            &args(&["-k", "cli-key", "-d", "/cli", "-Q", "low", "-b", "1", "-x", "B"]),
            Some(file),
        )
        .unwrap();
        assert_eq!(settings.api_key, "cli-key");
        assert_eq!(settings.directory, PathBuf::from("/cli"));
        assert_eq!(settings.quality, Quality::Low);
        assert_eq!(settings.backfill_days, 1);
        assert_eq!(settings.excluded_categories, vec!["B".to_string()]);
    }

    #[test]
    fn test_merge_file_fills_gaps() {
        let file = FileConfig {
            api_key: Some("from-file".to_string()),
            exclude_categories: Some(vec!["A".to_string()]),
            idle_timeout_secs: Some(5),
            ..FileConfig::default()
        };
        let mut cli = args(&["-d", "/cli"]);
        cli.api_key = None;
        let settings = merge(&cli, Some(file)).unwrap();
        assert_eq!(settings.api_key, "from-file");
        assert_eq!(settings.excluded_categories, vec!["A".to_string()]);
        assert_eq!(settings.idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_merge_missing_api_key_is_error() {
        let mut cli = args(&[]);
        cli.api_key = None;
        let err = merge(&cli, None).unwrap_err();
        assert!(err.to_string().contains("missing API key"));

        cli.api_key = Some("   ".to_string());
        assert!(merge(&cli, None).is_err());
    }

    #[test]
    fn test_merge_rejects_bad_cli_quality() {
        let mut cli = args(&["-Q", "ultra"]);
        cli.api_key = Some("k".to_string());
        assert!(merge(&cli, None).is_err());
    }

    #[test]
    fn test_load_file_config_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_file_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_file_config_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "backfill_days = 2\n").unwrap();
        let cfg = load_file_config(Some(&path)).unwrap().unwrap();
        assert_eq!(cfg.backfill_days, Some(2));
    }
}
