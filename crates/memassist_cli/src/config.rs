use chrono::{FixedOffset, Offset, Utc};
use memassist_core::DEFAULT_TOLERANCE;
use std::path::{Path, PathBuf};

/// Offset used to render stored timestamps when none is configured (IST).
const DEFAULT_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// CLI configuration, loaded from `MEMASSIST_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for every default path below.
    pub data_dir: PathBuf,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory of per-name face vector files.
    pub faces_dir: PathBuf,
    /// Directory of stored person photos.
    pub uploads_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    /// Maximum face distance for a match.
    pub tolerance: f64,
    /// Offset applied when rendering stored UTC timestamps.
    pub utc_offset: FixedOffset,
    /// External face encoder command line, if any.
    pub encoder_command: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env(data_dir_override: Option<&Path>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), data_dir_override)
    }

    /// Load configuration through `lookup`.
    ///
    /// `data_dir_override` replaces `MEMASSIST_DATA_DIR`; paths that are not
    /// set explicitly are derived from the resulting data directory.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        data_dir_override: Option<&Path>,
    ) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = data_dir_override
            .map(Path::to_path_buf)
            .or_else(|| var("MEMASSIST_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| default_data_dir(&var));
        let data_dir = absolutize(data_dir);

        let path_or = |key: &str, default: PathBuf| {
            var(key)
                .map(|value| absolutize(PathBuf::from(value)))
                .unwrap_or(default)
        };

        Self {
            db_path: path_or("MEMASSIST_DB_PATH", data_dir.join("memory_assist.db")),
            faces_dir: path_or("MEMASSIST_FACES_DIR", data_dir.join("known_faces")),
            uploads_dir: path_or("MEMASSIST_UPLOADS_DIR", data_dir.join("uploads")),
            log_dir: path_or("MEMASSIST_LOG_DIR", data_dir.join("logs")),
            log_level: var("MEMASSIST_LOG_LEVEL")
                .unwrap_or_else(|| memassist_core::default_log_level().to_string()),
            tolerance: var("MEMASSIST_TOLERANCE")
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite() && *value >= 0.0)
                .unwrap_or(DEFAULT_TOLERANCE),
            utc_offset: var("MEMASSIST_UTC_OFFSET")
                .and_then(|value| parse_utc_offset(&value))
                .unwrap_or_else(default_utc_offset),
            encoder_command: var("MEMASSIST_ENCODER"),
            data_dir,
        }
    }
}

/// Parses `+05:30`, `-0800`, `Z` or `UTC`.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Some(Utc.fix());
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => return None,
    };
    let hours: i32 = hours.parse().ok().filter(|h| (0..=23).contains(h))?;
    let minutes: i32 = minutes.parse().ok().filter(|m| (0..=59).contains(m))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn default_utc_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

fn default_data_dir(var: &impl Fn(&str) -> Option<String>) -> PathBuf {
    var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("memory-assist")
}

fn absolutize(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)], data_dir: Option<&Path>) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned(), data_dir)
    }

    #[test]
    fn defaults_live_under_xdg_data_home() {
        let config = load(&[("XDG_DATA_HOME", "/srv/data")], None);
        assert_eq!(config.data_dir, PathBuf::from("/srv/data/memory-assist"));
        assert_eq!(
            config.db_path,
            PathBuf::from("/srv/data/memory-assist/memory_assist.db")
        );
        assert_eq!(
            config.faces_dir,
            PathBuf::from("/srv/data/memory-assist/known_faces")
        );
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.utc_offset.local_minus_utc(), 19_800);
        assert!(config.encoder_command.is_none());
    }

    #[test]
    fn home_fallback_when_xdg_missing() {
        let config = load(&[("HOME", "/home/ravi")], None);
        assert_eq!(
            config.data_dir,
            PathBuf::from("/home/ravi/.local/share/memory-assist")
        );
    }

    #[test]
    fn flag_overrides_env_data_dir_but_not_explicit_paths() {
        let config = load(
            &[
                ("MEMASSIST_DATA_DIR", "/env/dir"),
                ("MEMASSIST_DB_PATH", "/db/custom.db"),
            ],
            Some(Path::new("/flag/dir")),
        );
        assert_eq!(config.data_dir, PathBuf::from("/flag/dir"));
        assert_eq!(config.db_path, PathBuf::from("/db/custom.db"));
        assert_eq!(config.uploads_dir, PathBuf::from("/flag/dir/uploads"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = load(
            &[
                ("HOME", "/h"),
                ("MEMASSIST_TOLERANCE", "-1"),
                ("MEMASSIST_UTC_OFFSET", "later"),
                ("MEMASSIST_ENCODER", "   "),
            ],
            None,
        );
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.utc_offset.local_minus_utc(), 19_800);
        assert!(config.encoder_command.is_none());
    }

    #[test]
    fn utc_offsets_parse() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_utc_offset("-0800").unwrap().local_minus_utc(), -28_800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("noon").is_none());
        assert!(parse_utc_offset("+25:00").is_none());
    }
}
