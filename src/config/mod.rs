//! Session configuration.
//!
//! A [`Configuration`] is built once per session and shared, unchanged, by
//! every compilation stage of that session. [`Settings`] is its on-disk
//! TOML form (`sift.toml`):
//!
//! ```toml
//! time_zone = "+02:00"
//! fetch_size = 500
//! request_timeout = "90s"
//! page_timeout = "45s"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::UtcOffset;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid time zone offset: {0}")]
    InvalidTimeZone(String),

    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),
}

/// Immutable per-session compilation settings.
///
/// Cheap to clone; the session clones it into the compilation context
/// installed around each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    time_zone: UtcOffset,
    fetch_size: usize,
    request_timeout: Duration,
    page_timeout: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            time_zone: UtcOffset::UTC,
            fetch_size: 1000,
            request_timeout: Duration::from_secs(90),
            page_timeout: Duration::from_secs(45),
        }
    }
}

impl Configuration {
    pub fn new(
        time_zone: UtcOffset,
        fetch_size: usize,
        request_timeout: Duration,
        page_timeout: Duration,
    ) -> Self {
        Self {
            time_zone,
            fetch_size,
            request_timeout,
            page_timeout,
        }
    }

    /// Set the offset applied to date/time literals at parse time.
    pub fn with_time_zone(mut self, time_zone: UtcOffset) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// Set the page size handed to the physical planner.
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn time_zone(&self) -> UtcOffset {
        self.time_zone
    }

    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn page_timeout(&self) -> Duration {
        self.page_timeout
    }
}

/// On-disk configuration (`sift.toml`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Fixed offset, e.g. `"Z"`, `"+02:00"`, `"-05:30"`.
    pub time_zone: String,

    /// Documents fetched per page.
    pub fetch_size: usize,

    /// Total request timeout (e.g. "90s", "5m").
    pub request_timeout: String,

    /// Per-page timeout (e.g. "45s").
    pub page_timeout: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_zone: "Z".to_string(),
            fetch_size: 1000,
            request_timeout: "90s".to_string(),
            page_timeout: "45s".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Convert to the in-memory session configuration.
    pub fn to_configuration(&self) -> Result<Configuration, SettingsError> {
        Ok(Configuration {
            time_zone: parse_offset(&self.time_zone)?,
            fetch_size: self.fetch_size,
            request_timeout: parse_duration(&self.request_timeout)?,
            page_timeout: parse_duration(&self.page_timeout)?,
        })
    }
}

/// Parse a fixed offset: `Z`, `+HH:MM` or `-HH:MM`.
fn parse_offset(raw: &str) -> Result<UtcOffset, SettingsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("z") || trimmed == "UTC" {
        return Ok(UtcOffset::UTC);
    }
    let invalid = || SettingsError::InvalidTimeZone(raw.to_string());
    let (sign, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
        (1i8, rest)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (-1i8, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };
    let hours: i8 = hours.parse().map_err(|_| invalid())?;
    let minutes: i8 = minutes.parse().map_err(|_| invalid())?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).map_err(|_| invalid())
}

/// Parse a duration string: `"30s"`, `"5m"`, `"1h"`.
fn parse_duration(raw: &str) -> Result<Duration, SettingsError> {
    let trimmed = raw.trim();
    let invalid = || SettingsError::InvalidDuration(raw.to_string());
    let (value, scale) = if let Some(value) = trimmed.strip_suffix('s') {
        (value, 1)
    } else if let Some(value) = trimmed.strip_suffix('m') {
        (value, 60)
    } else if let Some(value) = trimmed.strip_suffix('h') {
        (value, 3600)
    } else {
        return Err(invalid());
    };
    let value: u64 = value.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(value * scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_convert() {
        let config = Settings::default().to_configuration().unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn offset_parsing() {
        assert_eq!(parse_offset("Z").unwrap(), UtcOffset::UTC);
        assert_eq!(
            parse_offset("+02:00").unwrap(),
            UtcOffset::from_hms(2, 0, 0).unwrap()
        );
        assert_eq!(
            parse_offset("-05:30").unwrap(),
            UtcOffset::from_hms(-5, -30, 0).unwrap()
        );
        assert!(parse_offset("monday").is_err());
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert!(parse_duration("5 fortnights").is_err());
    }

    #[test]
    fn settings_round_trip() {
        let settings: Settings = toml::from_str(
            r#"
            time_zone = "+01:00"
            fetch_size = 250
            "#,
        )
        .unwrap();
        assert_eq!(settings.fetch_size, 250);
        // unspecified keys fall back to defaults
        assert_eq!(settings.request_timeout, "90s");
        let config = settings.to_configuration().unwrap();
        assert_eq!(config.time_zone(), UtcOffset::from_hms(1, 0, 0).unwrap());
    }
}
