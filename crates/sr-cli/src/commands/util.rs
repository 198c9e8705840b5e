//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use regex::Regex;

use sr_db::Database;

use crate::Config;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Pre-compiled regex for granularity parsing.
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(s|m|h)$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Conservative bound for granularities (one week in seconds).
const MAX_DURATION_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    // Try ISO 8601 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try relative time: "N hours/minutes/days/weeks ago"
    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    let duration = Duration::minutes(n * minutes_per_unit);
    Ok(now() - duration)
}

/// Parse a granularity such as "30s", "15m" or "1h".
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let Some(caps) = DURATION_RE.captures(s.trim()) else {
        anyhow::bail!("Invalid duration: {s}. Use <n>s, <n>m or <n>h (e.g., 15m)");
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in duration")?;
    let seconds_per_unit = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        unit => anyhow::bail!("Unknown duration unit: {unit}"),
    };

    if n > MAX_DURATION_SECONDS / seconds_per_unit {
        anyhow::bail!("Duration too large: {s}");
    }
    Ok(Duration::seconds(n * seconds_per_unit))
}

/// The current time at the precision the event store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a situation length as "1h05m", "42m" or "30s".
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds();
    let (hours, minutes) = (seconds / 3600, (seconds % 3600) / 60);
    if hours > 0 {
        format!("{hours}h{minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

/// Open the configured database, creating its parent directory if needed.
pub fn open_database(config: &Config) -> anyhow::Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok(db.with_page_size(config.page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_datetime_accepts_rfc3339() {
        let dt = parse_datetime("2025-01-15T09:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-15T09:30:00+00:00");
    }

    #[test]
    fn parse_datetime_accepts_relative() {
        let before = Utc::now();
        let dt = parse_datetime("2 hours ago").unwrap();
        let expected = before - Duration::hours(2);
        assert!((dt - expected).num_seconds().abs() <= 1);
    }

    #[test]
    fn parse_datetime_rejects_garbage() {
        let err = parse_datetime("yesterday-ish").unwrap_err();
        assert!(err.to_string().starts_with("Invalid datetime"));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("1h").unwrap(), Duration::hours(1));
        assert_eq!(parse_duration(" 5 m ").unwrap(), Duration::minutes(5));
    }

    #[test]
    fn parse_duration_rejects_invalid() {
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("9999h").is_err());
    }

    #[test]
    fn format_duration_picks_largest_unit() {
        assert_eq!(format_duration(Duration::minutes(65)), "1h05m");
        assert_eq!(format_duration(Duration::minutes(42)), "42m");
        assert_eq!(format_duration(Duration::seconds(30)), "30s");
    }

    #[test]
    fn open_database_creates_parent_directory() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("nested/dir/sr.db"),
            ..Config::default()
        };
        open_database(&config).unwrap();
        assert!(config.database_path.exists());
    }
}
