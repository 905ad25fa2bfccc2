use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

/// Parses a Slack `ts` value (e.g. `"1609459200.000100"`) as a Unix timestamp.
pub fn parse_event_ts(raw: &str) -> Result<f64> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid ts value {raw:?}"))?;
    if !parsed.is_finite() {
        bail!("ts value {raw:?} is not a finite timestamp");
    }
    Ok(parsed)
}

/// Renders a Unix timestamp as `YYYY-MM-DD HH:MM:SS` in UTC.
///
/// Fractional seconds are truncated, matching the precision Slack event
/// timestamps are displayed with.
pub fn format_utc_timestamp(unix_seconds: f64) -> Result<String> {
    let whole_seconds = unix_seconds.floor();
    if !whole_seconds.is_finite()
        || whole_seconds < i64::MIN as f64
        || whole_seconds > i64::MAX as f64
    {
        bail!("timestamp {unix_seconds} is out of range");
    }
    let datetime = DateTime::<Utc>::from_timestamp(whole_seconds as i64, 0)
        .with_context(|| format!("timestamp {unix_seconds} is out of range"))?;
    Ok(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}
