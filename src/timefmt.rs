//! UTC timestamp and date normalization.
//!
//! Every persisted timestamp is `YYYY-MM-DDTHH:MM:SSZ` and every date is
//! `YYYY-MM-DD`. Inputs with explicit offsets are converted to UTC; naive
//! inputs are assumed to already be UTC. Both normalizers are idempotent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current instant as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn utc_now_iso() -> String {
    Utc::now().format(TS_FORMAT).to_string()
}

/// Current UTC date as `YYYY-MM-DD`.
pub fn today_utc() -> String {
    Utc::now().format(DATE_FORMAT).to_string()
}

/// Normalize a timestamp string to `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Accepts RFC 3339 with any offset (converted to UTC), a naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` (treated as UTC), or a bare `YYYY-MM-DD`
/// (expanded to midnight UTC). Sub-second precision is truncated.
pub fn iso_z(value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(Error::InvalidDate(value.to_string()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(v, DATE_FORMAT) {
        return Ok(format!("{}T00:00:00Z", date.format(DATE_FORMAT)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Ok(dt.with_timezone(&Utc).format(TS_FORMAT).to_string());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc().format(TS_FORMAT).to_string());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().format(TS_FORMAT).to_string());
    }
    Err(Error::InvalidDate(value.to_string()))
}

/// `iso_z` over an optional value, falling back to the current instant.
pub fn iso_z_or_now(value: Option<&str>) -> Result<String> {
    match value {
        Some(v) => iso_z(v),
        None => Ok(utc_now_iso()),
    }
}

/// Normalize a date string to `YYYY-MM-DD`.
///
/// Accepts a plain date or any timestamp `iso_z` accepts (date part taken
/// after UTC conversion).
pub fn date_str(value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(Error::InvalidDate(value.to_string()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(v, DATE_FORMAT) {
        return Ok(date.format(DATE_FORMAT).to_string());
    }
    let ts = iso_z(v)?;
    Ok(ts[..10].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_z_passthrough() {
        assert_eq!(iso_z("2026-02-22T22:00:00Z").unwrap(), "2026-02-22T22:00:00Z");
    }

    #[test]
    fn test_iso_z_idempotent() {
        let once = iso_z("2026-02-22T22:00:00+02:00").unwrap();
        assert_eq!(iso_z(&once).unwrap(), once);
    }

    #[test]
    fn test_iso_z_offset_converted() {
        assert_eq!(iso_z("2026-02-22T22:00:00+02:00").unwrap(), "2026-02-22T20:00:00Z");
    }

    #[test]
    fn test_iso_z_naive_assumed_utc() {
        assert_eq!(iso_z("2026-02-22T22:00:00").unwrap(), "2026-02-22T22:00:00Z");
    }

    #[test]
    fn test_iso_z_expands_bare_date() {
        assert_eq!(iso_z("2026-02-22").unwrap(), "2026-02-22T00:00:00Z");
    }

    #[test]
    fn test_iso_z_rejects_garbage() {
        assert!(iso_z("not a time").is_err());
        assert!(iso_z("").is_err());
    }

    #[test]
    fn test_date_str_idempotent() {
        let once = date_str("2026-02-22").unwrap();
        assert_eq!(date_str(&once).unwrap(), once);
    }

    #[test]
    fn test_date_str_from_timestamp() {
        assert_eq!(date_str("2026-02-22T22:00:00Z").unwrap(), "2026-02-22");
    }

    #[test]
    fn test_date_str_rejects_garbage() {
        assert!(date_str("22/02/2026").is_err());
    }
}
