use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// `{recordId}-{index}_{channelId}-{userId}_{timestampMs}{extension}`
pub fn canonical_filename(
    record_id: &str,
    index: usize,
    channel_id: &str,
    user_id: &str,
    timestamp_ms: i64,
    extension: &str,
) -> String {
    format!("{record_id}-{index}_{channel_id}-{user_id}_{timestamp_ms}{extension}")
}

/// Name used by the legacy import format: `{caveId}_{index}_{channelId}_{userId}{extension}`.
pub fn legacy_import_filename(
    cave_id: &str,
    index: usize,
    channel_id: &str,
    user_id: &str,
    extension: &str,
) -> String {
    format!("{cave_id}_{index}_{channel_id}_{user_id}{extension}")
}

/// Parse an ISO-8601 timestamp into Unix epoch milliseconds.
///
/// Accepts RFC 3339, `T` or space separators, optional seconds, and
/// offsets with or without a colon. A trailing `Z` means UTC. Offset-less
/// forms are read as UTC and a bare date maps to midnight UTC.
pub fn iso_to_epoch_ms(iso: &str) -> Option<i64> {
    let iso = iso.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return Some(dt.timestamp_millis());
    }
    let zoned = match iso.strip_suffix(['Z', 'z']) {
        Some(local) => format!("{local}+00:00"),
        None => iso.to_string(),
    };
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(iso, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// UTC instant rendered with microseconds and a `Z` suffix.
pub fn iso_utc(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Split `name` into stem and extension (dot included). Leading dots of the
/// final component do not start an extension, so `.hidden` has none.
pub fn split_extension(name: &str) -> (&str, &str) {
    let base_start = name.rfind('/').map_or(0, |i| i + 1);
    let base = &name[base_start..];
    let leading = base.len() - base.trim_start_matches('.').len();
    match base[leading..].rfind('.') {
        Some(i) => name.split_at(base_start + leading + i),
        None => (name, ""),
    }
}

/// Final path component of a `/`-separated relative name.
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
