//! Run identifiers and file-name timestamps.

use chrono::Local;
use rand::RngCore;

/// Generate a per-process-unique opaque token.
///
/// Combines 16 random bytes (grouped like a UUID) with a millisecond
/// epoch suffix so that textual sort tracks temporal sort closely
/// enough for log/run ordering purposes without requiring a real
/// time-ordered UUID variant.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let millis = chrono::Utc::now().timestamp_millis();
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}-{}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
        millis,
    )
}

/// Produce a `YYYY-MM-DD HH_MM` (or `HH_MM_SS` when `with_seconds`)
/// timestamp using underscores instead of colons, since `:` is not a
/// legal path character on some filesystems.
pub fn current_timestamp(with_seconds: bool) -> String {
    let now = Local::now();
    if with_seconds {
        now.format("%Y-%m-%d %H_%M_%S").to_string()
    } else {
        now.format("%Y-%m-%d %H_%M").to_string()
    }
}

/// Parse a `current_timestamp(true)`-shaped string (`YYYY-MM-DD
/// HH_MM_SS`) back into a naive instant usable for ordering run files.
/// The time half's underscores are mapped back to colons.
pub fn parse_run_timestamp(name: &str) -> Option<chrono::NaiveDateTime> {
    let (date, time) = name.split_once(' ')?;
    let time = time.replace('_', ":");
    chrono::NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_id_is_unique_across_calls() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn timestamp_without_seconds_has_no_trailing_group() {
        let ts = current_timestamp(false);
        assert_eq!(ts.split(' ').count(), 2);
        assert_eq!(ts.split(' ').nth(1).unwrap().split('_').count(), 2);
    }

    #[test]
    fn timestamp_with_seconds_has_three_time_groups() {
        let ts = current_timestamp(true);
        assert_eq!(ts.split(' ').nth(1).unwrap().split('_').count(), 3);
    }

    #[test]
    fn parse_run_timestamp_round_trips() {
        let ts = "2024-03-05 14_30_59";
        let parsed = parse_run_timestamp(ts).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H_%M_%S").to_string(), ts);
    }

    #[test]
    fn parse_run_timestamp_rejects_garbage() {
        assert!(parse_run_timestamp("not-a-timestamp").is_none());
    }
}
