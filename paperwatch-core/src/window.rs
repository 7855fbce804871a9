//! Time-window computation and entry filtering.
//!
//! The digest covers the previous calendar day in a configured local
//! timezone, with both bounds shifted forward by a configured skew: the
//! upstream system publishes near its own day boundary, so a naive
//! local-midnight window clips the batch. The window is computed once per
//! run and consumed read-only.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::feed::Entry;

/// A closed UTC interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

/// The UTC window for "yesterday" in the given local timezone.
///
/// Both bounds carry the same skew so the interval is exactly 24 hours
/// minus one microsecond.
pub fn previous_day_window(now_local: DateTime<Tz>, skew_hours: i64) -> TimeWindow {
    let yesterday = now_local.date_naive() - Duration::days(1);
    let start_naive = yesterday
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        + Duration::hours(skew_hours);
    let end_naive = start_naive + Duration::days(1) - Duration::microseconds(1);

    let tz = now_local.timezone();
    TimeWindow {
        start_utc: local_to_utc(tz, start_naive),
        end_utc: local_to_utc(tz, end_naive),
    }
}

/// Resolve a naive local time in `tz`, stepping forward out of a DST gap
/// and taking the earlier instant of an ambiguous fold.
fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = naive;
    for _ in 0..8 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => candidate += Duration::minutes(30),
        }
    }
    Utc.from_utc_datetime(&naive)
}

/// Whether the entry's effective timestamp (`updated`, else `published`)
/// falls within the window, inclusive at both bounds.
pub fn in_window(entry: &Entry, window: &TimeWindow) -> bool {
    entry
        .effective_timestamp()
        .is_some_and(|ts| window.start_utc <= ts && ts <= window.end_utc)
}

/// Whether the entry's primary category starts with any allowed prefix.
pub fn is_target_category(entry: &Entry, prefixes: &[String]) -> bool {
    entry
        .primary_category
        .as_deref()
        .is_some_and(|cat| prefixes.iter().any(|p| cat.starts_with(p.as_str())))
}

/// The date the digest reports on: yesterday in the local timezone. Used
/// for the date-stamped output root.
pub fn report_date(now_local: DateTime<Tz>) -> NaiveDate {
    now_local.date_naive() - Duration::days(1)
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Shanghai;

    fn entry_at(updated: Option<DateTime<Utc>>, published: Option<DateTime<Utc>>) -> Entry {
        Entry {
            id: "https://arxiv.org/abs/2506.16012v2".into(),
            title: String::new(),
            summary: String::new(),
            comment: String::new(),
            journal_ref: String::new(),
            authors: vec![],
            published,
            updated,
            primary_category: Some("cs.AI".into()),
            links: vec![],
        }
    }

    fn local(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Tz> {
        Shanghai
            .with_ymd_and_hms(y, mo, d, h, 0, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn test_window_with_default_skew() {
        // Shanghai is UTC+8 year-round: yesterday 08:00 local is
        // yesterday 00:00 UTC.
        let window = previous_day_window(local(2025, 6, 20, 10), 8);
        assert_eq!(
            window.start_utc,
            Utc.with_ymd_and_hms(2025, 6, 19, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.end_utc,
            Utc.with_ymd_and_hms(2025, 6, 19, 23, 59, 59).unwrap()
                + Duration::microseconds(999_999)
        );
    }

    #[test]
    fn test_window_width_is_one_day_minus_one_microsecond() {
        for skew in [0, 8, -3] {
            let window = previous_day_window(local(2025, 6, 20, 10), skew);
            assert_eq!(
                window.end_utc - window.start_utc,
                Duration::days(1) - Duration::microseconds(1),
                "skew {skew}"
            );
        }
    }

    #[test]
    fn test_in_window_inclusive_at_both_bounds() {
        let window = previous_day_window(local(2025, 6, 20, 10), 8);
        let micro = Duration::microseconds(1);

        assert!(in_window(&entry_at(Some(window.start_utc), None), &window));
        assert!(in_window(&entry_at(Some(window.end_utc), None), &window));
        assert!(!in_window(
            &entry_at(Some(window.start_utc - micro), None),
            &window
        ));
        assert!(!in_window(
            &entry_at(Some(window.end_utc + micro), None),
            &window
        ));
    }

    #[test]
    fn test_in_window_prefers_updated_over_published() {
        let window = previous_day_window(local(2025, 6, 20, 10), 8);
        // published inside, updated outside: the entry is out.
        let outside = window.end_utc + Duration::days(2);
        let entry = entry_at(Some(outside), Some(window.start_utc));
        assert!(!in_window(&entry, &window));
        // updated absent: published decides.
        let entry = entry_at(None, Some(window.start_utc));
        assert!(in_window(&entry, &window));
    }

    #[test]
    fn test_entry_without_timestamps_is_excluded() {
        let window = previous_day_window(local(2025, 6, 20, 10), 8);
        assert!(!in_window(&entry_at(None, None), &window));
    }

    #[test]
    fn test_is_target_category() {
        let prefixes = vec!["cs.".to_string(), "stat.ML".to_string()];
        let mut entry = entry_at(None, None);
        assert!(is_target_category(&entry, &prefixes));

        entry.primary_category = Some("stat.ML".into());
        assert!(is_target_category(&entry, &prefixes));

        entry.primary_category = Some("math.CO".into());
        assert!(!is_target_category(&entry, &prefixes));

        entry.primary_category = None;
        assert!(!is_target_category(&entry, &prefixes));
    }

    #[test]
    fn test_report_date_is_yesterday_local() {
        assert_eq!(
            report_date(local(2025, 6, 20, 0)),
            NaiveDate::from_ymd_opt(2025, 6, 19).unwrap()
        );
    }
}
