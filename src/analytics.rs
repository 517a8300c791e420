//! Per-event summaries for the history and analytics tabs.
//!
//! Everything here is a pure function of an occurrence slice and the
//! viewer's time zone; callers recompute after every add or delete.

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use serde::Serialize;

use crate::models::Occurrence;

pub const MONTH_LABELS: [&str; 12] = [
    "Jan.", "Feb.", "Mar.", "Apr.", "May", "Jun.", "Jul.", "Aug.", "Sep.", "Oct.", "Nov.", "Dec.",
];

/// One bar of the monthly chart. `month` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    pub month: u32,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearStats<'a> {
    pub year: i32,
    /// Every occurrence in the year, including months without a bar.
    pub total: usize,
    /// Non-empty months only, January first.
    pub months: Vec<MonthBucket>,
    pub occurrences: Vec<&'a Occurrence>,
}

/// Group occurrences by local calendar year, most recent year first.
pub fn yearly_stats<'a, Tz: TimeZone>(
    occurrences: &'a [Occurrence],
    tz: &Tz,
) -> Vec<YearStats<'a>> {
    let mut by_year: BTreeMap<i32, (Vec<&'a Occurrence>, [usize; 12])> = BTreeMap::new();

    for occurrence in occurrences {
        let local = occurrence.date_time.with_timezone(tz);
        let (items, counts) = by_year.entry(local.year()).or_default();
        items.push(occurrence);
        counts[local.month0() as usize] += 1;
    }

    by_year
        .into_iter()
        .rev()
        .map(|(year, (items, counts))| YearStats {
            year,
            total: items.len(),
            months: counts
                .iter()
                .zip(1u32..)
                .filter(|(count, _)| **count > 0)
                .map(|(count, month)| MonthBucket {
                    month,
                    label: MONTH_LABELS[(month - 1) as usize],
                    count: *count,
                })
                .collect(),
            occurrences: items,
        })
        .collect()
}

/// Daily counts for the calendar heatmap. Every day of each month that has
/// at least one occurrence is present, zero-filled; other months are absent.
pub fn heatmap<Tz: TimeZone>(occurrences: &[Occurrence], tz: &Tz) -> BTreeMap<NaiveDate, usize> {
    let mut cells = BTreeMap::new();
    let local_days: Vec<NaiveDate> = occurrences
        .iter()
        .map(|occurrence| occurrence.date_time.with_timezone(tz).date_naive())
        .collect();

    for day in &local_days {
        let Some(mut cursor) = day.with_day(1) else {
            continue;
        };
        if cells.contains_key(&cursor) {
            continue;
        }
        while cursor.month() == day.month() {
            cells.insert(cursor, 0);
            match cursor.succ_opt() {
                Some(next) => cursor = next,
                None => break,
            }
        }
    }

    for day in local_days {
        *cells.entry(day).or_insert(0) += 1;
    }
    cells
}

/// Newest first, for the history timeline.
pub fn history(occurrences: &[Occurrence]) -> Vec<&Occurrence> {
    occurrences.iter().rev().collect()
}

/// `Dec 25, 2024, 2:30:45 PM`
pub fn format_date_time_us<Tz>(value: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    value.format("%b %-d, %Y, %-I:%M:%S %p").to_string()
}

/// `2024-01-05`, in the given zone.
pub fn to_yyyymmdd<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    value.date_naive().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32) -> Occurrence {
        Occurrence {
            id: None,
            date_time: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            comment: String::new(),
        }
    }

    #[test]
    fn buckets_by_year_and_month_descending() {
        let data = vec![
            at(2024, 1, 15, 12),
            at(2024, 1, 20, 12),
            at(2024, 3, 1, 12),
            at(2023, 12, 31, 12),
        ];

        let stats = yearly_stats(&data, &Utc);

        let years: Vec<i32> = stats.iter().map(|s| s.year).collect();
        assert_eq!(years, [2024, 2023]);

        assert_eq!(stats[0].total, 3);
        assert_eq!(
            stats[0].months,
            vec![
                MonthBucket { month: 1, label: "Jan.", count: 2 },
                MonthBucket { month: 3, label: "Mar.", count: 1 },
            ]
        );
        assert_eq!(
            stats[1].months,
            vec![MonthBucket { month: 12, label: "Dec.", count: 1 }]
        );
        assert_eq!(stats[1].occurrences, vec![&data[3]]);
    }

    #[test]
    fn year_total_matches_bucket_sum() {
        let data: Vec<Occurrence> = (1..=12).map(|m| at(2022, m, 10, 8)).collect();
        let stats = yearly_stats(&data, &Utc);
        let bucket_sum: usize = stats[0].months.iter().map(|b| b.count).sum();
        assert_eq!(stats[0].total, bucket_sum);
        assert_eq!(stats[0].months.len(), 12);
    }

    #[test]
    fn buckets_follow_viewer_time_zone() {
        // 23:00 UTC on Dec 31 is already next year three hours east.
        let data = vec![at(2023, 12, 31, 23)];
        let east = FixedOffset::east_opt(3 * 3600).unwrap();

        assert_eq!(yearly_stats(&data, &Utc)[0].year, 2023);
        let shifted = yearly_stats(&data, &east);
        assert_eq!(shifted[0].year, 2024);
        assert_eq!(shifted[0].months[0].label, "Jan.");
    }

    #[test]
    fn empty_history_has_no_years() {
        assert!(yearly_stats(&[], &Utc).is_empty());
        assert!(heatmap(&[], &Utc).is_empty());
    }

    #[test]
    fn heatmap_fills_whole_months_with_data() {
        let data = vec![at(2024, 2, 3, 10), at(2024, 2, 3, 18), at(2024, 4, 30, 9)];

        let cells = heatmap(&data, &Utc);

        // February 2024 has 29 days, April 30; March is absent.
        assert_eq!(cells.len(), 29 + 30);
        let feb3 = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        assert_eq!(cells[&feb3], 2);
        assert_eq!(cells[&NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()], 0);
        assert!(!cells.contains_key(&NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
        assert_eq!(cells.values().sum::<usize>(), 3);
    }

    #[test]
    fn history_is_newest_first() {
        let data = vec![at(2024, 1, 1, 0), at(2024, 1, 2, 0)];
        assert_eq!(history(&data), vec![&data[1], &data[0]]);
    }

    #[test]
    fn display_helpers() {
        let value = Utc.with_ymd_and_hms(2024, 12, 25, 14, 30, 45).unwrap();
        assert_eq!(format_date_time_us(&value), "Dec 25, 2024, 2:30:45 PM");

        let early = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(to_yyyymmdd(&early), "2024-01-05");
    }
}
