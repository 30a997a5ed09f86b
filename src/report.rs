use chrono::{NaiveDate, Weekday};
use std::collections::BTreeMap;

use crate::model::{EntryRecord, EntryType};

/// Monday through Sunday of the given ISO week, or `None` if the week does
/// not exist in that year.
pub fn week_days(year: i32, week: u32) -> Option<[NaiveDate; 7]> {
    use Weekday::*;

    let mut days = [NaiveDate::MIN; 7];
    for (slot, day) in days.iter_mut().zip([Mon, Tue, Wed, Thu, Fri, Sat, Sun]) {
        *slot = NaiveDate::from_isoywd_opt(year, week, day)?;
    }
    Some(days)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryReport {
    pub entries: Vec<EntryRecord>,
    pub hours: f64,
}

/// Entries of one ISO week grouped by category.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekReport {
    pub year: i32,
    pub week: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub categories: BTreeMap<EntryType, CategoryReport>,
    pub total_hours: f64,
}

impl WeekReport {
    pub fn build(year: i32, week: u32, records: &[EntryRecord]) -> Option<Self> {
        let days = week_days(year, week)?;
        let (start, end) = (days[0], days[6]);

        let mut in_week: Vec<&EntryRecord> = records
            .iter()
            .filter(|r| r.logdate >= start && r.logdate <= end)
            .collect();
        in_week.sort_by_key(|r| r.logdate);

        let mut categories: BTreeMap<EntryType, CategoryReport> = EntryType::ALL
            .iter()
            .map(|t| (*t, CategoryReport::default()))
            .collect();
        let mut total_hours = 0.0;
        for record in in_week {
            let category = categories.entry(record.entry_type).or_default();
            category.hours += record.spend_time;
            category.entries.push(record.clone());
            total_hours += record.spend_time;
        }

        Some(Self {
            year,
            week,
            start,
            end,
            categories,
            total_hours,
        })
    }
}

/// `1 Stunde`, `2.5 Stunden`.
pub fn format_hours(hours: f64) -> String {
    if hours == 1.0 {
        "1 Stunde".to_string()
    } else {
        format!("{} Stunden", hours)
    }
}
