//! Quiet hours: recurring daily windows during which commands are denied
//!
//! Times are wall-clock `HH:MM` in the hub's local timezone. Days use
//! 0 = Sunday .. 6 = Saturday. An overnight window (`start > end`) belongs to
//! the day it starts on, so `{22:00-06:00, days: [5]}` covers Friday night
//! into Saturday morning.

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use homegate_core::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A daily time window, optionally limited to some weekdays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,

    #[serde(with = "hhmm")]
    pub end: NaiveTime,

    /// Weekdays the window starts on (None = every day)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<BTreeSet<u8>>,
}

impl TimeRange {
    /// Parse a window from `HH:MM` strings
    pub fn new(start: &str, end: &str) -> HubResult<Self> {
        Ok(Self {
            start: parse_hhmm("start", start)?,
            end: parse_hhmm("end", end)?,
            days: None,
        })
    }

    /// Restrict the window to the given weekdays
    pub fn on_days(mut self, days: impl IntoIterator<Item = u8>) -> HubResult<Self> {
        let days: BTreeSet<u8> = days.into_iter().collect();
        if let Some(&bad) = days.iter().find(|d| **d > 6) {
            return Err(HubError::InvalidDay(bad));
        }
        self.days = Some(days);
        Ok(self)
    }

    /// Check day numbers; times are already valid once parsed
    pub fn validate(&self) -> HubResult<()> {
        if let Some(days) = &self.days {
            if let Some(&bad) = days.iter().find(|d| **d > 6) {
                return Err(HubError::InvalidDay(bad));
            }
        }
        Ok(())
    }

    pub fn is_overnight(&self) -> bool {
        self.start > self.end
    }

    fn starts_on(&self, day: u8) -> bool {
        self.days.as_ref().map_or(true, |days| days.contains(&day))
    }

    /// Whether `now` falls inside this window
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        let time = now.time();
        let today = now.weekday().num_days_from_sunday() as u8;

        if self.start == self.end {
            return false;
        }

        if !self.is_overnight() {
            return time >= self.start && time < self.end && self.starts_on(today);
        }

        if time >= self.start {
            self.starts_on(today)
        } else if time < self.end {
            self.starts_on((today + 6) % 7)
        } else {
            false
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// First window in `ranges` that contains `now`
pub fn active_quiet_window(ranges: &[TimeRange], now: NaiveDateTime) -> Option<&TimeRange> {
    ranges.iter().find(|range| range.contains(now))
}

fn parse_hhmm(field: &'static str, value: &str) -> HubResult<NaiveTime> {
    let invalid = || HubError::InvalidTime {
        field,
        value: value.to_string(),
    };

    let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm("time range", &raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-06-02 is a Sunday
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_rejects_bad_times() {
        assert!(TimeRange::new("22:00", "06:00").is_ok());
        assert!(TimeRange::new("7:30", "08:00").is_ok());
        assert!(matches!(
            TimeRange::new("25:00", "06:00"),
            Err(HubError::InvalidTime { field: "start", .. })
        ));
        assert!(TimeRange::new("22:00", "6pm").is_err());
        assert!(TimeRange::new("22:0", "06:00").is_err());
        assert!(TimeRange::new("", "06:00").is_err());
    }

    #[test]
    fn test_same_day_window() {
        let range = TimeRange::new("13:00", "15:00").unwrap();
        assert!(!range.contains(at(3, 12, 59)));
        assert!(range.contains(at(3, 13, 0)));
        assert!(range.contains(at(3, 14, 59)));
        assert!(!range.contains(at(3, 15, 0)));
    }

    #[test]
    fn test_overnight_window() {
        let range = TimeRange::new("22:00", "06:00").unwrap();
        assert!(range.is_overnight());
        assert!(range.contains(at(3, 23, 30)));
        assert!(range.contains(at(4, 2, 0)));
        assert!(range.contains(at(4, 5, 59)));
        assert!(!range.contains(at(4, 6, 0)));
        assert!(!range.contains(at(4, 12, 0)));
        assert!(!range.contains(at(4, 21, 59)));
    }

    #[test]
    fn test_empty_window() {
        let range = TimeRange::new("08:00", "08:00").unwrap();
        assert!(!range.contains(at(3, 8, 0)));
    }

    #[test]
    fn test_day_filter_same_day() {
        // Sunday only
        let range = TimeRange::new("09:00", "12:00").unwrap().on_days([0]).unwrap();
        assert!(range.contains(at(2, 10, 0)));
        assert!(!range.contains(at(3, 10, 0)));
    }

    #[test]
    fn test_day_filter_overnight_uses_start_day() {
        // Friday night (5) into Saturday morning
        let range = TimeRange::new("22:00", "06:00").unwrap().on_days([5]).unwrap();
        // 2024-06-07 is Friday, 2024-06-08 Saturday
        assert!(range.contains(at(7, 23, 0)));
        assert!(range.contains(at(8, 3, 0)));
        assert!(!range.contains(at(8, 23, 0)));
        assert!(!range.contains(at(7, 3, 0)));
    }

    #[test]
    fn test_invalid_day() {
        let result = TimeRange::new("22:00", "06:00").unwrap().on_days([1, 7]);
        assert_eq!(result.unwrap_err(), HubError::InvalidDay(7));
    }

    #[test]
    fn test_serde_hhmm() {
        let range: TimeRange =
            serde_json::from_str(r#"{"start":"22:00","end":"06:30","days":[0,6]}"#).unwrap();
        assert_eq!(range.to_string(), "22:00-06:30");
        assert_eq!(range.days.as_ref().map(|d| d.len()), Some(2));

        let json = serde_json::to_value(&range).unwrap();
        assert_eq!(json["start"], "22:00");
        assert_eq!(json["end"], "06:30");

        let bad: Result<TimeRange, _> = serde_json::from_str(r#"{"start":"9","end":"10:00"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_active_window_picks_first_match() {
        let ranges = vec![
            TimeRange::new("01:00", "02:00").unwrap(),
            TimeRange::new("22:00", "06:00").unwrap(),
        ];
        let hit = active_quiet_window(&ranges, at(3, 1, 30)).unwrap();
        assert_eq!(hit.to_string(), "01:00-02:00");
        assert!(active_quiet_window(&ranges, at(3, 12, 0)).is_none());
    }
}
