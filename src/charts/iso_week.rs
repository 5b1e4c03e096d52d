use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An ISO-8601 week, rendered as `YYYY-Www`.
///
/// Weeks start on Monday and week 1 is the week holding the year's first
/// Thursday, so the ISO year can differ from the calendar year around
/// January 1st.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoWeek {
    year: i32,
    week: u32,
}

impl IsoWeek {
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self::from_date(at.date_naive())
    }

    pub fn current() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// Monday of this week.
    pub fn start_date(&self) -> NaiveDate {
        // Always valid: year and week come from a real date or were checked by parse.
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon).unwrap_or_default()
    }

    pub fn previous(&self) -> Self {
        Self::from_date(self.start_date() - Duration::days(7))
    }

    pub fn next(&self) -> Self {
        Self::from_date(self.start_date() + Duration::days(7))
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for IsoWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid ISO week: {}", s);
        let (year, week) = s.split_once("-W").ok_or_else(invalid)?;
        if week.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        // Rejects week 53 in years that only have 52.
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
        Ok(Self { year, week })
    }
}

impl Serialize for IsoWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week_of(y: i32, m: u32, d: u32) -> String {
        IsoWeek::from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap()).to_string()
    }

    #[test]
    fn matches_iso_numbering_around_new_year() {
        assert_eq!(week_of(2025, 1, 1), "2025-W01");
        assert_eq!(week_of(2024, 12, 30), "2025-W01");
        assert_eq!(week_of(2024, 12, 29), "2024-W52");
        assert_eq!(week_of(2021, 1, 1), "2020-W53");
        assert_eq!(week_of(2021, 1, 3), "2020-W53");
        assert_eq!(week_of(2021, 1, 4), "2021-W01");
        assert_eq!(week_of(2026, 12, 31), "2026-W53");
        assert_eq!(week_of(2027, 1, 1), "2026-W53");
        assert_eq!(week_of(2023, 1, 1), "2022-W52");
    }

    #[test]
    fn previous_crosses_year_boundaries() {
        let w: IsoWeek = "2025-W01".parse().unwrap();
        assert_eq!(w.previous().to_string(), "2024-W52");

        let w: IsoWeek = "2021-W01".parse().unwrap();
        assert_eq!(w.previous().to_string(), "2020-W53");
        assert_eq!(w.previous().next(), w);

        let w: IsoWeek = "2025-W10".parse().unwrap();
        assert_eq!(w.previous().to_string(), "2025-W09");
    }

    #[test]
    fn parse_rejects_malformed_weeks() {
        assert!("2025-W1".parse::<IsoWeek>().is_err());
        assert!("2025W01".parse::<IsoWeek>().is_err());
        assert!("2025-W00".parse::<IsoWeek>().is_err());
        assert!("2025-W53".parse::<IsoWeek>().is_err());
        assert!("2020-W53".parse::<IsoWeek>().is_ok());
    }

    #[test]
    fn orders_chronologically() {
        let a: IsoWeek = "2024-W52".parse().unwrap();
        let b: IsoWeek = "2025-W01".parse().unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn starts_on_monday() {
        let w: IsoWeek = "2025-W01".parse().unwrap();
        assert_eq!(w.start_date(), NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());
    }
}
