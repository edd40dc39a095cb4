use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

/// A non-negative duration, in seconds.
///
/// Used for footpaths, access/egress offsets, transfer buffers, dwell
/// times and travel-time bounds.
#[derive(Debug, Default, Eq, PartialEq, Clone, Copy, Ord, PartialOrd, Hash)]
pub struct PositiveDuration {
    seconds: u32,
}

impl PositiveDuration {
    pub const fn zero() -> Self {
        Self { seconds: 0 }
    }

    pub const fn from_seconds(seconds: u32) -> Self {
        Self { seconds }
    }

    pub const fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            seconds: seconds + 60 * minutes + 60 * 60 * hours,
        }
    }

    pub fn total_seconds(&self) -> u32 {
        self.seconds
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0
    }

    pub fn max(self, other: Self) -> Self {
        Self {
            seconds: self.seconds.max(other.seconds),
        }
    }
}

impl Display for PositiveDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let hours = self.seconds / (60 * 60);
        let minutes = (self.seconds % (60 * 60)) / 60;
        let seconds = self.seconds % 60;
        if hours != 0 {
            write!(f, "{}h{:02}m{:02}s", hours, minutes, seconds)
        } else if minutes != 0 {
            write!(f, "{}m{:02}s", minutes, seconds)
        } else {
            write!(f, "{}s", seconds)
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DurationParseError {
    text: String,
}

impl Display for DurationParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "bad duration `{}`, expected hh:mm:ss", self.text)
    }
}

impl std::error::Error for DurationParseError {}

impl FromStr for PositiveDuration {
    type Err = DurationParseError;

    /// Parses `hh:mm:ss` into a duration.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let err = || DurationParseError {
            text: text.to_string(),
        };
        let mut fields = text.split(':');
        let hours: u32 = fields.next().and_then(|s| s.parse().ok()).ok_or_else(err)?;
        let minutes: u32 = fields.next().and_then(|s| s.parse().ok()).ok_or_else(err)?;
        let seconds: u32 = fields.next().and_then(|s| s.parse().ok()).ok_or_else(err)?;
        if fields.next().is_some() || minutes >= 60 || seconds >= 60 {
            return Err(err());
        }
        Ok(Self::from_hms(hours, minutes, seconds))
    }
}

// configs write durations as "hh:mm:ss"
impl<'de> serde::Deserialize<'de> for PositiveDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for PositiveDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        serializer.collect_str(&format_args!(
            "{:02}:{:02}:{:02}",
            hours,
            minutes,
            self.seconds % 60
        ))
    }
}

impl std::ops::Add for PositiveDuration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            seconds: self.seconds + rhs.seconds,
        }
    }
}

impl std::ops::Mul<u32> for PositiveDuration {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        Self {
            seconds: self.seconds * rhs,
        }
    }
}

/// A point in time, counted in seconds since 00:00:00 UTC on the first
/// day of the dataset's calendar.
///
/// This is the only representation of an instant used inside the engine,
/// so that label comparisons are plain integer comparisons.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct SecondsSinceDatasetStart {
    seconds: u32,
}

impl SecondsSinceDatasetStart {
    pub const fn zero() -> Self {
        Self { seconds: 0 }
    }

    pub const fn from_seconds(seconds: u32) -> Self {
        Self { seconds }
    }

    pub fn total_seconds(&self) -> u32 {
        self.seconds
    }

    /// `self - start`, or `None` when `start` is later than `self`.
    pub fn duration_since(&self, start: &Self) -> Option<PositiveDuration> {
        self.seconds
            .checked_sub(start.seconds)
            .map(PositiveDuration::from_seconds)
    }

    /// Shifts backward in time; `None` before the calendar origin.
    pub fn checked_sub(&self, duration: PositiveDuration) -> Option<Self> {
        self.seconds
            .checked_sub(duration.seconds)
            .map(|seconds| Self { seconds })
    }
}

impl std::ops::Add<PositiveDuration> for SecondsSinceDatasetStart {
    type Output = Self;

    fn add(self, rhs: PositiveDuration) -> Self::Output {
        Self {
            seconds: self.seconds + rhs.seconds,
        }
    }
}

impl Display for SecondsSinceDatasetStart {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let day = self.seconds / SECONDS_PER_DAY;
        let in_day = self.seconds % SECONDS_PER_DAY;
        write!(
            f,
            "day {} {:02}:{:02}:{:02}",
            day,
            in_day / 3600,
            (in_day / 60) % 60,
            in_day % 60
        )
    }
}

/// Number of days since the first day of the dataset's calendar.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct DaysSinceDatasetStart {
    pub(crate) days: u16,
}

impl DaysSinceDatasetStart {
    pub const fn new(days: u16) -> Self {
        Self { days }
    }

    pub fn idx(&self) -> usize {
        usize::from(self.days)
    }
}

pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

// more than 100 years, and still well below u16::MAX days
const MAX_DAYS_IN_CALENDAR: u16 = 100 * 366;

/// The validity period of a timetable.
///
/// Converts between the external `chrono` types and the dataset-relative
/// instants used everywhere inside the router. A datetime outside the
/// validity period is a lookup miss, not an error.
#[derive(Debug, Clone)]
pub struct Calendar {
    first_date: NaiveDate,
    last_date: NaiveDate, // included
    nb_of_days: u16,
}

impl Calendar {
    /// `None` when `last_date < first_date` or the period exceeds
    /// `MAX_DAYS_IN_CALENDAR`.
    pub fn new(first_date: NaiveDate, last_date: NaiveDate) -> Option<Self> {
        let nb_of_days = last_date.signed_duration_since(first_date).num_days() + 1;
        if nb_of_days < 1 || nb_of_days > i64::from(MAX_DAYS_IN_CALENDAR) {
            return None;
        }
        Some(Self {
            first_date,
            last_date,
            nb_of_days: nb_of_days as u16,
        })
    }

    pub fn first_date(&self) -> NaiveDate {
        self.first_date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    pub fn nb_of_days(&self) -> u16 {
        self.nb_of_days
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_date <= date && date <= self.last_date
    }

    pub fn days(&self) -> impl Iterator<Item = DaysSinceDatasetStart> {
        (0..self.nb_of_days).map(DaysSinceDatasetStart::new)
    }

    pub fn day_of(&self, date: NaiveDate) -> Option<DaysSinceDatasetStart> {
        if !self.contains(date) {
            return None;
        }
        let days = date.signed_duration_since(self.first_date).num_days();
        Some(DaysSinceDatasetStart::new(days as u16))
    }

    pub fn date_of(&self, day: DaysSinceDatasetStart) -> Option<NaiveDate> {
        if day.days >= self.nb_of_days {
            return None;
        }
        self.first_date
            .checked_add_days(chrono::Days::new(u64::from(day.days)))
    }

    /// `None` when `datetime` falls outside the validity period.
    pub fn from_naive_datetime(
        &self,
        datetime: &NaiveDateTime,
    ) -> Option<SecondsSinceDatasetStart> {
        let day = self.day_of(datetime.date())?;
        let midnight = chrono::NaiveTime::from_hms_opt(0, 0, 0)?;
        let in_day = datetime.time().signed_duration_since(midnight);
        let seconds = u32::from(day.days) * SECONDS_PER_DAY + in_day.num_seconds() as u32;
        Some(SecondsSinceDatasetStart::from_seconds(seconds))
    }

    pub fn to_naive_datetime(&self, instant: &SecondsSinceDatasetStart) -> Option<NaiveDateTime> {
        let (day, in_day) = self.decompose(instant);
        let date = self.date_of(day)?;
        let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(in_day, 0)?;
        Some(NaiveDateTime::new(date, time))
    }

    /// Splits an instant into its calendar day and the seconds elapsed in
    /// that day.
    pub fn decompose(&self, instant: &SecondsSinceDatasetStart) -> (DaysSinceDatasetStart, u32) {
        let seconds = instant.total_seconds();
        let day = (seconds / SECONDS_PER_DAY) as u16;
        (DaysSinceDatasetStart::new(day), seconds % SECONDS_PER_DAY)
    }

    /// The instant at which `day` starts.
    pub fn day_start(&self, day: DaysSinceDatasetStart) -> SecondsSinceDatasetStart {
        SecondsSinceDatasetStart::from_seconds(u32::from(day.days) * SECONDS_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn duration_display_and_parse() {
        let duration = PositiveDuration::from_hms(1, 2, 3);
        assert_eq!(duration.total_seconds(), 3723);
        assert_eq!(format!("{}", duration), "1h02m03s");
        assert_eq!(PositiveDuration::from_str("01:02:03").unwrap(), duration);
        assert!(PositiveDuration::from_str("1:99:00").is_err());
        assert!(PositiveDuration::from_str("nonsense").is_err());
    }

    #[test]
    fn instant_arithmetic() {
        let t = SecondsSinceDatasetStart::from_seconds(100);
        let d = PositiveDuration::from_seconds(40);
        assert_eq!((t + d).total_seconds(), 140);
        assert_eq!(
            (t + d).duration_since(&t),
            Some(PositiveDuration::from_seconds(40))
        );
        assert_eq!(t.duration_since(&(t + d)), None);
        assert_eq!(t.checked_sub(d).unwrap().total_seconds(), 60);
        assert_eq!(
            SecondsSinceDatasetStart::from_seconds(10).checked_sub(d),
            None
        );
    }

    #[test]
    fn calendar_conversions() {
        let calendar = Calendar::new(date("2024-01-01"), date("2024-01-10")).unwrap();
        assert_eq!(calendar.nb_of_days(), 10);
        assert!(calendar.contains(date("2024-01-05")));
        assert!(!calendar.contains(date("2024-01-11")));

        let datetime = NaiveDateTime::new(
            date("2024-01-02"),
            chrono::NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        );
        let instant = calendar.from_naive_datetime(&datetime).unwrap();
        assert_eq!(instant.total_seconds(), SECONDS_PER_DAY + 8 * 3600 + 30 * 60);
        assert_eq!(calendar.to_naive_datetime(&instant), Some(datetime));

        let (day, in_day) = calendar.decompose(&instant);
        assert_eq!(day, DaysSinceDatasetStart::new(1));
        assert_eq!(in_day, 8 * 3600 + 30 * 60);

        let outside = NaiveDateTime::new(
            date("2024-02-01"),
            chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        );
        assert_eq!(calendar.from_naive_datetime(&outside), None);
    }

    #[test]
    fn rejects_empty_calendar() {
        assert!(Calendar::new(date("2024-01-10"), date("2024-01-01")).is_none());
    }
}
