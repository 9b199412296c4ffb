//! Schedule logic - weekday sets, the studio clock and occurrence expansion.
//!
//! Everything here is pure: an [`Occurrence`] is derived from a session template and a
//! date, never stored, and the same template, range and "today" always expand to the
//! same sequence. "Today" is always the studio's local date, never UTC or the caller's
//! zone, which is why callers obtain it from a [`StudioClock`].

use chrono::{Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::{
    entities::session_template,
    errors::{Error, Result},
};

const WEEKDAY_ORDER: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

const fn bit(day: Weekday) -> i32 {
    1 << day.num_days_from_sunday()
}

fn short_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

/// Subset of the days of the week, stored as a 7-bit mask (bit 0 = Sunday).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WeekdaySet(i32);

impl WeekdaySet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Builds a set from a stored mask, ignoring bits above Saturday.
    #[must_use]
    pub const fn from_mask(mask: i32) -> Self {
        Self(mask & 0x7f)
    }

    /// Stored representation.
    #[must_use]
    pub const fn mask(self) -> i32 {
        self.0
    }

    /// Whether `day` is in the set.
    #[must_use]
    pub const fn contains(self, day: Weekday) -> bool {
        self.0 & bit(day) != 0
    }

    /// Returns a copy with `day` added.
    #[must_use]
    pub const fn with(self, day: Weekday) -> Self {
        Self(self.0 | bit(day))
    }

    /// Whether no day is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Days in the set, Sunday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEKDAY_ORDER.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(short_name))
            .finish()
    }
}

/// Parses one weekday name; accepts short and full English names in any case.
pub fn parse_weekday(name: &str) -> Result<Weekday> {
    Weekday::from_str(name.trim())
        .map_err(|_| Error::validation(format!("unknown weekday '{name}'")))
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(short_name))
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|n| parse_weekday(n))
            .collect::<Result<Self>>()
            .map_err(serde::de::Error::custom)
    }
}

/// Source of the studio's local "today".
///
/// A pinned clock always reports the same date, which keeps expansion deterministic
/// in tests and replay tooling.
#[derive(Debug, Clone, Copy)]
pub struct StudioClock {
    timezone: Tz,
    pinned: Option<NaiveDate>,
}

impl StudioClock {
    /// Clock following wall time in `timezone`.
    #[must_use]
    pub const fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            pinned: None,
        }
    }

    /// Clock that always reports `today`.
    #[must_use]
    pub const fn pinned(timezone: Tz, today: NaiveDate) -> Self {
        Self {
            timezone,
            pinned: Some(today),
        }
    }

    /// Parses an IANA zone name such as `"America/Chicago"`.
    pub fn from_timezone_name(name: &str) -> Result<Self> {
        let timezone = Tz::from_str(name).map_err(|e| Error::Config {
            message: format!("invalid studio timezone '{name}': {e}"),
        })?;
        Ok(Self::new(timezone))
    }

    /// Studio timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Current calendar date at the studio.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.pinned
            .unwrap_or_else(|| Utc::now().with_timezone(&self.timezone).date_naive())
    }
}

/// One concrete, bookable calendar instance of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Occurrence {
    /// Session the occurrence belongs to
    pub session_id: i64,
    /// Calendar date in the studio timezone
    pub date: NaiveDate,
    /// Local start time
    pub start_time: NaiveTime,
    /// Local end time
    pub end_time: NaiveTime,
}

/// Expands a session template into its occurrences between `from` and `to` inclusive.
///
/// Dates before `today` are skipped even when `from` is earlier. Inactive sessions and
/// sessions without weekdays produce an empty sequence; callers that need to tell
/// those apart from "no dates in range" check `is_active` themselves. The iterator is
/// lazy and finite.
pub fn occurrences(
    session: &session_template::Model,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> impl Iterator<Item = Occurrence> + use<> {
    let weekdays = session.weekdays();
    let runs = session.is_active && !weekdays.is_empty();
    let start = from.max(today);
    let (session_id, start_time, end_time) = (session.id, session.start_time, session.end_time);

    start
        .iter_days()
        .take_while(move |d| runs && *d <= to)
        .filter(move |d| weekdays.contains(d.weekday()))
        .map(move |date| Occurrence {
            session_id,
            date,
            start_time,
            end_time,
        })
}

/// Returns the occurrence at `date`/`time` if the session really runs then.
///
/// `time` must match the template's start time exactly; past dates never match.
#[must_use]
pub fn occurrence_at(
    session: &session_template::Model,
    date: NaiveDate,
    time: NaiveTime,
    today: NaiveDate,
) -> Option<Occurrence> {
    if time != session.start_time {
        return None;
    }
    occurrences(session, date, date, today).next()
}
