//! Weekly opening hours and point-in-time openness.
//!
//! A schedule holds at most one interval per weekday. Days without data stay
//! [`DaySlot::Unknown`] so that "no information" never reads as "closed".

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};

use crate::error::CoreError;
use crate::models::OpenState;

const RANGE_SEPARATORS: [char; 3] = ['-', '–', '—'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyInterval {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl DailyInterval {
    /// Parses `HH:MM-HH:MM`. A close of `24:00` means midnight.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.contains(',') {
            return Err(CoreError::InvalidSchedule(format!(
                "more than one interval in '{raw}'"
            )));
        }

        let (open, close) = raw
            .split_once(RANGE_SEPARATORS)
            .ok_or_else(|| CoreError::InvalidSchedule(format!("'{raw}' is not an HH:MM-HH:MM range")))?;

        Ok(Self {
            open: parse_clock(open, false)?,
            close: parse_clock(close, true)?,
        })
    }

    pub fn wraps_midnight(&self) -> bool {
        self.close < self.open
    }

    pub fn is_all_day(&self) -> bool {
        self.open == self.close
    }

    fn covers_same_day(&self, time: NaiveTime) -> bool {
        if self.is_all_day() {
            true
        } else if self.wraps_midnight() {
            time >= self.open
        } else {
            self.open <= time && time < self.close
        }
    }

    fn covers_next_morning(&self, time: NaiveTime) -> bool {
        self.wraps_midnight() && time < self.close
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaySlot {
    #[default]
    Unknown,
    Closed,
    Open(DailyInterval),
}

/// Seven day slots, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpeningSchedule {
    days: [DaySlot; 7],
}

impl OpeningSchedule {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// One interval applied uniformly to every day.
    pub fn from_single_daily_range(raw: &str) -> Result<Self, CoreError> {
        let interval = DailyInterval::parse(raw)?;
        Ok(Self {
            days: [DaySlot::Open(interval); 7],
        })
    }

    /// Per-day entries, Monday first: `None` is unknown, `closed`/`off` is closed.
    pub fn from_days(days: [Option<&str>; 7]) -> Result<Self, CoreError> {
        let mut schedule = Self::default();
        for (index, entry) in days.into_iter().enumerate() {
            schedule.days[index] = match entry {
                None => DaySlot::Unknown,
                Some(value) if is_closed_token(value) => DaySlot::Closed,
                Some(value) => DaySlot::Open(DailyInterval::parse(value)?),
            };
        }
        Ok(schedule)
    }

    /// Accepts a bare daily range, `24/7`, or OpenStreetMap-style rules such as
    /// `Mo-Fr 08:00-17:00; Sa 09:00-12:00; Su off`. Later rules override earlier ones.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::InvalidSchedule("empty schedule".to_string()));
        }
        if raw.eq_ignore_ascii_case("24/7") {
            let midnight = NaiveTime::MIN;
            return Ok(Self {
                days: [DaySlot::Open(DailyInterval {
                    open: midnight,
                    close: midnight,
                }); 7],
            });
        }

        let mut schedule = Self::default();
        for rule in raw.split(';').map(str::trim).filter(|rule| !rule.is_empty()) {
            if rule.starts_with(|ch: char| ch.is_ascii_digit()) {
                let interval = DailyInterval::parse(rule)?;
                schedule.days = [DaySlot::Open(interval); 7];
                continue;
            }

            let (selector, hours) = rule
                .split_once(char::is_whitespace)
                .ok_or_else(|| CoreError::InvalidSchedule(format!("rule '{rule}' has no hours")))?;

            // holiday rules are not modelled
            if selector.split(',').any(|token| token.trim().eq_ignore_ascii_case("PH")) {
                continue;
            }

            let slot = if is_closed_token(hours) {
                DaySlot::Closed
            } else {
                DaySlot::Open(DailyInterval::parse(hours)?)
            };
            for weekday in parse_day_selector(selector)? {
                schedule.days[weekday.num_days_from_monday() as usize] = slot;
            }
        }

        Ok(schedule)
    }

    pub fn day(&self, weekday: Weekday) -> DaySlot {
        self.days[weekday.num_days_from_monday() as usize]
    }

    pub fn is_open_at(&self, at: NaiveDateTime) -> OpenState {
        let time = at.time();
        if let DaySlot::Open(previous) = self.day(at.weekday().pred()) {
            if previous.covers_next_morning(time) {
                return OpenState::Open;
            }
        }

        match self.day(at.weekday()) {
            DaySlot::Open(interval) if interval.covers_same_day(time) => OpenState::Open,
            DaySlot::Open(_) | DaySlot::Closed => OpenState::Closed,
            DaySlot::Unknown => OpenState::Unknown,
        }
    }
}

/// Openness of `schedule` at a local wall-clock time.
pub fn is_open_at(schedule: &OpeningSchedule, at: NaiveDateTime) -> OpenState {
    schedule.is_open_at(at)
}

fn parse_clock(raw: &str, allow_end_of_day: bool) -> Result<NaiveTime, CoreError> {
    let raw = raw.trim();
    if allow_end_of_day && raw == "24:00" {
        return Ok(NaiveTime::MIN);
    }
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|error| CoreError::InvalidSchedule(format!("bad time '{raw}': {error}")))
}

fn is_closed_token(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "off" | "closed" | "close")
}

fn parse_day_selector(selector: &str) -> Result<Vec<Weekday>, CoreError> {
    let mut days = Vec::new();
    for token in selector.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_weekday(start)?;
                let end = parse_weekday(end)?;
                let mut current = start;
                loop {
                    days.push(current);
                    if current == end {
                        break;
                    }
                    current = current.succ();
                }
            }
            None => days.push(parse_weekday(token)?),
        }
    }

    if days.is_empty() {
        return Err(CoreError::InvalidSchedule(format!("no days in '{selector}'")));
    }
    Ok(days)
}

fn parse_weekday(token: &str) -> Result<Weekday, CoreError> {
    match token.trim().to_lowercase().as_str() {
        "mo" | "mon" => Ok(Weekday::Mon),
        "tu" | "tue" => Ok(Weekday::Tue),
        "we" | "wed" => Ok(Weekday::Wed),
        "th" | "thu" => Ok(Weekday::Thu),
        "fr" | "fri" => Ok(Weekday::Fri),
        "sa" | "sat" => Ok(Weekday::Sat),
        "su" | "sun" => Ok(Weekday::Sun),
        other => Err(CoreError::InvalidSchedule(format!("unknown day '{other}'"))),
    }
}
