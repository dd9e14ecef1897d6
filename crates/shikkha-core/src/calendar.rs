//! The academic calendar: load windows, partition months, terms.
//!
//! Facts are partitioned by calendar month of their business date, and every
//! fact load targets an inclusive month range (the load window). Academic
//! years follow the Bangladeshi school calendar, which runs January to
//! December, so the academic year of a date is simply its calendar year.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};

use crate::{Error, Result};

// ─── YearMonth ───────────────────────────────────────────────────────────────

/// A calendar month — the unit of fact partitioning.
///
/// The month is always in `1..=12`; the only constructors are the validating
/// ones below, plus [`YearMonth::from_date`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
  pub year:  i32,
  pub month: u32,
}

impl YearMonth {
  pub fn new(year: i32, month: u32) -> Result<Self> {
    if !(1..=12).contains(&month) {
      return Err(Error::BadMonth(format!("{year:04}-{month:02}")));
    }
    Ok(Self { year, month })
  }

  /// Parse a `YYYY-MM` partition label.
  pub fn parse(label: &str) -> Result<Self> {
    let bad = || Error::BadMonth(label.to_owned());
    let (y, m) = label.split_once('-').ok_or_else(bad)?;
    if y.len() != 4 || m.len() != 2 {
      return Err(bad());
    }
    let year: i32 = y.parse().map_err(|_| bad())?;
    let month: u32 = m.parse().map_err(|_| bad())?;
    Self::new(year, month)
  }

  pub fn from_date(date: NaiveDate) -> Self {
    Self { year: date.year(), month: date.month() }
  }

  /// The `YYYY-MM` partition label.
  pub fn label(self) -> String {
    format!("{:04}-{:02}", self.year, self.month)
  }

  pub fn first_day(self) -> NaiveDate {
    NaiveDate::from_ymd_opt(self.year, self.month, 1)
      .expect("month is validated on construction")
  }

  pub fn last_day(self) -> NaiveDate {
    self
      .next()
      .first_day()
      .pred_opt()
      .expect("predecessor of a first-of-month always exists")
  }

  pub fn next(self) -> Self {
    if self.month == 12 {
      Self { year: self.year + 1, month: 1 }
    } else {
      Self { year: self.year, month: self.month + 1 }
    }
  }
}

impl std::fmt::Display for YearMonth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

// ─── LoadWindow ──────────────────────────────────────────────────────────────

/// An inclusive range of partition months targeted by a fact load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadWindow {
  pub from: YearMonth,
  pub to:   YearMonth,
}

impl LoadWindow {
  pub fn new(from: YearMonth, to: YearMonth) -> Result<Self> {
    if from > to {
      return Err(Error::WindowInverted {
        from: from.label(),
        to:   to.label(),
      });
    }
    Ok(Self { from, to })
  }

  pub fn single(month: YearMonth) -> Self {
    Self { from: month, to: month }
  }

  /// Every partition month in the window, in order.
  pub fn partitions(&self) -> Vec<YearMonth> {
    let mut months = Vec::new();
    let mut cursor = self.from;
    while cursor <= self.to {
      months.push(cursor);
      cursor = cursor.next();
    }
    months
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    let month = YearMonth::from_date(date);
    self.from <= month && month <= self.to
  }

  pub fn start_date(&self) -> NaiveDate {
    self.from.first_day()
  }

  pub fn end_date(&self) -> NaiveDate {
    self.to.last_day()
  }

  /// The first instant strictly after the window — midnight UTC following its
  /// last day. Used to bound dimension freshness checks.
  pub fn end_instant(&self) -> DateTime<Utc> {
    end_of_day_cutoff(self.end_date())
  }
}

impl std::fmt::Display for LoadWindow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}..{}", self.from, self.to)
  }
}

// ─── Academic calendar ───────────────────────────────────────────────────────

/// The academic year a business date belongs to.
pub fn academic_year(date: NaiveDate) -> String {
  date.year().to_string()
}

/// Term buckets of the Bangladeshi school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
  First,
  Second,
  Annual,
}

impl Term {
  pub fn for_month(month: u32) -> Self {
    match month {
      1..=4 => Self::First,
      5..=8 => Self::Second,
      _ => Self::Annual,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::First => "first",
      Self::Second => "second",
      Self::Annual => "annual",
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "first" | "1" | "term 1" | "first term" => Some(Self::First),
      "second" | "2" | "term 2" | "second term" => Some(Self::Second),
      "annual" | "3" | "final" | "annual exam" => Some(Self::Annual),
      _ => None,
    }
  }
}

/// The weekend in Bangladesh falls on Friday and Saturday.
pub fn is_weekend(date: NaiveDate) -> bool {
  matches!(date.weekday(), Weekday::Fri | Weekday::Sat)
}

/// Midnight UTC of the day following `date` — the cutoff used when resolving
/// a dimension version "as of the end of" a business date.
pub fn end_of_day_cutoff(date: NaiveDate) -> DateTime<Utc> {
  let next = date
    .succ_opt()
    .expect("business dates are far from the end of the calendar");
  Utc
    .with_ymd_and_hms(next.year(), next.month(), next.day(), 0, 0, 0)
    .single()
    .expect("midnight UTC is unambiguous")
}
