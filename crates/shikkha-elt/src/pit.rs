//! Point-in-time resolution of dimension versions.

use std::collections::HashMap;

use chrono::NaiveDate;
use shikkha_core::{calendar::end_of_day_cutoff, dimension::DimVersion};

/// Version chains indexed by business key, for resolving which version of an
/// entity a business date saw.
///
/// Resolution uses end-of-day semantics: a fact dated `D` joins to the last
/// version effective before the midnight following `D`, so several versions
/// landing on one day collapse to the day's final state.
pub struct PitIndex<'a, R> {
  chains: HashMap<&'a str, Vec<&'a R>>,
}

impl<'a, R: DimVersion> PitIndex<'a, R> {
  /// Build the index from version rows in any order.
  pub fn new(rows: &'a [R]) -> Self {
    let mut chains: HashMap<&'a str, Vec<&'a R>> = HashMap::new();
    for row in rows {
      chains.entry(row.business_key()).or_default().push(row);
    }
    for chain in chains.values_mut() {
      chain.sort_by_key(|version| version.effective_from());
    }
    Self { chains }
  }

  /// The version of `business_key` in effect at the end of `date`, if the
  /// entity had any version by then.
  pub fn resolve(&self, business_key: &str, date: NaiveDate) -> Option<&'a R> {
    let chain = self.chains.get(business_key)?;
    let cutoff = end_of_day_cutoff(date);
    let idx = chain.partition_point(|version| version.effective_from() < cutoff);
    if idx == 0 { None } else { Some(chain[idx - 1]) }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};

  use super::*;

  struct V {
    key:  &'static str,
    from: DateTime<Utc>,
  }

  impl DimVersion for V {
    fn business_key(&self) -> &str {
      self.key
    }

    fn effective_from(&self) -> DateTime<Utc> {
      self.from
    }
  }

  fn dt(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
  }

  fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).unwrap()
  }

  #[test]
  fn resolves_the_version_covering_the_date() {
    let rows = vec![
      V { key: "STU-1", from: dt(2024, 1, 1, 0) },
      V { key: "STU-1", from: dt(2024, 6, 1, 0) },
    ];
    let index = PitIndex::new(&rows);

    // Before the change, on its first day, and long after.
    assert_eq!(
      index.resolve("STU-1", date(2024, 5, 31)).unwrap().from,
      dt(2024, 1, 1, 0)
    );
    assert_eq!(
      index.resolve("STU-1", date(2024, 6, 1)).unwrap().from,
      dt(2024, 6, 1, 0)
    );
    assert_eq!(
      index.resolve("STU-1", date(2025, 3, 1)).unwrap().from,
      dt(2024, 6, 1, 0)
    );
  }

  #[test]
  fn dates_before_the_first_version_resolve_to_nothing() {
    let rows = vec![V { key: "STU-1", from: dt(2024, 6, 1, 0) }];
    let index = PitIndex::new(&rows);
    assert!(index.resolve("STU-1", date(2024, 5, 31)).is_none());
    assert!(index.resolve("STU-2", date(2024, 7, 1)).is_none());
  }

  #[test]
  fn same_day_versions_collapse_to_the_last() {
    // Two updates land on one day; a fact dated that day sees the later one.
    let rows = vec![
      V { key: "STU-1", from: dt(2024, 3, 10, 9) },
      V { key: "STU-1", from: dt(2024, 3, 10, 17) },
    ];
    let index = PitIndex::new(&rows);
    assert_eq!(
      index.resolve("STU-1", date(2024, 3, 10)).unwrap().from,
      dt(2024, 3, 10, 17)
    );
  }

  #[test]
  fn unsorted_input_is_sorted_per_chain() {
    let rows = vec![
      V { key: "STU-1", from: dt(2024, 6, 1, 0) },
      V { key: "STU-2", from: dt(2024, 2, 1, 0) },
      V { key: "STU-1", from: dt(2024, 1, 1, 0) },
    ];
    let index = PitIndex::new(&rows);
    assert_eq!(
      index.resolve("STU-1", date(2024, 3, 1)).unwrap().from,
      dt(2024, 1, 1, 0)
    );
    assert_eq!(
      index.resolve("STU-2", date(2024, 3, 1)).unwrap().from,
      dt(2024, 2, 1, 0)
    );
  }
}
