//! Mart rows — the published, query-shaped aggregates.
//!
//! The equity mart compares advantaged and disadvantaged subgroups within a
//! reporting group. Gaps are always advantaged minus disadvantaged, in
//! percentage points, and any cell smaller than [`MIN_CELL_SIZE`] students
//! is withheld rather than published.

use crate::{
  grading::{GradeLetter, PerformanceBand},
  normalize::SchoolType,
};

/// Gap magnitude, in percentage points, at or under which a subgroup pair
/// counts as equitable.
pub const EQUITY_GAP_THRESHOLD_PP: f64 = 5.0;

/// Smallest subgroup (or group) size that may be published.
pub const MIN_CELL_SIZE: i64 = 5;

// ─── Score accumulation ──────────────────────────────────────────────────────

/// Running sum and count of percentage scores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreAccumulator {
  pub sum:   f64,
  pub count: i64,
}

impl ScoreAccumulator {
  pub fn push(&mut self, score: f64) {
    self.sum += score;
    self.count += 1;
  }

  pub fn mean(&self) -> Option<f64> {
    if self.count == 0 {
      return None;
    }
    Some(self.sum / self.count as f64)
  }
}

// ─── Subgroup gaps ───────────────────────────────────────────────────────────

/// Published comparison of one advantaged/disadvantaged subgroup pair.
///
/// Counts are always published. Averages appear only for subgroups of at
/// least [`MIN_CELL_SIZE`] students, and the gap only when both subgroups
/// clear that floor.
#[derive(Debug, Clone, PartialEq)]
pub struct GapStats {
  pub advantaged_count:    i64,
  pub disadvantaged_count: i64,
  pub advantaged_avg:      Option<f64>,
  pub disadvantaged_avg:   Option<f64>,
  /// Advantaged average minus disadvantaged average, in percentage points.
  /// Positive means the advantaged subgroup scores higher.
  pub gap:                 Option<f64>,
  pub is_equitable:        Option<bool>,
}

impl GapStats {
  /// Compute the published stats for one pair. The second return value is
  /// true when a gap existed but was withheld because a subgroup fell below
  /// the publication floor.
  pub fn compute(
    advantaged: ScoreAccumulator,
    disadvantaged: ScoreAccumulator,
  ) -> (Self, bool) {
    let publish = |acc: ScoreAccumulator| {
      if acc.count >= MIN_CELL_SIZE { acc.mean() } else { None }
    };
    let advantaged_avg = publish(advantaged);
    let disadvantaged_avg = publish(disadvantaged);
    let gap = match (advantaged_avg, disadvantaged_avg) {
      (Some(a), Some(d)) => Some(a - d),
      _ => None,
    };
    let is_equitable = gap.map(|g| g.abs() <= EQUITY_GAP_THRESHOLD_PP);
    let suppressed =
      gap.is_none() && advantaged.count > 0 && disadvantaged.count > 0;
    let stats = Self {
      advantaged_count: advantaged.count,
      disadvantaged_count: disadvantaged.count,
      advantaged_avg,
      disadvantaged_avg,
      gap,
      is_equitable,
    };
    (stats, suppressed)
  }
}

// ─── mart_equity_metrics ─────────────────────────────────────────────────────

/// One reporting group of the equity mart.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityMetricsRow {
  pub division:      String,
  pub district:      String,
  pub school_type:   SchoolType,
  pub academic_year: String,
  pub grade_level:   String,
  pub result_count:  i64,
  pub student_count: i64,
  pub avg_score:     f64,
  pub pass_rate:     f64,
  /// Male versus female.
  pub gender:        GapStats,
  /// Non-low-income versus low-income.
  pub socioeconomic: GapStats,
  /// Students without a recorded disability versus students with one.
  pub disability:    GapStats,
  /// Urban versus rural school location.
  pub location:      GapStats,
}

// ─── mart_student_performance ────────────────────────────────────────────────

/// How many results landed on each grade letter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeCounts {
  pub a_plus:  i64,
  pub a:       i64,
  pub a_minus: i64,
  pub b:       i64,
  pub c:       i64,
  pub d:       i64,
  pub f:       i64,
}

impl GradeCounts {
  pub fn record(&mut self, letter: GradeLetter) {
    match letter {
      GradeLetter::APlus => self.a_plus += 1,
      GradeLetter::A => self.a += 1,
      GradeLetter::AMinus => self.a_minus += 1,
      GradeLetter::B => self.b += 1,
      GradeLetter::C => self.c += 1,
      GradeLetter::D => self.d += 1,
      GradeLetter::F => self.f += 1,
    }
  }

  pub fn total(&self) -> i64 {
    self.a_plus + self.a + self.a_minus + self.b + self.c + self.d + self.f
  }
}

/// One student's year at one school: score aggregates plus attendance.
///
/// A student can appear with assessments but no attendance records, or the
/// reverse; the missing side's aggregates are `None` rather than zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentPerformanceRow {
  pub student_id:       String,
  pub school_id:        String,
  pub academic_year:    String,
  pub student_name:     String,
  pub school_name:      String,
  pub division:         String,
  pub district:         String,
  pub assessment_count: i64,
  pub avg_percentage:   Option<f64>,
  pub pass_rate:        Option<f64>,
  pub performance_band: Option<PerformanceBand>,
  pub grades:           GradeCounts,
  pub school_days:      i64,
  pub present_days:     i64,
  pub absent_days:      i64,
  pub attendance_rate:  Option<f64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn acc(scores: &[f64]) -> ScoreAccumulator {
    let mut acc = ScoreAccumulator::default();
    for s in scores {
      acc.push(*s);
    }
    acc
  }

  #[test]
  fn gap_is_advantaged_minus_disadvantaged() {
    let advantaged = acc(&[80.0, 80.0, 80.0, 80.0, 80.0]);
    let disadvantaged = acc(&[72.0, 72.0, 72.0, 72.0, 72.0]);
    let (stats, suppressed) = GapStats::compute(advantaged, disadvantaged);
    assert!(!suppressed);
    assert_eq!(stats.gap, Some(8.0));
    assert_eq!(stats.is_equitable, Some(false));
    assert_eq!(stats.advantaged_avg, Some(80.0));
    assert_eq!(stats.disadvantaged_avg, Some(72.0));
  }

  #[test]
  fn equitable_at_the_threshold() {
    let (stats, _) = GapStats::compute(
      acc(&[75.0, 75.0, 75.0, 75.0, 75.0]),
      acc(&[70.0, 70.0, 70.0, 70.0, 70.0]),
    );
    assert_eq!(stats.gap, Some(5.0));
    assert_eq!(stats.is_equitable, Some(true));

    // Sign does not matter, magnitude does.
    let (stats, _) = GapStats::compute(
      acc(&[70.0, 70.0, 70.0, 70.0, 70.0]),
      acc(&[76.0, 76.0, 76.0, 76.0, 76.0]),
    );
    assert_eq!(stats.gap, Some(-6.0));
    assert_eq!(stats.is_equitable, Some(false));
  }

  #[test]
  fn small_subgroup_withholds_gap_but_keeps_counts() {
    let (stats, suppressed) = GapStats::compute(
      acc(&[80.0; 7]),
      acc(&[60.0, 60.0, 60.0]), // below the floor
    );
    assert!(suppressed);
    assert_eq!(stats.advantaged_count, 7);
    assert_eq!(stats.disadvantaged_count, 3);
    assert_eq!(stats.advantaged_avg, Some(80.0));
    assert_eq!(stats.disadvantaged_avg, None);
    assert_eq!(stats.gap, None);
    assert_eq!(stats.is_equitable, None);
  }

  #[test]
  fn empty_subgroup_is_absence_not_suppression() {
    let (stats, suppressed) =
      GapStats::compute(acc(&[80.0; 6]), ScoreAccumulator::default());
    assert!(!suppressed);
    assert_eq!(stats.disadvantaged_count, 0);
    assert_eq!(stats.disadvantaged_avg, None);
    assert_eq!(stats.gap, None);
  }

  #[test]
  fn grade_counts_record_each_letter() {
    let mut counts = GradeCounts::default();
    counts.record(GradeLetter::APlus);
    counts.record(GradeLetter::APlus);
    counts.record(GradeLetter::F);
    assert_eq!(counts.a_plus, 2);
    assert_eq!(counts.f, 1);
    assert_eq!(counts.total(), 3);
  }
}
