//! Assessment scoring: percentages, grade letters, performance bands.
//!
//! The breakpoints follow the national grading scheme and are fixed
//! constants, not configuration. Changing them changes the meaning of every
//! published mart, so they live in one place with tests pinning each edge.

/// Minimum percentage that counts as a pass.
pub const PASS_MARK: f64 = 33.0;

/// Percentage scored, or `None` when the measures cannot produce one:
/// a non-positive maximum, negative marks, or marks above the maximum.
pub fn percentage(marks_obtained: f64, max_marks: f64) -> Option<f64> {
  if max_marks <= 0.0 || marks_obtained < 0.0 || marks_obtained > max_marks {
    return None;
  }
  Some(marks_obtained / max_marks * 100.0)
}

/// Percentage rescaled to `0.0..=1.0` for cross-assessment comparison.
pub fn normalized_score(percentage: f64) -> f64 {
  (percentage / 100.0).clamp(0.0, 1.0)
}

pub fn is_pass(percentage: f64) -> bool {
  percentage >= PASS_MARK
}

// ─── Grade letters ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradeLetter {
  APlus,
  A,
  AMinus,
  B,
  C,
  D,
  F,
}

impl GradeLetter {
  pub fn from_percentage(percentage: f64) -> Self {
    if percentage >= 80.0 {
      Self::APlus
    } else if percentage >= 70.0 {
      Self::A
    } else if percentage >= 60.0 {
      Self::AMinus
    } else if percentage >= 50.0 {
      Self::B
    } else if percentage >= 40.0 {
      Self::C
    } else if percentage >= PASS_MARK {
      Self::D
    } else {
      Self::F
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::APlus => "A+",
      Self::A => "A",
      Self::AMinus => "A-",
      Self::B => "B",
      Self::C => "C",
      Self::D => "D",
      Self::F => "F",
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim() {
      "A+" => Some(Self::APlus),
      "A" => Some(Self::A),
      "A-" => Some(Self::AMinus),
      "B" => Some(Self::B),
      "C" => Some(Self::C),
      "D" => Some(Self::D),
      "F" => Some(Self::F),
      _ => None,
    }
  }
}

// ─── Performance bands ───────────────────────────────────────────────────────

/// Coarser banding used by the student performance mart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceBand {
  Excellent,
  VeryGood,
  Good,
  Satisfactory,
  NeedsImprovement,
  Poor,
}

impl PerformanceBand {
  pub fn from_percentage(percentage: f64) -> Self {
    if percentage >= 90.0 {
      Self::Excellent
    } else if percentage >= 80.0 {
      Self::VeryGood
    } else if percentage >= 70.0 {
      Self::Good
    } else if percentage >= 60.0 {
      Self::Satisfactory
    } else if percentage >= 50.0 {
      Self::NeedsImprovement
    } else {
      Self::Poor
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Excellent => "Excellent",
      Self::VeryGood => "Very Good",
      Self::Good => "Good",
      Self::Satisfactory => "Satisfactory",
      Self::NeedsImprovement => "Needs Improvement",
      Self::Poor => "Poor",
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim() {
      "Excellent" => Some(Self::Excellent),
      "Very Good" => Some(Self::VeryGood),
      "Good" => Some(Self::Good),
      "Satisfactory" => Some(Self::Satisfactory),
      "Needs Improvement" => Some(Self::NeedsImprovement),
      "Poor" => Some(Self::Poor),
      _ => None,
    }
  }
}
