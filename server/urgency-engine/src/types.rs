//! Urgency types plus the CLI JSON contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
  Low,
  Moderate,
  Critical,
}

impl UrgencyLevel {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Moderate => "moderate",
      Self::Critical => "critical",
    }
  }
}

impl std::fmt::Display for UrgencyLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Keyword analysis of one comment. `score` is in [0.0, 3.0], `confidence` in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UrgencyScore {
  pub score: f64,
  pub level: UrgencyLevel,
  pub confidence: f64,
}

// ---------------------------------------------------------------------------
// CLI contract
// ---------------------------------------------------------------------------

/// Input: one JSON object on stdin.
#[derive(Debug, Deserialize)]
pub struct Input {
  pub text: String,
  #[serde(default)]
  pub comments: Vec<String>,
  /// Stored urgency of the post the comments belong to.
  #[serde(default = "default_urgency")]
  pub urgency: i32,
}

fn default_urgency() -> i32 {
  1
}

/// Output: one JSON object on stdout.
#[derive(Debug, Serialize)]
pub struct Output {
  pub heuristic_score: f64,
  pub bucket: i32,
  pub comments: Vec<UrgencyScore>,
  pub aggregate_urgency: i32,
  pub aggregate_level: UrgencyLevel,
}
