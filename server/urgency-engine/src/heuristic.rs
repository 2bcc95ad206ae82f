//! Local heuristic score and the fixed score/bucket tables.

/// Terms that mark a report as critical (checked first).
pub const CRITICAL_TERMS: &[&str] = &[
  "emergency",
  "danger",
  "fire",
  "explosion",
  "injury",
  "critical",
  "urgent",
];

/// Terms that mark a report as moderate when no critical term is present.
pub const MODERATE_TERMS: &[&str] = &[
  "broken", "delay", "blocked", "leak", "issue", "problem", "trash",
];

pub const CRITICAL_SCORE: f64 = 0.85;
pub const MODERATE_SCORE: f64 = 0.6;
pub const BASELINE_SCORE: f64 = 0.3;

/// Keyword scan: 0.85 on any critical term, else 0.6 on any moderate term,
/// else 0.3 for non-blank text, 0.0 for blank text.
///
/// Matching is case-insensitive substring containment.
pub fn heuristic_score(text: &str) -> f64 {
  let lower = text.to_lowercase();
  if CRITICAL_TERMS.iter().any(|t| lower.contains(t)) {
    return CRITICAL_SCORE;
  }
  if MODERATE_TERMS.iter().any(|t| lower.contains(t)) {
    return MODERATE_SCORE;
  }
  if lower.trim().is_empty() {
    return 0.0;
  }
  BASELINE_SCORE
}

/// Continuous score -> discrete urgency bucket: `>= 0.8 -> 3`, `>= 0.5 -> 2`, else 1.
pub fn score_to_bucket(score: f64) -> i32 {
  if score >= 0.8 {
    3
  } else if score >= 0.5 {
    2
  } else {
    1
  }
}

/// Stored urgency level -> representative score. Unknown levels score 0.
pub fn urgency_to_score(urgency: i32) -> f64 {
  match urgency {
    3 => 0.85,
    2 => 0.6,
    1 => 0.3,
    _ => 0.0,
  }
}

/// Model label -> (bucket, score). Labels are matched trimmed and lowercased.
pub fn label_to_verdict(label: &str) -> Option<(i32, f64)> {
  match label.trim().to_lowercase().as_str() {
    "critical" | "urgent" => Some((3, 0.9)),
    "moderate" | "medium" => Some((2, 0.65)),
    "low" | "minor" => Some((1, 0.3)),
    _ => None,
  }
}
