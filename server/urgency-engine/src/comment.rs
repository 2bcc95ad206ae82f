//! Per-comment urgency from keyword analysis.

use crate::aggregate::categorize;
use crate::keywords::{self, PARTIAL_MATCH_DISCOUNT};
use crate::types::{UrgencyLevel, UrgencyScore};

/// Characters stripped from both ends of every token.
const TRIM_CHARS: &[char] = &[
  '.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}',
];

/// Score used when a comment carries no keyword evidence.
const NO_EVIDENCE: UrgencyScore = UrgencyScore {
  score: 1.0,
  level: UrgencyLevel::Moderate,
  confidence: 0.5,
};

/// Analyze a comment and return its urgency score (0.0-3.0).
///
/// - Tokens are whitespace-split, trimmed of surrounding punctuation, lowercased.
/// - Exact keyword hits count at full multiplier; otherwise the longest keyword
///   the token starts with counts at `multiplier * 0.8`.
/// - No hits: score 1.0, confidence 0.5.
/// - Otherwise score is the mean multiplier, confidence `min(1, hits * 0.15)`.
/// - A mean above 3.0 is capped; a mean below 0.5 is reset to exactly 1.0.
pub fn comment_urgency(text: &str) -> UrgencyScore {
  if text.is_empty() {
    return NO_EVIDENCE;
  }

  let lower = text.to_lowercase();
  let mut total = 0.0;
  let mut matches = 0u32;

  for word in lower.split_whitespace() {
    let word = word.trim_matches(TRIM_CHARS);
    if let Some(multiplier) = keywords::exact(word) {
      total += multiplier;
      matches += 1;
    } else if let Some((_, multiplier)) = keywords::longest_prefix(word) {
      total += multiplier * PARTIAL_MATCH_DISCOUNT;
      matches += 1;
    }
  }

  if matches == 0 {
    return NO_EVIDENCE;
  }

  let mut score = total / matches as f64;
  let confidence = (matches as f64 * 0.15).min(1.0);
  if score > 3.0 {
    score = 3.0;
  }
  if score < 0.5 {
    score = 1.0;
  }

  UrgencyScore {
    score,
    level: categorize(score),
    confidence,
  }
}
