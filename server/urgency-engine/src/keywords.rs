//! Comment keyword table: keyword -> urgency multiplier (0.0-3.0 domain).

/// Multiplier applied to partial (prefix) matches.
pub const PARTIAL_MATCH_DISCOUNT: f64 = 0.8;

/// Keyword multipliers, grouped critical (2.5-3.0), moderate (1.2-2.3), low (0.6-1.0).
///
/// Some entries are stems ("explod", "waterlog") that only ever match as prefixes.
pub const KEYWORDS: &[(&str, f64)] = &[
  // critical
  ("dangerous", 3.0),
  ("critical", 3.0),
  ("emergency", 3.0),
  ("severe", 3.0),
  ("urgent", 3.0),
  ("fatal", 3.0),
  ("death", 3.0),
  ("dying", 3.0),
  ("collapsed", 3.0),
  ("collapse", 3.0),
  ("bleeding", 3.0),
  ("fire", 3.0),
  ("explod", 3.0),
  ("broken", 2.5),
  ("destroyed", 2.5),
  ("accident", 2.5),
  ("injury", 2.5),
  ("injured", 2.5),
  ("hazard", 2.5),
  ("gas", 2.5),
  // moderate
  ("danger", 2.3),
  ("flood", 2.2),
  ("flooding", 2.2),
  ("waterlog", 2.2),
  ("unsafe", 2.2),
  ("serious", 2.0),
  ("damage", 2.0),
  ("damaged", 2.0),
  ("risk", 2.0),
  ("sick", 2.0),
  ("illness", 2.0),
  ("disease", 2.0),
  ("spread", 2.0),
  ("concern", 1.8),
  ("repair", 1.8),
  ("pothole", 1.8),
  ("crack", 1.6),
  ("problem", 1.5),
  ("needs", 1.5),
  ("needed", 1.5),
  ("hole", 1.5),
  ("issue", 1.2),
  // low
  ("suggests", 1.0),
  ("could", 0.9),
  ("might", 0.9),
  ("possible", 0.9),
  ("seems", 0.9),
  ("minor", 0.8),
  ("maybe", 0.8),
  ("small", 0.7),
  ("slight", 0.7),
  ("bit", 0.6),
  ("little", 0.6),
];

/// Exact keyword lookup.
pub fn exact(word: &str) -> Option<f64> {
  KEYWORDS
    .iter()
    .find(|(k, _)| *k == word)
    .map(|(_, m)| *m)
}

/// Prefix lookup: the longest keyword that `word` starts with.
///
/// Equal-length prefixes of one word are the same string, so the result is
/// independent of table order.
pub fn longest_prefix(word: &str) -> Option<(&'static str, f64)> {
  KEYWORDS
    .iter()
    .filter(|(k, _)| word.starts_with(k))
    .max_by_key(|(k, _)| k.len())
    .map(|(k, m)| (*k, *m))
}
