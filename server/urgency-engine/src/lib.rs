//! Civic Feed Urgency Engine: rule-based urgency scoring; no DB, no network.
//! Used by the feed service as a library and by the binary for stdin/stdout.

pub mod aggregate;
pub mod comment;
pub mod error;
pub mod feed;
pub mod heuristic;
pub mod keywords;
pub mod types;

pub use aggregate::{aggregate_urgency, categorize};
pub use comment::comment_urgency;
pub use error::EngineError;
pub use heuristic::{heuristic_score, label_to_verdict, score_to_bucket, urgency_to_score};
pub use types::{Input, Output, UrgencyLevel, UrgencyScore};

/// Run the engine on parsed input and return the output (no I/O).
pub fn run(input: &Input) -> Result<Output, EngineError> {
  if !(1..=3).contains(&input.urgency) {
    return Err(EngineError::validation("urgency", "expected 1, 2 or 3"));
  }

  let heuristic_score = heuristic::heuristic_score(&input.text);
  let comments: Vec<UrgencyScore> = input.comments.iter().map(|c| comment_urgency(c)).collect();
  let scores: Vec<f64> = comments.iter().map(|c| c.score).collect();
  let (aggregate_urgency, aggregate_level) = aggregate::aggregate_urgency(input.urgency, &scores);

  Ok(Output {
    heuristic_score,
    bucket: score_to_bucket(heuristic_score),
    comments,
    aggregate_urgency,
    aggregate_level,
  })
}
