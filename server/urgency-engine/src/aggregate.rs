//! Post urgency re-derived from its baseline and the comment scores.

use crate::types::UrgencyLevel;

/// Numeric score (0.0-3.0 domain) -> level: `<= 0.75` low, `<= 1.5` moderate, else critical.
pub fn categorize(score: f64) -> UrgencyLevel {
  if score <= 0.75 {
    UrgencyLevel::Low
  } else if score <= 1.5 {
    UrgencyLevel::Moderate
  } else {
    UrgencyLevel::Critical
  }
}

/// Mean of the scores, or `None` when empty.
pub fn mean(scores: &[f64]) -> Option<f64> {
  if scores.is_empty() {
    return None;
  }
  Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Blend the post's baseline urgency 50/50 with the mean comment score.
///
/// With no comments the baseline stands in for the comment mean. The blended
/// score discretizes as `> 2.25 -> 3`, `> 1.125 -> 2`, else 1.
pub fn aggregate_urgency(post_urgency: i32, comment_scores: &[f64]) -> (i32, UrgencyLevel) {
  let baseline = post_urgency as f64;
  let comment_avg = mean(comment_scores).unwrap_or(baseline);
  let final_score = 0.5 * baseline + 0.5 * comment_avg;

  let urgency = if final_score > 2.25 {
    3
  } else if final_score > 1.125 {
    2
  } else {
    1
  };

  (urgency, categorize(final_score))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::comment::comment_urgency;

  #[test]
  fn categorize_boundaries() {
    assert_eq!(categorize(0.5), UrgencyLevel::Low);
    assert_eq!(categorize(0.75), UrgencyLevel::Low);
    assert_eq!(categorize(0.8), UrgencyLevel::Moderate);
    assert_eq!(categorize(1.5), UrgencyLevel::Moderate);
    assert_eq!(categorize(1.51), UrgencyLevel::Critical);
    assert_eq!(categorize(3.0), UrgencyLevel::Critical);
  }

  #[test]
  fn no_comments_keeps_baseline() {
    assert_eq!(aggregate_urgency(1, &[]), (1, UrgencyLevel::Moderate));
    assert_eq!(aggregate_urgency(3, &[]).0, 3);
  }

  #[test]
  fn aggregate_table() {
    let cases: &[(i32, &[f64], i32)] = &[
      (1, &[3.0], 2),
      (1, &[2.8, 2.9, 3.0], 2),
      (2, &[1.0, 2.0, 1.5], 2),
      (3, &[0.8, 0.9], 2),
      (3, &[2.55], 3),
      (1, &[0.3, 0.3], 1),
    ];
    for (post, comments, want) in cases {
      let (got, _) = aggregate_urgency(*post, comments);
      assert_eq!(got, *want, "post={} comments={:?}", post, comments);
    }
  }

  #[test]
  fn discretization_thresholds_are_exclusive() {
    // 0.5 * 1 + 0.5 * 1.25 = 1.125 -> stays 1
    assert_eq!(aggregate_urgency(1, &[1.25]).0, 1);
    // 0.5 * 2 + 0.5 * 2.5 = 2.25 -> stays 2
    assert_eq!(aggregate_urgency(2, &[2.5]).0, 2);
  }

  #[test]
  fn community_comments_escalate_a_pothole() {
    let comments = [
      "This pothole is really dangerous, my car got damaged",
      "Several accidents happened here already, it's critical",
      "Multiple vehicles have been damaged, needs urgent repair",
    ];
    let scores: Vec<f64> = comments.iter().map(|c| comment_urgency(c).score).collect();
    let (urgency, level) = aggregate_urgency(1, &scores);
    assert!(urgency >= 2, "got {}", urgency);
    assert_eq!(level, UrgencyLevel::Critical);
  }

  #[test]
  fn mean_of_empty_is_none() {
    assert_eq!(mean(&[]), None);
    assert_eq!(mean(&[1.0, 2.0]), Some(1.5));
  }
}
