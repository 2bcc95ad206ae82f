//! Feed blend: continuous urgency score mixed with upvote presence.

/// Weight of the urgency score in the feed blend.
pub const SCORE_WEIGHT: f64 = 0.8;
/// Weight of upvote presence in the feed blend.
pub const UPVOTE_WEIGHT: f64 = 0.2;

/// 1.0 when the post has at least one upvote. The count is not a signal.
pub fn upvote_presence(upvotes: usize) -> f64 {
  if upvotes > 0 {
    1.0
  } else {
    0.0
  }
}

/// `0.8 * score + 0.2 * upvote_presence`.
pub fn blend(score: f64, upvotes: usize) -> f64 {
  SCORE_WEIGHT * score + UPVOTE_WEIGHT * upvote_presence(upvotes)
}

/// Running average `sum / max(1, count)` clamped into [0, 1].
pub fn running_average(score_sum: f64, score_count: i32) -> f64 {
  let avg = score_sum / f64::from(score_count.max(1));
  if avg.is_nan() {
    return 0.0;
  }
  avg.clamp(0.0, 1.0)
}
