//! Per-post running urgency score: `score_sum / score_count`.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::repository::{PostRepository, StoreError};

/// New accumulator values after applying a delta. The sum never drops below
/// zero and the count never below one.
pub fn accumulate(sum: f64, count: i32, delta_sum: f64, delta_count: i32) -> (f64, i32) {
  let sum = (sum + delta_sum).max(0.0);
  let count = count.saturating_add(delta_count).max(1);
  (sum, count)
}

/// Thin handle over the repository's atomic accumulator update.
#[derive(Clone)]
pub struct IncrementalScoreStore {
  repo: Arc<dyn PostRepository>,
}

impl IncrementalScoreStore {
  pub fn new(repo: Arc<dyn PostRepository>) -> Self {
    Self { repo }
  }

  pub async fn add_score(
    &self,
    post_id: Uuid,
    delta_score: f64,
    delta_count: i32,
  ) -> Result<(), StoreError> {
    self
      .repo
      .update_post_score_add(post_id, delta_score, delta_count)
      .await?;
    debug!(%post_id, delta_score, delta_count, "score accumulated");
    Ok(())
  }
}
