//! Persistence boundary for posts, comments, upvotes and the score accumulator.

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Comment, NewComment, NewReport, Post, PostStatus};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: Uuid },

  #[error("database: {0}")]
  Database(#[from] sqlx::Error),

  #[error("migration: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
  pub fn not_found(entity: &'static str, id: Uuid) -> Self {
    Self::NotFound { entity, id }
  }
}

/// Storage operations the service needs. Posts come back with their issue,
/// comments (newest first) and upvotes preloaded.
#[async_trait]
pub trait PostRepository: Send + Sync {
  /// Newest posts first, at most `limit`.
  async fn feed_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError>;

  /// Newest posts first, optionally filtered by status.
  async fn admin_posts(
    &self,
    status: Option<PostStatus>,
    limit: i64,
  ) -> Result<Vec<Post>, StoreError>;

  async fn get_post(&self, post_id: Uuid) -> Result<Post, StoreError>;

  /// All comments on a post, oldest first.
  async fn post_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, StoreError>;

  async fn update_post_urgency(&self, post_id: Uuid, urgency: i32) -> Result<(), StoreError>;

  /// Atomically applies `score_sum = max(0, score_sum + delta_sum)` and
  /// `score_count = max(1, score_count + delta_count)`.
  async fn update_post_score_add(
    &self,
    post_id: Uuid,
    delta_sum: f64,
    delta_count: i32,
  ) -> Result<(), StoreError>;

  /// Finds or creates the issue by name, then inserts the post with an empty
  /// accumulator.
  async fn report_issue_via_post(&self, report: NewReport) -> Result<Post, StoreError>;

  async fn add_comment(&self, comment: NewComment) -> Result<Comment, StoreError>;

  /// Adds the user's upvote, or removes it if present. Returns whether the
  /// post is upvoted by the user afterwards.
  async fn toggle_upvote(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, StoreError>;

  async fn update_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<(), StoreError>;
}
