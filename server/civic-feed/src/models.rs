//! Domain records stored by the repository and returned by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category used when a report does not name one.
pub const DEFAULT_CATEGORY: &str = "Miscellaneous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
  #[default]
  Open,
  InProgress,
  Closed,
}

impl PostStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      PostStatus::Open => "open",
      PostStatus::InProgress => "inprogress",
      PostStatus::Closed => "closed",
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "open" => Some(PostStatus::Open),
      "inprogress" => Some(PostStatus::InProgress),
      "closed" => Some(PostStatus::Closed),
      _ => None,
    }
  }
}

/// Issue type a post is filed under. Names are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  pub id: Uuid,
  pub name: String,
  pub description: String,
  pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id: Uuid,
  pub post_id: Uuid,
  pub user_id: Uuid,
  pub content: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upvote {
  pub id: Uuid,
  pub post_id: Uuid,
  pub user_id: Uuid,
  pub created_at: DateTime<Utc>,
}

/// A report with its issue, comments (newest first) and upvotes preloaded.
///
/// The running score accumulator is internal and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
  pub id: Uuid,
  pub user_id: Uuid,
  pub issue: Issue,
  pub description: String,
  pub status: PostStatus,
  /// Stored urgency level, 1..=3.
  pub urgency: i32,
  pub lat: f64,
  pub lng: f64,
  pub media_url: Option<String>,
  pub classified_as: Option<String>,
  #[serde(skip)]
  pub score_sum: f64,
  #[serde(skip)]
  pub score_count: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub comments: Vec<Comment>,
  pub upvotes: Vec<Upvote>,
}

/// A post as served by the feed: the post plus its ranking score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
  #[serde(flatten)]
  pub post: Post,
  pub score: f64,
  pub computed_urgency: i32,
}

/// Everything needed to file a report. Ingestion decides the final urgency.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
  pub user_id: Uuid,
  pub issue_name: String,
  pub issue_desc: String,
  pub issue_cat: String,
  pub description: String,
  pub urgency: i32,
  pub lat: f64,
  pub lng: f64,
  pub media_url: Option<String>,
  pub classified_as: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
  pub user_id: Uuid,
  pub post_id: Uuid,
  pub content: String,
}
