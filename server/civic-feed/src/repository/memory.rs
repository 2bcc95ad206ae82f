//! In-process repository used when no database is configured, and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{PostRepository, StoreError};
use crate::models::{
  Comment, Issue, NewComment, NewReport, Post, PostStatus, Upvote, DEFAULT_CATEGORY,
};
use crate::score_store::accumulate;

#[derive(Debug, Clone)]
struct PostRow {
  id: Uuid,
  user_id: Uuid,
  issue_id: Uuid,
  description: String,
  status: PostStatus,
  urgency: i32,
  lat: f64,
  lng: f64,
  media_url: Option<String>,
  classified_as: Option<String>,
  score_sum: f64,
  score_count: i32,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
  issues: Vec<Issue>,
  posts: Vec<PostRow>,
  comments: Vec<Comment>,
  upvotes: Vec<Upvote>,
}

impl Tables {
  fn post_row_mut(&mut self, post_id: Uuid) -> Result<&mut PostRow, StoreError> {
    self
      .posts
      .iter_mut()
      .find(|p| p.id == post_id)
      .ok_or_else(|| StoreError::not_found("post", post_id))
  }

  fn hydrate(&self, row: &PostRow) -> Result<Post, StoreError> {
    let issue = self
      .issues
      .iter()
      .find(|i| i.id == row.issue_id)
      .cloned()
      .ok_or_else(|| StoreError::not_found("issue", row.issue_id))?;

    // Newest first; insertion order breaks timestamp ties.
    let mut comments: Vec<Comment> = self
      .comments
      .iter()
      .rev()
      .filter(|c| c.post_id == row.id)
      .cloned()
      .collect();
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let upvotes = self
      .upvotes
      .iter()
      .filter(|u| u.post_id == row.id)
      .cloned()
      .collect();

    Ok(Post {
      id: row.id,
      user_id: row.user_id,
      issue,
      description: row.description.clone(),
      status: row.status,
      urgency: row.urgency,
      lat: row.lat,
      lng: row.lng,
      media_url: row.media_url.clone(),
      classified_as: row.classified_as.clone(),
      score_sum: row.score_sum,
      score_count: row.score_count,
      created_at: row.created_at,
      updated_at: row.updated_at,
      comments,
      upvotes,
    })
  }

  fn newest_posts(&self, status: Option<PostStatus>, limit: i64) -> Result<Vec<Post>, StoreError> {
    let mut rows: Vec<&PostRow> = self
      .posts
      .iter()
      .rev()
      .filter(|p| status.map_or(true, |s| p.status == s))
      .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    rows
      .into_iter()
      .take(limit)
      .map(|row| self.hydrate(row))
      .collect()
  }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
  tables: RwLock<Tables>,
}

impl MemoryRepository {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl PostRepository for MemoryRepository {
  async fn feed_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError> {
    self.tables.read().newest_posts(None, limit)
  }

  async fn admin_posts(
    &self,
    status: Option<PostStatus>,
    limit: i64,
  ) -> Result<Vec<Post>, StoreError> {
    self.tables.read().newest_posts(status, limit)
  }

  async fn get_post(&self, post_id: Uuid) -> Result<Post, StoreError> {
    let tables = self.tables.read();
    let row = tables
      .posts
      .iter()
      .find(|p| p.id == post_id)
      .ok_or_else(|| StoreError::not_found("post", post_id))?;
    tables.hydrate(row)
  }

  async fn post_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, StoreError> {
    let tables = self.tables.read();
    let mut comments: Vec<Comment> = tables
      .comments
      .iter()
      .filter(|c| c.post_id == post_id)
      .cloned()
      .collect();
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(comments)
  }

  async fn update_post_urgency(&self, post_id: Uuid, urgency: i32) -> Result<(), StoreError> {
    let mut tables = self.tables.write();
    let row = tables.post_row_mut(post_id)?;
    row.urgency = urgency;
    row.updated_at = Utc::now();
    Ok(())
  }

  async fn update_post_score_add(
    &self,
    post_id: Uuid,
    delta_sum: f64,
    delta_count: i32,
  ) -> Result<(), StoreError> {
    let mut tables = self.tables.write();
    let row = tables.post_row_mut(post_id)?;
    let (sum, count) = accumulate(row.score_sum, row.score_count, delta_sum, delta_count);
    row.score_sum = sum;
    row.score_count = count;
    Ok(())
  }

  async fn report_issue_via_post(&self, report: NewReport) -> Result<Post, StoreError> {
    let mut tables = self.tables.write();

    let existing = tables
      .issues
      .iter()
      .find(|i| i.name == report.issue_name)
      .map(|i| i.id);
    let issue_id = match existing {
      Some(id) => id,
      None => {
        let category = if report.issue_cat.trim().is_empty() {
          DEFAULT_CATEGORY.to_string()
        } else {
          report.issue_cat.clone()
        };
        let issue = Issue {
          id: Uuid::new_v4(),
          name: report.issue_name.clone(),
          description: report.issue_desc.clone(),
          category,
        };
        let id = issue.id;
        tables.issues.push(issue);
        id
      }
    };

    let now = Utc::now();
    let row = PostRow {
      id: Uuid::new_v4(),
      user_id: report.user_id,
      issue_id,
      description: report.description,
      status: PostStatus::Open,
      urgency: report.urgency,
      lat: report.lat,
      lng: report.lng,
      media_url: report.media_url,
      classified_as: report.classified_as,
      score_sum: 0.0,
      score_count: 0,
      created_at: now,
      updated_at: now,
    };
    let post = tables.hydrate(&row)?;
    tables.posts.push(row);
    Ok(post)
  }

  async fn add_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
    let mut tables = self.tables.write();
    if !tables.posts.iter().any(|p| p.id == comment.post_id) {
      return Err(StoreError::not_found("post", comment.post_id));
    }
    let stored = Comment {
      id: Uuid::new_v4(),
      post_id: comment.post_id,
      user_id: comment.user_id,
      content: comment.content,
      created_at: Utc::now(),
    };
    tables.comments.push(stored.clone());
    Ok(stored)
  }

  async fn toggle_upvote(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, StoreError> {
    let mut tables = self.tables.write();
    if !tables.posts.iter().any(|p| p.id == post_id) {
      return Err(StoreError::not_found("post", post_id));
    }
    let before = tables.upvotes.len();
    tables
      .upvotes
      .retain(|u| !(u.post_id == post_id && u.user_id == user_id));
    if tables.upvotes.len() < before {
      return Ok(false);
    }
    tables.upvotes.push(Upvote {
      id: Uuid::new_v4(),
      post_id,
      user_id,
      created_at: Utc::now(),
    });
    Ok(true)
  }

  async fn update_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<(), StoreError> {
    let mut tables = self.tables.write();
    let row = tables.post_row_mut(post_id)?;
    row.status = status;
    row.updated_at = Utc::now();
    Ok(())
  }
}
