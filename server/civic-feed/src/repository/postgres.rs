//! PostgreSQL repository. Comments and upvotes are batch-loaded per page of posts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use super::{PostRepository, StoreError};
use crate::models::{
  Comment, Issue, NewComment, NewReport, Post, PostStatus, Upvote, DEFAULT_CATEGORY,
};

const POST_COLUMNS: &str = r#"
  p.id, p.user_id, p.description, p.status, p.urgency, p.lat, p.lng,
  p.media_url, p.classified_as, p.score_sum, p.score_count,
  p.created_at, p.updated_at,
  i.id AS issue_id, i.name AS issue_name,
  i.description AS issue_description, i.category AS issue_category
"#;

#[derive(Debug, Clone)]
pub struct PgRepository {
  pool: PgPool,
}

impl PgRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
    let pool = PgPoolOptions::new()
      .max_connections(10)
      .connect(database_url)
      .await?;
    Ok(Self::new(pool))
  }

  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  async fn post_exists(&self, post_id: Uuid) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
      .bind(post_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(exists)
  }

  async fn load_posts(&self, rows: Vec<PgRow>) -> Result<Vec<Post>, StoreError> {
    let mut posts = rows
      .iter()
      .map(post_from_row)
      .collect::<Result<Vec<Post>, sqlx::Error>>()?;
    if posts.is_empty() {
      return Ok(posts);
    }
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

    let comment_rows = sqlx::query(
      r#"
      SELECT id, post_id, user_id, content, created_at
      FROM comments
      WHERE post_id = ANY($1)
      ORDER BY created_at DESC
      "#,
    )
    .bind(&ids)
    .fetch_all(&self.pool)
    .await?;

    let upvote_rows = sqlx::query(
      r#"
      SELECT id, post_id, user_id, created_at
      FROM upvotes
      WHERE post_id = ANY($1)
      ORDER BY created_at
      "#,
    )
    .bind(&ids)
    .fetch_all(&self.pool)
    .await?;

    let mut comments: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for row in &comment_rows {
      let comment = comment_from_row(row)?;
      comments.entry(comment.post_id).or_default().push(comment);
    }
    let mut upvotes: HashMap<Uuid, Vec<Upvote>> = HashMap::new();
    for row in &upvote_rows {
      let upvote = upvote_from_row(row)?;
      upvotes.entry(upvote.post_id).or_default().push(upvote);
    }

    for post in &mut posts {
      post.comments = comments.remove(&post.id).unwrap_or_default();
      post.upvotes = upvotes.remove(&post.id).unwrap_or_default();
    }
    Ok(posts)
  }
}

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
  let raw_status: String = row.try_get("status")?;
  let status = PostStatus::parse(&raw_status).ok_or_else(|| {
    sqlx::Error::Decode(format!("unknown post status {raw_status:?}").into())
  })?;

  Ok(Post {
    id: row.try_get("id")?,
    user_id: row.try_get("user_id")?,
    issue: Issue {
      id: row.try_get("issue_id")?,
      name: row.try_get("issue_name")?,
      description: row.try_get("issue_description")?,
      category: row.try_get("issue_category")?,
    },
    description: row.try_get("description")?,
    status,
    urgency: row.try_get("urgency")?,
    lat: row.try_get("lat")?,
    lng: row.try_get("lng")?,
    media_url: row.try_get("media_url")?,
    classified_as: row.try_get("classified_as")?,
    score_sum: row.try_get("score_sum")?,
    score_count: row.try_get("score_count")?,
    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    comments: Vec::new(),
    upvotes: Vec::new(),
  })
}

fn comment_from_row(row: &PgRow) -> Result<Comment, sqlx::Error> {
  Ok(Comment {
    id: row.try_get("id")?,
    post_id: row.try_get("post_id")?,
    user_id: row.try_get("user_id")?,
    content: row.try_get("content")?,
    created_at: row.try_get("created_at")?,
  })
}

fn upvote_from_row(row: &PgRow) -> Result<Upvote, sqlx::Error> {
  Ok(Upvote {
    id: row.try_get("id")?,
    post_id: row.try_get("post_id")?,
    user_id: row.try_get("user_id")?,
    created_at: row.try_get("created_at")?,
  })
}

#[async_trait]
impl PostRepository for PgRepository {
  async fn feed_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError> {
    self.admin_posts(None, limit).await
  }

  async fn admin_posts(
    &self,
    status: Option<PostStatus>,
    limit: i64,
  ) -> Result<Vec<Post>, StoreError> {
    let sql = format!(
      r#"
      SELECT {POST_COLUMNS}
      FROM posts p
      JOIN issues i ON i.id = p.issue_id
      WHERE ($1::text IS NULL OR p.status = $1)
      ORDER BY p.created_at DESC
      LIMIT $2
      "#
    );
    let rows = sqlx::query(&sql)
      .bind(status.map(PostStatus::as_str))
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    self.load_posts(rows).await
  }

  async fn get_post(&self, post_id: Uuid) -> Result<Post, StoreError> {
    let sql = format!(
      r#"
      SELECT {POST_COLUMNS}
      FROM posts p
      JOIN issues i ON i.id = p.issue_id
      WHERE p.id = $1
      "#
    );
    let row = sqlx::query(&sql)
      .bind(post_id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| StoreError::not_found("post", post_id))?;
    let mut posts = self.load_posts(vec![row]).await?;
    posts.pop().ok_or_else(|| StoreError::not_found("post", post_id))
  }

  async fn post_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, StoreError> {
    let rows = sqlx::query(
      r#"
      SELECT id, post_id, user_id, content, created_at
      FROM comments
      WHERE post_id = $1
      ORDER BY created_at ASC
      "#,
    )
    .bind(post_id)
    .fetch_all(&self.pool)
    .await?;
    let comments = rows
      .iter()
      .map(comment_from_row)
      .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
  }

  async fn update_post_urgency(&self, post_id: Uuid, urgency: i32) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE posts SET urgency = $2, updated_at = now() WHERE id = $1")
      .bind(post_id)
      .bind(urgency)
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::not_found("post", post_id));
    }
    Ok(())
  }

  async fn update_post_score_add(
    &self,
    post_id: Uuid,
    delta_sum: f64,
    delta_count: i32,
  ) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
      UPDATE posts SET
        score_sum = GREATEST(0, score_sum + $2),
        score_count = GREATEST(1, score_count + $3)
      WHERE id = $1
      "#,
    )
    .bind(post_id)
    .bind(delta_sum)
    .bind(delta_count)
    .execute(&self.pool)
    .await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::not_found("post", post_id));
    }
    Ok(())
  }

  async fn report_issue_via_post(&self, report: NewReport) -> Result<Post, StoreError> {
    let category = if report.issue_cat.trim().is_empty() {
      DEFAULT_CATEGORY.to_string()
    } else {
      report.issue_cat.clone()
    };

    let mut tx = self.pool.begin().await?;

    // The no-op update makes RETURNING yield the existing row on conflict.
    let issue_id: Uuid = sqlx::query_scalar(
      r#"
      INSERT INTO issues (id, name, description, category)
      VALUES ($1, $2, $3, $4)
      ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
      RETURNING id
      "#,
    )
    .bind(Uuid::new_v4())
    .bind(&report.issue_name)
    .bind(&report.issue_desc)
    .bind(&category)
    .fetch_one(&mut *tx)
    .await?;

    let post_id = Uuid::new_v4();
    sqlx::query(
      r#"
      INSERT INTO posts
        (id, user_id, issue_id, description, status, urgency, lat, lng,
         media_url, classified_as, score_sum, score_count)
      VALUES ($1, $2, $3, $4, 'open', $5, $6, $7, $8, $9, 0, 0)
      "#,
    )
    .bind(post_id)
    .bind(report.user_id)
    .bind(issue_id)
    .bind(&report.description)
    .bind(report.urgency)
    .bind(report.lat)
    .bind(report.lng)
    .bind(&report.media_url)
    .bind(&report.classified_as)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    self.get_post(post_id).await
  }

  async fn add_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
    if !self.post_exists(comment.post_id).await? {
      return Err(StoreError::not_found("post", comment.post_id));
    }
    let row = sqlx::query(
      r#"
      INSERT INTO comments (id, post_id, user_id, content)
      VALUES ($1, $2, $3, $4)
      RETURNING id, post_id, user_id, content, created_at
      "#,
    )
    .bind(Uuid::new_v4())
    .bind(comment.post_id)
    .bind(comment.user_id)
    .bind(&comment.content)
    .fetch_one(&self.pool)
    .await?;
    Ok(comment_from_row(&row)?)
  }

  async fn toggle_upvote(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, StoreError> {
    if !self.post_exists(post_id).await? {
      return Err(StoreError::not_found("post", post_id));
    }
    let removed = sqlx::query("DELETE FROM upvotes WHERE post_id = $1 AND user_id = $2")
      .bind(post_id)
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    if removed.rows_affected() > 0 {
      return Ok(false);
    }
    sqlx::query(
      r#"
      INSERT INTO upvotes (id, post_id, user_id)
      VALUES ($1, $2, $3)
      ON CONFLICT (post_id, user_id) DO NOTHING
      "#,
    )
    .bind(Uuid::new_v4())
    .bind(post_id)
    .bind(user_id)
    .execute(&self.pool)
    .await?;
    Ok(true)
  }

  async fn update_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE posts SET status = $2, updated_at = now() WHERE id = $1")
      .bind(post_id)
      .bind(status.as_str())
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::not_found("post", post_id));
    }
    Ok(())
  }
}
