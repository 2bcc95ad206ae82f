//! HTTP handlers for the civic feed service.

use axum::{
  extract::{Query, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ScoringMode;
use crate::error::ApiError;
use crate::identity::{AdminUser, CurrentUser};
use crate::models::{Comment, NewReport, Post, PostStatus, RankedPost};
use crate::provider::ScoreSubject;
use crate::state::AppState;

const ADMIN_LIST_LIMIT: i64 = 100;

const NO_CACHE: [(header::HeaderName, &str); 3] = [
  (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
  (header::PRAGMA, "no-cache"),
  (header::EXPIRES, "0"),
];

fn parse_id(raw: &str, field: &str) -> Result<Uuid, ApiError> {
  Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("invalid {field}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn health() -> &'static str {
  "ok"
}

pub async fn feed(
  State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
  let posts: Vec<RankedPost> = state
    .ranker
    .feed(state.repo.as_ref(), state.scoring_mode())
    .await?;
  Ok((NO_CACHE, Json(posts)))
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
  pub issue_name: String,
  #[serde(default)]
  pub issue_desc: String,
  #[serde(default)]
  pub issue_cat: String,
  #[serde(default)]
  pub post_desc: String,
  pub urgency: Option<i32>,
  pub lat: f64,
  pub lng: f64,
  #[serde(default)]
  pub media_url: Option<String>,
}

impl ReportRequest {
  fn into_new_report(self, user_id: Uuid) -> Result<NewReport, ApiError> {
    let issue_name = self.issue_name.trim().to_string();
    if issue_name.is_empty() {
      return Err(ApiError::bad_request("issue_name is required"));
    }
    let urgency = self.urgency.unwrap_or(1);
    if !(1..=3).contains(&urgency) {
      return Err(ApiError::bad_request("urgency must be 1, 2 or 3"));
    }
    if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
      return Err(ApiError::bad_request("lat/lng out of range"));
    }
    Ok(NewReport {
      user_id,
      issue_name,
      issue_desc: self.issue_desc,
      issue_cat: self.issue_cat.trim().to_string(),
      description: self.post_desc,
      urgency,
      lat: self.lat,
      lng: self.lng,
      media_url: non_blank(self.media_url),
      classified_as: None,
    })
  }
}

pub async fn report(
  State(state): State<Arc<AppState>>,
  CurrentUser(user_id): CurrentUser,
  Json(req): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
  let report = req.into_new_report(user_id)?;
  let post = state
    .ingestion
    .report(report, state.scoring_mode())
    .await?;
  Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
  pub post_id: String,
  pub content: String,
}

pub async fn comment(
  State(state): State<Arc<AppState>>,
  CurrentUser(user_id): CurrentUser,
  Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
  let post_id = parse_id(&req.post_id, "post_id")?;
  if req.content.trim().is_empty() {
    return Err(ApiError::bad_request("content is required"));
  }
  let comment = state
    .ingestion
    .comment(user_id, post_id, req.content, state.scoring_mode())
    .await?;
  Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Debug, Deserialize)]
pub struct UpvoteRequest {
  pub post_id: String,
}

#[derive(Debug, Serialize)]
pub struct UpvoteResponse {
  pub upvoted: bool,
}

pub async fn upvote(
  State(state): State<Arc<AppState>>,
  CurrentUser(user_id): CurrentUser,
  Json(req): Json<UpvoteRequest>,
) -> Result<Json<UpvoteResponse>, ApiError> {
  let post_id = parse_id(&req.post_id, "post_id")?;
  let upvoted = state.repo.toggle_upvote(user_id, post_id).await?;
  info!(%post_id, %user_id, upvoted, "upvote toggled");
  Ok(Json(UpvoteResponse { upvoted }))
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
  #[serde(default)]
  pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
  pub urgency: i32,
  pub score: f64,
}

/// Scores free text with the model, or the heuristic when the model is
/// unavailable. Never fails on scoring errors.
pub async fn predict_urgency(
  State(state): State<Arc<AppState>>,
  Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
  if req.text.trim().is_empty() {
    return Err(ApiError::bad_request("text is required"));
  }
  let scored = state
    .providers
    .for_mode(ScoringMode::Ml)
    .score(ScoreSubject::new(&req.text, 1))
    .await;
  Ok(Json(PredictResponse {
    urgency: scored.urgency,
    score: scored.value,
  }))
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
  #[serde(default)]
  pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
  pub predicted_class: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ClassifyResponse {
  fn failed(error: impl Into<String>) -> Self {
    Self {
      predicted_class: String::new(),
      error: Some(error.into()),
    }
  }
}

/// Classifier failures are reported in the body with a 200.
pub async fn classify_image(
  State(state): State<Arc<AppState>>,
  Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, ApiError> {
  let image_url = req.image_url.trim();
  if image_url.is_empty() {
    return Err(ApiError::bad_request("image_url is required"));
  }
  let Some(classifier) = state.classifier.as_ref() else {
    return Ok(Json(ClassifyResponse::failed("image classification is not configured")));
  };
  let response = match classifier.classify(image_url).await {
    Ok(Some(class)) => ClassifyResponse {
      predicted_class: class,
      error: None,
    },
    Ok(None) => ClassifyResponse::failed("classifier returned no class"),
    Err(e) => {
      warn!(image_url, error = %e, "image classification failed");
      ClassifyResponse::failed(e.to_string())
    }
  };
  Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
  pub post_id: String,
  pub status: String,
}

pub async fn admin_update_status(
  State(state): State<Arc<AppState>>,
  AdminUser(admin_id): AdminUser,
  Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Post>, ApiError> {
  let post_id = parse_id(&req.post_id, "post_id")?;
  let status = PostStatus::parse(&req.status)
    .ok_or_else(|| ApiError::bad_request("status must be open, inprogress or closed"))?;

  state.repo.update_post_status(post_id, status).await?;
  info!(%post_id, %admin_id, status = status.as_str(), "post status updated");
  Ok(Json(state.repo.get_post(post_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AdminIssuesQuery {
  pub status: Option<String>,
}

pub async fn admin_issues(
  State(state): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Query(query): Query<AdminIssuesQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
  let status = match non_blank(query.status) {
    Some(raw) => Some(
      PostStatus::parse(&raw)
        .ok_or_else(|| ApiError::bad_request("status must be open, inprogress or closed"))?,
    ),
    None => None,
  };
  let posts = state.repo.admin_posts(status, ADMIN_LIST_LIMIT).await?;
  Ok(Json(posts))
}
