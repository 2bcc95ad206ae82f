//! Report and comment ingestion: scoring, accumulator bookkeeping and the
//! urgency recompute. Scoring is best-effort; only persisting the report or
//! comment itself can fail a request.

use std::sync::Arc;

use tracing::{debug, info, warn};
use urgency_engine::aggregate::{aggregate_urgency, mean};
use urgency_engine::comment_urgency;
use uuid::Uuid;

use crate::config::ScoringMode;
use crate::ml::ImageClassifierClient;
use crate::models::{Comment, NewComment, NewReport, Post};
use crate::provider::{Providers, ScoreSubject, Scored};
use crate::repository::{PostRepository, StoreError};
use crate::score_store::{accumulate, IncrementalScoreStore};

/// Provider scores are in [0, 1]; comment aggregation works on the 0..=3 scale.
const COMMENT_SCALE: f64 = 3.0;

#[derive(Clone)]
pub struct ReportIngestion {
  repo: Arc<dyn PostRepository>,
  store: IncrementalScoreStore,
  providers: Arc<Providers>,
  classifier: Option<ImageClassifierClient>,
}

impl ReportIngestion {
  pub fn new(
    repo: Arc<dyn PostRepository>,
    providers: Arc<Providers>,
    classifier: Option<ImageClassifierClient>,
  ) -> Self {
    Self {
      store: IncrementalScoreStore::new(repo.clone()),
      repo,
      providers,
      classifier,
    }
  }

  /// Files a report. The description's level overrides the caller's urgency
  /// unless the model answered with a level outside 1..=3, and its score seeds
  /// the running average.
  pub async fn report(&self, mut report: NewReport, mode: ScoringMode) -> Result<Post, StoreError> {
    if let Some(media_url) = report.media_url.as_deref() {
      report.classified_as = self.classify(media_url).await;
    }

    let provider = self.providers.for_mode(mode);
    let scored = provider
      .score(ScoreSubject::new(&report.description, report.urgency))
      .await;
    log_fallback("report", &scored);
    if (1..=3).contains(&scored.urgency) {
      report.urgency = scored.urgency;
    }

    let mut post = self.repo.report_issue_via_post(report).await?;

    match self.store.add_score(post.id, scored.value, 1).await {
      Ok(()) => {
        let (sum, count) = accumulate(post.score_sum, post.score_count, scored.value, 1);
        post.score_sum = sum;
        post.score_count = count;
      }
      Err(e) => warn!(post_id = %post.id, error = %e, "failed to seed post score"),
    }

    info!(
      post_id = %post.id,
      urgency = post.urgency,
      init_score = scored.value,
      classified_as = post.classified_as.as_deref().unwrap_or(""),
      "report ingested"
    );
    Ok(post)
  }

  /// Adds a comment, feeds its score into the accumulator and recomputes the
  /// post's urgency from all of its comments.
  pub async fn comment(
    &self,
    user_id: Uuid,
    post_id: Uuid,
    content: String,
    mode: ScoringMode,
  ) -> Result<Comment, StoreError> {
    let comment = self
      .repo
      .add_comment(NewComment {
        user_id,
        post_id,
        content,
      })
      .await?;

    let post = match self.repo.get_post(post_id).await {
      Ok(post) => post,
      Err(e) => {
        warn!(%post_id, error = %e, "comment saved but post reload failed");
        return Ok(comment);
      }
    };

    let mut known = None;
    if !comment.content.trim().is_empty() {
      let scored = self
        .providers
        .for_mode(mode)
        .score(ScoreSubject::new(&comment.content, post.urgency))
        .await;
      log_fallback("comment", &scored);
      if let Err(e) = self.store.add_score(post_id, scored.value, 1).await {
        warn!(%post_id, error = %e, "failed to accumulate comment score");
      }
      known = Some((comment.id, scored.value));
    }

    if let Err(e) = self.recompute_urgency(&post, mode, known).await {
      warn!(%post_id, error = %e, "urgency recompute failed");
    }
    Ok(comment)
  }

  /// `known` is a comment already scored in this request, reused instead of
  /// asking the provider again.
  async fn recompute_urgency(
    &self,
    post: &Post,
    mode: ScoringMode,
    known: Option<(Uuid, f64)>,
  ) -> Result<(), StoreError> {
    let comments = self.repo.post_comments(post.id).await?;
    let scores = self
      .comment_scores(&comments, post.urgency, mode, known)
      .await;
    let (urgency, level) = aggregate_urgency(post.urgency, &scores);

    self.repo.update_post_urgency(post.id, urgency).await?;
    info!(
      post_id = %post.id,
      initial = post.urgency,
      comments_count = comments.len(),
      comment_avg = mean(&scores).unwrap_or(0.0),
      final_urgency = urgency,
      level = %level,
      "post urgency recomputed"
    );
    Ok(())
  }

  /// Per-comment scores on the 0..=3 scale.
  async fn comment_scores(
    &self,
    comments: &[Comment],
    stored_urgency: i32,
    mode: ScoringMode,
    known: Option<(Uuid, f64)>,
  ) -> Vec<f64> {
    if mode == ScoringMode::None {
      return comments
        .iter()
        .map(|c| comment_urgency(&c.content).score)
        .collect();
    }
    let provider = self.providers.for_mode(mode);
    let mut scores = Vec::with_capacity(comments.len());
    for comment in comments {
      let value = match known {
        Some((id, value)) if id == comment.id => value,
        _ => {
          provider
            .score(ScoreSubject::new(&comment.content, stored_urgency))
            .await
            .value
        }
      };
      scores.push(value * COMMENT_SCALE);
    }
    scores
  }

  async fn classify(&self, media_url: &str) -> Option<String> {
    let classifier = self.classifier.as_ref()?;
    if media_url.trim().is_empty() {
      return None;
    }
    match classifier.classify(media_url).await {
      Ok(class) => class,
      Err(e) => {
        warn!(media_url, error = %e, "image classification failed");
        None
      }
    }
  }
}

fn log_fallback(stage: &'static str, scored: &Scored) {
  if scored.is_fallback() {
    debug!(stage, source = ?scored.source, value = scored.value, "scored with fallback");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ml::UrgencyModelClient;
  use crate::provider::{ScoreProvider, ScoreSource};
  use crate::repository::MemoryRepository;
  use async_trait::async_trait;
  use reqwest::Url;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  struct CountingProvider {
    value: f64,
    calls: AtomicUsize,
  }

  impl CountingProvider {
    fn new(value: f64) -> Arc<Self> {
      Arc::new(Self {
        value,
        calls: AtomicUsize::new(0),
      })
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl ScoreProvider for CountingProvider {
    async fn score(&self, _subject: ScoreSubject<'_>) -> Scored {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Scored::new(self.value, ScoreSource::Heuristic)
    }
  }

  fn new_report(description: &str, urgency: i32) -> NewReport {
    NewReport {
      user_id: Uuid::new_v4(),
      issue_name: "Road hazard".to_string(),
      issue_desc: String::new(),
      issue_cat: "Roads".to_string(),
      description: description.to_string(),
      urgency,
      lat: 12.9,
      lng: 77.6,
      media_url: None,
      classified_as: None,
    }
  }

  fn ingestion(repo: Arc<MemoryRepository>) -> ReportIngestion {
    ReportIngestion::new(repo, Arc::new(Providers::default()), None)
  }

  #[tokio::test]
  async fn heuristic_report_overrides_urgency_and_seeds_score() {
    let repo = Arc::new(MemoryRepository::new());
    let ingest = ingestion(repo.clone());

    let post = ingest
      .report(
        new_report("This is an emergency, fire danger", 1),
        ScoringMode::Heuristic,
      )
      .await
      .unwrap();

    assert_eq!(post.urgency, 3);
    assert_eq!((post.score_sum, post.score_count), (0.85, 1));
    let stored = repo.get_post(post.id).await.unwrap();
    assert_eq!((stored.score_sum, stored.score_count), (0.85, 1));
  }

  #[tokio::test]
  async fn none_mode_keeps_caller_urgency() {
    let repo = Arc::new(MemoryRepository::new());
    let post = ingestion(repo)
      .report(new_report("fire near the market", 2), ScoringMode::None)
      .await
      .unwrap();
    assert_eq!(post.urgency, 2);
    assert_eq!(post.score_sum, 0.6);
  }

  #[tokio::test]
  async fn blank_description_takes_lowest_level() {
    let repo = Arc::new(MemoryRepository::new());
    let post = ingestion(repo)
      .report(new_report("   ", 3), ScoringMode::Heuristic)
      .await
      .unwrap();
    assert_eq!(post.urgency, 1);
    assert_eq!((post.score_sum, post.score_count), (0.0, 1));
  }

  #[tokio::test]
  async fn model_level_zero_keeps_caller_urgency() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"urgency": 0})))
      .mount(&server)
      .await;
    let client =
      UrgencyModelClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5))
        .unwrap();

    let repo = Arc::new(MemoryRepository::new());
    let ingest = ReportIngestion::new(repo, Arc::new(Providers::new(Some(client))), None);
    let post = ingest
      .report(new_report("water everywhere", 2), ScoringMode::Ml)
      .await
      .unwrap();
    assert_eq!(post.urgency, 2);
    assert_eq!((post.score_sum, post.score_count), (0.0, 1));
  }

  #[tokio::test]
  async fn model_zero_score_still_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"score": 0.0})))
      .mount(&server)
      .await;
    let client =
      UrgencyModelClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5))
        .unwrap();

    let repo = Arc::new(MemoryRepository::new());
    let ingest = ReportIngestion::new(repo, Arc::new(Providers::new(Some(client))), None);
    let post = ingest
      .report(new_report("water everywhere", 3), ScoringMode::Ml)
      .await
      .unwrap();
    assert_eq!(post.urgency, 1);
  }

  #[tokio::test]
  async fn critical_comments_escalate_in_none_mode() {
    let repo = Arc::new(MemoryRepository::new());
    let ingest = ingestion(repo.clone());
    let post = ingest
      .report(new_report("Pothole on Main Street", 1), ScoringMode::None)
      .await
      .unwrap();
    assert_eq!(post.urgency, 1);

    for text in [
      "This pothole is really dangerous, my car got damaged",
      "Several accidents happened here already, it's critical",
      "Multiple vehicles have been damaged, needs urgent repair",
    ] {
      ingest
        .comment(Uuid::new_v4(), post.id, text.to_string(), ScoringMode::None)
        .await
        .unwrap();
    }

    let stored = repo.get_post(post.id).await.unwrap();
    assert_eq!(stored.urgency, 2);
    assert_eq!(stored.comments.len(), 3);
    assert_eq!(stored.score_count, 4);
  }

  #[tokio::test]
  async fn heuristic_comments_scale_provider_scores() {
    let repo = Arc::new(MemoryRepository::new());
    let ingest = ingestion(repo.clone());
    let post = ingest
      .report(new_report("streetlight flickering", 1), ScoringMode::Heuristic)
      .await
      .unwrap();
    assert_eq!(post.urgency, 1);

    // 0.85 * 3 = 2.55 per comment: avg of (1, 2.55) = 1.775 -> 2.
    ingest
      .comment(
        Uuid::new_v4(),
        post.id,
        "sparks, this is a fire danger".to_string(),
        ScoringMode::Heuristic,
      )
      .await
      .unwrap();
    assert_eq!(repo.get_post(post.id).await.unwrap().urgency, 2);
  }

  #[tokio::test]
  async fn new_comment_is_scored_once() {
    let provider = CountingProvider::new(0.85);
    let providers = Providers::with(provider.clone(), provider.clone(), provider.clone());
    let repo = Arc::new(MemoryRepository::new());
    let ingest = ReportIngestion::new(repo.clone(), Arc::new(providers), None);

    let post = ingest
      .report(new_report("streetlight out", 1), ScoringMode::Ml)
      .await
      .unwrap();
    assert_eq!(provider.calls(), 1);

    ingest
      .comment(Uuid::new_v4(), post.id, "first".to_string(), ScoringMode::Ml)
      .await
      .unwrap();
    assert_eq!(provider.calls(), 2);

    // The older comment is rescored during the recompute; the new one is not.
    ingest
      .comment(Uuid::new_v4(), post.id, "second".to_string(), ScoringMode::Ml)
      .await
      .unwrap();
    assert_eq!(provider.calls(), 4);

    let stored = repo.get_post(post.id).await.unwrap();
    assert_eq!(stored.score_count, 3);
    assert_eq!(stored.urgency, 3);
  }

  #[tokio::test]
  async fn blank_comment_skips_accumulator() {
    let repo = Arc::new(MemoryRepository::new());
    let ingest = ingestion(repo.clone());
    let post = ingest
      .report(new_report("broken bench", 1), ScoringMode::Heuristic)
      .await
      .unwrap();

    ingest
      .comment(Uuid::new_v4(), post.id, "  ".to_string(), ScoringMode::None)
      .await
      .unwrap();
    let stored = repo.get_post(post.id).await.unwrap();
    assert_eq!(stored.score_count, 1);
    assert_eq!(stored.comments.len(), 1);
  }

  #[tokio::test]
  async fn comment_on_missing_post_fails() {
    let repo = Arc::new(MemoryRepository::new());
    let err = ingestion(repo)
      .comment(Uuid::new_v4(), Uuid::new_v4(), "hi".to_string(), ScoringMode::None)
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
  }

  #[tokio::test]
  async fn report_is_classified_when_media_present() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/classify"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"predicted_class": "pothole"})),
      )
      .mount(&server)
      .await;
    let classifier = ImageClassifierClient::new(
      Url::parse(&format!("{}/classify", server.uri())).unwrap(),
      Duration::from_secs(5),
    )
    .unwrap();

    let repo = Arc::new(MemoryRepository::new());
    let ingest = ReportIngestion::new(repo, Arc::new(Providers::default()), Some(classifier));
    let mut report = new_report("hole in road", 1);
    report.media_url = Some("https://cdn.example/1.jpg".to_string());

    let post = ingest.report(report, ScoringMode::Heuristic).await.unwrap();
    assert_eq!(post.classified_as.as_deref(), Some("pothole"));
  }

  #[tokio::test]
  async fn classifier_failure_does_not_fail_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;
    let classifier =
      ImageClassifierClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5))
        .unwrap();

    let repo = Arc::new(MemoryRepository::new());
    let ingest = ReportIngestion::new(repo, Arc::new(Providers::default()), Some(classifier));
    let mut report = new_report("hole in road", 1);
    report.media_url = Some("https://cdn.example/2.jpg".to_string());

    let post = ingest.report(report, ScoringMode::None).await.unwrap();
    assert!(post.classified_as.is_none());
  }
}
