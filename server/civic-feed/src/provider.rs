//! Score providers: the pluggable source of a text's urgency score in [0, 1].
//!
//! Providers never fail. When the model cannot answer, the ML provider falls
//! back to the keyword heuristic and says why in the returned [`ScoreSource`].

use std::sync::Arc;

use async_trait::async_trait;
use urgency_engine::{heuristic_score, score_to_bucket, urgency_to_score};

use crate::config::ScoringMode;
use crate::ml::{ModelField, UrgencyModelClient};

/// Why the ML provider answered with the heuristic instead of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
  /// No model endpoint configured.
  Disabled,
  Timeout,
  Network,
  Status(u16),
  Decode,
  Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
  Model(ModelField),
  Heuristic,
  StoredLevel,
  Fallback(FallbackReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
  pub value: f64,
  /// Discrete level. The bucket of `value`, except when the model answered
  /// with a level directly, which is passed through as given.
  pub urgency: i32,
  pub source: ScoreSource,
}

impl Scored {
  pub fn new(value: f64, source: ScoreSource) -> Self {
    Self {
      value,
      urgency: score_to_bucket(value),
      source,
    }
  }

  pub fn is_fallback(&self) -> bool {
    matches!(self.source, ScoreSource::Fallback(_))
  }
}

/// What a provider scores: free text plus the post's stored level, which only
/// the stored-level provider reads.
#[derive(Debug, Clone, Copy)]
pub struct ScoreSubject<'a> {
  pub text: &'a str,
  pub stored_urgency: i32,
}

impl<'a> ScoreSubject<'a> {
  pub fn new(text: &'a str, stored_urgency: i32) -> Self {
    Self {
      text,
      stored_urgency,
    }
  }
}

#[async_trait]
pub trait ScoreProvider: Send + Sync {
  async fn score(&self, subject: ScoreSubject<'_>) -> Scored;
}

/// Keyword heuristic from the urgency engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicProvider;

#[async_trait]
impl ScoreProvider for HeuristicProvider {
  async fn score(&self, subject: ScoreSubject<'_>) -> Scored {
    Scored::new(heuristic_score(subject.text), ScoreSource::Heuristic)
  }
}

/// Maps the stored level 3/2/1 to 0.85/0.6/0.3, ignoring the text.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoredLevelProvider;

#[async_trait]
impl ScoreProvider for StoredLevelProvider {
  async fn score(&self, subject: ScoreSubject<'_>) -> Scored {
    Scored::new(
      urgency_to_score(subject.stored_urgency),
      ScoreSource::StoredLevel,
    )
  }
}

/// Remote text model with heuristic fallback.
#[derive(Debug, Clone, Default)]
pub struct MlProvider {
  client: Option<UrgencyModelClient>,
}

impl MlProvider {
  pub fn new(client: Option<UrgencyModelClient>) -> Self {
    Self { client }
  }

  fn fallback(text: &str, reason: FallbackReason) -> Scored {
    Scored::new(heuristic_score(text), ScoreSource::Fallback(reason))
  }
}

#[async_trait]
impl ScoreProvider for MlProvider {
  async fn score(&self, subject: ScoreSubject<'_>) -> Scored {
    let Some(client) = &self.client else {
      return Self::fallback(subject.text, FallbackReason::Disabled);
    };
    match client.predict(subject.text).await {
      Ok(verdict) => Scored {
        value: verdict.score,
        urgency: verdict.urgency,
        source: ScoreSource::Model(verdict.field),
      },
      Err(e) => Self::fallback(subject.text, e.reason()),
    }
  }
}

/// One provider per scoring path, selected by [`ScoringMode`].
#[derive(Clone)]
pub struct Providers {
  ml: Arc<dyn ScoreProvider>,
  heuristic: Arc<dyn ScoreProvider>,
  stored_level: Arc<dyn ScoreProvider>,
}

impl Providers {
  pub fn new(ml_client: Option<UrgencyModelClient>) -> Self {
    Self::with(
      Arc::new(MlProvider::new(ml_client)),
      Arc::new(HeuristicProvider),
      Arc::new(StoredLevelProvider),
    )
  }

  pub fn with(
    ml: Arc<dyn ScoreProvider>,
    heuristic: Arc<dyn ScoreProvider>,
    stored_level: Arc<dyn ScoreProvider>,
  ) -> Self {
    Self {
      ml,
      heuristic,
      stored_level,
    }
  }

  /// Incremental mode scores new content through the ML path; the feed never
  /// calls a provider in that mode.
  pub fn for_mode(&self, mode: ScoringMode) -> &dyn ScoreProvider {
    match mode {
      ScoringMode::Ml | ScoringMode::Incremental => self.ml.as_ref(),
      ScoringMode::Heuristic => self.heuristic.as_ref(),
      ScoringMode::None => self.stored_level.as_ref(),
    }
  }
}

impl Default for Providers {
  fn default() -> Self {
    Self::new(None)
  }
}
