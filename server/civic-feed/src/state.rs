//! Shared state handed to every handler.

use std::sync::Arc;

use crate::config::{Config, ScoringMode};
use crate::ingestion::ReportIngestion;
use crate::ml::{ImageClassifierClient, UrgencyModelClient};
use crate::provider::Providers;
use crate::ranker::FeedRanker;
use crate::repository::PostRepository;

pub struct AppState {
  pub config: Config,
  pub repo: Arc<dyn PostRepository>,
  pub providers: Arc<Providers>,
  pub classifier: Option<ImageClassifierClient>,
  pub ranker: FeedRanker,
  pub ingestion: ReportIngestion,
}

impl AppState {
  pub fn new(
    config: Config,
    repo: Arc<dyn PostRepository>,
    ml_client: Option<UrgencyModelClient>,
    classifier: Option<ImageClassifierClient>,
  ) -> Self {
    Self::with_providers(config, repo, Arc::new(Providers::new(ml_client)), classifier)
  }

  pub fn with_providers(
    config: Config,
    repo: Arc<dyn PostRepository>,
    providers: Arc<Providers>,
    classifier: Option<ImageClassifierClient>,
  ) -> Self {
    let ranker = FeedRanker::new(providers.clone(), config.feed);
    let ingestion = ReportIngestion::new(repo.clone(), providers.clone(), classifier.clone());
    Self {
      config,
      repo,
      providers,
      classifier,
      ranker,
      ingestion,
    }
  }

  pub fn scoring_mode(&self) -> ScoringMode {
    self.config.scoring_mode
  }
}
