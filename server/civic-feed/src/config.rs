//! Service configuration, read from environment variables at startup.

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use reqwest::Url;
use thiserror::Error;

/// Which scoring path the feed and ingestion use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoringMode {
  /// Read the stored running average; score with the ML provider only at ingestion.
  Incremental,
  /// Recompute through the ML endpoint, falling back to the heuristic.
  Ml,
  /// Recompute with the keyword heuristic only.
  Heuristic,
  /// Recompute from each post's stored urgency level.
  #[default]
  None,
}

impl ScoringMode {
  pub fn as_str(self) -> &'static str {
    match self {
      ScoringMode::Incremental => "incremental",
      ScoringMode::Ml => "ml",
      ScoringMode::Heuristic => "heuristic",
      ScoringMode::None => "none",
    }
  }
}

impl fmt::Display for ScoringMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ScoringMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "incremental" => Ok(ScoringMode::Incremental),
      "ml" => Ok(ScoringMode::Ml),
      "heuristic" => Ok(ScoringMode::Heuristic),
      "none" => Ok(ScoringMode::None),
      other => Err(format!(
        "unknown scoring mode {other:?} (expected incremental, ml, heuristic or none)"
      )),
    }
  }
}

/// Limits applied when the feed is recomputed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedPolicy {
  /// Maximum posts returned by the feed.
  pub limit: i64,
  /// Provider calls allowed per feed request, shared across all posts.
  pub call_budget: usize,
  /// Newest comments considered per post.
  pub comments_per_post: usize,
}

impl Default for FeedPolicy {
  fn default() -> Self {
    Self {
      limit: 50,
      call_budget: 50,
      comments_per_post: 5,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub bind_addr: SocketAddr,
  /// Unset means the in-memory repository is used.
  pub database_url: Option<String>,
  pub scoring_mode: ScoringMode,
  pub feed: FeedPolicy,
  pub ml_api_url: Option<Url>,
  pub image_api_url: Option<Url>,
  pub ml_text_timeout: Duration,
  pub ml_image_timeout: Duration,
  /// Unset means permissive CORS.
  pub allowed_origin: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid value for {name}: {reason}")]
  Invalid { name: &'static str, reason: String },
}

impl ConfigError {
  fn invalid(name: &'static str, reason: impl fmt::Display) -> Self {
    Self::Invalid {
      name,
      reason: reason.to_string(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
      database_url: None,
      scoring_mode: ScoringMode::default(),
      feed: FeedPolicy::default(),
      ml_api_url: None,
      image_api_url: None,
      ml_text_timeout: Duration::from_secs(15),
      ml_image_timeout: Duration::from_secs(20),
      allowed_origin: None,
    }
  }
}

impl Config {
  /// Reads the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Builds the config from an arbitrary key lookup. Empty values count as unset.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| {
      lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    };
    let defaults = Self::default();

    let host = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
    let port: u16 = parse_or("PORT", get("PORT"), 8080)?;
    let bind_addr = format!("{host}:{port}")
      .parse::<SocketAddr>()
      .map_err(|e| ConfigError::invalid("BIND_ADDR", e))?;

    let scoring_mode = match get("SCORING_MODE") {
      Some(raw) => raw
        .parse::<ScoringMode>()
        .map_err(|e| ConfigError::invalid("SCORING_MODE", e))?,
      None => ScoringMode::default(),
    };

    let feed = FeedPolicy {
      limit: parse_positive("FEED_LIMIT", get("FEED_LIMIT"), defaults.feed.limit)?,
      call_budget: parse_or(
        "FEED_CALL_BUDGET",
        get("FEED_CALL_BUDGET"),
        defaults.feed.call_budget,
      )?,
      comments_per_post: parse_or(
        "FEED_COMMENTS_PER_POST",
        get("FEED_COMMENTS_PER_POST"),
        defaults.feed.comments_per_post,
      )?,
    };

    let ml_api_url = parse_url("ML_API_URL", get("ML_API_URL"))?;
    let image_api_url = parse_url(
      "IMAGE_CLASSIFICATION_API_URL",
      get("IMAGE_CLASSIFICATION_API_URL"),
    )?;
    let ml_text_timeout = Duration::from_secs(parse_positive(
      "ML_TEXT_TIMEOUT_SECS",
      get("ML_TEXT_TIMEOUT_SECS"),
      15,
    )?);
    let ml_image_timeout = Duration::from_secs(parse_positive(
      "ML_IMAGE_TIMEOUT_SECS",
      get("ML_IMAGE_TIMEOUT_SECS"),
      20,
    )?);

    Ok(Self {
      bind_addr,
      database_url: get("DATABASE_URL"),
      scoring_mode,
      feed,
      ml_api_url,
      image_api_url,
      ml_text_timeout,
      ml_image_timeout,
      allowed_origin: get("ALLOWED_ORIGIN"),
    })
  }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: fmt::Display,
{
  match raw {
    Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::invalid(name, e)),
    None => Ok(default),
  }
}

fn parse_positive<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
  T: FromStr + PartialOrd + Default,
  T::Err: fmt::Display,
{
  let value = parse_or(name, raw, default)?;
  if value <= T::default() {
    return Err(ConfigError::invalid(name, "must be greater than zero"));
  }
  Ok(value)
}

fn parse_url(name: &'static str, raw: Option<String>) -> Result<Option<Url>, ConfigError> {
  raw
    .map(|raw| Url::parse(&raw).map_err(|e| ConfigError::invalid(name, e)))
    .transpose()
}
