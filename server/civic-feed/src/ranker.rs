//! Feed ranking: one blended score per post, sorted descending.
//!
//! Incremental mode reads the stored running average and makes no provider
//! calls. The other modes recompute from the post text and its newest
//! comments under a per-request [`CallBudget`].

use std::sync::Arc;

use tracing::debug;
use urgency_engine::aggregate::mean;
use urgency_engine::feed::{blend, running_average};
use urgency_engine::score_to_bucket;

use crate::budget::CallBudget;
use crate::config::{FeedPolicy, ScoringMode};
use crate::models::{Post, RankedPost};
use crate::provider::{Providers, ScoreProvider, ScoreSubject};
use crate::repository::{PostRepository, StoreError};

#[derive(Clone)]
pub struct FeedRanker {
  providers: Arc<Providers>,
  policy: FeedPolicy,
}

impl FeedRanker {
  pub fn new(providers: Arc<Providers>, policy: FeedPolicy) -> Self {
    Self { providers, policy }
  }

  /// Loads the newest posts and ranks them.
  pub async fn feed(
    &self,
    repo: &dyn PostRepository,
    mode: ScoringMode,
  ) -> Result<Vec<RankedPost>, StoreError> {
    let posts = repo.feed_posts(self.policy.limit).await?;
    Ok(self.rank(posts, mode).await)
  }

  pub async fn rank(&self, posts: Vec<Post>, mode: ScoringMode) -> Vec<RankedPost> {
    let mut ranked = match mode {
      ScoringMode::Incremental => rank_incremental(posts),
      _ => self.rank_recomputed(posts, mode).await,
    };
    sort_by_score(&mut ranked);
    ranked
  }

  async fn rank_recomputed(&self, posts: Vec<Post>, mode: ScoringMode) -> Vec<RankedPost> {
    let provider = self.providers.for_mode(mode);
    let mut budget = CallBudget::new(self.policy.call_budget);
    let mut fallbacks = 0usize;
    let post_count = posts.len();

    let mut ranked = Vec::with_capacity(post_count);
    for post in posts {
      let scores = self
        .collect_scores(provider, &post, &mut budget, &mut fallbacks)
        .await;
      let avg = mean(&scores).unwrap_or(0.0);
      let score = blend(avg, post.upvotes.len());
      ranked.push(RankedPost {
        computed_urgency: score_to_bucket(avg),
        score,
        post,
      });
    }

    debug!(
      mode = %mode,
      posts = post_count,
      calls = budget.spent(),
      fallbacks,
      budget_exhausted = budget.is_exhausted(),
      "feed ranked"
    );
    ranked
  }

  /// Post text first, then up to `comments_per_post` newest comments, each
  /// costing one call. Stops as soon as the budget runs out.
  async fn collect_scores(
    &self,
    provider: &dyn ScoreProvider,
    post: &Post,
    budget: &mut CallBudget,
    fallbacks: &mut usize,
  ) -> Vec<f64> {
    let texts = std::iter::once(post.description.as_str()).chain(
      post
        .comments
        .iter()
        .take(self.policy.comments_per_post)
        .map(|c| c.content.as_str()),
    );

    let mut scores = Vec::new();
    for text in texts {
      if !budget.try_spend() {
        break;
      }
      let scored = provider.score(ScoreSubject::new(text, post.urgency)).await;
      if scored.is_fallback() {
        *fallbacks += 1;
      }
      scores.push(scored.value);
    }
    scores
  }
}

fn rank_incremental(posts: Vec<Post>) -> Vec<RankedPost> {
  posts
    .into_iter()
    .map(|post| {
      let avg = running_average(post.score_sum, post.score_count);
      RankedPost {
        computed_urgency: score_to_bucket(avg),
        score: blend(avg, post.upvotes.len()),
        post,
      }
    })
    .collect()
}

/// Descending by score; equal scores keep their incoming (newest-first) order.
fn sort_by_score(ranked: &mut [RankedPost]) {
  ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{Comment, Issue, PostStatus, Upvote};
  use crate::provider::{ScoreSource, Scored};
  use async_trait::async_trait;
  use chrono::{Duration, Utc};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use uuid::Uuid;

  /// Returns a fixed score and counts calls.
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
  }

  #[async_trait]
  impl ScoreProvider for CountingProvider {
    async fn score(&self, _subject: ScoreSubject<'_>) -> Scored {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Scored::new(self.value, ScoreSource::Heuristic)
    }
  }

  fn post(description: &str, urgency: i32, comments: usize, upvotes: usize, age_mins: i64) -> Post {
    let id = Uuid::new_v4();
    let created = Utc::now() - Duration::minutes(age_mins);
    Post {
      id,
      user_id: Uuid::new_v4(),
      issue: Issue {
        id: Uuid::new_v4(),
        name: "Pothole".to_string(),
        description: String::new(),
        category: "Roads".to_string(),
      },
      description: description.to_string(),
      status: PostStatus::Open,
      urgency,
      lat: 0.0,
      lng: 0.0,
      media_url: None,
      classified_as: None,
      score_sum: 0.0,
      score_count: 0,
      created_at: created,
      updated_at: created,
      comments: (0..comments)
        .map(|i| Comment {
          id: Uuid::new_v4(),
          post_id: id,
          user_id: Uuid::new_v4(),
          content: format!("comment {i}"),
          created_at: created,
        })
        .collect(),
      upvotes: (0..upvotes)
        .map(|_| Upvote {
          id: Uuid::new_v4(),
          post_id: id,
          user_id: Uuid::new_v4(),
          created_at: created,
        })
        .collect(),
    }
  }

  fn ranker_with(provider: Arc<CountingProvider>, policy: FeedPolicy) -> FeedRanker {
    let providers = Providers::with(provider.clone(), provider.clone(), provider);
    FeedRanker::new(Arc::new(providers), policy)
  }

  #[tokio::test]
  async fn none_mode_ranks_by_stored_level_and_upvotes() {
    let ranker = FeedRanker::new(Arc::new(Providers::default()), FeedPolicy::default());
    let posts = vec![
      post("low, upvoted", 1, 0, 2, 0),
      post("critical", 3, 0, 0, 1),
      post("moderate", 2, 0, 0, 2),
    ];

    let ranked = ranker.rank(posts, ScoringMode::None).await;
    let order: Vec<&str> = ranked.iter().map(|r| r.post.description.as_str()).collect();
    assert_eq!(order, vec!["critical", "moderate", "low, upvoted"]);

    assert!((ranked[0].score - 0.68).abs() < 1e-9);
    assert_eq!(ranked[0].computed_urgency, 3);
    assert!((ranked[1].score - 0.48).abs() < 1e-9);
    assert_eq!(ranked[1].computed_urgency, 2);
    assert!((ranked[2].score - 0.44).abs() < 1e-9);
    assert_eq!(ranked[2].computed_urgency, 1);
  }

  #[tokio::test]
  async fn budget_caps_calls_across_the_feed() {
    let provider = CountingProvider::new(0.6);
    let ranker = ranker_with(
      provider.clone(),
      FeedPolicy {
        limit: 50,
        call_budget: 50,
        comments_per_post: 5,
      },
    );
    // 20 posts with 10 comments each would want 20 * 6 = 120 calls.
    let posts: Vec<Post> = (0..20).map(|i| post("p", 1, 10, 0, i)).collect();

    let ranked = ranker.rank(posts, ScoringMode::Heuristic).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 50);
    assert_eq!(ranked.len(), 20);

    // The first eight posts are fully scored (6 calls each), the ninth gets two.
    let scored = ranked.iter().filter(|r| r.computed_urgency == 2).count();
    assert_eq!(scored, 9);
    let unscored: Vec<&RankedPost> = ranked.iter().filter(|r| r.score == 0.0).collect();
    assert_eq!(unscored.len(), 11);
    assert!(unscored.iter().all(|r| r.computed_urgency == 1));
  }

  #[tokio::test]
  async fn only_newest_comments_are_scored() {
    let provider = CountingProvider::new(0.3);
    let ranker = ranker_with(
      provider.clone(),
      FeedPolicy {
        limit: 50,
        call_budget: 100,
        comments_per_post: 5,
      },
    );
    ranker
      .rank(vec![post("p", 1, 12, 0, 0)], ScoringMode::Ml)
      .await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
  }

  #[tokio::test]
  async fn incremental_mode_makes_no_calls() {
    let provider = CountingProvider::new(0.9);
    let ranker = ranker_with(provider.clone(), FeedPolicy::default());

    let mut hot = post("hot", 1, 3, 0, 5);
    hot.score_sum = 1.7;
    hot.score_count = 2;
    let mut fresh = post("fresh", 1, 0, 1, 0);
    fresh.score_sum = 0.0;
    fresh.score_count = 0;

    let ranked = ranker.rank(vec![fresh, hot], ScoringMode::Incremental).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ranked[0].post.description, "hot");
    assert!((ranked[0].score - 0.68).abs() < 1e-9);
    assert_eq!(ranked[0].computed_urgency, 3);
    assert!((ranked[1].score - 0.2).abs() < 1e-9);
  }

  #[tokio::test]
  async fn equal_scores_keep_incoming_order() {
    let ranker = FeedRanker::new(Arc::new(Providers::default()), FeedPolicy::default());
    let posts: Vec<Post> = (0..5).map(|i| post(&format!("p{i}"), 2, 0, 0, i)).collect();
    let expected: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

    let ranked = ranker.rank(posts, ScoringMode::None).await;
    let ids: Vec<Uuid> = ranked.iter().map(|r| r.post.id).collect();
    assert_eq!(ids, expected);
  }

  #[tokio::test]
  async fn empty_feed_is_empty() {
    let ranker = FeedRanker::new(Arc::new(Providers::default()), FeedPolicy::default());
    assert!(ranker.rank(Vec::new(), ScoringMode::Ml).await.is_empty());
  }
}
