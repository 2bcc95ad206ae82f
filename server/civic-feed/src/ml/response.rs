//! Decoding of loosely-shaped model responses.
//!
//! The urgency endpoint may answer with any of `score`, `label`, `urgency` or
//! `confidence`; the first usable field in that order wins.

use serde_json::Value;
use urgency_engine::{label_to_verdict, score_to_bucket, urgency_to_score};

/// Which response field produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelField {
  Score,
  Label,
  Urgency,
  Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
  pub urgency: i32,
  pub score: f64,
  pub field: ModelField,
}

pub fn extract_verdict(body: &Value) -> Option<Verdict> {
  from_score(body)
    .or_else(|| from_label(body))
    .or_else(|| from_urgency(body))
    .or_else(|| from_confidence(body))
}

fn from_score(body: &Value) -> Option<Verdict> {
  let score = body.get("score")?.as_f64()?;
  Some(Verdict {
    urgency: score_to_bucket(score),
    score,
    field: ModelField::Score,
  })
}

fn from_label(body: &Value) -> Option<Verdict> {
  let label = body.get("label")?.as_str()?;
  let (urgency, score) = label_to_verdict(label)?;
  Some(Verdict {
    urgency,
    score,
    field: ModelField::Label,
  })
}

fn from_urgency(body: &Value) -> Option<Verdict> {
  // Fractional levels truncate toward zero.
  let urgency = body.get("urgency")?.as_f64()? as i32;
  Some(Verdict {
    urgency,
    score: urgency_to_score(urgency),
    field: ModelField::Urgency,
  })
}

fn from_confidence(body: &Value) -> Option<Verdict> {
  let score = body.get("confidence")?.as_f64()?;
  Some(Verdict {
    urgency: score_to_bucket(score),
    score,
    field: ModelField::Confidence,
  })
}

/// The first string among `predicted_class`, `classification`, `class`
/// decides the answer; a blank one means no class.
pub fn extract_class(body: &Value) -> Option<String> {
  let class = ["predicted_class", "classification", "class"]
    .iter()
    .find_map(|key| body.get(*key).and_then(Value::as_str))?
    .trim();
  (!class.is_empty()).then(|| class.to_string())
}
