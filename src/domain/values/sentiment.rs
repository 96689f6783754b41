use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scores with an absolute value below this are treated as neutral.
pub const NEUTRAL_EPSILON: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentDirection {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl fmt::Display for SentimentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentDirection::Positive => write!(f, "positive"),
            SentimentDirection::Negative => write!(f, "negative"),
            SentimentDirection::Neutral => write!(f, "neutral"),
        }
    }
}

impl FromStr for SentimentDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "bullish" | "up" => Ok(SentimentDirection::Positive),
            "negative" | "bearish" | "down" => Ok(SentimentDirection::Negative),
            "neutral" | "hold" => Ok(SentimentDirection::Neutral),
            _ => Err(format!("Unknown sentiment direction: {s}")),
        }
    }
}

/// Clamps `score` into [-1, 1] and derives the direction from its sign.
///
/// A score whose magnitude is at least [`NEUTRAL_EPSILON`] decides the direction.
/// Below that, the item is neutral and the score is pinned to 0. Whatever direction
/// the model claimed is ignored.
pub fn direction_for_score(score: f64) -> (SentimentDirection, f64) {
    let score = if score.is_finite() { score.clamp(-1.0, 1.0) } else { 0.0 };
    if score >= NEUTRAL_EPSILON {
        (SentimentDirection::Positive, score)
    } else if score <= -NEUTRAL_EPSILON {
        (SentimentDirection::Negative, score)
    } else {
        (SentimentDirection::Neutral, 0.0)
    }
}

/// True when the pair satisfies the direction/sign invariant.
pub fn is_consistent(direction: SentimentDirection, score: f64) -> bool {
    match direction {
        SentimentDirection::Positive => score > 0.0,
        SentimentDirection::Negative => score < 0.0,
        SentimentDirection::Neutral => score.abs() < NEUTRAL_EPSILON,
    }
}
