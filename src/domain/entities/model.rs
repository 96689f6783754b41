use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prediction engine identity, resolved to a callable through `(provider, model_identifier)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub name: String,
    /// Registry tag, e.g. `openai` or `openrouter`.
    pub provider: String,
    pub model_identifier: String,
    pub active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn new(name: &str, provider: &str, model_identifier: &str, description: Option<String>) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            provider: provider.to_lowercase(),
            model_identifier: model_identifier.to_string(),
            active: true,
            description,
            created_at: Utc::now(),
        }
    }
}

/// The pair of models evaluated side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbConfig {
    pub id: i64,
    pub model_a_id: i64,
    pub model_b_id: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl AbConfig {
    pub fn new(model_a_id: i64, model_b_id: i64) -> Result<Self, String> {
        if model_a_id == model_b_id {
            return Err(format!("A/B models must differ (both are {model_a_id})"));
        }
        Ok(Self {
            id: 0,
            model_a_id,
            model_b_id,
            active: true,
            created_at: Utc::now(),
        })
    }
}
