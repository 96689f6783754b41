use crate::domain::entities::model::{AbConfig, Model};
use crate::domain::error::DomainError;
use crate::domain::ports::llm_provider::{CompletionRequest, LlmProvider};
use crate::domain::ports::model_repository::ModelRepository;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Completion backends keyed by provider tag.
#[derive(Default, Clone)]
pub struct LlmRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl LlmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers
            .insert(provider.provider_tag().to_lowercase(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(&tag.to_lowercase()).cloned()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.providers.keys().cloned().collect();
        tags.sort();
        tags
    }
}

/// Side of an A/B comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arm {
    A,
    B,
}

impl Arm {
    /// Key under which a report stores this arm's output.
    pub fn key(&self) -> &'static str {
        match self {
            Arm::A => "model_a",
            Arm::B => "model_b",
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A model a request is dispatched to, with its A/B arm when a test is active.
#[derive(Debug, Clone)]
pub struct ModelTarget {
    pub model: Model,
    pub arm: Option<Arm>,
}

/// Resolves which models serve predictions and reports, and calls them.
pub struct ModelRegistry {
    models: Arc<dyn ModelRepository>,
    llms: LlmRegistry,
    default_model: Option<(String, String)>,
}

impl ModelRegistry {
    pub fn new(models: Arc<dyn ModelRepository>, llms: LlmRegistry) -> Self {
        Self {
            models,
            llms,
            default_model: None,
        }
    }

    /// Model used when no A/B pair is active, as `(provider, model_identifier)`.
    pub fn with_default(mut self, provider: &str, model_identifier: &str) -> Self {
        self.default_model = Some((provider.to_lowercase(), model_identifier.to_string()));
        self
    }

    pub fn llms(&self) -> &LlmRegistry {
        &self.llms
    }

    /// Registers a model; an existing model with the same name is returned unchanged.
    pub fn add_model(
        &self,
        name: &str,
        provider: &str,
        model_identifier: &str,
        description: Option<String>,
    ) -> Result<Model, DomainError> {
        if name.trim().is_empty() || model_identifier.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "Model name and identifier must not be empty".into(),
            ));
        }
        if let Some(existing) = self.models.get_by_name(name)? {
            return Ok(existing);
        }
        if self.llms.get(provider).is_none() {
            tracing::warn!(provider, "No provider registered for tag; model will be unavailable");
        }
        let mut model = Model::new(name, provider, model_identifier, description);
        model.id = self.models.add(&model)?;
        info!(model_id = model.id, name, provider, model_identifier, "Model registered");
        Ok(model)
    }

    /// Looks a model up by name, falling back to its model identifier.
    pub fn lookup(&self, name_or_identifier: &str) -> Result<Model, DomainError> {
        if let Some(m) = self.models.get_by_name(name_or_identifier)? {
            return Ok(m);
        }
        self.models
            .list_active()?
            .into_iter()
            .find(|m| m.model_identifier == name_or_identifier)
            .ok_or_else(|| DomainError::NotFound(format!("model '{name_or_identifier}'")))
    }

    pub fn set_ab(&self, model_a: &str, model_b: &str) -> Result<AbConfig, DomainError> {
        let a = self.lookup(model_a)?;
        let b = self.lookup(model_b)?;
        let mut config = AbConfig::new(a.id, b.id).map_err(DomainError::InvalidInput)?;
        config.id = self.models.activate_ab(&config)?;
        info!(model_a = %a.name, model_b = %b.name, "A/B test activated");
        Ok(config)
    }

    pub fn clear_ab(&self) -> Result<(), DomainError> {
        self.models.deactivate_ab()
    }

    pub fn active_ab(&self) -> Result<Option<AbConfig>, DomainError> {
        self.models.active_ab()
    }

    /// Makes sure the configured default model has a row, creating it when missing.
    pub fn ensure_default(&self) -> Result<Option<Model>, DomainError> {
        let Some((provider, ident)) = &self.default_model else {
            return Ok(None);
        };
        match self.models.find(provider, ident)? {
            Some(m) => Ok(Some(m)),
            None => self.add_model(ident, provider, ident, None).map(Some),
        }
    }

    /// Dispatch targets: both arms of the active A/B pair, otherwise the default model.
    pub fn targets(&self) -> Result<Vec<ModelTarget>, DomainError> {
        if let Some(ab) = self.models.active_ab()? {
            let a = self.get_model(ab.model_a_id)?;
            let b = self.get_model(ab.model_b_id)?;
            return Ok(vec![
                ModelTarget { model: a, arm: Some(Arm::A) },
                ModelTarget { model: b, arm: Some(Arm::B) },
            ]);
        }
        match self.ensure_default()? {
            Some(model) => Ok(vec![ModelTarget { model, arm: None }]),
            None => Err(DomainError::Config("no default model and no active A/B pair".into())),
        }
    }

    pub fn get_model(&self, id: i64) -> Result<Model, DomainError> {
        self.models
            .get(id)?
            .ok_or_else(|| DomainError::NotFound(format!("model {id}")))
    }

    pub async fn complete(&self, model: &Model, request: &CompletionRequest) -> Result<String, DomainError> {
        let provider = self.llms.get(&model.provider).ok_or_else(|| {
            DomainError::ModelUnavailable(format!("no provider registered for '{}'", model.provider))
        })?;
        provider.complete(&model.model_identifier, request).await
    }
}
