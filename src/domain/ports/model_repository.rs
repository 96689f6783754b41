use crate::domain::entities::model::{AbConfig, Model};
use crate::domain::error::DomainError;

pub trait ModelRepository: Send + Sync {
    fn add(&self, model: &Model) -> Result<i64, DomainError>;
    fn get(&self, id: i64) -> Result<Option<Model>, DomainError>;
    fn get_by_name(&self, name: &str) -> Result<Option<Model>, DomainError>;
    fn find(&self, provider: &str, model_identifier: &str) -> Result<Option<Model>, DomainError>;
    fn list_active(&self) -> Result<Vec<Model>, DomainError>;
    /// Deactivates any active pair and activates the new one atomically.
    fn activate_ab(&self, config: &AbConfig) -> Result<i64, DomainError>;
    fn deactivate_ab(&self) -> Result<(), DomainError>;
    fn active_ab(&self) -> Result<Option<AbConfig>, DomainError>;
}
