use super::domain::{Lead, LeadId};

/// Lead storage the facade reads from and writes scored leads back to.
pub trait LeadRepository: Send + Sync {
    fn upsert(&self, lead: Lead) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    fn all(&self) -> Result<Vec<Lead>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
