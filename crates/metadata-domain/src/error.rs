use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("resource type must not be empty")]
    EmptyResourceType,

    #[error("alias must not be empty")]
    EmptyAlias,

    #[error("invalid raw content: {0}")]
    InvalidRawContent(#[from] serde_json::Error),
}
