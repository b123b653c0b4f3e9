use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alias not found: {0}")]
    NotFound(String),

    #[error("alias must not be empty")]
    EmptyAlias,
}
