use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("transient query failure: {0}")]
    TransientQuery(String),

    #[error("permanent query failure: {0}")]
    PermanentQuery(String),
}
