pub mod error;
pub mod record;
pub mod resource;

pub use error::DomainError;
pub use record::{MetadataRecord, RawContent};
pub use resource::MonitoredResource;
