pub mod config;
pub mod envelope;
pub mod operation;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use envelope::{Envelope, EnvelopeStatus};
pub use operation::{AssociationSpec, Operation, PropertyMap, SearchFilter};
