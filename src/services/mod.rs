// Service exports
pub mod artifact;
pub mod registry;

pub use artifact::{load_model, ArtifactError, ModelArtifact};
pub use registry::{initialize_model, ModelRegistry, RegistryError};
