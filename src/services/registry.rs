use crate::config::ModelSettings;
use crate::core::model::CompatibilityModel;
use crate::services::artifact::{load_model, ArtifactError};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors that can occur while resolving a model artifact
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Registry returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No model source configured (set model.local_path or model.repo_id)")]
    NotConfigured,
}

/// Resolves the learned model artifact to a local file
///
/// Handles:
/// - Explicit local artifact paths
/// - Reusing a previously downloaded artifact from the cache directory
/// - Downloading from a Hugging Face style registry
pub struct ModelRegistry {
    client: Client,
    settings: ModelSettings,
}

impl ModelRegistry {
    pub fn new(settings: &ModelSettings) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.download_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    /// Download URL for the configured artifact
    pub fn artifact_url(&self) -> Option<String> {
        let repo_id = self.settings.repo_id.as_ref()?;
        Some(format!(
            "{}/{}/resolve/{}/{}",
            self.settings.endpoint.trim_end_matches('/'),
            repo_id,
            self.settings.revision,
            self.settings.filename
        ))
    }

    /// Cache location for the configured artifact
    pub fn cached_path(&self) -> Option<PathBuf> {
        let repo_id = self.settings.repo_id.as_ref()?;
        Some(
            PathBuf::from(&self.settings.cache_dir)
                .join(repo_id.replace('/', "--"))
                .join(&self.settings.revision)
                .join(&self.settings.filename),
        )
    }

    /// Resolve the artifact to a file on disk, downloading it if needed
    pub async fn resolve(&self) -> Result<PathBuf, RegistryError> {
        if let Some(local) = &self.settings.local_path {
            let path = PathBuf::from(local);
            if !path.exists() {
                return Err(RegistryError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("model artifact not found at {}", local),
                )));
            }
            return Ok(path);
        }

        let (Some(url), Some(cached)) = (self.artifact_url(), self.cached_path()) else {
            return Err(RegistryError::NotConfigured);
        };

        if cached.exists() {
            info!("Using cached model artifact at {}", cached.display());
            return Ok(cached);
        }

        info!("Downloading model artifact from {}", url);
        self.download(&url, &cached).await?;
        info!("Model artifact saved to {}", cached.display());

        Ok(cached)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), RegistryError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.settings.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a partial download is never mistaken for a cached artifact
        let partial = dest.with_extension("partial");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, dest).await?;

        Ok(())
    }
}

/// Resolve and load the learned model at startup
///
/// Any failure is logged and yields `None`: the service then runs on
/// rule-based scoring alone.
pub async fn initialize_model(settings: &ModelSettings) -> Option<Arc<dyn CompatibilityModel>> {
    if !settings.enabled {
        info!("Learned model disabled, using rule-based scoring");
        return None;
    }

    let registry = match ModelRegistry::new(settings) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to create model registry client: {}", e);
            return None;
        }
    };

    let path = match registry.resolve().await {
        Ok(path) => path,
        Err(RegistryError::NotConfigured) => {
            warn!("No model source configured, using rule-based scoring");
            return None;
        }
        Err(e) => {
            error!("Failed to resolve model artifact: {}", e);
            return None;
        }
    };

    match load_model(&path).await {
        Ok(model) => {
            info!(
                "Learned model loaded from {} (feature schema v{})",
                path.display(),
                model.schema().version()
            );
            Some(model)
        }
        Err(e @ ArtifactError::FeatureMismatch { .. }) => {
            error!("Model artifact does not match the feature encoder: {}", e);
            None
        }
        Err(e) => {
            error!("Failed to load model artifact: {}", e);
            None
        }
    }
}
