// Anonymous identity
//
// Two identifiers are attached to every report:
// - client id: random UUID generated on first run, persisted in the user's
//   home directory, reused afterwards
// - project id: SHA-256 of the project root path, recomputed every run

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::environment::Environment;
use crate::error::Result;

/// Who is running the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    #[serde(rename = "CI")]
    Ci,
    Developer,
}

impl UserType {
    pub fn from_ci(is_ci: bool) -> Self {
        if is_ci {
            UserType::Ci
        } else {
            UserType::Developer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Ci => "CI",
            UserType::Developer => "Developer",
        }
    }
}

/// Everything the backends need to know about who is reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub client_id: String,
    pub project_id: String,
    pub user_type: UserType,
    pub user_agent: String,
    pub tool_version: String,
    pub environment: Environment,
}

impl Identity {
    /// Assemble an identity from already-resolved parts
    pub fn new(
        client_id: impl Into<String>,
        project_id: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            project_id: project_id.into(),
            user_type: UserType::from_ci(environment.is_ci),
            user_agent: environment.user_agent.clone(),
            tool_version: environment.tool_version.clone(),
            environment,
        }
    }

    /// Load (or create) the client id and fingerprint the project root
    pub async fn resolve(root_path: &Path, store: &ClientIdStore, environment: Environment) -> Self {
        let client_id = store.load_or_create().await;
        Self::new(client_id, project_id(root_path), environment)
    }
}

/// Deterministic fingerprint of a project root path
pub fn project_id(root_path: &Path) -> String {
    debug!(root = %root_path.display(), "Computing project id");
    let digest = Sha256::digest(root_path.to_string_lossy().as_bytes());
    hex::encode(digest)
}

/// On-disk shape of the identity file
#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    analytics: AnalyticsSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsSection {
    client_id: String,
}

/// Persistent store for the per-machine client id
#[derive(Debug, Clone)]
pub struct ClientIdStore {
    path: PathBuf,
}

impl ClientIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.smelter/config.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".smelter")
            .join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the stored client id, generating and persisting one if needed.
    ///
    /// Never fails: an unreadable or malformed file is treated as missing,
    /// and a failed write still yields a usable id for this process.
    pub async fn load_or_create(&self) -> String {
        debug!(path = %self.path.display(), "Looking up client id");

        match self.load().await {
            Ok(Some(client_id)) => {
                debug!(client_id = %client_id, "Client id found");
                return client_id;
            }
            Ok(None) => debug!("Client id not found, generating a new one"),
            Err(e) => debug!(error = %e, "Client id unreadable, generating a new one"),
        }

        let client_id = Uuid::new_v4().to_string();
        match self.store(&client_id).await {
            Ok(()) => debug!(client_id = %client_id, "Generated client id"),
            Err(e) => debug!(error = %e, "Failed to persist client id"),
        }
        client_id
    }

    /// Read the client id, if the file exists and carries one
    pub async fn load(&self) -> Result<Option<String>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: IdentityFile = serde_json::from_str(&data)?;
        let client_id = file.analytics.client_id.trim().to_string();
        if client_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(client_id))
    }

    /// Write the identity file, creating its directory if needed
    pub async fn store(&self, client_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = IdentityFile {
            analytics: AnalyticsSection {
                client_id: client_id.to_string(),
            },
        };
        tokio::fs::write(&self.path, serde_json::to_vec(&file)?).await?;
        Ok(())
    }
}
