use crate::integration::{ConfigInvalid, IntegrationConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Sentry URL prefix cannot be empty")]
    EmptyUrlPrefix,

    #[error("Invalid settings for project {project}: {source}")]
    InvalidProject {
        project: String,
        source: ConfigInvalid,
    },
}

/// Bridge configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener receiving event notifications
    #[serde(default = "Listener::default_events")]
    pub listener: Listener,
    /// Listener for health and readiness probes
    #[serde(default = "Listener::default_admin")]
    pub admin_listener: Listener,
    /// Public Sentry URL, used to link issues back to events
    pub sentry_url_prefix: String,
    /// Integration settings keyed by Sentry project slug
    #[serde(default)]
    pub projects: BTreeMap<String, IntegrationConfig>,
}

impl Config {
    /// Validates the bridge configuration.
    ///
    /// Projects that are not configured at all are accepted: their events are
    /// skipped at dispatch time.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.sentry_url_prefix.trim().is_empty() {
            return Err(ValidationError::EmptyUrlPrefix);
        }

        for (slug, project) in &self.projects {
            if !project.is_configured() {
                tracing::warn!(project = %slug, "Project is not configured, its events will be skipped");
                continue;
            }

            project
                .check()
                .map_err(|source| ValidationError::InvalidProject {
                    project: slug.clone(),
                    source,
                })?;
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    fn default_events() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }

    fn default_admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}
