use crate::error::Result;
use crate::types::CommandType;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// IdentityConfig
// ---------------------------------------------------------------------------

/// Default agent and instrument labels recorded on actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_app_name")]
    pub agent: String,
    #[serde(default = "default_app_name")]
    pub instrument: String,
    /// Instrument recorded on validate actions.
    #[serde(default = "default_metadata_service")]
    pub metadata_service: String,
    /// Instrument recorded on stage-transfer and publish actions.
    #[serde(default = "default_publish_service")]
    pub publish_service: String,
}

fn default_app_name() -> String {
    "cr8tor".to_string()
}

fn default_metadata_service() -> String {
    "cr8tor-metadata-service".to_string()
}

fn default_publish_service() -> String {
    "cr8tor-publish-service".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            agent: default_app_name(),
            instrument: default_app_name(),
            metadata_service: default_metadata_service(),
            publish_service: default_publish_service(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServicesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    60
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            metadata_url: None,
            publish_url: None,
            timeout_seconds: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleConfig
// ---------------------------------------------------------------------------

/// Which completed command the publish command is gated on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishGate {
    StageTransfer,
    #[default]
    DisclosureCheck,
}

impl PublishGate {
    pub fn prerequisite(self) -> CommandType {
        match self {
            PublishGate::StageTransfer => CommandType::StageTransfer,
            PublishGate::DisclosureCheck => CommandType::DisclosureCheck,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub publish_requires: PublishGate,
    /// Upper bound on dataset metadata files processed per command. `None`
    /// processes every `metadata/dataset*.toml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dataset_files: Option<usize>,
    /// Age after which a leftover project lock is taken over.
    #[serde(default = "default_lock_stale")]
    pub lock_stale_seconds: u64,
}

fn default_lock_stale() -> u64 {
    600
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            publish_requires: PublishGate::default(),
            max_dataset_files: None,
            lock_stale_seconds: default_lock_stale(),
        }
    }
}

// ---------------------------------------------------------------------------
// CrateConfig
// ---------------------------------------------------------------------------

/// Metadata stamped onto the provenance document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrateConfig {
    /// Base that relative entity ids resolve against.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    #[serde(default = "default_license")]
    pub license: String,
    #[serde(default = "default_publisher_name")]
    pub publisher_name: String,
    #[serde(default = "default_publisher_url")]
    pub publisher_url: String,
}

fn default_base_uri() -> String {
    "https://lscsde.org/crate/".to_string()
}

fn default_license() -> String {
    "https://opensource.org/license/mit".to_string()
}

fn default_publisher_name() -> String {
    "LSC SDE".to_string()
}

fn default_publisher_url() -> String {
    "https://github.com/lsc-sde-crates".to_string()
}

impl Default for CrateConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            license: default_license(),
            publisher_name: default_publisher_name(),
            publisher_url: default_publisher_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default, rename = "crate")]
    pub crate_meta: CrateConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            identity: IdentityConfig::default(),
            services: ServicesConfig::default(),
            lifecycle: LifecycleConfig::default(),
            crate_meta: CrateConfig::default(),
        }
    }
}

impl Config {
    /// Load `cr8tor.yaml`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::io::write_yaml(path, self)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.identity.agent.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "identity.agent is empty; no action can be recorded without an agent"
                    .to_string(),
            });
        }

        for (key, url) in [
            ("services.metadata_url", &self.services.metadata_url),
            ("services.publish_url", &self.services.publish_url),
        ] {
            match url {
                None => warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{key} is not set; commands calling it will fail"),
                }),
                Some(u) if reqwest::Url::parse(u).is_err() => warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{key} '{u}' is not a valid URL"),
                }),
                Some(_) => {}
            }
        }

        if self.services.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "services.timeout_seconds is 0; requests will wait indefinitely"
                    .to_string(),
            });
        }

        if self.lifecycle.max_dataset_files == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "lifecycle.max_dataset_files is 0; no dataset can be processed"
                    .to_string(),
            });
        }

        if !self.crate_meta.base_uri.ends_with('/') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "crate.base_uri '{}' should end with '/' so entity ids resolve beneath it",
                    self.crate_meta.base_uri
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
