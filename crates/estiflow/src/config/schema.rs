use serde::{Deserialize, Serialize};

/// Process configuration, constructed once at startup and passed by reference
/// into each adapter's constructor. Adapters never look anything up globally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Root of the private per-job working directories.
    pub run_root: String,
    /// Root of the shared canonical file store.
    pub filestore_root: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Which implementation backs an external-system adapter. `stub` keeps the
/// pipeline runnable end to end without live third-party credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Http,
    #[default]
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default)]
    pub base_url: String,
    /// Personal access token; may be a `${ENV:VAR}` reference in the file.
    #[serde(default)]
    pub pat: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Stub,
            base_url: String::new(),
            pat: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_portal_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Stub,
            base_url: String::new(),
            username: None,
            password: None,
            timeout_secs: default_portal_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

// The portal renders and serves a whole document; give it longer than an API call.
fn default_portal_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub kanban: KanbanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_user: None,
            smtp_pass: None,
            from: default_from(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from() -> String {
    "Estimating <estimating@example.com>".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KanbanConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
}
