use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "fleetquery.toml";

/// Errors that make the process unable to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no queryable endpoints configured ({catalog} catalog entries, none with an address)")]
    NoEndpoints { catalog: usize },

    #[error("invalid value {value:?} for setting {key}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    #[error("endpoint name {0:?} is declared more than once")]
    DuplicateEndpoint(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub defaults: EndpointDefaults,

    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointDef>,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub catalog: TableCatalog,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// How long the collector waits for a single task before abandoning it.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Window granted to a cancelled task to tear down its remote statement.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    #[serde(default = "default_application_name")]
    pub application_name: String,

    #[serde(default)]
    pub ssl_mode: SslPreference,
}

/// libpq-style `sslmode`. TLS sessions encrypt the link without checking the
/// server certificate, as libpq does below `verify-ca`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslPreference {
    Disable,
    #[default]
    Prefer,
    Require,
}

/// Setting keys and fallbacks shared by every catalog entry that does not
/// override them.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointDefaults {
    #[serde(default = "default_port_env")]
    pub port_env: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database_env")]
    pub database_env: String,
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password_env")]
    pub password_env: String,
}

/// One catalog entry. `host` wins over `host_env`; an entry whose address
/// resolves to nothing is skipped by the registry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EndpointDef {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub host_env: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_planner_url")]
    pub base_url: String,
    #[serde(default = "default_planner_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableCatalog {
    #[serde(default = "default_tables")]
    pub tables: Vec<TableDef>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

fn default_max_workers() -> usize {
    8
}
fn default_task_timeout_secs() -> u64 {
    30
}
fn default_cancel_grace_ms() -> u64 {
    2_000
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_statement_timeout_ms() -> u64 {
    30_000
}
fn default_application_name() -> String {
    "fleetquery".to_string()
}
fn default_port_env() -> String {
    "HEALTH_CHECK_PORT".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database_env() -> String {
    "HEALTH_CHECK_DB".to_string()
}
fn default_database() -> String {
    "inventory".to_string()
}
fn default_username_env() -> String {
    "HEALTH_CHECK_USER".to_string()
}
fn default_username() -> String {
    "app_user_pg".to_string()
}
fn default_password_env() -> String {
    "HEALTH_CHECK_PASSWORD".to_string()
}
fn default_planner_url() -> String {
    "https://models.github.ai/inference/chat/completions".to_string()
}
fn default_planner_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    2_000
}

fn datacenter(name: &str, aliases: &[&str], host_env: &str) -> EndpointDef {
    EndpointDef {
        name: name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        host: None,
        host_env: Some(host_env.to_string()),
        port: None,
        database: None,
        username: None,
        password: None,
        password_env: None,
    }
}

fn default_endpoints() -> Vec<EndpointDef> {
    vec![
        datacenter(
            "DC4",
            &["dc4", "datacenter-4", "datacenter 4"],
            "HEALTH_CHECK_HOST_1",
        ),
        datacenter(
            "GB00",
            &["gb00", "datacenter-2", "datacenter 2"],
            "HEALTH_CHECK_HOST_2",
        ),
        datacenter(
            "CH00",
            &["ch00", "datacenter-3", "datacenter 3"],
            "HEALTH_CHECK_HOST_3",
        ),
        datacenter(
            "SG00",
            &["sg00", "datacenter-1", "datacenter 1"],
            "HEALTH_CHECK_HOST_4",
        ),
    ]
}

const INVENTORY_COLUMNS: &[&str] = &[
    "id",
    "data_extracted_on",
    "database_type",
    "hostname",
    "database_status",
    "database_name",
    "database_size",
    "database_version",
    "database_role",
    "database_uptime",
    "is_it_pdb",
    "cluster_type",
    "os_type",
    "cpu_count",
    "encryption_status",
    "server_uptime",
    "ram",
    "last_backup",
    "backup_type",
    "collection_status",
    "data_centre",
];

fn default_tables() -> Vec<TableDef> {
    ["oracle_tb", "postgres_tb", "mysql_tb", "mssql_tb"]
        .iter()
        .map(|name| TableDef {
            name: name.to_string(),
            columns: INVENTORY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
        .collect()
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            connection: ConnectionConfig::default(),
            defaults: EndpointDefaults::default(),
            endpoints: default_endpoints(),
            planner: PlannerConfig::default(),
            catalog: TableCatalog::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            task_timeout_secs: default_task_timeout_secs(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

impl PoolConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            statement_timeout_ms: default_statement_timeout_ms(),
            application_name: default_application_name(),
            ssl_mode: SslPreference::default(),
        }
    }
}

impl Default for EndpointDefaults {
    fn default() -> Self {
        Self {
            port_env: default_port_env(),
            port: default_port(),
            database_env: default_database_env(),
            database: default_database(),
            username_env: default_username_env(),
            username: default_username(),
            password_env: default_password_env(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: default_planner_url(),
            model: default_planner_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for TableCatalog {
    fn default() -> Self {
        Self {
            tables: default_tables(),
        }
    }
}

impl FleetConfig {
    /// Load from an explicit path, or the first of `./fleetquery.toml` and the
    /// platform config directory that exists. No file means defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("config file {} does not exist", p.display());
                }
                Some(p.to_path_buf())
            }
            None => candidate_paths().into_iter().find(|p| p.exists()),
        };

        let Some(path) = path else {
            info!("No {} found, using built-in defaults.", CONFIG_FILE_NAME);
            return Ok(Self::default());
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        info!(
            "Loaded {}: {} catalog endpoints, max_workers={}, task_timeout={}s",
            path.display(),
            config.endpoints.len(),
            config.pool.max_workers,
            config.pool.task_timeout_secs
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: FleetConfig = toml::from_str(content)?;
        config.normalize()?;
        Ok(config)
    }

    fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.pool.max_workers == 0 {
            warn!("pool.max_workers = 0 is not usable, running with 1 worker");
            self.pool.max_workers = 1;
        }
        if self.pool.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "pool.task_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for def in &self.endpoints {
            if !seen.insert(def.name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(def.name.clone()));
            }
        }
        Ok(())
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("fleetquery").join(CONFIG_FILE_NAME));
    }
    paths
}
