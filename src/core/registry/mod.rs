//! Endpoint registry: the fixed set of database instances a plan can target.
//!
//! Built once at startup from the endpoint catalog plus key/value settings
//! (process environment in production). Entries without an address are left
//! out; an empty result is fatal.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::config::{ConfigError, EndpointDef, EndpointDefaults};

/// Read-only key/value lookup used to resolve endpoint settings.
pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Settings backed by the process environment.
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub aliases: Vec<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Credentials,
}

impl Endpoint {
    /// Case-insensitive match against the canonical name and every alias.
    pub fn answers_to(&self, text: &str) -> bool {
        let text = text.trim();
        self.name.eq_ignore_ascii_case(text) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(text))
    }

    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: Vec<Arc<Endpoint>>,
}

impl EndpointRegistry {
    /// Resolve the catalog against `settings`, keeping catalog order.
    pub fn resolve(
        catalog: &[EndpointDef],
        defaults: &EndpointDefaults,
        settings: &dyn SettingsSource,
    ) -> Result<Self, ConfigError> {
        let shared_port = match non_blank(settings.get(&defaults.port_env)) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidSetting {
                    key: defaults.port_env.clone(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => defaults.port,
        };
        let shared_database =
            non_blank(settings.get(&defaults.database_env)).unwrap_or_else(|| defaults.database.clone());
        let shared_username =
            non_blank(settings.get(&defaults.username_env)).unwrap_or_else(|| defaults.username.clone());

        let mut endpoints = Vec::new();
        for def in catalog {
            let host = non_blank(def.host.clone())
                .or_else(|| def.host_env.as_deref().and_then(|k| non_blank(settings.get(k))));
            let Some(host) = host else {
                debug!("Endpoint {} has no address configured, skipping", def.name);
                continue;
            };

            let password_key = def.password_env.as_deref().unwrap_or(&defaults.password_env);
            let password = def
                .password
                .clone()
                .or_else(|| settings.get(password_key))
                .unwrap_or_default();

            endpoints.push(Arc::new(Endpoint {
                name: def.name.clone(),
                aliases: def.aliases.clone(),
                host: host.trim().to_string(),
                port: def.port.unwrap_or(shared_port),
                database: def.database.clone().unwrap_or_else(|| shared_database.clone()),
                credentials: Credentials::new(
                    def.username.clone().unwrap_or_else(|| shared_username.clone()),
                    password,
                ),
            }));
        }

        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints {
                catalog: catalog.len(),
            });
        }

        info!(
            "Resolved {} of {} endpoints: {}",
            endpoints.len(),
            catalog.len(),
            endpoints
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { endpoints })
    }

    pub fn from_endpoints(endpoints: Vec<Endpoint>) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints { catalog: 0 });
        }
        Ok(Self {
            endpoints: endpoints.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Exact canonical-name lookup. This is the only matching the dispatcher does.
    pub fn find(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Lenient lookup by name or alias, for callers turning user text into a
    /// canonical endpoint name.
    pub fn match_alias(&self, text: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.iter().find(|e| e.answers_to(text))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FleetConfig;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolves_only_endpoints_with_addresses() {
        let config = FleetConfig::default();
        let env = settings(&[
            ("HEALTH_CHECK_HOST_1", "dc4.db.internal"),
            ("HEALTH_CHECK_HOST_3", "ch00.db.internal"),
            ("HEALTH_CHECK_PASSWORD", "s3cret"),
        ]);
        let registry = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &env).unwrap();
        let names: Vec<_> = registry.endpoints().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["DC4", "CH00"]);

        let dc4 = registry.find("DC4").unwrap();
        assert_eq!(dc4.host, "dc4.db.internal");
        assert_eq!(dc4.port, 5432);
        assert_eq!(dc4.database, "inventory");
        assert_eq!(dc4.credentials.username, "app_user_pg");
        assert_eq!(dc4.credentials.password(), "s3cret");
    }

    #[test]
    fn blank_address_counts_as_missing() {
        let config = FleetConfig::default();
        let env = settings(&[("HEALTH_CHECK_HOST_1", "   "), ("HEALTH_CHECK_HOST_2", "gb")]);
        let registry = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &env).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.find("DC4").is_none());
    }

    #[test]
    fn zero_endpoints_is_fatal() {
        let config = FleetConfig::default();
        let err = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &settings(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoEndpoints { catalog: 4 }));
    }

    #[test]
    fn shared_settings_override_defaults() {
        let config = FleetConfig::default();
        let env = settings(&[
            ("HEALTH_CHECK_HOST_4", "sg"),
            ("HEALTH_CHECK_PORT", "6432"),
            ("HEALTH_CHECK_DB", "assets"),
            ("HEALTH_CHECK_USER", "auditor"),
        ]);
        let registry = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &env).unwrap();
        let sg = registry.find("SG00").unwrap();
        assert_eq!(sg.port, 6432);
        assert_eq!(sg.database, "assets");
        assert_eq!(sg.credentials.username, "auditor");
        assert_eq!(sg.credentials.password(), "");
    }

    #[test]
    fn invalid_port_is_a_configuration_error() {
        let config = FleetConfig::default();
        let env = settings(&[("HEALTH_CHECK_HOST_1", "dc4"), ("HEALTH_CHECK_PORT", "fifty")]);
        let err = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { ref key, .. } if key == "HEALTH_CHECK_PORT"));
    }

    #[test]
    fn inline_host_wins_over_host_env() {
        let config = FleetConfig::from_toml_str(
            r#"
[[endpoints]]
name = "LAB"
host = "10.1.1.1"
host_env = "LAB_HOST"
port = 15432
password = "inline"
"#,
        )
        .unwrap();
        let env = settings(&[("LAB_HOST", "ignored"), ("HEALTH_CHECK_PASSWORD", "shared")]);
        let registry = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &env).unwrap();
        let lab = registry.find("LAB").unwrap();
        assert_eq!(lab.host, "10.1.1.1");
        assert_eq!(lab.port, 15432);
        assert_eq!(lab.credentials.password(), "inline");
    }

    #[test]
    fn find_is_exact_but_alias_matching_is_lenient() {
        let config = FleetConfig::default();
        let env = settings(&[("HEALTH_CHECK_HOST_2", "gb")]);
        let registry = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &env).unwrap();
        assert!(registry.find("gb00").is_none());
        assert!(registry.find("GB00").is_some());
        assert_eq!(registry.match_alias("Datacenter 2").unwrap().name, "GB00");
        assert_eq!(registry.match_alias(" gb00 ").unwrap().name, "GB00");
        assert!(registry.match_alias("datacenter 9").is_none());
    }

    #[test]
    fn debug_output_hides_password() {
        let creds = Credentials::new("u", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }
}
