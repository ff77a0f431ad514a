use anyhow::{Context, Result};

use crate::core::config::FleetConfig;
use crate::core::registry::{EndpointRegistry, EnvSettings};
use crate::core::terminal::{print_status, print_step, print_warn};

pub fn list_endpoints(config: &FleetConfig) -> Result<()> {
    let registry = EndpointRegistry::resolve(&config.endpoints, &config.defaults, &EnvSettings)
        .context("Failed to resolve endpoints")?;

    print_step(&format!(
        "{} of {} configured endpoints resolved",
        registry.len(),
        config.endpoints.len()
    ));
    for endpoint in registry.endpoints() {
        let aliases = if endpoint.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", endpoint.aliases.join(", "))
        };
        print_status(
            &endpoint.name,
            &format!(
                "{} db={} user={}{}",
                endpoint.address(),
                endpoint.database,
                endpoint.credentials.username,
                aliases
            ),
        );
    }

    let resolved: Vec<&str> = registry.endpoints().iter().map(|e| e.name.as_str()).collect();
    for def in &config.endpoints {
        if !resolved.contains(&def.name.as_str()) {
            print_warn(&format!(
                "{} skipped: no address configured{}",
                def.name,
                def.host_env
                    .as_deref()
                    .map(|env| format!(" (set {})", env))
                    .unwrap_or_default()
            ));
        }
    }
    Ok(())
}
