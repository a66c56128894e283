use std::path::Path;

use crate::config::schema::{Config, DriverKind};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;
    resolve_secrets(&mut json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let compiled =
        jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

    let error_messages: Vec<String> = compiled
        .iter_errors(json_value)
        .map(|e| format!("{} at {}", e, e.instance_path()))
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Replaces `${ENV:VAR}` string values with the variable's contents so
/// credentials can stay out of the config file.
fn resolve_secrets(value: &mut serde_json::Value) -> Result<(), ConfigError> {
    match value {
        serde_json::Value::String(s) => {
            if let Some(var) = s.strip_prefix("${ENV:").and_then(|r| r.strip_suffix('}')) {
                let resolved =
                    std::env::var(var).map_err(|_| ConfigError::MissingSecret {
                        reference: s.clone(),
                        var: var.to_string(),
                    })?;
                *s = resolved;
            }
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for item in items {
                resolve_secrets(item)?;
            }
            Ok(())
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                resolve_secrets(v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.crm.driver == DriverKind::Http {
        if config.crm.base_url.is_empty() {
            return Err(ConfigError::Validation {
                message: "crm.base_url is required when crm.driver is 'http'".to_string(),
            });
        }
        if config.crm.pat.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::Validation {
                message: "crm.pat is required when crm.driver is 'http'".to_string(),
            });
        }
    }

    if config.portal.driver == DriverKind::Http {
        if config.portal.base_url.is_empty() {
            return Err(ConfigError::Validation {
                message: "portal.base_url is required when portal.driver is 'http'".to_string(),
            });
        }
        if config.portal.username.is_none() || config.portal.password.is_none() {
            return Err(ConfigError::Validation {
                message: "portal.username and portal.password are required when portal.driver is 'http'"
                    .to_string(),
            });
        }
    }

    if config.notifications.email.enabled && config.notifications.email.smtp_host.is_none() {
        return Err(ConfigError::Validation {
            message: "notifications.email.smtp_host is required when email is enabled".to_string(),
        });
    }

    if config.notifications.kanban.enabled {
        let kanban = &config.notifications.kanban;
        if kanban.key.is_none() || kanban.token.is_none() || kanban.list_id.is_none() {
            return Err(ConfigError::Validation {
                message: "notifications.kanban requires key, token and list_id when enabled"
                    .to_string(),
            });
        }
    }

    Ok(())
}
