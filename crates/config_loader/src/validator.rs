//! Configuration validation
//!
//! Rules:
//! - every required field present and non-empty (derive rules in `contracts`)
//! - topic filter wildcards well formed (`+` whole level, `#` last level only)
//! - connection strings use a scheme the matching client accepts
//! - push gateway endpoint is an http(s) URL

use contracts::{BridgeConfig, ContractError};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate BridgeConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &BridgeConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_topic_filter(&config.feed.topic)?;
    validate_schemes(config)?;
    Ok(())
}

/// Run the derive rules and report the first failing field by its full path
fn validate_fields(config: &BridgeConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_field_error(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

fn first_field_error(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut keys: Vec<_> = errors.errors().keys().collect();
    keys.sort();

    for key in keys {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        match &errors.errors()[key] {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(err) = field_errors.first() {
                    let message = match &err.message {
                        Some(message) => message.to_string(),
                        None => format!("failed '{}' rule", err.code),
                    };
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                if let Some(found) = first_field_error(nested, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    if let Some(found) = first_field_error(nested, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// Validate MQTT topic filter wildcard placement
fn validate_topic_filter(filter: &str) -> Result<(), ContractError> {
    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    for (idx, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || idx != last) {
            return Err(ContractError::config_validation(
                "feed.topic",
                format!("'#' must be the whole last level in filter '{filter}'"),
            ));
        }
        if level.contains('+') && *level != "+" {
            return Err(ContractError::config_validation(
                "feed.topic",
                format!("'+' must occupy a whole level in filter '{filter}'"),
            ));
        }
    }
    Ok(())
}

/// Validate connection string schemes
fn validate_schemes(config: &BridgeConfig) -> Result<(), ContractError> {
    require_scheme(
        "document_store.uri",
        &config.document_store.uri,
        &["mongodb://", "mongodb+srv://"],
    )?;
    require_scheme(
        "relational_store.uri",
        &config.relational_store.uri,
        &["postgres://", "postgresql://"],
    )?;
    require_scheme(
        "push_gateway.endpoint",
        &config.push_gateway.endpoint,
        &["http://", "https://"],
    )?;
    Ok(())
}

fn require_scheme(field: &str, value: &str, schemes: &[&str]) -> Result<(), ContractError> {
    if schemes.iter().any(|scheme| value.starts_with(scheme)) {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("expected one of {schemes:?}, got '{value}'"),
        ))
    }
}
