//! `validate` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use contracts::{BridgeConfig, RELATIONAL_TABLE};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::commands::load_config;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    broker: String,
    topic: String,
    qos: u8,
    cache_key: String,
    document_collection: String,
    relational_table: String,
    push_endpoint: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    let result = validate_config(args.config.as_deref());
    info!(source = %result.source, valid = result.valid, "Configuration validated");

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(path: Option<&Path>) -> ValidationResult {
    let source = match path {
        Some(path) => path.display().to_string(),
        None => "environment".to_string(),
    };

    match load_config(path) {
        Ok((config, _)) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                source,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    broker: format!("{}:{}", config.feed.host, config.feed.port),
                    topic: config.feed.topic.clone(),
                    qos: config.feed.qos.as_u8(),
                    cache_key: config.cache.key.clone(),
                    document_collection: format!(
                        "{}.{}",
                        config.document_store.database, config.document_store.collection
                    ),
                    relational_table: RELATIONAL_TABLE.to_string(),
                    push_endpoint: config.push_gateway.endpoint.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            source,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &BridgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.feed.password.is_some() && config.feed.username.is_none() {
        warnings.push("feed.password is set without feed.username and will be ignored".to_string());
    }

    if config.push_gateway.endpoint.starts_with("http://") {
        warnings.push("push_gateway.endpoint uses plain HTTP; the API key is sent unencrypted".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.source);

        if let Some(ref summary) = result.summary {
            println!("\n  Broker: {} (topic '{}', QoS {})", summary.broker, summary.topic, summary.qos);
            println!("  Cache key: {}", summary.cache_key);
            println!("  Document collection: {}", summary.document_collection);
            println!("  Relational table: {}", summary.relational_table);
            println!("  Push endpoint: {}", summary.push_endpoint);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.source);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
