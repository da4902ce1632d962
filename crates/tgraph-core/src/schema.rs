//! JSON schema and example config for `AppConfig`.
//!
//! The generated pair is checked in under `schemas/` at the workspace root and
//! regenerated with `cargo run -p tgraph-core --example generate_config`.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use schemars::Schema;
use schemars::generate::SchemaSettings;
use serde_json::json;

use crate::config::AppConfig;

/// Generated schema filename.
pub const SCHEMA_FILENAME: &str = "config.schema.json";

/// Generated config filename.
pub const CONFIG_FILENAME: &str = "config.toml";

const REGENERATE_HINT: &str = "cargo run -p tgraph-core --example generate_config";

/// Draft-07 schema for `AppConfig`, with `$id` under `repo_url`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn generate_schema(project_name: &str, repo_url: &str) -> Result<String> {
    let generator = SchemaSettings::draft07().into_generator();
    let mut schema: Schema = generator.into_root_schema_for::<AppConfig>();

    schema.insert(
        "$id".to_string(),
        json!(format!("{repo_url}/schemas/{SCHEMA_FILENAME}")),
    );
    schema.insert(
        "title".to_string(),
        json!(format!("{project_name} configuration")),
    );
    schema.insert(
        "description".to_string(),
        json!(format!("Configuration schema for {project_name}")),
    );

    // `$schema` is skipped on the struct but editors still write it.
    if let Some(props) = schema.get_mut("properties")
        && let Some(props_obj) = props.as_object_mut()
    {
        props_obj.insert(
            "$schema".to_string(),
            json!({
                "type": "string",
                "description": "JSON Schema reference for editor support"
            }),
        );
    }

    serde_json::to_string_pretty(&schema).context("serializing JSON schema")
}

/// The default `AppConfig` as commented TOML.
///
/// # Errors
///
/// Returns an error if TOML serialization fails.
pub fn generate_example_config(project_name: &str) -> Result<String> {
    let schema_url = format!(
        "https://raw.githubusercontent.com/byteowlz/schemas/refs/heads/main/{project_name}/{project_name}.config.schema.json"
    );

    let toml_body = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;

    let mut output = String::new();
    let _ = write!(
        output,
        r#""$schema" = "{schema_url}"

# Configuration for {project_name}.
# Copy this file to $XDG_CONFIG_HOME/{project_name}/config.toml and adjust as needed.
# API keys under [model] are read from the environment and never written here.

"#
    );
    output.push_str(&toml_body);

    Ok(output)
}

/// Write `config.schema.json` and `config.toml` into `output_dir`.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
pub fn write_generated_files(output_dir: &Path, project_name: &str, repo_url: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory: {}", output_dir.display()))?;

    for (name, contents) in [
        (SCHEMA_FILENAME, generate_schema(project_name, repo_url)?),
        (CONFIG_FILENAME, generate_example_config(project_name)?),
    ] {
        let path = output_dir.join(name);
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}

/// Check the files in `output_dir` against freshly generated ones.
///
/// Files are compared as parsed JSON and TOML values, so key order,
/// whitespace and comments do not count as drift.
///
/// # Errors
///
/// Returns an error listing every missing or stale file.
pub fn validate_generated_files(
    output_dir: &Path,
    project_name: &str,
    repo_url: &str,
) -> Result<()> {
    let schema = generate_schema(project_name, repo_url)?;
    let config = generate_example_config(project_name)?;

    let checks: [(&str, &str, fn(&str, &str) -> bool); 2] = [
        (SCHEMA_FILENAME, &schema, same_json),
        (CONFIG_FILENAME, &config, same_toml),
    ];

    let mut errors = Vec::new();
    for (name, generated, same) in checks {
        let path = output_dir.join(name);
        if !path.exists() {
            errors.push(format!(
                "{} does not exist. Run '{REGENERATE_HINT}' to create it.",
                path.display()
            ));
            continue;
        }
        let existing =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        if !same(&existing, generated) {
            errors.push(format!(
                "{} is out of date. Run '{REGENERATE_HINT}' to update it.",
                path.display()
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "generated config files are stale:\n  - {}",
            errors.join("\n  - ")
        )
    }
}

fn same_json(existing: &str, generated: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(existing),
        serde_json::from_str::<serde_json::Value>(generated),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn same_toml(existing: &str, generated: &str) -> bool {
    match (
        toml::from_str::<toml::Table>(existing),
        toml::from_str::<toml::Table>(generated),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
