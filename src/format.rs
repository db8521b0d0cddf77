//! Output formatting for the command-line tool.

use crate::config::{SourceInfo, SourceKind};
use clap::ValueEnum;
use serde_json::Value;
use std::path::Path;

/// Output format for printed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Render a value. Scalars are printed bare so `get` output is usable in
/// shell scripts.
pub fn format_value(value: &Value, format: OutputFormat) -> anyhow::Result<String> {
    let rendered = match (format, value) {
        (_, Value::String(s)) => s.clone(),
        (_, Value::Null) => String::new(),
        (_, Value::Bool(_) | Value::Number(_)) => value.to_string(),
        (OutputFormat::Json, _) => serde_json::to_string_pretty(value)?,
        (OutputFormat::Yaml, _) => serde_yaml::to_string(value)?
            .trim_end()
            .to_string(),
    };
    Ok(rendered)
}

/// Render the load summary: directory, environment and sources in merge order.
pub fn format_sources(config_dir: &Path, environment: &str, sources: &[SourceInfo]) -> String {
    let mut out = String::new();
    out.push_str(&format!("config_dir: {}\n", config_dir.display()));
    out.push_str(&format!("environment: {}\n", environment));
    for (i, source) in sources.iter().enumerate() {
        let origin = match (&source.kind, &source.path) {
            (_, Some(path)) => path.display().to_string(),
            (SourceKind::Overlay, None) => format!("{}* variables", source.name),
            (_, None) => source.name.clone(),
        };
        out.push_str(&format!(
            "{}. {:<11} {} ({} keys)\n",
            i + 1,
            source.kind.to_string(),
            origin,
            source.keys
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_scalars_are_bare() {
        assert_eq!(format_value(&json!("db"), OutputFormat::Json).unwrap(), "db");
        assert_eq!(format_value(&json!(5432), OutputFormat::Yaml).unwrap(), "5432");
        assert_eq!(format_value(&json!(true), OutputFormat::Json).unwrap(), "true");
        assert_eq!(format_value(&Value::Null, OutputFormat::Yaml).unwrap(), "");
    }

    #[test]
    fn test_mapping_formats() {
        let value = json!({"app": {"port": 8080}});
        assert_eq!(
            format_value(&value, OutputFormat::Yaml).unwrap(),
            "app:\n  port: 8080"
        );
        let json_out = format_value(&value, OutputFormat::Json).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&json_out).unwrap(), value);
    }

    #[test]
    fn test_format_sources() {
        let sources = vec![
            SourceInfo {
                kind: SourceKind::Base,
                name: "base".to_string(),
                path: Some(PathBuf::from("config/base.yaml")),
                keys: 3,
            },
            SourceInfo {
                kind: SourceKind::Overlay,
                name: "APP_".to_string(),
                path: None,
                keys: 1,
            },
        ];
        let out = format_sources(Path::new("config"), "local", &sources);
        assert!(out.starts_with("config_dir: config\nenvironment: local\n"));
        assert!(out.contains("1. base        config/base.yaml (3 keys)"));
        assert!(out.contains("2. overlay     APP_* variables (1 keys)"));
    }
}
