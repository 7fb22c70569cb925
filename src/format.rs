//! Output formatting for resolved settings.

use anyhow::Result;
use serde_json::{Map, Value};

/// Output format for the `show` and `get` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Markdown,
}

/// Format a full settings map.
pub fn format_settings(settings: &Map<String, Value>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(settings)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(settings)?),
        OutputFormat::Markdown => Ok(format_settings_markdown(settings)),
    }
}

/// Format a single value. Strings are printed bare so shells can capture them.
pub fn format_value(value: &Value, format: OutputFormat) -> Result<String> {
    match (value, format) {
        (Value::String(s), _) => Ok(s.clone()),
        (_, OutputFormat::Yaml) => Ok(serde_yaml::to_string(value)?.trim_end().to_string()),
        _ => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn format_settings_markdown(settings: &Map<String, Value>) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Settings ({})\n\n", settings.len()));
    md.push_str("| key | value |\n");
    md.push_str("|-----|-------|\n");
    for (key, value) in settings {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        md.push_str(&format!("| `{}` | {} |\n", key, text.replace('|', "\\|")));
    }

    md
}
