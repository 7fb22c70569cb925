//! Placeholder expansion for settings values.
//!
//! A settings file such as
//!
//! ```json
//! { "app_name": "MyApp", "freeze_dir": "target/${app_name}" }
//! ```
//!
//! resolves `freeze_dir` to `target/MyApp`. Substitution is plain substring
//! replacement of the rendered marker for every key in the map, so a marker
//! for a key that is not defined is left untouched.
//!
//! Two marker forms exist: `${key}` is expanded immediately, `@{key}` is a
//! deferred form that bundled defaults use to postpone a substitution until
//! the project files have been merged in.

use crate::error::{SettingsError, SettingsResult};
use regex_lite::{Captures, Regex};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Marker pattern; `%s` stands for the key name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pattern: Cow<'static, str>,
}

impl Template {
    /// `${key}`
    pub const IMMEDIATE: Template = Template {
        pattern: Cow::Borrowed("${%s}"),
    };

    /// `@{key}`
    pub const DEFERRED: Template = Template {
        pattern: Cow::Borrowed("@{%s}"),
    };

    /// Create a custom marker pattern. The pattern must contain `%s`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Cow::Owned(pattern.into()),
        }
    }

    /// Render the marker for a key.
    pub fn render(&self, key: &str) -> String {
        self.pattern.replacen("%s", key, 1)
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}

/// Text substituted for a setting value.
///
/// Strings substitute their raw text, everything else its compact JSON form.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace every marker in `text`, walking the settings in insertion order.
pub fn expand_str(text: &str, settings: &Map<String, Value>, template: &Template) -> String {
    let mut result = text.to_string();
    for (key, value) in settings {
        let marker = template.render(key);
        if result.contains(&marker) {
            result = result.replace(&marker, &value_to_text(value));
        }
    }
    result
}

/// Expand placeholders in a value, recursing into arrays and objects.
pub fn expand(value: &Value, settings: &Map<String, Value>, template: &Template) -> Value {
    match value {
        Value::String(s) => Value::String(expand_str(s, settings, template)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| expand(item, settings, template))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand(v, settings, template)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Expand every top-level setting against the map itself until nothing changes.
///
/// Each scan walks the keys in order and commits the first changed value, then
/// starts over. This lets a setting pick up a value that was itself just
/// expanded (`c -> ${b} -> ${a}`). At most `max_passes` commits are made.
///
/// Returns the number of committed changes.
pub fn expand_all(settings: &mut Map<String, Value>, max_passes: usize) -> SettingsResult<usize> {
    let original = settings.clone();
    let mut passes = 0;

    loop {
        let changed = settings.iter().find_map(|(key, value)| {
            let expanded = expand(value, settings, &Template::IMMEDIATE);
            (expanded != *value).then(|| (key.clone(), expanded))
        });

        let Some((key, expanded)) = changed else {
            break;
        };

        passes += 1;
        if passes > max_passes {
            return Err(SettingsError::PlaceholderCycle {
                chain: reference_chain(&original, &key),
                passes,
            });
        }
        trace!(key = %key, "Expanded setting");
        settings.insert(key, expanded);
    }

    // A fixed point can still hold markers for defined keys, e.g. a="${b}",
    // b="${a}" settles on a="${a}".
    if let Some(key) = settings
        .iter()
        .find(|(_, value)| !unresolved_refs(value, settings).is_empty())
        .map(|(key, _)| key.clone())
    {
        return Err(SettingsError::PlaceholderCycle {
            chain: reference_chain(&original, &key),
            passes,
        });
    }

    debug!(passes, keys = settings.len(), "Placeholder expansion converged");
    Ok(passes)
}

/// Keys whose immediate marker occurs somewhere inside `value`.
pub fn unresolved_refs(value: &Value, settings: &Map<String, Value>) -> Vec<String> {
    let mut refs = Vec::new();
    collect_refs(value, settings, &mut refs);
    refs
}

fn collect_refs(value: &Value, settings: &Map<String, Value>, refs: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for key in settings.keys() {
                if s.contains(&Template::IMMEDIATE.render(key)) && !refs.contains(key) {
                    refs.push(key.clone());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, settings, refs)),
        Value::Object(map) => map.values().for_each(|v| collect_refs(v, settings, refs)),
        _ => {}
    }
}

/// Follow references from `start` until a key repeats or nothing is referenced.
fn reference_chain(settings: &Map<String, Value>, start: &str) -> Vec<String> {
    let mut chain = vec![start.to_string()];
    let mut current = start.to_string();

    while let Some(next) = settings
        .get(&current)
        .and_then(|value| unresolved_refs(value, settings).into_iter().next())
    {
        let repeated = chain.contains(&next);
        chain.push(next.clone());
        if repeated {
            break;
        }
        current = next;
    }
    chain
}

fn deferred_pattern() -> &'static Regex {
    static DEFERRED: OnceLock<Regex> = OnceLock::new();
    DEFERRED.get_or_init(|| Regex::new(r"@\{.*?\}").expect("deferred marker regex"))
}

/// Turn every `@{name}` into `${name}` inside a string.
pub fn rewrite_deferred_str(text: &str) -> String {
    deferred_pattern()
        .replace_all(text, |caps: &Captures| format!("${}", &caps[0][1..]))
        .into_owned()
}

/// Turn every `@{name}` into `${name}`, recursing into arrays and objects.
pub fn rewrite_deferred(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(rewrite_deferred_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(rewrite_deferred).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, rewrite_deferred(v)))
                .collect(),
        ),
        other => other,
    }
}
