use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

pub const TYPOGRAPHY_CLASS: &str = "chisel-typography";
pub const COLOR_CLASS: &str = "chisel-color";
pub const RHYTHM_CLASS: &str = "chisel-rhythm";

/// Field names used by earlier releases, mapped to their current name.
const LEGACY_FIELDS: &[(&str, &str)] = &[("frontmatterProperty", "snippetKey")];
/// Autoload flag names used by earlier releases.
const LEGACY_AUTOLOAD_KEYS: &[&str] = &["autoload"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Frontmatter key listing local class names.
    pub class_key: String,
    /// Frontmatter key naming snippet notes to load for the active note.
    pub snippet_key: String,
    /// Frontmatter flag that puts a note's snippets into the global stylesheet.
    pub autoload_key: String,
    pub enable_typography: bool,
    pub enable_color: bool,
    pub enable_rhythm: bool,
    pub startup_snapshot: StartupSnapshot,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            class_key: "cssclasses".to_string(),
            snippet_key: "chisel".to_string(),
            autoload_key: "chisel-autoload".to_string(),
            enable_typography: false,
            enable_color: false,
            enable_rhythm: false,
            startup_snapshot: StartupSnapshot::default(),
        }
    }
}

/// What was on screen the last time a real note was reconciled, replayed
/// at startup before any note is open.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartupSnapshot {
    /// Local class names without the `cssclass-` prefix.
    pub class_list: Vec<String>,
    pub snippet_name_list: Vec<String>,
}

impl Settings {
    /// Merges stored data over the defaults one field at a time. A field
    /// that does not fit its type keeps its default; the rest still load.
    pub fn from_stored(stored: Option<Value>) -> Self {
        let Some(Value::Object(mut map)) = stored else {
            return Self::default();
        };
        migrate(&mut map);

        let mut settings = Self::default();
        for (key, value) in map {
            let Ok(Value::Object(mut merged)) = serde_json::to_value(&settings) else {
                break;
            };
            if !merged.contains_key(&key) {
                continue;
            }
            merged.insert(key.clone(), value);
            match serde_json::from_value(Value::Object(merged)) {
                Ok(next) => settings = next,
                Err(err) => tracing::warn!(field = %key, "ignoring unreadable setting: {err}"),
            }
        }
        settings
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Body classes switched on by the feature toggles.
    pub fn toggle_classes(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.enable_typography, TYPOGRAPHY_CLASS),
            (self.enable_color, COLOR_CLASS),
            (self.enable_rhythm, RHYTHM_CLASS),
        ]
        .into_iter()
        .filter_map(|(enabled, class)| enabled.then_some(class))
    }

    /// Keys holding local class names, configured key first.
    pub fn class_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.class_key.as_str()];
        for alias in ["cssclasses", "cssClasses"] {
            if !keys.contains(&alias) {
                keys.push(alias);
            }
        }
        keys
    }
}

fn migrate(map: &mut Map<String, Value>) {
    for (old, new) in LEGACY_FIELDS {
        if let Some(value) = map.remove(*old) {
            if !map.contains_key(*new) {
                tracing::debug!("migrating setting {old} -> {new}");
                map.insert((*new).to_string(), value);
            }
        }
    }
    let legacy_autoload = map
        .get("autoloadKey")
        .and_then(Value::as_str)
        .is_some_and(|key| LEGACY_AUTOLOAD_KEYS.contains(&key));
    if legacy_autoload {
        map.insert(
            "autoloadKey".to_string(),
            Value::String(Settings::default().autoload_key),
        );
    }
}
