//! Plugin manifest document (`manifest.json`) and its canonical field order.
//!
//! The manifest is kept as an untyped JSON object so that fields this crate
//! does not know about (extension parameters, future platform keys) survive
//! a load/modify/save cycle untouched. Only the handful of fields the build
//! pipeline reads or rewrites get typed accessors.

use serde_json::{Map, Value};

/// Keys that always serialize first, in exactly this order, when present.
pub const CANONICAL_KEY_ORDER: [&str; 10] = [
    "version",
    "manifest_version",
    "type",
    "icon",
    "name",
    "description",
    "homepage_url",
    "desktop",
    "mobile",
    "config",
];

/// Key holding extension parameters inside the `config` section.
pub const REQUIRED_PARAMS_KEY: &str = "required_params";

/// Errors raised while parsing, validating or serializing a manifest.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// A required field is absent or empty.
    #[error("Manifest is missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON type.
    #[error("Manifest field '{field}' must be {expected}")]
    InvalidField {
        /// The offending key.
        field: &'static str,
        /// Human-readable description of the accepted shape.
        expected: &'static str,
    },

    /// The document root is not a JSON object.
    #[error("Manifest root must be a JSON object")]
    NotAnObject,

    /// The document is not valid JSON.
    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// An ordered plugin manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginManifest {
    fields: Map<String, Value>,
}

impl PluginManifest {
    /// Parse a manifest from JSON text.
    ///
    /// Parsing does not validate required fields; call [`validate`](Self::validate)
    /// or [`to_canonical_json`](Self::to_canonical_json) for that.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Json`] for malformed JSON and
    /// [`ManifestError::NotAnObject`] if the root is not an object.
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(ManifestError::NotAnObject),
        }
    }

    /// Borrow a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Mutably borrow a field.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Remove a field, returning it if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Whether a field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// The version token, accepting both string and numeric forms.
    pub fn version(&self) -> Option<String> {
        match self.fields.get("version")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Display name for one language (`"en"`, `"ja"`, ...).
    pub fn localized_name(&self, lang: &str) -> Option<&str> {
        self.fields
            .get("name")?
            .as_object()?
            .get(lang)?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    /// Mutable access to the localized name map.
    pub fn names_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.fields.get_mut("name")?.as_object_mut()
    }

    /// Check the fields every valid manifest must carry.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingField`] when `version` or `name` is
    /// absent or empty, and [`ManifestError::InvalidField`] when `name` is not
    /// a map of language to text.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.version().is_none() {
            return Err(ManifestError::MissingField("version"));
        }

        let names = match self.fields.get("name") {
            None | Some(Value::Null) => return Err(ManifestError::MissingField("name")),
            Some(Value::Object(names)) => names,
            Some(_) => {
                return Err(ManifestError::InvalidField {
                    field: "name",
                    expected: "an object of language to text",
                });
            }
        };

        let has_name = names
            .values()
            .any(|v| v.as_str().is_some_and(|s| !s.trim().is_empty()));
        if !has_name {
            return Err(ManifestError::MissingField("name"));
        }

        Ok(())
    }

    /// Keys in serialization order: canonical keys first (fixed order), then
    /// every other key alphabetically.
    pub fn ordered_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = CANONICAL_KEY_ORDER
            .iter()
            .copied()
            .filter(|k| self.fields.contains_key(*k))
            .collect();

        let mut extra: Vec<&str> = self
            .fields
            .keys()
            .map(String::as_str)
            .filter(|k| !CANONICAL_KEY_ORDER.contains(k))
            .collect();
        extra.sort_unstable();

        keys.extend(extra);
        keys
    }

    /// Serialize with canonical top-level key order and two-space indentation.
    ///
    /// Validation runs first; an invalid manifest is never serialized.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or [`ManifestError::Json`] if a value
    /// cannot be encoded.
    pub fn to_canonical_json(&self) -> Result<String, ManifestError> {
        self.validate()?;

        let mut out = String::from("{\n");
        for (i, key) in self.ordered_keys().into_iter().enumerate() {
            if i > 0 {
                out.push_str(",\n");
            }
            let value = serde_json::to_string_pretty(&self.fields[key])?;
            out.push_str("  ");
            out.push_str(&serde_json::to_string(key)?);
            out.push_str(": ");
            // Nested lines shift one level right; JSON strings never contain raw newlines.
            out.push_str(&value.replace('\n', "\n  "));
        }
        out.push_str("\n}");
        Ok(out)
    }
}

impl From<PluginManifest> for Value {
    fn from(manifest: PluginManifest) -> Self {
        Value::Object(manifest.fields)
    }
}
