use serde_json::Value;

use crate::error::MediaflowError;
use crate::mapping::RawOptions;

/// JSON shape a raw provider field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// String that must be an `http(s)://` or `data:` URI.
    Uri,
    Integer,
    Number,
    Boolean,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Uri => "uri",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Enumerated-value constraint on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowed {
    Any,
    OneOf(&'static [&'static str]),
    IntegerOneOf(&'static [i64]),
    IntegerRange { min: i64, max: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub allowed: Allowed,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            allowed: Allowed::Any,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            allowed: Allowed::Any,
        }
    }

    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = Allowed::OneOf(values);
        self
    }

    pub const fn integer_one_of(mut self, values: &'static [i64]) -> Self {
        self.allowed = Allowed::IntegerOneOf(values);
        self
    }

    pub const fn range(mut self, min: i64, max: i64) -> Self {
        self.allowed = Allowed::IntegerRange { min, max };
        self
    }

    fn check(&self, value: &Value) -> Result<(), MediaflowError> {
        let type_ok = match self.kind {
            FieldKind::String => value.is_string(),
            FieldKind::Uri => value.as_str().is_some_and(is_uri),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
        };
        if !type_ok {
            return Err(self.reject(format!("expected {}", self.kind.as_str())));
        }

        match self.allowed {
            Allowed::Any => Ok(()),
            Allowed::OneOf(values) => {
                let s = value.as_str().unwrap_or_default();
                if values.contains(&s) {
                    Ok(())
                } else {
                    Err(self.reject(format!("must be one of: {}", values.join(", "))))
                }
            }
            Allowed::IntegerOneOf(values) => match value.as_i64() {
                Some(n) if values.contains(&n) => Ok(()),
                _ => {
                    let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    Err(self.reject(format!("must be one of: {}", list.join(", "))))
                }
            },
            Allowed::IntegerRange { min, max } => match value.as_i64() {
                Some(n) if (min..=max).contains(&n) => Ok(()),
                _ => Err(self.reject(format!("must be between {min} and {max}"))),
            },
        }
    }

    fn reject(&self, reason: String) -> MediaflowError {
        MediaflowError::Validation {
            field: self.name.to_string(),
            reason,
        }
    }
}

fn is_uri(s: &str) -> bool {
    s.starts_with("https://") || s.starts_with("http://") || s.starts_with("data:")
}

/// Structural rules for one model's raw options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSchema {
    fields: Vec<FieldSpec>,
}

impl RawSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Check type, required presence, and enumerated constraints.
    /// A JSON `null` counts as absent. Undeclared fields are rejected.
    pub fn validate(&self, raw: &RawOptions) -> Result<(), MediaflowError> {
        for rule in &self.fields {
            match raw.get(rule.name).filter(|v| !v.is_null()) {
                Some(value) => rule.check(value)?,
                None if rule.required => {
                    return Err(rule.reject("required field is missing".to_string()));
                }
                None => {}
            }
        }

        let mut undeclared: Vec<&String> = raw
            .keys()
            .filter(|k| self.field(k).is_none())
            .collect();
        undeclared.sort();
        if let Some(field) = undeclared.first() {
            return Err(MediaflowError::Validation {
                field: (*field).clone(),
                reason: "not accepted by this model".to_string(),
            });
        }

        Ok(())
    }
}
