//! Typed key/value parameter storage shared by instruments and effects.
//!
//! Every instrument and effect describes its tunable fields as a
//! [`ParameterSet`]. The key set is fixed when the set is built; `set` only
//! ever replaces values, after checking them against the declared kind.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/// Declared shape of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Number { min: f64, max: f64 },
    Choice(&'static [&'static str]),
    Boolean,
    Text,
}

impl ParamKind {
    fn type_name(&self) -> &'static str {
        match self {
            ParamKind::Number { .. } => "number",
            ParamKind::Choice(_) => "choice",
            ParamKind::Boolean => "boolean",
            ParamKind::Text => "text",
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Choice(String),
    Boolean(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Choice(s) | ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value or a type error naming `key`.
    pub fn number(&self, key: &str) -> Result<f64> {
        self.as_number().ok_or_else(|| SynthError::ParameterType {
            name: key.to_string(),
            expected: "number",
        })
    }

    /// Choice/text value or a type error naming `key`.
    pub fn text(&self, key: &str) -> Result<&str> {
        self.as_str().ok_or_else(|| SynthError::ParameterType {
            name: key.to_string(),
            expected: "choice",
        })
    }

    pub fn boolean(&self, key: &str) -> Result<bool> {
        self.as_bool().ok_or_else(|| SynthError::ParameterType {
            name: key.to_string(),
            expected: "boolean",
        })
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{v}"),
            ParamValue::Choice(s) | ParamValue::Text(s) => f.write_str(s),
            ParamValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub kind: ParamKind,
    pub value: ParamValue,
}

/// Ordered, fixed-key parameter collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(mut self, name: &'static str, value: f64, min: f64, max: f64) -> Self {
        self.entries.push(Parameter {
            name,
            kind: ParamKind::Number { min, max },
            value: ParamValue::Number(value),
        });
        self
    }

    pub fn choice(
        mut self,
        name: &'static str,
        value: &str,
        options: &'static [&'static str],
    ) -> Self {
        self.entries.push(Parameter {
            name,
            kind: ParamKind::Choice(options),
            value: ParamValue::Choice(value.to_string()),
        });
        self
    }

    pub fn boolean(mut self, name: &'static str, value: bool) -> Self {
        self.entries.push(Parameter {
            name,
            kind: ParamKind::Boolean,
            value: ParamValue::Boolean(value),
        });
        self
    }

    pub fn text(mut self, name: &'static str, value: &str) -> Self {
        self.entries.push(Parameter {
            name,
            kind: ParamKind::Text,
            value: ParamValue::Text(value.to_string()),
        });
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|p| p.name == key).map(|p| &p.value)
    }

    pub fn entry(&self, key: &str) -> Option<&Parameter> {
        self.entries.iter().find(|p| p.name == key)
    }

    /// Replace the value stored under `key` after checking it against the
    /// declared kind. Unknown keys are rejected; the key set never grows.
    pub fn set(&mut self, key: &str, value: ParamValue) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|p| p.name == key)
            .ok_or_else(|| SynthError::UnknownParameter(key.to_string()))?;
        check(entry, &value)?;
        entry.value = value;
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|p| p.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check(entry: &Parameter, value: &ParamValue) -> Result<()> {
    let mismatch = || SynthError::ParameterType {
        name: entry.name.to_string(),
        expected: entry.kind.type_name(),
    };
    match (&entry.kind, value) {
        (ParamKind::Number { min, max }, ParamValue::Number(v)) => {
            if !v.is_finite() || v < min || v > max {
                return Err(SynthError::invalid(
                    entry.name,
                    format!("{v} outside [{min}, {max}]"),
                ));
            }
            Ok(())
        }
        (ParamKind::Choice(options), ParamValue::Choice(s)) => {
            if !options.contains(&s.as_str()) {
                return Err(SynthError::invalid(
                    entry.name,
                    format!("`{s}` is not one of {options:?}"),
                ));
            }
            Ok(())
        }
        (ParamKind::Boolean, ParamValue::Boolean(_)) => Ok(()),
        (ParamKind::Text, ParamValue::Text(_)) => Ok(()),
        _ => Err(mismatch()),
    }
}

/// Anything that exposes a [`ParameterSet`] and accepts updates to it.
pub trait Parameterized {
    /// Current values, in a stable order.
    fn parameters(&self) -> ParameterSet;

    /// Store an already schema-checked value in the typed field behind `key`.
    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()>;

    /// Validate `value` against the declared kind, then apply it.
    fn set_parameter(&mut self, key: &str, value: ParamValue) -> Result<()> {
        let mut schema = self.parameters();
        schema.set(key, value.clone())?;
        self.apply_parameter(key, &value)
    }

    fn get_parameter(&self, key: &str) -> Option<ParamValue> {
        self.parameters().get(key).cloned()
    }
}
