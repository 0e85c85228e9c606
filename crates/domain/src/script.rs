//! Value model for talking to the script execution engine.
//!
//! The engine itself is an external capability behind a port; this module
//! defines the typed surface the core exchanges with it: function
//! signatures, singleton schemas with structural zero values, and the
//! structured diagnostics a script run can produce.
//!
//! Script values cross the boundary as [`serde_json::Value`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The type of a script value, as far as the core needs to know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    Null,
    Bool,
    Int,
    Float,
    String,
    List,
    Object,
}

impl ScriptType {
    /// Whether `value` inhabits this type.
    #[must_use]
    pub fn check(self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.as_i64().is_some(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// The structural zero value of this type.
    #[must_use]
    pub fn zero_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Int => Value::from(0),
            Self::Float => Value::from(0.0),
            Self::String => Value::String(String::new()),
            Self::List => Value::Array(Vec::new()),
            Self::Object => Value::Object(serde_json::Map::new()),
        }
    }

    /// Infer the type of an existing value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.as_i64().is_some() => Self::Int,
            Value::Number(_) => Self::Float,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Object,
        }
    }
}

/// Declared shape of a singleton: field name to field type.
///
/// Derived from the driver's code by the script engine. An empty schema means
/// the driver declares no state of that kind; its singleton is an empty
/// object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingletonSchema {
    pub fields: BTreeMap<String, ScriptType>,
}

impl SingletonSchema {
    #[must_use]
    pub fn new(fields: BTreeMap<String, ScriptType>) -> Self {
        Self { fields }
    }

    /// The structural zero value of this schema: an object with every
    /// declared field set to its type's zero.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, ty)| (name.clone(), ty.zero_value()))
            .collect();
        Value::Object(map)
    }

    /// Whether `value` is an object carrying every declared field with a
    /// type-correct value.
    #[must_use]
    pub fn validate(&self, value: &Value) -> bool {
        let Value::Object(map) = value else {
            return false;
        };
        self.fields.iter().all(|(name, ty)| {
            map.get(name).is_some_and(|field| ty.check(field))
        })
    }
}

/// The driver- and device-level schemas one driver declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverSchemas {
    pub driver: SingletonSchema,
    pub device: SingletonSchema,
}

/// Typed signature of a driver function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Action argument types, excluding the singleton parameters the engine
    /// prepends.
    pub params: Vec<ScriptType>,
    pub returns: ScriptType,
}

/// A request to call one named, typed function inside a driver script.
#[derive(Debug, Clone)]
pub struct FunctionInvocation {
    pub function: String,
    pub args: Vec<Value>,
    pub signature: FunctionSignature,
}

/// Singleton values handed to (and captured back from) one script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingletonValues {
    pub driver: Value,
    /// Present only when the run targets a concrete device.
    pub device: Option<Value>,
}

/// Source location of a script diagnostic. Zero means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

/// Failure class of a script diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptErrorKind {
    /// The script could not be parsed.
    Syntax,
    /// The script parsed but failed a semantic check (missing function,
    /// wrong argument or return types).
    Diagnostic,
    /// The script (or a post-run output contract) failed at runtime.
    RuntimeInterrupt,
}

/// One structured script diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub message: String,
    pub span: Span,
}

impl ScriptError {
    #[must_use]
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ScriptErrorKind::Syntax,
            message: message.into(),
            span,
        }
    }

    #[must_use]
    pub fn diagnostic(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ScriptErrorKind::Diagnostic,
            message: message.into(),
            span,
        }
    }

    #[must_use]
    pub fn runtime(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ScriptErrorKind::RuntimeInterrupt,
            message: message.into(),
            span,
        }
    }
}

/// Result of one engine run.
///
/// `errors` being empty is the success criterion; on failure the singleton
/// values are whatever was passed in and must not be persisted.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub singletons: SingletonValues,
    pub return_value: Value,
    pub errors: Vec<ScriptError>,
}

impl ScriptOutcome {
    /// An outcome that failed before producing any value.
    #[must_use]
    pub fn failed(singletons: SingletonValues, errors: Vec<ScriptError>) -> Self {
        Self {
            singletons,
            return_value: Value::Null,
            errors,
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}
