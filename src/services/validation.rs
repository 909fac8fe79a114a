use crate::constants::limits::MAX_SUGGESTIONS;
use crate::errors::{ToolError, ValidationRule};
use crate::registry::{EndpointDefinition, ParamLocation, ParamSpec, ParamType};
use crate::utils::suggest::suggest;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

static DATE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WireValue {
    Scalar(String),
    List(Vec<String>),
}

/// Validated arguments keyed by wire name, ready to be put on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedQuery {
    pub query: BTreeMap<String, WireValue>,
    pub path: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl NormalizedQuery {
    pub fn get(&self, wire: &str) -> Option<&WireValue> {
        self.query.get(wire)
    }

    pub fn contains(&self, wire: &str) -> bool {
        self.query.contains_key(wire) || self.path.contains_key(wire)
    }

    pub fn scalar(&self, wire: &str) -> Option<&str> {
        match self.query.get(wire) {
            Some(WireValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub fn set_scalar(&mut self, wire: &str, value: impl Into<String>) {
        self.query
            .insert(wire.to_string(), WireValue::Scalar(value.into()));
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn lookup<'a>(args: &'a Map<String, Value>, spec: &ParamSpec) -> Option<&'a Value> {
    let by_name = args.get(&spec.name).filter(|v| !is_absent(v));
    let by_alias = spec
        .alias()
        .and_then(|alias| args.get(alias))
        .filter(|v| !is_absent(v));
    by_name.or(by_alias)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    /// Checks `args` against the endpoint's parameters and builds the wire query.
    ///
    /// Stops at the first violation: missing required parameters are reported
    /// before unknown keys, and unknown keys before type problems. `null` and
    /// empty lists count as absent.
    pub fn validate(
        &self,
        endpoint: &EndpointDefinition,
        args: &Map<String, Value>,
    ) -> Result<NormalizedQuery, ToolError> {
        self.ensure_required(endpoint, args)?;
        self.ensure_declared(endpoint, args)?;

        let mut out = NormalizedQuery::default();
        for spec in &endpoint.params {
            let Some(value) = lookup(args, spec) else {
                continue;
            };
            match spec.location {
                ParamLocation::Body => {
                    out.body = Some(self.ensure_object(spec, value)?);
                }
                ParamLocation::Path => {
                    let rendered = self.ensure_scalar(spec, spec.ty, value)?;
                    out.path.insert(spec.wire_name().to_string(), rendered);
                }
                ParamLocation::Query => {
                    let rendered = match spec.ty {
                        ParamType::Array => WireValue::List(self.ensure_list(spec, value)?),
                        ParamType::Object => {
                            return Err(ToolError::validation(
                                ValidationRule::ShapeMismatch,
                                &spec.name,
                                format!("{} cannot be sent in the query string", spec.name),
                            ))
                        }
                        ty => WireValue::Scalar(self.ensure_scalar(spec, ty, value)?),
                    };
                    out.query.insert(spec.wire_name().to_string(), rendered);
                }
            }
        }
        Ok(out)
    }

    fn ensure_required(
        &self,
        endpoint: &EndpointDefinition,
        args: &Map<String, Value>,
    ) -> Result<(), ToolError> {
        for spec in endpoint.params.iter().filter(|p| p.required) {
            if lookup(args, spec).is_none() {
                let mut err = ToolError::validation(
                    ValidationRule::MissingRequired,
                    &spec.name,
                    format!("{} requires parameter {}", endpoint.name, spec.name),
                );
                if let Some(prereq) = spec.prerequisite.as_deref() {
                    err = err.with_hint(format!("Look the value up with {} first.", prereq));
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn ensure_declared(
        &self,
        endpoint: &EndpointDefinition,
        args: &Map<String, Value>,
    ) -> Result<(), ToolError> {
        for (key, value) in args {
            if value.is_null() {
                continue;
            }
            let Some(spec) = endpoint.param_by_key(key) else {
                let known: Vec<&str> = endpoint.params.iter().map(|p| p.name.as_str()).collect();
                let suggestions = suggest(key, &known, MAX_SUGGESTIONS);
                let mut err = ToolError::validation(
                    ValidationRule::UnknownParameter,
                    key,
                    format!("{} does not accept parameter {}", endpoint.name, key),
                )
                .with_details(serde_json::json!({ "suggestions": suggestions, "known": known }));
                if !suggestions.is_empty() {
                    err = err.with_hint(format!("Did you mean: {}?", suggestions.join(", ")));
                }
                return Err(err);
            };
            if let Some(alias) = spec.alias() {
                let both = [spec.name.as_str(), alias]
                    .iter()
                    .all(|k| args.get(*k).map(|v| !v.is_null()).unwrap_or(false));
                if both {
                    return Err(ToolError::validation(
                        ValidationRule::ShapeMismatch,
                        &spec.name,
                        format!("{} was given both as {} and as {}", spec.name, spec.name, alias),
                    )
                    .with_hint("Pass each parameter once."));
                }
            }
        }
        Ok(())
    }

    fn ensure_list(&self, spec: &ParamSpec, value: &Value) -> Result<Vec<String>, ToolError> {
        let Value::Array(items) = value else {
            return Err(ToolError::validation(
                ValidationRule::ShapeMismatch,
                &spec.name,
                format!("{} must be a list, got {}", spec.name, describe(value)),
            )
            .with_hint(format!("Wrap single values in a list, e.g. [{}].", value)));
        };
        let item_ty = spec.items.unwrap_or(ParamType::String);
        items
            .iter()
            .map(|item| self.ensure_scalar(spec, item_ty, item))
            .collect()
    }

    fn ensure_object(&self, spec: &ParamSpec, value: &Value) -> Result<Value, ToolError> {
        if value.is_object() {
            return Ok(value.clone());
        }
        Err(ToolError::validation(
            ValidationRule::ShapeMismatch,
            &spec.name,
            format!("{} must be an object, got {}", spec.name, describe(value)),
        ))
    }

    fn ensure_scalar(
        &self,
        spec: &ParamSpec,
        ty: ParamType,
        value: &Value,
    ) -> Result<String, ToolError> {
        if value.is_array() || value.is_object() {
            return Err(ToolError::validation(
                ValidationRule::ShapeMismatch,
                &spec.name,
                format!("{} expects a single value, got {}", spec.name, describe(value)),
            ));
        }
        match ty {
            ParamType::Date => self.ensure_date(spec, value),
            ParamType::Enum => self.ensure_enum(spec, value),
            ParamType::String => match value {
                Value::String(text) => Ok(text.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(mismatch(spec, "a string", other)),
            },
            ParamType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(|v| v.to_string())
                    .or_else(|| n.as_u64().map(|v| v.to_string()))
                    .or_else(|| {
                        // `i64::MAX as f64` rounds up to 2^63, hence the open upper bound.
                        n.as_f64()
                            .filter(|f| f.is_finite() && f.fract() == 0.0)
                            .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                            .map(|f| (f as i64).to_string())
                    })
                    .ok_or_else(|| mismatch(spec, "an integer", value)),
                Value::String(text) => text
                    .trim()
                    .parse::<i64>()
                    .map(|v| v.to_string())
                    .map_err(|_| mismatch(spec, "an integer", value)),
                other => Err(mismatch(spec, "an integer", other)),
            },
            ParamType::Decimal => match value {
                Value::Number(n) => Ok(n.to_string()),
                Value::String(text) => {
                    let trimmed = text.trim();
                    match trimmed.parse::<f64>() {
                        Ok(f) if f.is_finite() => Ok(trimmed.to_string()),
                        _ => Err(mismatch(spec, "a decimal number", value)),
                    }
                }
                other => Err(mismatch(spec, "a decimal number", other)),
            },
            ParamType::Boolean => match value {
                Value::Bool(b) => Ok(b.to_string()),
                Value::String(text) if text.eq_ignore_ascii_case("true") => Ok("true".to_string()),
                Value::String(text) if text.eq_ignore_ascii_case("false") => {
                    Ok("false".to_string())
                }
                other => Err(mismatch(spec, "true or false", other)),
            },
            ParamType::Array | ParamType::Object => Err(ToolError::validation(
                ValidationRule::ShapeMismatch,
                &spec.name,
                format!("{} cannot nest {} values", spec.name, ty.as_str()),
            )),
        }
    }

    fn ensure_date(&self, spec: &ParamSpec, value: &Value) -> Result<String, ToolError> {
        let text = value.as_str().unwrap_or_default();
        let valid = DATE_SHAPE.is_match(text) && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok();
        if valid {
            return Ok(text.to_string());
        }
        Err(ToolError::validation(
            ValidationRule::MalformedDate,
            &spec.name,
            format!("{} must be a date in YYYY-MM-DD format, got {}", spec.name, value),
        )
        .with_hint("Example: 2025-01-31"))
    }

    fn ensure_enum(&self, spec: &ParamSpec, value: &Value) -> Result<String, ToolError> {
        if let Some(text) = value.as_str() {
            if spec.values.iter().any(|allowed| allowed == text) {
                return Ok(text.to_string());
            }
        }
        Err(ToolError::validation(
            ValidationRule::InvalidEnumValue,
            &spec.name,
            format!(
                "{} must be one of {}, got {}",
                spec.name,
                spec.values.join(", "),
                value
            ),
        )
        .with_details(serde_json::json!({ "allowed": spec.values })))
    }
}

fn mismatch(spec: &ParamSpec, expected: &str, value: &Value) -> ToolError {
    ToolError::validation(
        ValidationRule::TypeMismatch,
        &spec.name,
        format!("{} must be {}, got {}", spec.name, expected, value),
    )
}
