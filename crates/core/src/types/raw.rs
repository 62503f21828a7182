//! Untrusted model output.
//!
//! Nothing in here is trusted: ids may be hallucinated and numbers may be
//! strings or out of range. Only the validator turns a [`RawPlan`] into a
//! [`super::plan::GeneratedPlan`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// What a completion provider handed back.
#[derive(Debug, Clone, PartialEq)]
pub enum RawModelOutput {
    /// Provider returned structured JSON (tool call / JSON mode).
    Structured(Value),
    /// Provider returned free text that should contain JSON.
    Text(String),
}

impl RawModelOutput {
    /// Parse into the untrusted plan shape.
    ///
    /// Fails with `SchemaViolation` when no plan-shaped JSON can be found or
    /// the plan has no entries.
    pub fn parse_plan(&self) -> Result<RawPlan> {
        let value = match self {
            Self::Structured(v) => v.clone(),
            Self::Text(text) => extract_json(text)?,
        };

        let plan = match value {
            Value::Array(_) => RawPlan {
                title: None,
                entries: serde_json::from_value(value)
                    .map_err(|e| Error::schema(format!("entries array: {}", e)))?,
            },
            Value::Object(_) => serde_json::from_value::<RawPlan>(value)
                .map_err(|e| Error::schema(format!("plan object: {}", e)))?,
            other => {
                return Err(Error::schema(format!(
                    "expected a JSON object, got {}",
                    type_name(&other)
                )))
            }
        };

        if plan.entries.is_empty() {
            return Err(Error::schema("plan contains no entries"));
        }
        Ok(plan)
    }
}

/// Plan as proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawPlan {
    /// Short human-readable plan title.
    #[serde(default)]
    pub title: Option<String>,

    /// Ordered plan entries.
    #[serde(alias = "exercises", alias = "items", alias = "foods", alias = "meals")]
    pub entries: Vec<RawEntry>,
}

/// One proposed entry. Every field is optional because the model may omit it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawEntry {
    /// Catalog identifier; must be one of the candidate ids.
    #[serde(default, alias = "exerciseId", alias = "itemId", alias = "exercise_id")]
    pub id: Option<String>,

    /// Name of the item, informational only.
    #[serde(default)]
    pub name: Option<String>,

    /// Category hint, informational only.
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    #[schemars(with = "Option<u32>")]
    pub sets: Option<Value>,

    #[serde(default)]
    #[schemars(with = "Option<u32>")]
    pub reps: Option<Value>,

    #[serde(default, alias = "restSeconds", alias = "rest")]
    #[schemars(with = "Option<u32>")]
    pub rest_seconds: Option<Value>,

    #[serde(default)]
    #[schemars(with = "Option<f32>")]
    pub servings: Option<Value>,

    #[serde(default)]
    #[schemars(with = "Option<u32>")]
    pub calories: Option<Value>,
}

impl RawEntry {
    pub fn sets(&self) -> Option<f64> {
        self.sets.as_ref().and_then(lenient_number)
    }

    pub fn reps(&self) -> Option<f64> {
        self.reps.as_ref().and_then(lenient_number)
    }

    pub fn rest_seconds(&self) -> Option<f64> {
        self.rest_seconds.as_ref().and_then(lenient_number)
    }

    pub fn servings(&self) -> Option<f64> {
        self.servings.as_ref().and_then(lenient_number)
    }

    pub fn calories(&self) -> Option<f64> {
        self.calories.as_ref().and_then(lenient_number)
    }

    /// Words the entry's name and category imply, for similarity ranking.
    pub fn implied_tags(&self) -> Vec<String> {
        self.name
            .iter()
            .chain(self.category.iter())
            .flat_map(|s| s.split(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.len() > 2)
            .map(str::to_lowercase)
            .collect()
    }
}

/// JSON schema handed to the provider alongside the prompt.
pub fn raw_plan_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(RawPlan)).unwrap_or(Value::Null)
}

/// Accept numbers, numeric strings and ranges like `"8-12"` (first bound).
fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .find(|part| !part.is_empty())
            .and_then(|part| part.parse().ok()),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Ok(v);
    }

    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => serde_json::from_str(&trimmed[s..=e])
            .map_err(|e| Error::schema(format!("unparsable JSON in model output: {}", e))),
        _ => Err(Error::schema("model output contains no JSON")),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
