//! Plan - the declarative multi-step action list produced by a planner
//!
//! The engine trusts a `Plan` completely once it exists, so all shape checks
//! happen here at the boundary: `Plan::from_json` rejects anything that does
//! not match the schema instead of coercing it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Errors raised at the planner/engine boundary
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Plan is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Plan must be a JSON object")]
    NotAnObject,
    #[error("Plan is missing required key '{0}'")]
    MissingKey(&'static str),
    #[error("Plan key '{key}' must be {expected}")]
    WrongType { key: &'static str, expected: &'static str },
    #[error("Step {step} is missing required key '{key}'")]
    StepMissingKey { step: usize, key: &'static str },
    #[error("Step {step}: '{key}' must be {expected}")]
    StepWrongType {
        step: usize,
        key: String,
        expected: &'static str,
    },
    #[error("Step {step} has an empty command")]
    EmptyCommand { step: usize },
    #[error("I couldn't understand the request '{0}'")]
    NotUnderstood(String),
}

/// One verb invocation inside a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub cmd: String,
    pub args: Vec<String>,
    #[serde(default, alias = "kwargs", skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    pub why: String,
}

impl Step {
    pub fn new(cmd: impl Into<String>, args: Vec<String>, why: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args,
            options: BTreeMap::new(),
            why: why.into(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A complete plan: stated assumptions plus ordered steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub assumptions: Vec<String>,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(assumptions: Vec<String>, steps: Vec<Step>) -> Self {
        Self { assumptions, steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Parse and validate planner output
    pub fn from_json(text: &str) -> Result<Self, PlanError> {
        let value: JsonValue = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value against the plan schema
    pub fn from_value(value: JsonValue) -> Result<Self, PlanError> {
        validate_shape(&value)?;
        let plan: Plan = serde_json::from_value(value)?;
        for (idx, step) in plan.steps.iter().enumerate() {
            if step.cmd.trim().is_empty() {
                return Err(PlanError::EmptyCommand { step: idx + 1 });
            }
        }
        Ok(plan)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

fn validate_shape(value: &JsonValue) -> Result<(), PlanError> {
    let obj = value.as_object().ok_or(PlanError::NotAnObject)?;

    let steps = obj.get("steps").ok_or(PlanError::MissingKey("steps"))?;
    let assumptions = obj
        .get("assumptions")
        .ok_or(PlanError::MissingKey("assumptions"))?;

    let assumptions = assumptions.as_array().ok_or(PlanError::WrongType {
        key: "assumptions",
        expected: "an array of strings",
    })?;
    if !assumptions.iter().all(JsonValue::is_string) {
        return Err(PlanError::WrongType {
            key: "assumptions",
            expected: "an array of strings",
        });
    }

    let steps = steps.as_array().ok_or(PlanError::WrongType {
        key: "steps",
        expected: "an array of step objects",
    })?;

    for (idx, step) in steps.iter().enumerate() {
        let n = idx + 1;
        let step = step.as_object().ok_or(PlanError::StepWrongType {
            step: n,
            key: "step".to_string(),
            expected: "an object",
        })?;

        for key in ["cmd", "args", "why"] {
            if !step.contains_key(key) {
                return Err(PlanError::StepMissingKey { step: n, key });
            }
        }

        if !step["cmd"].is_string() {
            return Err(step_type(n, "cmd", "a string"));
        }
        if !step["why"].is_string() {
            return Err(step_type(n, "why", "a string"));
        }
        match step["args"].as_array() {
            Some(args) if args.iter().all(JsonValue::is_string) => {}
            _ => return Err(step_type(n, "args", "an array of strings")),
        }

        for key in ["options", "kwargs"] {
            if let Some(options) = step.get(key) {
                match options.as_object() {
                    Some(map) if map.values().all(JsonValue::is_string) => {}
                    _ => return Err(step_type(n, key, "an object of string values")),
                }
            }
        }
        if step.contains_key("options") && step.contains_key("kwargs") {
            return Err(step_type(n, "options", "given once (not both 'options' and 'kwargs')"));
        }
    }

    Ok(())
}

fn step_type(step: usize, key: &str, expected: &'static str) -> PlanError {
    PlanError::StepWrongType {
        step,
        key: key.to_string(),
        expected,
    }
}
