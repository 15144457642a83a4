//! Variable resolution over step configuration and return templates.
//!
//! Two distinct modes operate at the string level and are never unified;
//! type preservation depends on the split:
//!
//! - **Whole-value**: a string that *is* a single reference (`"$stepResult.out.tags"`)
//!   resolves to the typed referent; objects, arrays, numbers, and booleans
//!   survive unchanged.
//! - **Interpolation**: a string that *contains* references
//!   (`"Hello $input.user.name!"`) has each occurrence replaced by the
//!   referent's string form; unresolved references stay verbatim.
//!
//! Containers resolve element-wise and recursively. `$$`-prefixed tokens are
//! escapes and pass through untouched.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::context::{ExecutionContext, JsonMap};

/// Reference prefix for process environment variables.
const ENV_PREFIX: &str = "env";
/// Reference prefix for the execution input.
const INPUT_PREFIX: &str = "input";
/// Reference prefix for stored step results.
const STEP_RESULT_PREFIX: &str = "stepResult";

fn whole_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*$").unwrap()
    })
}

fn interpolation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\$|\$[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*").unwrap()
    })
}

/// Borrowed view of the resolvable state of an execution.
#[derive(Debug, Clone, Copy)]
pub struct ResolveScope<'a> {
    /// The execution input (`$input.*`)
    pub input: &'a Value,
    /// Stored step results (`$stepResult.*` and the legacy `$<var>.*` alias)
    pub variables: &'a JsonMap,
}

impl<'a> ResolveScope<'a> {
    /// Create a scope from raw parts.
    #[must_use]
    pub fn new(input: &'a Value, variables: &'a JsonMap) -> Self {
        Self { input, variables }
    }

    /// Create a scope over an execution context.
    #[must_use]
    pub fn from_context(ctx: &'a ExecutionContext) -> Self {
        Self {
            input: &ctx.input,
            variables: &ctx.variables,
        }
    }
}

/// Resolve a template value against a scope.
///
/// Strings go through whole-value or interpolation resolution; arrays and
/// mappings resolve element-wise; other primitives are returned as-is.
/// Undefined whole-value references resolve to [`Value::Null`].
#[must_use]
pub fn resolve(template: &Value, scope: &ResolveScope<'_>) -> Value {
    match template {
        Value::String(text) => resolve_string(text, scope),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, scope)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| (key.clone(), resolve(val, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve a template against an execution context.
#[must_use]
pub fn resolve_in_context(template: &Value, ctx: &ExecutionContext) -> Value {
    resolve(template, &ResolveScope::from_context(ctx))
}

fn resolve_string(text: &str, scope: &ResolveScope<'_>) -> Value {
    if is_whole_reference(text) {
        return lookup(&text[1..], scope).unwrap_or(Value::Null);
    }

    if !text.contains('$') {
        return Value::String(text.to_string());
    }

    let replaced = interpolation_re().replace_all(text, |caps: &regex::Captures<'_>| {
        let token = &caps[0];
        if token == "$$" {
            return token.to_string();
        }
        match lookup(&token[1..], scope) {
            Some(value) => stringify(&value),
            None => token.to_string(),
        }
    });

    Value::String(replaced.into_owned())
}

/// Whether a string is a single bare reference eligible for typed resolution.
#[must_use]
pub fn is_whole_reference(text: &str) -> bool {
    !text.starts_with("$$") && whole_reference_re().is_match(text)
}

/// Look up a dotted reference path (without the leading `$`).
///
/// Returns `None` for undefined paths and for paths descending through
/// non-container nodes.
#[must_use]
pub fn lookup(path: &str, scope: &ResolveScope<'_>) -> Option<Value> {
    let mut segments = path.split('.');
    let head = segments.next()?;

    match head {
        ENV_PREFIX => {
            let name = segments.next()?;
            let value = std::env::var(name).ok()?;
            if segments.next().is_some() {
                // Environment values are flat strings; deeper paths miss.
                None
            } else {
                Some(Value::String(value))
            }
        }
        INPUT_PREFIX => descend(scope.input, segments),
        STEP_RESULT_PREFIX => {
            let var = segments.next()?;
            descend(scope.variables.get(var)?, segments)
        }
        var => descend(scope.variables.get(var)?, segments),
    }
}

fn descend<'a>(base: &Value, segments: impl Iterator<Item = &'a str>) -> Option<Value> {
    let mut current = base;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
