// ── Value writer ──
//
// Validates and clamps caller-supplied values before issuing a set
// command. Every variant looks the target up live on the provider; the
// target does not have to be monitored. Writers never touch the state
// store: the applied value arrives later as a push.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use emberlink_api::{ParameterKind, Provider, QualifiedPath, TreeNode, Value};

use crate::error::CoreError;
use crate::store::ParameterRegistry;

// ── Targets and values ───────────────────────────────────────────────

/// What a write addresses: a raw tree path or a monitored label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteTarget {
    Path(QualifiedPath),
    Label(String),
}

impl WriteTarget {
    /// Numeric paths (`1.2.3`, `1/2/3`) address the tree directly;
    /// anything else is taken as a monitored label.
    pub fn parse(text: &str) -> Self {
        match text.parse::<QualifiedPath>() {
            Ok(path) if !path.is_root() => Self::Path(path),
            _ => Self::Label(text.to_owned()),
        }
    }
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// A typed value for [`ValueWriter::set_absolute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum WriteValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
    Enum(i64),
}

impl WriteValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Integer(_) => ParameterKind::Integer,
            Self::Real(_) => ParameterKind::Real,
            Self::Boolean(_) => ParameterKind::Boolean,
            Self::String(_) => ParameterKind::String,
            Self::Enum(_) => ParameterKind::Enum,
        }
    }

    /// Parse user text as a value of `kind`.
    pub fn parse(kind: ParameterKind, text: &str) -> Result<Self, CoreError> {
        let text = text.trim();
        let invalid = || CoreError::ValidationFailed {
            message: format!("'{text}' is not a valid {kind} value"),
        };
        Ok(match kind {
            ParameterKind::Integer => Self::Integer(text.parse().map_err(|_| invalid())?),
            ParameterKind::Enum => Self::Enum(text.parse().map_err(|_| invalid())?),
            ParameterKind::Real => Self::Real(text.parse().map_err(|_| invalid())?),
            ParameterKind::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Self::Boolean(true),
                "false" | "off" | "0" => Self::Boolean(false),
                _ => return Err(invalid()),
            },
            ParameterKind::String => Self::String(text.to_owned()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StepDirection {
    Increment,
    Decrement,
}

// ── Outcomes ─────────────────────────────────────────────────────────

/// Why a write was not issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The target does not resolve to a parameter.
    NotFound,
    /// The value kind does not fit the parameter's declared kind.
    TypeMismatch {
        requested: ParameterKind,
        actual: ParameterKind,
    },
    /// The operation needs a bound the parameter does not declare.
    MissingBound,
    /// A numeric operand (current value or resolved template) is not a number.
    NotNumeric,
    /// Toggle on a parameter whose current value is not a boolean.
    NotBoolean,
}

/// Result of a write operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// A set command carrying this raw value was sent.
    Written(Value),
    Skipped(SkipReason),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

// ── Template resolution ──────────────────────────────────────────────

/// Expands a value template (placeholders, variables) into text.
pub trait TemplateResolver: Send + Sync {
    fn resolve(&self, template: &str) -> String;
}

impl<F> TemplateResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, template: &str) -> String {
        self(template)
    }
}

/// Resolver that returns templates unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl TemplateResolver for Verbatim {
    fn resolve(&self, template: &str) -> String {
        template.to_owned()
    }
}

// ── ValueWriter ──────────────────────────────────────────────────────

pub struct ValueWriter<'a, P: Provider> {
    provider: &'a P,
    registry: &'a ParameterRegistry,
}

impl<'a, P: Provider> ValueWriter<'a, P> {
    pub fn new(provider: &'a P, registry: &'a ParameterRegistry) -> Self {
        Self { provider, registry }
    }

    /// Write a typed value. Integers without an enumeration are clamped
    /// into the declared bounds.
    pub async fn set_absolute(
        &self,
        target: &WriteTarget,
        value: WriteValue,
    ) -> Result<WriteOutcome, CoreError> {
        let Some(node) = self.lookup(target).await? else {
            return Ok(not_found(target));
        };
        let Some(contents) = node.as_parameter() else {
            return Ok(not_found(target));
        };

        let requested = value.kind();
        if !kind_accepts(contents.kind, requested) {
            warn!(
                parameter = %target,
                requested = %requested,
                actual = %contents.kind,
                "parameter is not of the requested type"
            );
            return Ok(WriteOutcome::Skipped(SkipReason::TypeMismatch {
                requested,
                actual: contents.kind,
            }));
        }

        let raw = match value {
            WriteValue::Integer(i) if contents.enumeration.is_none() => {
                let minimum = contents.minimum.as_ref();
                Value::Integer(clamp_integer(i, minimum, contents.maximum.as_ref()))
            }
            WriteValue::Integer(i) | WriteValue::Enum(i) => Value::Integer(i),
            WriteValue::Real(r) => Value::Real(r),
            WriteValue::Boolean(b) => Value::Boolean(b),
            WriteValue::String(s) => Value::String(s),
        };
        self.send(&node, raw).await
    }

    /// Resolve `template`, clamp the number it yields into the declared
    /// bounds and write it. Requires a declared maximum.
    ///
    /// Comparison against the bounds is numeric: a resolved `"9"` is below
    /// a maximum of `10`.
    pub async fn set_expression(
        &self,
        target: &WriteTarget,
        template: &str,
        resolver: &dyn TemplateResolver,
    ) -> Result<WriteOutcome, CoreError> {
        let Some(node) = self.lookup(target).await? else {
            return Ok(not_found(target));
        };
        let Some(contents) = node.as_parameter() else {
            return Ok(not_found(target));
        };

        let Some(maximum) = contents
            .maximum
            .as_ref()
            .and_then(|v| numeric_bound(contents.kind, v, f64::floor))
        else {
            warn!(parameter = %target, "parameter declares no maximum, not an integer or enum");
            return Ok(WriteOutcome::Skipped(SkipReason::MissingBound));
        };

        let resolved = resolver.resolve(template);
        debug!(parameter = %target, template, resolved = %resolved, "resolved value template");
        let Ok(number) = resolved.trim().parse::<f64>() else {
            warn!(parameter = %target, resolved = %resolved, "resolved template is not a number");
            return Ok(WriteOutcome::Skipped(SkipReason::NotNumeric));
        };
        if !number.is_finite() {
            warn!(parameter = %target, resolved = %resolved, "resolved template is not a finite number");
            return Ok(WriteOutcome::Skipped(SkipReason::NotNumeric));
        }

        let minimum = contents
            .minimum
            .as_ref()
            .and_then(|v| numeric_bound(contents.kind, v, f64::ceil));
        let clamped = if number > maximum {
            maximum
        } else {
            match minimum {
                Some(min) if number < min => min,
                _ => number,
            }
        };
        self.send(&node, numeric_value(contents.kind, clamped)).await
    }

    /// Move the current value by `delta` towards the bound for
    /// `direction`. Crossing the bound writes exactly the bound.
    pub async fn step(
        &self,
        target: &WriteTarget,
        delta: f64,
        direction: StepDirection,
    ) -> Result<WriteOutcome, CoreError> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(CoreError::ValidationFailed {
                message: format!("step delta must be a non-negative number, got {delta}"),
            });
        }

        let Some(node) = self.lookup(target).await? else {
            return Ok(not_found(target));
        };
        let Some(contents) = node.as_parameter() else {
            return Ok(not_found(target));
        };

        let (bound, round): (_, fn(f64) -> f64) = match direction {
            StepDirection::Increment => (contents.maximum.as_ref(), f64::floor),
            StepDirection::Decrement => (contents.minimum.as_ref(), f64::ceil),
        };
        let Some(bound) = bound.and_then(|v| numeric_bound(contents.kind, v, round)) else {
            warn!(parameter = %target, direction = %direction, "parameter declares no bound for this direction");
            return Ok(WriteOutcome::Skipped(SkipReason::MissingBound));
        };
        let Some(current) = contents.value.as_ref().and_then(Value::as_f64) else {
            warn!(parameter = %target, "current value is not numeric");
            return Ok(WriteOutcome::Skipped(SkipReason::NotNumeric));
        };

        let next = match direction {
            StepDirection::Increment => (current + delta).min(bound),
            StepDirection::Decrement => (current - delta).max(bound),
        };
        self.send(&node, numeric_value(contents.kind, next)).await
    }

    /// Flip a boolean parameter.
    pub async fn toggle(&self, target: &WriteTarget) -> Result<WriteOutcome, CoreError> {
        let Some(node) = self.lookup(target).await? else {
            return Ok(not_found(target));
        };

        let Some(contents) = node.as_parameter() else {
            return Ok(not_found(target));
        };

        let Some(&Value::Boolean(current)) = contents.value.as_ref() else {
            warn!(parameter = %target, "parameter is not of type boolean");
            return Ok(WriteOutcome::Skipped(SkipReason::NotBoolean));
        };
        self.send(&node, Value::Boolean(!current)).await
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Resolve `target` to a live node. Unknown labels and unknown paths
    /// come back as `None`.
    async fn lookup(&self, target: &WriteTarget) -> Result<Option<TreeNode>, CoreError> {
        let path = match target {
            WriteTarget::Path(path) => path.clone(),
            WriteTarget::Label(label) => match self.registry.find_by_label(label) {
                Some(entry) => entry.path.clone(),
                None => return Ok(None),
            },
        };

        match self.provider.resolve(&path).await {
            Ok(node) => Ok(node),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&self, node: &TreeNode, value: Value) -> Result<WriteOutcome, CoreError> {
        debug!(path = %node.path, value = %value, "writing value");
        self.provider.write(node, value.clone()).await?;
        Ok(WriteOutcome::Written(value))
    }
}

fn not_found(target: &WriteTarget) -> WriteOutcome {
    warn!(parameter = %target, "parameter not found or not a parameter");
    WriteOutcome::Skipped(SkipReason::NotFound)
}

/// Integer and enum parameters both carry integer raw values and accept
/// either kind; every other kind must match exactly.
fn kind_accepts(actual: ParameterKind, requested: ParameterKind) -> bool {
    use ParameterKind::{Enum, Integer};
    actual == requested || matches!((actual, requested), (Integer, Enum) | (Enum, Integer))
}

/// Clamp against the declared bounds; the maximum is checked first.
fn clamp_integer(value: i64, minimum: Option<&Value>, maximum: Option<&Value>) -> i64 {
    if let Some(max) = maximum.and_then(|v| integer_bound(v, f64::floor)) {
        if value > max {
            return max;
        }
    }
    if let Some(min) = minimum.and_then(|v| integer_bound(v, f64::ceil)) {
        if value < min {
            return min;
        }
    }
    value
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn integer_bound(bound: &Value, round: fn(f64) -> f64) -> Option<i64> {
    match bound {
        Value::Integer(i) => Some(*i),
        Value::Real(r) if r.is_finite() => Some(round(*r) as i64),
        _ => None,
    }
}

/// A declared bound as a number. For integer-valued kinds a fractional
/// bound is rounded inwards with `round`, so the rounded write stays
/// within it.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn numeric_bound(kind: ParameterKind, bound: &Value, round: fn(f64) -> f64) -> Option<f64> {
    match kind {
        ParameterKind::Integer | ParameterKind::Enum => {
            integer_bound(bound, round).map(|b| b as f64)
        }
        ParameterKind::Real | ParameterKind::Boolean | ParameterKind::String => bound.as_f64(),
    }
}

/// Raw value of `kind` for a computed number. Integer-valued kinds are
/// rounded to the nearest integer.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn numeric_value(kind: ParameterKind, number: f64) -> Value {
    match kind {
        ParameterKind::Integer | ParameterKind::Enum => Value::Integer(number.round() as i64),
        ParameterKind::Real | ParameterKind::Boolean | ParameterKind::String => Value::Real(number),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn target_parses_paths_and_labels() {
        assert_eq!(
            WriteTarget::parse("1/2/3"),
            WriteTarget::Path("1.2.3".parse().unwrap())
        );
        assert_eq!(
            WriteTarget::parse("Audio.Gain"),
            WriteTarget::Label("Audio.Gain".into())
        );
        assert_eq!(WriteTarget::parse(""), WriteTarget::Label(String::new()));
    }

    #[test]
    fn write_value_parses_by_kind() {
        assert_eq!(
            WriteValue::parse(ParameterKind::Boolean, "On").unwrap(),
            WriteValue::Boolean(true)
        );
        assert_eq!(
            WriteValue::parse(ParameterKind::Real, "-3.5").unwrap(),
            WriteValue::Real(-3.5)
        );
        assert!(WriteValue::parse(ParameterKind::Integer, "loud").is_err());
    }

    #[test]
    fn clamp_applies_each_declared_bound() {
        let min = Value::Integer(-10);
        let max = Value::Integer(10);
        assert_eq!(clamp_integer(50, Some(&min), Some(&max)), 10);
        assert_eq!(clamp_integer(-50, Some(&min), Some(&max)), -10);
        assert_eq!(clamp_integer(3, Some(&min), Some(&max)), 3);
        assert_eq!(clamp_integer(50, None, None), 50);
        assert_eq!(clamp_integer(-50, None, Some(&max)), -50);
    }

    #[test]
    fn real_bounds_round_inwards_for_integers() {
        let min = Value::Real(-0.5);
        let max = Value::Real(9.5);
        assert_eq!(clamp_integer(20, Some(&min), Some(&max)), 9);
        assert_eq!(clamp_integer(-20, Some(&min), Some(&max)), 0);
    }

    #[test]
    fn integer_and_enum_are_interchangeable() {
        assert!(kind_accepts(ParameterKind::Enum, ParameterKind::Integer));
        assert!(kind_accepts(ParameterKind::Integer, ParameterKind::Enum));
        assert!(!kind_accepts(ParameterKind::Real, ParameterKind::Integer));
        assert!(!kind_accepts(ParameterKind::Integer, ParameterKind::Boolean));
    }

    #[test]
    fn closures_resolve_templates() {
        let resolver = |template: &str| template.replace("$(level)", "7");
        assert_eq!(resolver.resolve("$(level)"), "7");
        assert_eq!(Verbatim.resolve("$(level)"), "$(level)");
    }
}
