// ── Value decoding ──
//
// Raw protocol value → display text. Enumeration lookup wins over
// factor scaling, which wins over plain stringification.

use emberlink_api::{ParameterContents, Value};

/// Decode the current value of a parameter for display.
///
/// - With an enumeration: the label at index = raw value. Reals without
///   a fractional part index like integers. Out-of-range, negative or
///   fractional raw values decode to `""`.
/// - With a non-zero factor: `raw / factor` as shortest decimal text.
/// - Otherwise the raw value as text, `""` when absent.
pub fn decode(contents: &ParameterContents) -> String {
    let Some(raw) = contents.value.as_ref() else {
        return String::new();
    };

    if let Some(labels) = contents.enumeration.as_ref() {
        return enumeration_index(raw)
            .and_then(|index| labels.get(index))
            .cloned()
            .unwrap_or_default();
    }

    match contents.factor {
        Some(factor) if factor != 0 => scale(raw, factor),
        _ => raw.to_string(),
    }
}

#[allow(
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn enumeration_index(raw: &Value) -> Option<usize> {
    match raw {
        Value::Integer(i) => usize::try_from(*i).ok(),
        Value::Real(r) if r.is_finite() && *r >= 0.0 && r.fract() == 0.0 => Some(*r as usize),
        Value::Real(_) | Value::Boolean(_) | Value::String(_) => None,
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn scale(raw: &Value, factor: i64) -> String {
    match raw.as_f64() {
        Some(number) => Value::Real(number / factor as f64).to_string(),
        None => String::new(),
    }
}
