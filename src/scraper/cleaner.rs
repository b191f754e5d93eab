
use crate::models::Value;

/// Placeholder the finance pages print for missing figures.
pub const MISSING_PLACEHOLDER: &str = "--";

/// Width of mainland security codes.
pub const CODE_WIDTH: usize = 6;

// ── Text ─────────────────────────────────────────────────────────────────────

/// Blank out every "--" in a page body before it is parsed.
pub fn strip_placeholders(body: &str) -> String {
    body.replace(MISSING_PLACEHOLDER, "")
}

/// Parse a cell: blank → Empty, plain decimal literal → Number, else Text.
/// "12.50" → 12.5 | "" → Empty | "10派1.5" → Text
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Empty;
    }
    if looks_numeric(s) {
        if let Ok(n) = s.parse::<f64>() {
            return Value::Number(n);
        }
    }
    Value::Text(s.to_string())
}

// f64::from_str also takes "inf" and "NaN", which are names here, not numbers.
fn looks_numeric(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

// ── Column fix-ups ───────────────────────────────────────────────────────────

/// Left-pad a security code with zeros: 1 → "000001", "600" → "000600".
pub fn zero_pad(value: &Value, width: usize) -> Value {
    match value {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => {
            Value::Text(format!("{:0width$}", *n as u64, width = width))
        }
        Value::Text(s) => Value::Text(format!("{:0>width$}", s.trim(), width = width)),
        other => other.clone(),
    }
}

/// Epoch milliseconds → whole epoch seconds (truncating).
pub fn millis_to_secs(value: &Value) -> Value {
    match value {
        Value::Number(ms) => Value::Number((ms / 1000.0).trunc()),
        other => other.clone(),
    }
}

// ── JSON ─────────────────────────────────────────────────────────────────────

pub fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Empty,
        serde_json::Value::Bool(b) => Value::Text(b.to_string()),
        serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Empty),
        serde_json::Value::String(s) if s.trim().is_empty() => Value::Empty,
        serde_json::Value::String(s) => Value::Text(s.clone()),
        nested => Value::Text(nested.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
