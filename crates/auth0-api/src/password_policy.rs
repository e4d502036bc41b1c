//! Password strength error descriptions
//!
//! A weak-password rejection carries `description` as an object:
//!
//! ```json
//! {"rules": [{"code": "lengthAtLeast", "verified": false,
//!             "format": [8], "message": "At least %d characters in length"}]}
//! ```
//!
//! Each failed rule's `message` is a printf-style template filled from its
//! `format` array. Charset rules also list their `items[].message`.

use serde_json::{Map, Value};

const LENGTH_AT_LEAST: &str = "lengthAtLeast";
const CONTAINS_AT_LEAST: &str = "containsAtLeast";
const SHOULD_CONTAIN: &str = "shouldContain";
const IDENTICAL_CHARS: &str = "identicalChars";

/// Render the failed rules of a password policy object, joined with "; ".
///
/// Returns `None` when the object has no `rules` array.
pub fn describe(policy: &Map<String, Value>) -> Option<String> {
    let rules = policy.get("rules")?.as_array()?;
    let rendered: Vec<String> = rules
        .iter()
        .filter_map(Value::as_object)
        .filter(|rule| !rule.get("verified").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(describe_rule)
        .collect();
    Some(rendered.join("; "))
}

fn describe_rule(rule: &Map<String, Value>) -> Option<String> {
    let code = rule.get("code")?.as_str()?;
    let message = rule.get("message").and_then(Value::as_str).unwrap_or_default();
    let format: &[Value] = rule
        .get("format")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    match code {
        LENGTH_AT_LEAST | IDENTICAL_CHARS => Some(fill_template(message, format)),
        CONTAINS_AT_LEAST | SHOULD_CONTAIN => {
            let items = rule
                .get("items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.get("message").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            Some(format!("{} {}", fill_template(message, format), items))
        }
        _ => None,
    }
}

/// Substitute `%d` and `%s` placeholders in order. Surplus placeholders
/// are left untouched.
fn fill_template(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%'
            && matches!(chars.peek(), Some('d' | 's'))
            && let Some(arg) = args.next()
        {
            chars.next();
            out.push_str(&render_arg(arg));
            continue;
        }
        out.push(c);
    }
    out
}

fn render_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}
