use serde::Deserialize;
use serde_json::{error::Category, Value};
use std::fmt;

use crate::transport::RemoteCommandResult;

pub const MSG_WRONG_TOKEN: &str = "Invalid OP-FW configuration. Wrong token?";
pub const MSG_UNKNOWN_ERROR: &str = "Unknown error";
pub const MSG_DEFAULT_SUCCESS: &str = "Successfully executed route";

/// Deepest array/object nesting accepted in a response body.
pub const MAX_JSON_DEPTH: usize = 512;

/// Why a response body failed to parse as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonErrorKind {
    None,
    Depth,
    StateMismatch,
    ControlCharacter,
    Syntax,
    Utf8,
    Unknown,
}

impl JsonErrorKind {
    /// Categorize a parse error. `text` is the input that failed, used to
    /// tell a mismatched closer apart from other syntax errors.
    pub fn from_serde(err: &serde_json::Error, text: &str) -> Self {
        let msg = err.to_string();
        if msg.contains("recursion limit") {
            return JsonErrorKind::Depth;
        }
        if msg.contains("control character") {
            return JsonErrorKind::ControlCharacter;
        }
        // Bad UTF-16 escapes have no category of their own upstream.
        if msg.contains("surrogate") || msg.contains("hex escape") || msg.contains("unicode code point") {
            return JsonErrorKind::Unknown;
        }
        if msg.contains("UTF-8") {
            return JsonErrorKind::Utf8;
        }
        let wrong_closer = if msg.contains("expected `,` or `}`") {
            Some(b']')
        } else if msg.contains("expected `,` or `]`") {
            Some(b'}')
        } else {
            None
        };
        if let Some(closer) = wrong_closer {
            if byte_near_column(text, err.column(), closer) {
                return JsonErrorKind::StateMismatch;
            }
        }
        match err.classify() {
            Category::Syntax | Category::Eof => JsonErrorKind::Syntax,
            Category::Data | Category::Io => JsonErrorKind::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            JsonErrorKind::None => "No errors",
            JsonErrorKind::Depth => "Maximum stack depth exceeded",
            JsonErrorKind::StateMismatch => "Underflow or the modes mismatch",
            JsonErrorKind::ControlCharacter => "Unexpected control character found",
            JsonErrorKind::Syntax => "Syntax error, malformed JSON",
            JsonErrorKind::Utf8 => "Malformed UTF-8 characters, possibly incorrectly encoded",
            JsonErrorKind::Unknown => "Unknown error",
        }
    }
}

/// Whether `byte` sits at the 1-based `column` of single-line `text`, or
/// right before it.
fn byte_near_column(text: &str, column: usize, byte: u8) -> bool {
    let bytes = text.as_bytes();
    [column.checked_sub(1), column.checked_sub(2)]
        .into_iter()
        .flatten()
        .any(|i| bytes.get(i) == Some(&byte))
}

/// Maximum array/object nesting, ignoring brackets inside strings.
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for b in text.bytes() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                max = max.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

/// Parse with the upstream decoder's depth limit instead of serde_json's
/// default. Deep input grows the stack on the heap rather than overflowing.
fn parse_json(text: &str) -> Result<Value, JsonErrorKind> {
    if nesting_depth(text) > MAX_JSON_DEPTH {
        return Err(JsonErrorKind::Depth);
    }

    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let parsed = Value::deserialize(serde_stacker::Deserializer::new(&mut de));

    match parsed.and_then(|value| de.end().map(|_| value)) {
        Ok(value) => Ok(value),
        Err(err) => Err(JsonErrorKind::from_serde(&err, text)),
    }
}

impl fmt::Display for JsonErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Drop control characters and anything outside 7-bit ASCII.
///
/// The upstream service occasionally leaks stray bytes into otherwise
/// valid JSON strings. DEL (0x7F) is kept.
pub fn strip_invalid_chars(body: &str) -> String {
    body.chars()
        .filter(|c| {
            let cp = *c as u32;
            (0x20..0x80).contains(&cp)
        })
        .collect()
}

/// Turn a raw response body into a normalized result. Pure.
pub fn classify(body: &str) -> RemoteCommandResult {
    let cleaned = strip_invalid_chars(body);

    let json = match parse_json(&cleaned) {
        Ok(v) => v,
        Err(kind) => return route_failure(format!("Invalid response json: {}", kind)),
    };

    let code = match json.get("statusCode").and_then(loose_int) {
        Some(code) => code,
        None => return route_failure("Invalid server response 0"),
    };

    match code {
        401 => RemoteCommandResult::failure(MSG_WRONG_TOKEN),
        400 | 403 | 404 => RemoteCommandResult::failure(
            non_empty_message(json.get("message")).unwrap_or_else(|| MSG_UNKNOWN_ERROR.to_string()),
        ),
        200..=299 => {
            let message = match non_empty_message(json.get("message")) {
                Some(m) => format!("Success: {}", m),
                None => MSG_DEFAULT_SUCCESS.to_string(),
            };
            let data = json.get("data").filter(|d| !d.is_null()).cloned();
            RemoteCommandResult::success(message, data)
        }
        other => route_failure(format!("Unknown server response {}", other)),
    }
}

fn route_failure(reason: impl fmt::Display) -> RemoteCommandResult {
    RemoteCommandResult::failure(format!("Failed to execute route: \"{}\"", reason))
}

/// Integer coercion of a `statusCode` value. `null` counts as absent.
fn loose_int(v: &Value) -> Option<i64> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => Some(n.as_i64().unwrap_or_else(|| n.as_f64().map(|f| f as i64).unwrap_or(0))),
        Value::String(s) => Some(leading_int(s)),
        Value::Array(a) => Some(i64::from(!a.is_empty())),
        Value::Object(o) => Some(i64::from(!o.is_empty())),
    }
}

fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// Message text, treating `null`, `""`, `"0"`, `0`, `false` and empty
/// containers as missing. `true` renders as `1`.
fn non_empty_message(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() || s == "0" => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        Value::Bool(true) => Some("1".to_string()),
        other => Some(other.to_string()),
    }
}
