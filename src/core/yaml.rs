//! core::yaml
//!
//! Parser and canonical emitter for the restricted YAML subset.
//!
//! # Accepted language
//!
//! - Top-level `key: value` entries with no leading indentation
//! - A key with an empty value opens a sequence of `  - <scalar>` lines
//! - Scalars: `[]`, double-quoted strings (standard escapes), single-quoted
//!   strings (verbatim), `true`/`false`/`null`, number literals, bare strings
//! - Comments are forbidden outright, not stripped
//! - Duplicate and empty keys are parse errors
//!
//! # Canonical form
//!
//! Emission writes keys in ascending lexicographic order, quotes exactly the
//! strings that would not survive a round-trip bare, renders integral numbers
//! without a decimal point, and writes one `  - ` line per sequence element.
//!
//! The round-trip law holds for every accepted document `D`:
//! `parse(emit(parse(D))) == parse(D)`, and `emit(v)` is a fixed point of
//! `emit . parse` for every representable value `v`.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::value::{ArrayItem, Value, ValueError};

/// Errors from parsing the YAML subset.
#[derive(Debug, Error, PartialEq)]
pub enum YamlError {
    /// A line is, or contains, a comment.
    #[error("comments are not allowed")]
    CommentsNotAllowed,

    /// A line is indented but is not a sequence item.
    #[error("unexpected indentation at line {0}")]
    UnexpectedIndentation(usize),

    /// A line has no `key: value` shape.
    #[error("line {0} is not key: value")]
    NotKeyValue(usize),

    /// A line has an empty key before the colon.
    #[error("line {0} has empty key")]
    EmptyKey(usize),

    /// The same key appears twice in one document.
    #[error("duplicate key {0:?}")]
    DuplicateKey(String),

    /// A double-quoted string does not unescape cleanly.
    #[error("invalid quoted string: {0}")]
    InvalidQuotedString(String),

    /// A token matched the number pattern but is not a finite 64-bit float.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// A scalar failed to parse on a specific line.
    #[error("line {line}: {source}")]
    Scalar {
        /// 1-based line number.
        line: usize,
        /// The underlying scalar error.
        source: Box<YamlError>,
    },

    /// A sequence under a key violated homogeneity.
    #[error("field {field}: {source}")]
    Sequence {
        /// The key that opened the sequence.
        field: String,
        /// The underlying value error.
        source: ValueError,
    },
}

/// Parse a document into a field map.
///
/// Input is normalized CRLF to LF; blank lines are skipped. The result map
/// is ordered by key, which is also the canonical emission order.
pub fn parse_object(input: &str) -> Result<BTreeMap<String, Value>, YamlError> {
    let text = input.replace("\r\n", "\n");
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = BTreeMap::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_end_matches([' ', '\t']);
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        if line.trim_start().starts_with('#') || line.contains(" #") {
            return Err(YamlError::CommentsNotAllowed);
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(YamlError::UnexpectedIndentation(i + 1));
        }

        let colon = match line.find(':') {
            Some(pos) if pos > 0 => pos,
            _ => return Err(YamlError::NotKeyValue(i + 1)),
        };
        let key = line[..colon].trim();
        let rest = line[colon + 1..].trim();
        if key.is_empty() {
            return Err(YamlError::EmptyKey(i + 1));
        }
        if out.contains_key(key) {
            return Err(YamlError::DuplicateKey(key.to_string()));
        }

        if rest.is_empty() {
            // An empty value opens a sequence; items are exactly "  - <scalar>".
            let mut items = Vec::new();
            i += 1;
            while i < lines.len() {
                let item_line = lines[i].trim_end_matches([' ', '\t']);
                if item_line.trim().is_empty() {
                    i += 1;
                    continue;
                }
                if item_line.trim_start().starts_with('#') || item_line.contains(" #") {
                    return Err(YamlError::CommentsNotAllowed);
                }
                let Some(raw) = item_line.strip_prefix("  - ") else {
                    break;
                };
                let item = parse_scalar(raw.trim()).map_err(|e| YamlError::Scalar {
                    line: i + 1,
                    source: Box::new(e),
                })?;
                items.push(item);
                i += 1;
            }
            let seq = Value::sequence(items).map_err(|e| YamlError::Sequence {
                field: key.to_string(),
                source: e,
            })?;
            out.insert(key.to_string(), seq);
            continue;
        }

        let value = parse_scalar(rest).map_err(|e| YamlError::Scalar {
            line: i + 1,
            source: Box::new(e),
        })?;
        out.insert(key.to_string(), value);
        i += 1;
    }

    Ok(out)
}

/// Parse a single scalar token.
///
/// The merge engine reuses this for manual conflict resolutions.
pub fn parse_scalar(raw: &str) -> Result<Value, YamlError> {
    if raw == "[]" {
        return Ok(Value::Array(vec![]));
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return unquote(&raw[1..raw.len() - 1]).map(Value::String);
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Ok(Value::String(raw[1..raw.len() - 1].to_string()));
    }
    match raw {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }
    if is_number_literal(raw) {
        let n: f64 = raw
            .parse()
            .map_err(|e: std::num::ParseFloatError| YamlError::InvalidNumber(e.to_string()))?;
        if !n.is_finite() {
            return Err(YamlError::InvalidNumber(format!("{raw:?} is out of range")));
        }
        return Ok(Value::Number(n));
    }
    Ok(Value::String(raw.to_string()))
}

/// Emit the canonical form of a field map.
pub fn emit_object(fields: &BTreeMap<String, Value>) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        match value {
            Value::Null => out.push_str(&format!("{key}: null\n")),
            Value::Bool(b) => out.push_str(&format!("{key}: {b}\n")),
            Value::Number(n) => out.push_str(&format!("{key}: {}\n", format_number(*n))),
            Value::String(s) => out.push_str(&format!("{key}: {}\n", render_string(s))),
            Value::Array(items) if items.is_empty() => out.push_str(&format!("{key}: []\n")),
            Value::Array(items) => {
                out.push_str(&format!("{key}:\n"));
                for item in items {
                    match item {
                        ArrayItem::String(s) => {
                            out.push_str(&format!("  - {}\n", render_string(s)))
                        }
                        ArrayItem::Number(n) => {
                            out.push_str(&format!("  - {}\n", format_number(*n)))
                        }
                    }
                }
            }
        }
    }
    out
}

/// Render a single value as it would appear after a colon, for display.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => render_string(s),
        Value::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| match item {
                    ArrayItem::String(s) => render_string(s),
                    ArrayItem::Number(n) => format_number(*n),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}

/// Format a number canonically: integral values have no decimal point,
/// everything else uses the shortest representation that round-trips.
pub fn format_number(n: f64) -> String {
    format!("{n}")
}

/// Check a token against the number literal pattern
/// `[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?`.
fn is_number_literal(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;
    let mut frac_digits = 0;
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
        // A bare leading dot needs at least one digit after it.
        if int_digits == 0 && frac_digits == 0 {
            return false;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        i += 1;
        if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == b.len()
}

/// Decide how a string is written after a colon.
///
/// Strings that would parse back as something else (booleans, null, or a
/// number) and strings containing characters outside `[A-Za-z0-9_./-]` are
/// double-quoted; the empty string is `""`; everything else is bare.
fn render_string(s: &str) -> String {
    if s.is_empty() {
        return "\"\"".to_string();
    }
    let lower = s.to_ascii_lowercase();
    if lower == "true" || lower == "false" || lower == "null" || is_number_literal(s) {
        return quote_string(s);
    }
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-'))
    {
        return s.to_string();
    }
    quote_string(s)
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unquote(inner: &str) -> Result<String, YamlError> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '"' {
            return Err(YamlError::InvalidQuotedString(
                "unescaped quote inside string".to_string(),
            ));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = chars
                        .next()
                        .and_then(|h| h.to_digit(16))
                        .ok_or_else(|| {
                            YamlError::InvalidQuotedString(
                                "\\u requires four hex digits".to_string(),
                            )
                        })?;
                    code = code * 16 + digit;
                }
                let decoded = char::from_u32(code).ok_or_else(|| {
                    YamlError::InvalidQuotedString(format!("invalid code point \\u{code:04x}"))
                })?;
                out.push(decoded);
            }
            Some(other) => {
                return Err(YamlError::InvalidQuotedString(format!(
                    "unsupported escape \\{other}"
                )));
            }
            None => {
                return Err(YamlError::InvalidQuotedString(
                    "trailing backslash".to_string(),
                ));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> BTreeMap<String, Value> {
        parse_object(input).expect("document should parse")
    }

    #[test]
    fn parses_scalars() {
        let fields = parse("name: Platform\ncount: 3\nratio: 0.5\nlive: true\nnote: null\n");
        assert_eq!(fields["name"], Value::String("Platform".into()));
        assert_eq!(fields["count"], Value::Number(3.0));
        assert_eq!(fields["ratio"], Value::Number(0.5));
        assert_eq!(fields["live"], Value::Bool(true));
        assert_eq!(fields["note"], Value::Null);
    }

    #[test]
    fn parses_quoted_strings() {
        let fields = parse("a: \"true\"\nb: '123'\nc: \"line\\nbreak\"\n");
        assert_eq!(fields["a"], Value::String("true".into()));
        assert_eq!(fields["b"], Value::String("123".into()));
        assert_eq!(fields["c"], Value::String("line\nbreak".into()));
    }

    #[test]
    fn parses_sequences() {
        let fields = parse("ports:\n  - 443\n  - 8443\nempty: []\n");
        assert_eq!(
            fields["ports"],
            Value::Array(vec![ArrayItem::Number(443.0), ArrayItem::Number(8443.0)])
        );
        assert_eq!(fields["empty"], Value::Array(vec![]));
    }

    #[test]
    fn sequence_ends_at_unindented_line() {
        let fields = parse("tags:\n  - a\nname: x\n");
        assert_eq!(fields["tags"], Value::Array(vec![ArrayItem::String("a".into())]));
        assert_eq!(fields["name"], Value::String("x".into()));
    }

    #[test]
    fn key_with_no_items_is_empty_sequence() {
        let fields = parse("tags:\nname: x\n");
        assert_eq!(fields["tags"], Value::Array(vec![]));
    }

    #[test]
    fn crlf_is_normalized() {
        let fields = parse("name: x\r\ncode: y\r\n");
        assert_eq!(fields["name"], Value::String("x".into()));
        assert_eq!(fields["code"], Value::String("y".into()));
    }

    #[test]
    fn comments_are_rejected() {
        assert_eq!(
            parse_object("# header\nname: x\n"),
            Err(YamlError::CommentsNotAllowed)
        );
        assert_eq!(
            parse_object("name: x # trailing\n"),
            Err(YamlError::CommentsNotAllowed)
        );
    }

    #[test]
    fn duplicate_key_rejected() {
        assert_eq!(
            parse_object("name: a\nname: b\n"),
            Err(YamlError::DuplicateKey("name".into()))
        );
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(parse_object(" : x\n"), Err(YamlError::UnexpectedIndentation(1)));
        assert_eq!(parse_object(":x\n"), Err(YamlError::NotKeyValue(1)));
    }

    #[test]
    fn nested_mapping_rejected() {
        // A nested map looks like indentation that is not a sequence item.
        assert_eq!(
            parse_object("outer:\n  inner: x\n"),
            Err(YamlError::UnexpectedIndentation(2))
        );
    }

    #[test]
    fn mixed_sequence_rejected() {
        let err = parse_object("bad:\n  - 1\n  - two\n").unwrap_err();
        assert!(matches!(err, YamlError::Sequence { ref field, .. } if field == "bad"));
    }

    #[test]
    fn boolean_sequence_rejected() {
        let err = parse_object("bad:\n  - true\n").unwrap_err();
        assert!(matches!(err, YamlError::Sequence { .. }));
    }

    #[test]
    fn huge_exponent_rejected() {
        assert!(matches!(
            parse_object("n: 1e999\n"),
            Err(YamlError::Scalar { .. })
        ));
    }

    #[test]
    fn emits_keys_in_lexicographic_order() {
        let fields = parse(
            "name: Platform\ncode: PLAT\n_type: team\n_id: 11111111-1111-4111-8111-111111111111\n",
        );
        assert_eq!(
            emit_object(&fields),
            "_id: 11111111-1111-4111-8111-111111111111\n_type: team\ncode: PLAT\nname: Platform\n"
        );
    }

    #[test]
    fn emits_quoting_rules() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), Value::String(String::new()));
        fields.insert("b".to_string(), Value::String("true".into()));
        fields.insert("c".to_string(), Value::String("123".into()));
        fields.insert("d".to_string(), Value::String("has space".into()));
        fields.insert("e".to_string(), Value::String("a/b.c-d_e".into()));
        assert_eq!(
            emit_object(&fields),
            "a: \"\"\nb: \"true\"\nc: \"123\"\nd: \"has space\"\ne: a/b.c-d_e\n"
        );
    }

    #[test]
    fn emits_numbers_canonically() {
        let mut fields = BTreeMap::new();
        fields.insert("int".to_string(), Value::Number(443.0));
        fields.insert("neg".to_string(), Value::Number(-2.0));
        fields.insert("frac".to_string(), Value::Number(0.5));
        assert_eq!(emit_object(&fields), "frac: 0.5\nint: 443\nneg: -2\n");
    }

    #[test]
    fn round_trip_is_stable() {
        let doc = "code: PLAT\nname: \"true\"\nports:\n  - 443\n  - 8443\nratio: 0.25\n";
        let once = parse(doc);
        let emitted = emit_object(&once);
        let twice = parse(&emitted);
        assert_eq!(once, twice);
        assert_eq!(emit_object(&twice), emitted);
    }

    #[test]
    fn number_literal_pattern() {
        for ok in ["1", "+1", "-1", "1.", "1.5", ".5", "1e5", "1E-5", "1.5e+10"] {
            assert!(is_number_literal(ok), "{ok} should match");
        }
        for bad in ["", ".", "e5", "1e", "1.5.5", "--1", "1f", "0x10"] {
            assert!(!is_number_literal(bad), "{bad} should not match");
        }
    }
}
