//! Colourised pretty printing of JSON values.
//!
//! Layout matches `serde_json::to_string_pretty` exactly, so with colours
//! disabled the two are interchangeable.

use std::fmt::Write;

use colored::Colorize;
use serde_json::Value;

const INDENT: &str = "  ";

/// Render `value` as indented JSON with syntax colouring.
pub fn colorize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Null => push(out, "null".white()),
        Value::Bool(b) => push(out, b.to_string().cyan()),
        Value::Number(n) => push(out, n.to_string().green()),
        Value::String(s) => push(out, quoted(s).yellow()),
        Value::Array(items) => {
            if items.is_empty() {
                push(out, "[]".dimmed());
                return;
            }
            push(out, "[".dimmed());
            for (i, item) in items.iter().enumerate() {
                separator(out, i, depth + 1);
                write_value(out, item, depth + 1);
            }
            newline(out, depth);
            push(out, "]".dimmed());
        }
        Value::Object(map) => {
            if map.is_empty() {
                push(out, "{}".dimmed());
                return;
            }
            push(out, "{".dimmed());
            for (i, (key, item)) in map.iter().enumerate() {
                separator(out, i, depth + 1);
                push(out, quoted(key).magenta());
                push(out, ":".dimmed());
                out.push(' ');
                write_value(out, item, depth + 1);
            }
            newline(out, depth);
            push(out, "}".dimmed());
        }
    }
}

fn separator(out: &mut String, index: usize, depth: usize) {
    if index > 0 {
        push(out, ",".dimmed());
    }
    newline(out, depth);
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn push(out: &mut String, text: colored::ColoredString) {
    // Writing to a String cannot fail.
    let _ = write!(out, "{text}");
}

/// JSON-escaped, quoted form of a string.
fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
