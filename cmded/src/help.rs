//! Help trees and the default renderer.
//!
//! A help tree is a JSON object. Keys starting with `@` carry metadata
//! (`@usage`, `@title`, `@see`, `@examples`, `@notes`); every other key
//! names an option (`|` separates aliases) and maps either to its
//! description or to the nested tree of a sub-command.

use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::context::RunContext;
use crate::error::{Error, Result};

const MAX_COL_WIDTH: usize = 79;
const INDENT: usize = 4;

/// Entry for `path` in `full`, or `full` itself when the path is empty or
/// has no entry.
pub fn sub_help<'a>(full: &'a Value, path: &str) -> &'a Value {
    if path.is_empty() {
        return full;
    }
    crate::path::get(full, path).unwrap_or(full)
}

/// Default renderer: writes to stdout.
pub fn print(sub: &Value, _full: &Value, path: &str, context: &RunContext) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render(
        &mut out,
        sub,
        path,
        &program_name(),
        context.root_options().help_pattern(),
    )
}

/// Basename of the running executable.
pub fn program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn render<W: Write>(
    out: &mut W,
    help: &Value,
    path: &str,
    program: &str,
    help_argument: Option<&str>,
) -> Result<()> {
    let empty = serde_json::Map::new();
    let (tree, text) = match help {
        Value::Object(tree) => (tree, None),
        Value::String(text) => (&empty, Some(text.as_str())),
        Value::Null => (&empty, None),
        other => return Err(Error::Help(format!("cannot render {other} as help"))),
    };

    match tree.get("@usage").and_then(Value::as_str) {
        Some(usage) => writeln!(out, "Usage: {usage}")?,
        None if path.is_empty() => writeln!(out, "Usage: {program} [options]")?,
        None => writeln!(out, "Usage: {program} {} [options]", path.replace('.', " "))?,
    }

    if let Some(title) = tree.get("@title").and_then(Value::as_str) {
        write!(out, "\n{}\n", title.trim())?;
    }
    if let Some(text) = text {
        writeln!(out)?;
        write_indented(out, text, INDENT)?;
        return Ok(());
    }

    writeln!(out, "\nOptions:")?;

    let mut keys: Vec<&String> = tree.keys().filter(|key| !key.starts_with('@')).collect();
    keys.sort();

    for key in keys {
        for alias in key.split('|').map(str::trim) {
            writeln!(out, "  {alias}:")?;
        }

        match &tree[key.as_str()] {
            Value::Array(_) => {
                return Err(Error::Help(format!(
                    "\"{key}\": an array does not make sense as an option description"
                )))
            }
            Value::Object(sub) => {
                let title = match sub.get("@title").and_then(Value::as_str) {
                    Some(title) => title.to_string(),
                    None => {
                        let article = match key.chars().next().map(|c| c.to_ascii_lowercase()) {
                            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
                            _ => "a",
                        };
                        format!("Invoke {article} \"{key}\" sub-command.")
                    }
                };
                write_indented(out, &title, INDENT)?;

                let see = match (sub.get("@see").and_then(Value::as_str), help_argument) {
                    (Some(see), _) => Some(see.to_string()),
                    (None, Some(arg)) => {
                        Some(format!("See: '{program} {key} {arg}' for more help"))
                    }
                    (None, None) => None,
                };
                if let Some(see) = see {
                    writeln!(out, "{:width$}{see}", "", width = INDENT)?;
                }
            }
            Value::String(text) => write_indented(out, text, INDENT)?,
            other => write_indented(out, &other.to_string(), INDENT)?,
        }
    }

    for (heading, key) in [("Example", "@examples"), ("Note", "@notes")] {
        for (i, entry) in entries(tree.get(key)).iter().enumerate() {
            write!(out, "\n{heading} #{}:\n", i + 1)?;
            write_indented(out, entry, 2)?;
        }
    }

    Ok(())
}

fn entries(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) if !text.is_empty() => Some(text.clone()),
                Value::String(_) | Value::Null | Value::Bool(false) => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(text)) if !text.is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

/// Write each line of `text` indented, wrapping long lines on spaces.
fn write_indented<W: Write>(out: &mut W, text: &str, indent: usize) -> Result<()> {
    let line_length = MAX_COL_WIDTH.saturating_sub(indent).max(20);
    for line in text.trim().lines() {
        write!(out, "{:indent$}", "")?;
        write_wrapped_text(out, line.trim(), indent, line_length)?;
    }
    Ok(())
}

fn write_wrapped_text<W: Write>(
    out: &mut W,
    text: &str,
    indent: usize,
    line_length: usize,
) -> Result<()> {
    let mut rest = text;
    while rest.len() > line_length {
        let Some(head) = rest.get(..line_length) else {
            break;
        };
        let break_at = match head.rfind(' ') {
            Some(pos) if pos > 0 => pos,
            _ => break,
        };

        write!(out, "{}\n{:indent$}", &rest[..break_at], "")?;
        rest = rest[break_at..].trim_start_matches(' ');
    }

    writeln!(out, "{rest}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rendered(help: &Value, path: &str) -> String {
        let mut out = Vec::new();
        render(&mut out, help, path, "tool", Some("--help")).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn sub_help_falls_back_to_full() {
        let help = json!({ "remote": { "add": "add one" }, "-v": "verbose" });
        assert_eq!(sub_help(&help, ""), &help);
        assert_eq!(sub_help(&help, "remote"), &json!({ "add": "add one" }));
        assert_eq!(sub_help(&help, "remote.add"), &json!("add one"));
        assert_eq!(sub_help(&help, "missing"), &help);
    }

    #[test]
    fn renders_options_sorted_with_aliases() {
        let help = json!({
            "@title": "Say things",
            "-v": "Verbosity level.",
            "--word {word} | --word=word": "Add an extra word.",
        });
        assert_eq!(
            rendered(&help, ""),
            "Usage: tool [options]\n\
             \nSay things\n\
             \nOptions:\n\
             \x20 --word {word}:\n\
             \x20 --word=word:\n\
             \x20   Add an extra word.\n\
             \x20 -v:\n\
             \x20   Verbosity level.\n"
        );
    }

    #[test]
    fn renders_sub_commands_with_see_hint() {
        let help = json!({ "install": { "--force": "overwrite" }, "build": { "@title": "Compile it" } });
        let text = rendered(&help, "");
        assert!(text.contains("  build:\n    Compile it\n    See: 'tool build --help' for more help\n"));
        assert!(text.contains("    Invoke an \"install\" sub-command.\n"));
    }

    #[test]
    fn usage_line_uses_path_or_override() {
        assert!(rendered(&json!({}), "remote.add").starts_with("Usage: tool remote add [options]\n"));
        assert!(rendered(&json!({ "@usage": "my-echo [options] ...args" }), "")
            .starts_with("Usage: my-echo [options] ...args\n"));
    }

    #[test]
    fn examples_and_notes_are_numbered() {
        let help = json!({
            "@examples": ["verbosity -v", "verbosity -v -v"],
            "@notes": "repeat -v",
        });
        let text = rendered(&help, "");
        assert!(text.ends_with(
            "\nExample #1:\n  verbosity -v\n\nExample #2:\n  verbosity -v -v\n\nNote #1:\n  repeat -v\n"
        ));
    }

    #[test]
    fn long_descriptions_wrap() {
        let long = "word ".repeat(30);
        let text = rendered(&json!({ "-x": long }), "");
        for line in text.lines() {
            assert!(line.len() <= MAX_COL_WIDTH, "{line:?}");
        }
    }

    #[test]
    fn array_descriptions_are_rejected() {
        let mut out = Vec::new();
        let err = render(&mut out, &json!({ "-x": ["a"] }), "", "tool", None);
        assert!(matches!(err, Err(Error::Help(_))));
        let err = render(&mut out, &json!(5), "", "tool", None);
        assert!(matches!(err, Err(Error::Help(_))));
    }
}
