use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::RunContext;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

/// Default accumulator key formatter: non-word runs become a single
/// separator and the result is camel-cased (`use-system-echo` is stored
/// as `useSystemEcho`).
pub fn default_formatter(name: &str, _context: Option<&RunContext>) -> String {
    let snake = NON_WORD.replace_all(name, "_");

    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for c in snake.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_names() {
        assert_eq!(default_formatter("test1", None), "test1");
        assert_eq!(default_formatter("use-system-echo", None), "useSystemEcho");
        assert_eq!(default_formatter("dry_run", None), "dryRun");
        assert_eq!(default_formatter("--weird..name--", None), "weirdName");
        assert_eq!(default_formatter("v", None), "v");
    }
}
