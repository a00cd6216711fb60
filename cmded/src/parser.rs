//! The default value coercer.
//!
//! Decodes `prefix name[=value]` tokens, optionally pulling the following
//! token in as the value, and passes bare tokens through as the value of an
//! externally named "solo" argument.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::RunContext;

static STRUCTURED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^A-Za-z0-9_]*)([A-Za-z0-9_-]+)(?:=(.*))?$").unwrap());

/// Options handed to the coercer for a single decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// The literal pattern being matched. `None` selects solo decoding.
    pub pattern: Option<String>,
    /// Name reported for solo arguments.
    pub name: Option<String>,
    /// Never pull the next token in as a value.
    pub solo: bool,
    /// Consume the tokens while decoding instead of probing.
    pub consume: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            pattern: None,
            name: None,
            solo: false,
            consume: true,
        }
    }
}

/// A decoded argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResult {
    /// Full option text including its prefix, e.g. `--size`.
    pub raw_name: Option<String>,
    pub prefix: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    /// Every token index that took part in the decode.
    pub indexes: Vec<usize>,
    /// Indexes the matcher still has to consume.
    pub not_consumed: Vec<usize>,
}

/// Decode the token at `index` (the cursor when `None`).
pub fn default_parser(
    context: &RunContext,
    options: &ParserOptions,
    index: Option<usize>,
) -> Option<ParsedResult> {
    let mut args = context.args_mut();
    let index = index.unwrap_or_else(|| args.cursor());

    let arg = if options.consume {
        args.consume(Some(index))?
    } else {
        args.get(Some(index))?.to_string()
    };

    let mut not_consumed = if options.consume { vec![] } else { vec![index] };
    let mut indexes = vec![index];

    if options.pattern.as_deref().map_or(true, str::is_empty) {
        return Some(ParsedResult {
            raw_name: options.name.clone(),
            prefix: None,
            name: options.name.clone(),
            value: Some(arg),
            indexes,
            not_consumed,
        });
    }

    let captures = STRUCTURED.captures(&arg)?;
    let prefix = captures
        .get(1)
        .map(|m| m.as_str())
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let name = captures[2].to_string();
    let mut value = captures
        .get(3)
        .map(|m| m.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if prefix.is_some() && value.is_none() && !options.solo {
        let next = index + 1;
        let following = if options.consume {
            args.consume(Some(next))
        } else if args.is_consumed(next) {
            None
        } else {
            args.get(Some(next)).map(str::to_string)
        };

        if let Some(following) = following {
            if !options.consume {
                not_consumed.push(next);
            }
            indexes.push(next);
            value = Some(following);
        }
    }

    Some(ParsedResult {
        raw_name: Some(format!("{}{}", prefix.as_deref().unwrap_or(""), name)),
        prefix,
        name: Some(name),
        value,
        indexes,
        not_consumed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RootOptions;
    use crate::tokens::TokenSequence;

    fn context(argv: &[&str]) -> RunContext {
        RunContext::new(RootOptions::builder().build(), TokenSequence::new(argv.iter().copied()))
    }

    fn probe(pattern: &str) -> ParserOptions {
        ParserOptions {
            pattern: Some(pattern.to_string()),
            consume: false,
            ..ParserOptions::default()
        }
    }

    #[test]
    fn solo_consuming_decode() {
        let ctx = context(&["--test", "test2"]);
        let options = ParserOptions {
            solo: true,
            ..probe("--test")
        };
        let options = ParserOptions {
            consume: true,
            ..options
        };
        let result = default_parser(&ctx, &options, None).unwrap();
        assert_eq!(
            result,
            ParsedResult {
                raw_name: Some("--test".into()),
                prefix: Some("--".into()),
                name: Some("test".into()),
                value: None,
                indexes: vec![0],
                not_consumed: vec![],
            }
        );
        assert_eq!(ctx.args().unconsumed_indexes(), vec![1]);
    }

    #[test]
    fn solo_probe_leaves_tokens() {
        let ctx = context(&["--test", "test2"]);
        let options = ParserOptions {
            solo: true,
            ..probe("--test")
        };
        let result = default_parser(&ctx, &options, None).unwrap();
        assert_eq!(result.indexes, vec![0]);
        assert_eq!(result.not_consumed, vec![0]);
        assert_eq!(ctx.args().unconsumed_indexes(), vec![0, 1]);
    }

    #[test]
    fn pulls_following_value() {
        let ctx = context(&["foo", "--size", "10k"]);
        let result = default_parser(&ctx, &probe("--size"), Some(1)).unwrap();
        assert_eq!(result.value.as_deref(), Some("10k"));
        assert_eq!(result.indexes, vec![1, 2]);
        assert_eq!(result.not_consumed, vec![1, 2]);
    }

    #[test]
    fn inline_value_stays_single_token() {
        let ctx = context(&["--size=54gb", "next"]);
        let result = default_parser(&ctx, &probe("--size"), Some(0)).unwrap();
        assert_eq!(result.raw_name.as_deref(), Some("--size"));
        assert_eq!(result.value.as_deref(), Some("54gb"));
        assert_eq!(result.indexes, vec![0]);
    }

    #[test]
    fn empty_inline_value_pulls_next() {
        let ctx = context(&["--name=", "bob"]);
        let result = default_parser(&ctx, &probe("--name"), Some(0)).unwrap();
        assert_eq!(result.value.as_deref(), Some("bob"));
    }

    #[test]
    fn bare_word_has_no_prefix() {
        let ctx = context(&["hello", "world"]);
        let result = default_parser(&ctx, &probe("--x"), Some(0)).unwrap();
        assert_eq!(result.prefix, None);
        assert_eq!(result.raw_name.as_deref(), Some("hello"));
        assert_eq!(result.value, None);
        assert_eq!(result.indexes, vec![0]);
    }

    #[test]
    fn consumed_follower_is_not_pulled() {
        let ctx = context(&["--a", "--b", "x"]);
        ctx.args_mut().consume(Some(1));
        let result = default_parser(&ctx, &probe("--a"), Some(0)).unwrap();
        assert_eq!(result.value, None);
        assert_eq!(result.indexes, vec![0]);
    }

    #[test]
    fn no_pattern_passes_token_through() {
        let ctx = context(&["-11.65"]);
        let options = ParserOptions {
            name: Some("size".into()),
            consume: false,
            ..ParserOptions::default()
        };
        let result = default_parser(&ctx, &options, None).unwrap();
        assert_eq!(result.name.as_deref(), Some("size"));
        assert_eq!(result.raw_name.as_deref(), Some("size"));
        assert_eq!(result.value.as_deref(), Some("-11.65"));
    }

    #[test]
    fn undecodable_or_missing_token() {
        let ctx = context(&["a b"]);
        assert_eq!(default_parser(&ctx, &probe("--x"), Some(0)), None);
        assert_eq!(default_parser(&ctx, &probe("--x"), Some(3)), None);
    }
}
