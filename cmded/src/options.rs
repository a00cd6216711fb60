//! Root configuration shared by every run context of a parse.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::context::RunContext;
use crate::error::Result;
use crate::format::default_formatter;
use crate::matcher::Runner;
use crate::parser::{default_parser, ParsedResult, ParserOptions};
use crate::tokens::split_command_line;
use crate::types::{TypeOptions, TypeRegistry};

pub type Coercer = Rc<dyn Fn(&RunContext, &ParserOptions, Option<usize>) -> Option<ParsedResult>>;

pub type NameFormatter = Rc<dyn Fn(&str, Option<&RunContext>) -> String>;

/// `(sub_help, full_help, help_path, context)`
pub type HelpRenderer = Rc<dyn Fn(&Value, &Value, &str, &RunContext) -> Result<()>>;

pub const DEFAULT_HELP_PATTERN: &str = "--help";

pub struct RootOptions {
    pub(crate) strict: bool,
    pub(crate) argv: Vec<String>,
    pub(crate) parser: Coercer,
    pub(crate) formatter: NameFormatter,
    pub(crate) help: Option<Value>,
    pub(crate) show_help: Option<HelpRenderer>,
    pub(crate) help_pattern: Option<String>,
    pub(crate) types: TypeRegistry,
}

impl RootOptions {
    pub fn builder() -> RootOptionsBuilder {
        RootOptionsBuilder::new()
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn help(&self) -> Option<&Value> {
        self.help.as_ref()
    }

    pub fn help_pattern(&self) -> Option<&str> {
        self.help_pattern.as_deref()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }
}

impl Default for RootOptions {
    fn default() -> Self {
        RootOptionsBuilder::new().build()
    }
}

impl fmt::Debug for RootOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootOptions")
            .field("strict", &self.strict)
            .field("argv", &self.argv)
            .field("help", &self.help)
            .field("custom_help_renderer", &self.show_help.is_some())
            .field("help_pattern", &self.help_pattern)
            .field("types", &self.types.names())
            .finish()
    }
}

pub struct RootOptionsBuilder {
    strict: bool,
    argv: Option<Vec<String>>,
    parser: Option<Coercer>,
    formatter: Option<NameFormatter>,
    help: Option<Value>,
    show_help: Option<HelpRenderer>,
    help_pattern: Option<String>,
    types: TypeRegistry,
}

impl RootOptionsBuilder {
    pub fn new() -> Self {
        RootOptionsBuilder {
            strict: false,
            argv: None,
            parser: None,
            formatter: None,
            help: None,
            show_help: None,
            help_pattern: Some(DEFAULT_HELP_PATTERN.to_string()),
            types: TypeRegistry::standard(),
        }
    }

    /// Fail the parse when any token is left unconsumed.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    /// Take the input tokens from a shell-like command line string.
    pub fn command_line(self, line: &str) -> Result<Self> {
        Ok(self.argv(split_command_line(line)?))
    }

    pub fn parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&RunContext, &ParserOptions, Option<usize>) -> Option<ParsedResult> + 'static,
    {
        self.parser = Some(Rc::new(parser));
        self
    }

    pub fn formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&str, Option<&RunContext>) -> String + 'static,
    {
        self.formatter = Some(Rc::new(formatter));
        self
    }

    pub fn help(mut self, help: Value) -> Self {
        self.help = Some(help);
        self
    }

    pub fn show_help<F>(mut self, renderer: F) -> Self
    where
        F: Fn(&Value, &Value, &str, &RunContext) -> Result<()> + 'static,
    {
        self.show_help = Some(Rc::new(renderer));
        self
    }

    /// Pattern that requests help; `None` disables the check.
    pub fn help_pattern(mut self, pattern: Option<&str>) -> Self {
        self.help_pattern = pattern.map(str::to_string);
        self
    }

    pub fn register_type<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(TypeOptions) -> Runner + 'static,
    {
        self.types.register(name, factory);
        self
    }

    pub fn build(self) -> RootOptions {
        let argv = self
            .argv
            .unwrap_or_else(|| std::env::args().skip(1).collect());

        RootOptions {
            strict: self.strict,
            argv,
            parser: self.parser.unwrap_or_else(|| Rc::new(default_parser) as Coercer),
            formatter: self.formatter.unwrap_or_else(|| Rc::new(default_formatter) as NameFormatter),
            help: self.help,
            show_help: self.show_help,
            help_pattern: self.help_pattern,
            types: self.types,
        }
    }
}

impl Default for RootOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let options = RootOptions::builder().argv(["a"]).build();
        assert!(!options.strict());
        assert_eq!(options.argv(), ["a"]);
        assert_eq!(options.help_pattern(), Some("--help"));
        assert!(options.help().is_none());
        assert!(options.types().get("BYTES").is_some());
    }

    #[test]
    fn command_line_argv() {
        let options = RootOptions::builder()
            .command_line("--word 'too much' -v")
            .unwrap()
            .strict(true)
            .help(json!({ "-v": "verbose" }))
            .help_pattern(None)
            .build();
        assert_eq!(options.argv(), ["--word", "too much", "-v"]);
        assert!(options.strict());
        assert_eq!(options.help_pattern(), None);
        assert_eq!(options.help(), Some(&json!({ "-v": "verbose" })));
    }

    #[test]
    fn registered_types_are_visible() {
        let options = RootOptions::builder()
            .argv(Vec::<String>::new())
            .register_type("PORT", crate::types::integer)
            .build();
        assert!(options.types().get("PORT").is_some());
        assert!(options.types().names().contains(&"PORT".to_string()));
    }
}
