//! Standard type handlers.
//!
//! Each factory returns a [`Runner`] that coerces the matched value,
//! optionally validates and reformats it, and stores it in the current
//! scope under the formatted option name. Unparseable or rejected values
//! make the handler report no match.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::trace;

use crate::error::Error;
use crate::matcher::{Handler, MatchOptions, Runner, Validator, ValueFormatter};

static TRUTHY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(true|1)$").unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+(e[+-]?[0-9]+)?$").unwrap());
static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[+-]?([0-9]*\.?[0-9]+|[0-9]+\.[0-9]*)(e[+-]?[0-9]+)?$").unwrap()
});
static HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[+-]?0x[0-9a-f]+$").unwrap());
static OCTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[+-]?(0o)?[0-7]+$").unwrap());
static BYTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\+?([0-9.]+)(b|k|kb|m|mb|g|gb|t|tb)?$").unwrap());

/// Construction-time settings of a type handler. Call-time match options
/// take precedence.
#[derive(Clone, Default)]
pub struct TypeOptions {
    pub validate: Option<Validator>,
    pub format: Option<ValueFormatter>,
    pub solo: Option<bool>,
}

impl TypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value, &crate::context::RunContext) -> bool + 'static,
    {
        self.validate = Some(Rc::new(validate));
        self
    }

    pub fn format<F>(mut self, format: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.format = Some(Rc::new(format));
        self
    }

    pub fn solo(mut self, solo: bool) -> Self {
        self.solo = Some(solo);
        self
    }
}

impl From<&MatchOptions> for TypeOptions {
    fn from(options: &MatchOptions) -> Self {
        TypeOptions {
            validate: options.validate.clone(),
            format: options.format.clone(),
            solo: options.solo,
        }
    }
}

impl fmt::Debug for TypeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeOptions")
            .field("validate", &self.validate.is_some())
            .field("format", &self.format.is_some())
            .field("solo", &self.solo)
            .finish()
    }
}

type Convert = fn(Option<&str>) -> Option<Value>;

fn coercing(type_name: &'static str, options: TypeOptions, solo: Option<bool>, convert: Convert) -> Runner {
    let solo = options.solo.or(solo);
    let runner = Runner::new(move |context, result, call| {
        let key = call
            .name
            .as_deref()
            .or_else(|| result.name())
            .ok_or(Error::MissingName)?;

        let Some(mut value) = convert(result.value()) else {
            trace!(type_name, key, value = ?result.value(), "rejected");
            return Ok(false);
        };

        if let Some(validate) = call.validate.as_ref().or(options.validate.as_ref()) {
            if !validate(&value, context) {
                trace!(type_name, key, "failed validation");
                return Ok(false);
            }
        }
        if let Some(format) = call.format.as_ref().or(options.format.as_ref()) {
            value = format(value);
        }

        let mut entry = Map::new();
        entry.insert(context.format_name(key), value);
        context.store_all(Value::Object(entry));
        Ok(true)
    });

    match solo {
        Some(solo) => runner.solo(solo),
        None => runner,
    }
}

/// Flag or `true`/`1` value; solo unless told otherwise.
pub fn boolean(options: TypeOptions) -> Runner {
    coercing("BOOLEAN", options, Some(true), |value| match value {
        None => Some(Value::Bool(true)),
        Some(value) => Some(Value::Bool(TRUTHY.is_match(value))),
    })
}

/// Whole number, exponent allowed, rounded to the nearest integer.
pub fn integer(options: TypeOptions) -> Runner {
    coercing("INTEGER", options, None, |value| {
        let value = value.filter(|v| INTEGER.is_match(v))?;
        rounded(value.parse::<f64>().ok()?)
    })
}

pub fn decimal(options: TypeOptions) -> Runner {
    coercing("DECIMAL", options, None, |value| {
        let value = value.filter(|v| DECIMAL.is_match(v))?;
        Number::from_f64(value.parse::<f64>().ok()?).map(Value::Number)
    })
}

pub fn hex(options: TypeOptions) -> Runner {
    coercing("HEX", options, None, |value| {
        let value = value.filter(|v| HEX.is_match(v))?;
        radix(value, 16)
    })
}

pub fn octal(options: TypeOptions) -> Runner {
    coercing("OCTAL", options, None, |value| {
        let value = value.filter(|v| OCTAL.is_match(v))?;
        radix(value, 8)
    })
}

/// Size with an optional binary unit suffix: `10k`, `1.5m`, `54gb`.
pub fn bytes(options: TypeOptions) -> Runner {
    coercing("BYTES", options, None, |value| {
        let captures = BYTES.captures(value?)?;
        let amount = captures[1].parse::<f64>().ok()?;
        let scalar = match captures
            .get(2)
            .and_then(|unit| unit.as_str().chars().next())
            .map(|unit| unit.to_ascii_lowercase())
        {
            None | Some('b') => 1.0,
            Some('k') => 1024.0,
            Some('m') => 1024.0 * 1024.0,
            Some('g') => 1024.0 * 1024.0 * 1024.0,
            Some(_) => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        };
        rounded(amount * scalar)
    })
}

/// Any value, verbatim.
pub fn string(options: TypeOptions) -> Runner {
    coercing("STRING", options, None, |value| {
        value.map(|v| Value::String(v.to_string()))
    })
}

fn rounded(value: f64) -> Option<Value> {
    let value = value.round();
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(Value::from(value as i64))
}

fn radix(value: &str, radix: u32) -> Option<Value> {
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let digits = match digits.get(..2) {
        Some(marker) if marker.eq_ignore_ascii_case("0x") || marker.eq_ignore_ascii_case("0o") => {
            &digits[2..]
        }
        _ => digits,
    };

    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(Value::from(if negative { -magnitude } else { magnitude }))
}

/// Wrap a type factory so that it is built from each call's match options.
pub fn deferred<F>(build: F) -> Handler
where
    F: Fn(TypeOptions) -> Runner + 'static,
{
    Handler::factory(move |options| build(TypeOptions::from(options)))
}

pub type TypeFactory = Rc<dyn Fn(TypeOptions) -> Runner>;

/// Named type factories available to a parse.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    factories: BTreeMap<String, TypeFactory>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = TypeRegistry::new();
        registry.register("BOOLEAN", boolean);
        registry.register("BYTES", bytes);
        registry.register("DECIMAL", decimal);
        registry.register("HEX", hex);
        registry.register("INTEGER", integer);
        registry.register("OCTAL", octal);
        registry.register("STRING", string);
        registry
    }

    /// Add or replace a factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(TypeOptions) -> Runner + 'static,
    {
        self.factories.insert(name.to_string(), Rc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<&TypeFactory> {
        self.factories.get(name)
    }

    /// Build a handler of the named type.
    pub fn build(&self, name: &str, options: TypeOptions) -> Option<Runner> {
        self.get(name).map(|factory| factory(options))
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::options::RootOptions;
    use crate::tokens::TokenSequence;
    use rstest::rstest;
    use serde_json::json;

    fn context(argv: &[&str]) -> RunContext {
        RunContext::new(
            RootOptions::builder().argv(Vec::<String>::new()).build(),
            TokenSequence::new(argv.iter().copied()),
        )
    }

    fn run(build: fn(TypeOptions) -> Runner, argv: &[&str], pattern: &str, options: MatchOptions) -> (bool, Value) {
        let ctx = context(argv);
        let matched = ctx
            .match_arg(pattern, build(TypeOptions::new()), options)
            .unwrap();
        (matched, ctx.values())
    }

    #[rstest]
    #[case(&["--test"], json!({ "test": true }))]
    #[case(&["--test=true"], json!({ "test": true }))]
    #[case(&["--test=TRUE"], json!({ "test": true }))]
    #[case(&["--test=1"], json!({ "test": true }))]
    #[case(&["--test=false"], json!({ "test": false }))]
    #[case(&["--test=nope"], json!({ "test": false }))]
    fn boolean_values(#[case] argv: &[&str], #[case] expected: Value) {
        let (matched, values) = run(boolean, argv, "--test", MatchOptions::new());
        assert!(matched);
        assert_eq!(values, expected);
    }

    #[test]
    fn boolean_is_solo() {
        let ctx = context(&["--test", "test2"]);
        ctx.match_arg("--test", boolean(TypeOptions::new()), MatchOptions::new())
            .unwrap();
        assert_eq!(ctx.args().unconsumed(), vec!["test2"]);

        let ctx = context(&["--test", "false"]);
        ctx.match_arg("--test", boolean(TypeOptions::new().solo(false)), MatchOptions::new())
            .unwrap();
        assert_eq!(ctx.fetch("test"), Some(json!(false)));
    }

    #[rstest]
    #[case("543", Some(json!(543)))]
    #[case("+543e3", Some(json!(543000)))]
    #[case("-12", Some(json!(-12)))]
    #[case("1e-1", Some(json!(0)))]
    #[case("12.5", None)]
    #[case("abc", None)]
    fn integer_values(#[case] input: &str, #[case] expected: Option<Value>) {
        let (matched, values) = run(integer, &["--num", input], "--num", MatchOptions::new());
        assert_eq!(matched, expected.is_some());
        assert_eq!(values.get("num").cloned(), expected);
    }

    #[rstest]
    #[case("345.654", Some(json!(345.654)))]
    #[case("543.45e4", Some(json!(5434500.0)))]
    #[case(".5", Some(json!(0.5)))]
    #[case("5.", Some(json!(5.0)))]
    #[case("-11.65", Some(json!(-11.65)))]
    #[case("1.2.3", None)]
    #[case("5a", None)]
    fn decimal_values(#[case] input: &str, #[case] expected: Option<Value>) {
        let (matched, values) = run(decimal, &["--size", input], "--size", MatchOptions::new());
        assert_eq!(matched, expected.is_some());
        assert_eq!(values.get("size").cloned(), expected);
    }

    #[rstest]
    #[case("0xff", Some(json!(255)))]
    #[case("-0X1A", Some(json!(-26)))]
    #[case("ff", None)]
    #[case("0xzz", None)]
    fn hex_values(#[case] input: &str, #[case] expected: Option<Value>) {
        let (matched, values) = run(hex, &["--mask", input], "--mask", MatchOptions::new());
        assert_eq!(matched, expected.is_some());
        assert_eq!(values.get("mask").cloned(), expected);
    }

    #[rstest]
    #[case("0o17", Some(json!(15)))]
    #[case("755", Some(json!(493)))]
    #[case("-0O7", Some(json!(-7)))]
    #[case("8", None)]
    fn octal_values(#[case] input: &str, #[case] expected: Option<Value>) {
        let (matched, values) = run(octal, &["--mode", input], "--mode", MatchOptions::new());
        assert_eq!(matched, expected.is_some());
        assert_eq!(values.get("mode").cloned(), expected);
    }

    #[rstest]
    #[case("54gb", Some(json!(57982058496_i64)))]
    #[case("1.5m", Some(json!(1572864)))]
    #[case("10k", Some(json!(10240)))]
    #[case("10KB", Some(json!(10240)))]
    #[case("512", Some(json!(512)))]
    #[case("2t", Some(json!(2199023255552_i64)))]
    #[case("abc", None)]
    #[case("1.2.3k", None)]
    #[case("-5k", None)]
    fn bytes_values(#[case] input: &str, #[case] expected: Option<Value>) {
        let (matched, values) = run(bytes, &["--size", input], "--size", MatchOptions::new());
        assert_eq!(matched, expected.is_some());
        assert_eq!(values.get("size").cloned(), expected);
    }

    #[test]
    fn string_requires_a_value() {
        let (matched, values) = run(string, &["--word", "too much"], "--word", MatchOptions::new());
        assert!(matched);
        assert_eq!(values, json!({ "word": "too much" }));

        let (matched, values) = run(string, &["--word"], "--word", MatchOptions::new());
        assert!(!matched);
        assert_eq!(values, json!({}));
    }

    #[test]
    fn solo_positional_uses_call_name() {
        let (matched, values) = run(
            decimal,
            &["-11.65"],
            "",
            MatchOptions::new().name("size"),
        );
        assert!(matched);
        assert_eq!(values, json!({ "size": -11.65 }));
    }

    #[test]
    fn call_name_overrides_decoded_name() {
        let (_, values) = run(integer, &["--num", "4"], "--num", MatchOptions::new().name("count"));
        assert_eq!(values, json!({ "count": 4 }));
    }

    #[test]
    fn key_is_formatted() {
        let (_, values) = run(boolean, &["--use-system-echo"], "--use-system-echo", MatchOptions::new());
        assert_eq!(values, json!({ "useSystemEcho": true }));
    }

    #[test]
    fn validate_and_format_precedence() {
        let ctx = context(&["--port", "80"]);
        let handler = integer(
            TypeOptions::new()
                .validate(|value, _| value.as_i64().is_some_and(|port| port > 1024))
                .format(|value| json!({ "port": value })),
        );
        assert!(!ctx
            .match_arg("--port", handler.clone(), MatchOptions::new())
            .unwrap());
        assert_eq!(ctx.fetch("port"), None);

        // call-time validator and formatter replace the construction-time ones
        let ctx = context(&["--port", "80"]);
        assert!(ctx
            .match_arg(
                "--port",
                handler,
                MatchOptions::new()
                    .validate(|value, _| value.as_i64() == Some(80))
                    .format(|value| json!(value.as_i64().unwrap_or_default() * 2)),
            )
            .unwrap());
        assert_eq!(ctx.fetch("port"), Some(json!(160)));
    }

    #[test]
    fn deferred_factory_reads_match_options() {
        let ctx = context(&["--level", "3"]);
        ctx.match_arg(
            "--level",
            deferred(integer),
            MatchOptions::new().format(|value| json!(value.as_i64().unwrap_or_default() + 1)),
        )
        .unwrap();
        assert_eq!(ctx.fetch("level"), Some(json!(4)));
    }

    #[test]
    fn registry_lists_standard_types() {
        let registry = TypeRegistry::standard();
        assert_eq!(
            registry.names(),
            vec!["BOOLEAN", "BYTES", "DECIMAL", "HEX", "INTEGER", "OCTAL", "STRING"]
        );

        let ctx = context(&["--size", "1k"]);
        let handler = registry.build("BYTES", TypeOptions::new()).unwrap();
        ctx.match_arg("--size", handler, MatchOptions::new()).unwrap();
        assert_eq!(ctx.fetch("size"), Some(json!(1024)));
        assert!(registry.build("NOPE", TypeOptions::new()).is_none());
    }
}
