//! The matching engine.
//!
//! A match call locates the first token (or token pair) satisfying a
//! pattern, consumes exactly the tokens that took part, and hands the
//! decoded result to a handler running in a forked context whose path is
//! extended with the decoded name. Calling it in a loop consumes every
//! occurrence of a repeatable flag, one per call.

use std::collections::BTreeMap;
use std::fmt;
use std::future::{ready, Future};
use std::ops::ControlFlow;
use std::pin::Pin;
use std::rc::Rc;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::parser::{ParsedResult, ParserOptions};

pub type LocalFuture<T> = Pin<Box<dyn Future<Output = T>>>;

pub type Validator = Rc<dyn Fn(&Value, &RunContext) -> bool>;

pub type ValueFormatter = Rc<dyn Fn(Value) -> Value>;

pub type ResultFormatter = Rc<dyn Fn(MatchResult, &RunContext, &MatchOptions) -> MatchResult>;

/// Custom matcher: receives every unconsumed index in turn, consumes
/// whatever it uses itself, and returns `Some` on a match.
pub type Predicate = Rc<dyn Fn(&RunContext, &MatchOptions, usize) -> Option<MatchResult>>;

// ============================================================================
// Pattern
// ============================================================================

#[derive(Clone)]
pub enum Pattern {
    /// No literal name: the first unconsumed token is taken whole as the
    /// value of the `name` given in the match options.
    Solo,
    /// A literal option name such as `--flag`, searched across every
    /// unconsumed token.
    Name(String),
    /// Tested against the token under the cursor only.
    Regex(Regex),
    Predicate(Predicate),
}

impl Pattern {
    pub fn regex(expr: &str) -> Result<Self> {
        Ok(Pattern::Regex(Regex::new(expr)?))
    }

    pub fn predicate<F>(matcher: F) -> Self
    where
        F: Fn(&RunContext, &MatchOptions, usize) -> Option<MatchResult> + 'static,
    {
        Pattern::Predicate(Rc::new(matcher))
    }

    fn kind(&self) -> &'static str {
        match self {
            Pattern::Solo => "solo",
            Pattern::Name(_) => "name",
            Pattern::Regex(_) => "regex",
            Pattern::Predicate(_) => "predicate",
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Solo => write!(f, "Solo"),
            Pattern::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Pattern::Regex(expr) => f.debug_tuple("Regex").field(&expr.as_str()).finish(),
            Pattern::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

impl From<&str> for Pattern {
    fn from(name: &str) -> Self {
        if name.is_empty() {
            Pattern::Solo
        } else {
            Pattern::Name(name.to_string())
        }
    }
}

impl From<String> for Pattern {
    fn from(name: String) -> Self {
        Pattern::from(name.as_str())
    }
}

impl From<Option<&str>> for Pattern {
    fn from(name: Option<&str>) -> Self {
        name.map_or(Pattern::Solo, Pattern::from)
    }
}

impl From<Regex> for Pattern {
    fn from(expr: Regex) -> Self {
        Pattern::Regex(expr)
    }
}

// ============================================================================
// Match results
// ============================================================================

/// Captures of a regular-expression match, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSet {
    /// Index of the matched token.
    pub index: usize,
    /// Positional groups; group 0 is the whole match.
    pub groups: Vec<Option<String>>,
    pub named: BTreeMap<String, String>,
}

impl CaptureSet {
    fn capture(expr: &Regex, token: &str, index: usize) -> Option<Self> {
        let captures = expr.captures(token)?;
        let groups = captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        let named = expr
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        Some(CaptureSet {
            index,
            groups,
            named,
        })
    }

    pub fn text(&self) -> &str {
        self.group(0).unwrap_or_default()
    }

    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// What a handler receives.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Parsed(ParsedResult),
    Captures(CaptureSet),
    /// Free-form output of a result formatter.
    Value(Value),
}

impl MatchResult {
    /// The decoded option name; for captures the `name` group, for free-form
    /// values the `name` field.
    pub fn name(&self) -> Option<&str> {
        self.field("name")
    }

    pub fn value(&self) -> Option<&str> {
        self.field("value")
    }

    fn field(&self, field: &str) -> Option<&str> {
        match self {
            MatchResult::Parsed(parsed) => match field {
                "name" => parsed.name.as_deref(),
                _ => parsed.value.as_deref(),
            },
            MatchResult::Captures(captures) => captures.get(field),
            MatchResult::Value(value) => value.get(field).and_then(Value::as_str),
        }
    }

    pub fn as_parsed(&self) -> Option<&ParsedResult> {
        match self {
            MatchResult::Parsed(parsed) => Some(parsed),
            _ => None,
        }
    }

    pub fn as_captures(&self) -> Option<&CaptureSet> {
        match self {
            MatchResult::Captures(captures) => Some(captures),
            _ => None,
        }
    }
}

// ============================================================================
// MatchOptions
// ============================================================================

#[derive(Clone, Default)]
pub struct MatchOptions {
    /// Name for solo patterns; overrides the decoded name in standard types.
    pub name: Option<String>,
    /// Never pull the following token in as a value.
    pub solo: Option<bool>,
    pub format_result: Option<ResultFormatter>,
    pub validate: Option<Validator>,
    pub format: Option<ValueFormatter>,
}

impl MatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn solo(mut self, solo: bool) -> Self {
        self.solo = Some(solo);
        self
    }

    pub fn format_result<F>(mut self, formatter: F) -> Self
    where
        F: Fn(MatchResult, &RunContext, &MatchOptions) -> MatchResult + 'static,
    {
        self.format_result = Some(Rc::new(formatter));
        self
    }

    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value, &RunContext) -> bool + 'static,
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
}

impl fmt::Debug for MatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchOptions")
            .field("name", &self.name)
            .field("solo", &self.solo)
            .field("format_result", &self.format_result.is_some())
            .field("validate", &self.validate.is_some())
            .field("format", &self.format.is_some())
            .finish()
    }
}

// ============================================================================
// Handlers
// ============================================================================

type RunFn = Rc<dyn Fn(&RunContext, &MatchResult, &MatchOptions) -> Result<bool>>;

/// A synchronous handler plus the parser defaults it asks for.
#[derive(Clone)]
pub struct Runner {
    run: RunFn,
    solo: Option<bool>,
}

impl Runner {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&RunContext, &MatchResult, &MatchOptions) -> Result<bool> + 'static,
    {
        Runner {
            run: Rc::new(run),
            solo: None,
        }
    }

    /// Default solo decoding for matches using this runner; per-call
    /// options still win.
    pub fn solo(mut self, solo: bool) -> Self {
        self.solo = Some(solo);
        self
    }

    pub fn default_solo(&self) -> Option<bool> {
        self.solo
    }

    pub fn call(
        &self,
        context: &RunContext,
        result: &MatchResult,
        options: &MatchOptions,
    ) -> Result<bool> {
        (self.run)(context, result, options)
    }
}

/// Either a ready runner or a factory that builds one from the match
/// options. Factories are resolved once, before the scan.
#[derive(Clone)]
pub enum Handler {
    Runner(Runner),
    Factory(Rc<dyn Fn(&MatchOptions) -> Runner>),
}

impl Handler {
    pub fn factory<F>(build: F) -> Self
    where
        F: Fn(&MatchOptions) -> Runner + 'static,
    {
        Handler::Factory(Rc::new(build))
    }

    pub fn resolve(self, options: &MatchOptions) -> Runner {
        match self {
            Handler::Runner(runner) => runner,
            Handler::Factory(build) => build(options),
        }
    }
}

impl From<Runner> for Handler {
    fn from(runner: Runner) -> Self {
        Handler::Runner(runner)
    }
}

type AsyncRunFn = Rc<dyn Fn(RunContext, MatchResult, MatchOptions) -> LocalFuture<Result<bool>>>;

/// A handler whose outcome arrives later.
#[derive(Clone)]
pub struct AsyncRunner {
    run: AsyncRunFn,
    solo: Option<bool>,
}

impl AsyncRunner {
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn(RunContext, MatchResult, MatchOptions) -> Fut + 'static,
        Fut: Future<Output = Result<bool>> + 'static,
    {
        AsyncRunner {
            run: Rc::new(move |context, result, options| {
                Box::pin(run(context, result, options)) as LocalFuture<Result<bool>>
            }),
            solo: None,
        }
    }

    pub fn solo(mut self, solo: bool) -> Self {
        self.solo = Some(solo);
        self
    }
}

// ============================================================================
// Engine
// ============================================================================

impl RunContext {
    /// Find the first token satisfying `pattern`, consume it and run the
    /// handler. Returns the handler's verdict, or `false` when nothing
    /// matched.
    pub fn match_arg<P, H>(&self, pattern: P, handler: H, options: MatchOptions) -> Result<bool>
    where
        P: Into<Pattern>,
        H: Into<Handler>,
    {
        let runner = handler.into().resolve(&options);
        let Some(result) = self.scan(&pattern.into(), runner.solo, &options)? else {
            return Ok(false);
        };

        let context = self.enter(&result);
        let matched = runner.call(&context, &result, &options)?;
        if matched {
            self.record_match();
        }

        Ok(matched)
    }

    /// Like [`RunContext::match_arg`] for asynchronous handlers. The scan and
    /// the handler call happen before this returns; the match counter is
    /// updated before the returned future resolves.
    pub fn match_arg_async<P>(
        &self,
        pattern: P,
        handler: AsyncRunner,
        options: MatchOptions,
    ) -> LocalFuture<Result<bool>>
    where
        P: Into<Pattern>,
    {
        let result = match self.scan(&pattern.into(), handler.solo, &options) {
            Err(err) => return Box::pin(ready(Err(err))),
            Ok(None) => return Box::pin(ready(Ok(false))),
            Ok(Some(result)) => result,
        };

        let context = self.enter(&result);
        let pending = (handler.run)(context, result, options);
        let matches = Rc::clone(&self.matches);

        Box::pin(async move {
            let matched = pending.await?;
            if matched {
                matches.set(matches.get() + 1);
            }
            Ok(matched)
        })
    }

    fn scan(
        &self,
        pattern: &Pattern,
        solo: Option<bool>,
        options: &MatchOptions,
    ) -> Result<Option<MatchResult>> {
        let found = match pattern {
            Pattern::Solo => self.scan_name(None, solo, options)?,
            Pattern::Name(name) => self.scan_name(Some(name.as_str()), solo, options)?,
            Pattern::Regex(expr) => self.scan_regex(expr),
            Pattern::Predicate(matcher) => self.scan_each(|index| matcher(self, options, index)),
        };

        let Some(result) = found else {
            return Ok(None);
        };
        trace!(pattern = pattern.kind(), name = ?result.name(), path = %self.path(), "matched");

        Ok(Some(match &options.format_result {
            Some(format) => format(result, self, options),
            None => result,
        }))
    }

    fn scan_name(
        &self,
        pattern: Option<&str>,
        solo: Option<bool>,
        options: &MatchOptions,
    ) -> Result<Option<MatchResult>> {
        if pattern.is_none() && options.name.is_none() {
            return Err(Error::MissingName);
        }

        let parser_options = ParserOptions {
            pattern: pattern.map(str::to_string),
            name: options.name.clone(),
            solo: pattern.is_none() || options.solo.or(solo).unwrap_or(false),
            consume: false,
        };

        Ok(self.scan_each(|index| {
            let mut parsed = self.parse(&parser_options, Some(index))?;
            if pattern.is_some() && parsed.raw_name.as_deref() != pattern {
                return None;
            }

            self.mark_consumed(parsed.not_consumed.drain(..));
            Some(MatchResult::Parsed(parsed))
        }))
    }

    fn scan_regex(&self, expr: &Regex) -> Option<MatchResult> {
        let (index, token) = {
            let args = self.args();
            if args.is_consumed(args.cursor()) {
                return None;
            }
            (args.cursor(), args.get(None)?.to_string())
        };

        let captures = CaptureSet::capture(expr, &token, index)?;
        self.mark_consumed([index]);
        Some(MatchResult::Captures(captures))
    }

    /// Offer each unconsumed index, in ascending order, to `attempt` until
    /// one produces a result. The token borrow is released between steps so
    /// that attempts may consume tokens.
    fn scan_each<F>(&self, mut attempt: F) -> Option<MatchResult>
    where
        F: FnMut(usize) -> Option<MatchResult>,
    {
        let mut from = 0;
        while let Some(index) = self.next_pending(from) {
            if let Some(result) = attempt(index) {
                return Some(result);
            }
            from = index + 1;
        }
        None
    }

    fn next_pending(&self, from: usize) -> Option<usize> {
        let mut found = None;
        self.args().iterate(false, |visit| {
            if visit.index < from {
                return ControlFlow::Continue(());
            }
            found = Some(visit.index);
            ControlFlow::Break(())
        });
        found
    }

    /// Fork the context a handler runs in.
    fn enter(&self, result: &MatchResult) -> RunContext {
        let path = match result.name() {
            Some(name) if !name.is_empty() && !self.path().is_empty() => {
                format!("{}.{}", self.path(), name)
            }
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.path().to_string(),
        };

        self.fork(path)
    }
}
