//! Top-level entry points.
//!
//! [`run`] builds the root context from the configured argv, answers help
//! requests, calls the entry handler and then decides between a
//! [`Parsed`] result and showing help.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::matcher::{MatchOptions, Runner};
use crate::options::RootOptions;
use crate::path;
use crate::tokens::TokenSequence;

/// Outcome of a successful parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    values: Map<String, Value>,
    remaining: Vec<String>,
}

impl Parsed {
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Unconsumed tokens, in input order.
    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    /// Value at a key path.
    pub fn value(&self, key: &str) -> Option<&Value> {
        path::get_in(&self.values, key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.value(key)
            .map(|value| {
                T::deserialize(value).map_err(|source| Error::Decode {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

/// Parse the configured argv with `entry`.
///
/// Returns `Ok(None)` when help was shown instead: help was requested, the
/// entry handler returned `false`, or strict mode found leftover tokens.
pub fn run<F>(entry: F, options: RootOptions) -> Result<Option<Parsed>>
where
    F: FnOnce(&RunContext) -> Result<bool>,
{
    let context = start(options);
    if help_requested(&context)? {
        return Ok(None);
    }

    let ok = entry(&context)?;
    finish(&context, ok)
}

/// [`run`] for an asynchronous entry handler.
pub async fn run_async<F, Fut>(entry: F, options: RootOptions) -> Result<Option<Parsed>>
where
    F: FnOnce(RunContext) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let context = start(options);
    if help_requested(&context)? {
        return Ok(None);
    }

    let ok = entry(context.clone()).await?;
    finish(&context, ok)
}

fn start(options: RootOptions) -> RunContext {
    let args = TokenSequence::new(options.argv().to_vec());
    debug!(tokens = args.len(), strict = options.strict(), "starting parse");
    RunContext::new(options, args)
}

fn help_requested(context: &RunContext) -> Result<bool> {
    let root = context.root_options();
    let Some(pattern) = root.help_pattern().filter(|_| root.help().is_some()) else {
        return Ok(false);
    };

    let show = Runner::new(|context, _, _| {
        let path = context.args().unconsumed().join(".");
        debug!(path = %path, "help requested");
        context.show_help(Some(path.as_str()))?;
        Ok(true)
    });

    context.match_arg(pattern, show, MatchOptions::new().solo(true))
}

fn finish(context: &RunContext, ok: bool) -> Result<Option<Parsed>> {
    if !ok {
        debug!("entry handler failed, showing help");
        context.show_help(None)?;
        return Ok(None);
    }

    let remaining = context.args().unconsumed();
    if context.root_options().strict() && !remaining.is_empty() {
        debug!(?remaining, "strict mode rejected leftover tokens");
        context.show_help(None)?;
        return Ok(None);
    }

    let values = match context.root_values() {
        Value::Object(values) => values,
        _ => Map::new(),
    };
    debug!(remaining = remaining.len(), "parse finished");

    Ok(Some(Parsed { values, remaining }))
}
