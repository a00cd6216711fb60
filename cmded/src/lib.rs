//! Matcher-style command-line argument parsing.
//!
//! Instead of declaring an option table up front, an entry handler asks for
//! arguments one at a time:
//! - `ctx.match_arg("--size", types::bytes(..), MatchOptions::new())` finds,
//!   consumes and coerces the first `--size` anywhere in argv
//! - handlers run in a forked [`RunContext`] whose path names the match,
//!   and can open value scopes for sub-commands
//! - whatever nobody consumed is returned as [`Parsed::remaining`]
//!
//! ```no_run
//! use cmded::{run, types, MatchOptions, RootOptions, Runner};
//!
//! let parsed = run(
//!     |ctx| {
//!         while ctx.match_arg(
//!             "-v",
//!             Runner::new(|ctx, _, _| {
//!                 let level = ctx.fetch_as::<u64>("verbosity")?.unwrap_or(0);
//!                 ctx.store("verbosity", level + 1);
//!                 Ok(true)
//!             }),
//!             MatchOptions::new().solo(true),
//!         )? {}
//!         Ok(ctx.has_matches())
//!     },
//!     RootOptions::default(),
//! )?;
//! # Ok::<(), cmded::Error>(())
//! ```

mod context;
mod entry;
mod error;
mod format;
pub mod help;
mod matcher;
mod options;
mod parser;
pub mod path;
mod tokens;
pub mod types;

pub use context::RunContext;
pub use entry::{run, run_async, Parsed};
pub use error::{Error, Result};
pub use format::default_formatter;
pub use matcher::{
    AsyncRunner, CaptureSet, Handler, LocalFuture, MatchOptions, MatchResult, Pattern, Predicate,
    ResultFormatter, Runner, Validator, ValueFormatter,
};
pub use options::{
    Coercer, HelpRenderer, NameFormatter, RootOptions, RootOptionsBuilder, DEFAULT_HELP_PATTERN,
};
pub use parser::{default_parser, ParsedResult, ParserOptions};
pub use tokens::{split_command_line, TokenSequence, Visit};
pub use types::{TypeOptions, TypeRegistry};
