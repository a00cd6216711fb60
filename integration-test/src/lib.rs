//! Test driver for whole-CLI flows.
//!
//! A [`Session`] runs an entry handler against a fixed argv with a
//! recording help renderer, so tests can assert on the parse result and on
//! every help invocation (path, help subtree and rendered text).

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use cmded::{help, Parsed, Result, RootOptions, RunContext};
use serde_json::Value;

pub const PROGRAM: &str = "test-cli";

/// One call of the help renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct HelpCall {
    pub path: String,
    pub sub: Value,
    pub text: String,
}

pub struct Session {
    argv: Vec<String>,
    help: Option<Value>,
    strict: bool,
    calls: Rc<RefCell<Vec<HelpCall>>>,
}

impl Session {
    pub fn new(argv: &[&str]) -> Session {
        Session {
            argv: argv.iter().map(|arg| arg.to_string()).collect(),
            help: None,
            strict: false,
            calls: Rc::default(),
        }
    }

    /// Split a shell-like command line into the session's argv.
    pub fn command_line(line: &str) -> Result<Session> {
        let argv = cmded::split_command_line(line)?;
        Ok(Session {
            argv,
            ..Session::new(&[])
        })
    }

    pub fn help(mut self, help: Value) -> Session {
        self.help = Some(help);
        self
    }

    pub fn strict(mut self) -> Session {
        self.strict = true;
        self
    }

    fn options(&self) -> RootOptions {
        let calls = Rc::clone(&self.calls);
        let mut builder = RootOptions::builder()
            .argv(self.argv.clone())
            .strict(self.strict)
            .show_help(move |sub, _, path, context| {
                let mut text = Vec::new();
                help::render(&mut text, sub, path, PROGRAM, context.root_options().help_pattern())?;
                calls.borrow_mut().push(HelpCall {
                    path: path.to_string(),
                    sub: sub.clone(),
                    text: String::from_utf8_lossy(&text).into_owned(),
                });
                Ok(())
            });
        if let Some(help) = &self.help {
            builder = builder.help(help.clone());
        }
        builder.build()
    }

    pub fn run<F>(&self, entry: F) -> Result<Option<Parsed>>
    where
        F: FnOnce(&RunContext) -> Result<bool>,
    {
        cmded::run(entry, self.options())
    }

    pub async fn run_async<F, Fut>(&self, entry: F) -> Result<Option<Parsed>>
    where
        F: FnOnce(RunContext) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        cmded::run_async(entry, self.options()).await
    }

    pub fn help_calls(&self) -> Vec<HelpCall> {
        self.calls.borrow().clone()
    }
}
