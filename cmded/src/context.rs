//! Per-handler view of a parse.
//!
//! All contexts of one parse share the token sequence and the root value
//! tree. Each context owns a scope path into that tree, a dotted runner
//! path naming where it sits in the command hierarchy, and its own match
//! counter.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::future::Future;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Error, Result};
use crate::help;
use crate::options::RootOptions;
use crate::parser::{ParsedResult, ParserOptions};
use crate::path;
use crate::tokens::TokenSequence;
use crate::types::TypeRegistry;

/// Cloning yields another handle to the same context: the match counter
/// is shared. Handlers receive a fresh context per match instead.
#[derive(Clone)]
pub struct RunContext {
    root: Rc<RootOptions>,
    args: Rc<RefCell<TokenSequence>>,
    values: Rc<RefCell<Value>>,
    scope: Vec<String>,
    path: String,
    pub(crate) matches: Rc<Cell<usize>>,
}

impl RunContext {
    pub fn new(root: RootOptions, args: TokenSequence) -> Self {
        RunContext {
            root: Rc::new(root),
            args: Rc::new(RefCell::new(args)),
            values: Rc::new(RefCell::new(Value::Object(Map::new()))),
            scope: Vec::new(),
            path: String::new(),
            matches: Rc::new(Cell::new(0)),
        }
    }

    /// Seed the accumulator. Non-object values are ignored.
    pub fn with_values(self, values: Value) -> Self {
        if values.is_object() {
            *self.values.borrow_mut() = values;
        }
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn root_options(&self) -> &RootOptions {
        &self.root
    }

    pub fn types(&self) -> &TypeRegistry {
        self.root.types()
    }

    /// Shared token sequence. Do not hold the guard across a match call.
    pub fn args(&self) -> Ref<'_, TokenSequence> {
        self.args.borrow()
    }

    pub fn args_mut(&self) -> RefMut<'_, TokenSequence> {
        self.args.borrow_mut()
    }

    /// Dotted runner path, e.g. `remote.add`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Keys leading from the root value tree to this context's scope.
    pub fn scope_path(&self) -> &[String] {
        &self.scope
    }

    /// Snapshot of this context's scope.
    pub fn values(&self) -> Value {
        self.read(Value::clone)
    }

    /// Snapshot of the whole value tree.
    pub fn root_values(&self) -> Value {
        self.values.borrow().clone()
    }

    // ------------------------------------------------------------------
    // Accumulator
    // ------------------------------------------------------------------

    /// Value at a key path inside the scope. A stored `null` is present.
    pub fn fetch(&self, key: &str) -> Option<Value> {
        self.read(|scope| path::get(scope, key).cloned())
    }

    pub fn fetch_or(&self, key: &str, default: Value) -> Value {
        self.fetch(key).unwrap_or(default)
    }

    /// Fetch several key paths at once. `keys` is either a list of paths or
    /// an object of path to default value; results are keyed by the last
    /// segment of each path.
    pub fn fetch_all(&self, keys: Value) -> Map<String, Value> {
        let wanted: Vec<(String, Value)> = match keys {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(|key| (key.to_string(), Value::Null)))
                .collect(),
            Value::Object(map) => map.into_iter().collect(),
            Value::String(key) => vec![(key, Value::Null)],
            _ => Vec::new(),
        };

        self.read(|scope| {
            wanted
                .into_iter()
                .map(|(key, default)| {
                    let value = path::get(scope, &key).cloned().unwrap_or(default);
                    (path::sanitize_key(&key), value)
                })
                .collect()
        })
    }

    /// Fetch and decode a value.
    pub fn fetch_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.fetch(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| Error::Decode {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Set a key path inside the scope, creating intermediate containers.
    /// An empty path stores under the `""` key; the scope itself is kept.
    pub fn store(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.write(|scope| path::set(scope, key, value));
    }

    /// Deep-merge an object into the scope. Non-object values are ignored.
    pub fn store_all(&self, values: Value) {
        if !values.is_object() {
            return;
        }
        self.write(|scope| path::merge(scope, values));
    }

    /// Run `handler` against a child scope `name`, starting from an empty
    /// object. Whatever was stored under `name` before is replaced.
    pub fn scope<F>(&self, name: &str, handler: F) -> Result<bool>
    where
        F: FnOnce(&RunContext) -> Result<bool>,
    {
        handler(&self.enter_scope(name))
    }

    pub async fn scope_async<F, Fut>(&self, name: &str, handler: F) -> Result<bool>
    where
        F: FnOnce(RunContext) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        handler(self.enter_scope(name)).await
    }

    fn enter_scope(&self, name: &str) -> RunContext {
        let key = name.to_string();
        self.write(|scope| {
            if let Value::Object(map) = scope {
                map.insert(key.clone(), Value::Object(Map::new()));
            }
        });

        let mut scope = self.scope.clone();
        scope.push(key);
        trace!(scope = %scope.join("."), path = %self.path, "entering scope");

        RunContext {
            scope,
            ..self.fork(self.path.clone())
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        let root = self.values.borrow();
        let scope = self
            .scope
            .iter()
            .try_fold(&*root, |node, key| node.get(key));
        match scope {
            Some(scope) => f(scope),
            None => f(&Value::Object(Map::new())),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut root = self.values.borrow_mut();
        let mut node: &mut Value = &mut root;

        for key in &self.scope {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                unreachable!("scope nodes are objects")
            };
            node = map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }

        f(node)
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    /// Decode a token with the configured coercer.
    pub fn parse(&self, options: &ParserOptions, index: Option<usize>) -> Option<ParsedResult> {
        (self.root.parser)(self, options, index)
    }

    /// Accumulator key for an option name, via the configured formatter.
    pub fn format_name(&self, name: &str) -> String {
        (self.root.formatter)(name, Some(self))
    }

    pub fn mark_consumed<I>(&self, indexes: I)
    where
        I: IntoIterator<Item = usize>,
    {
        let mut args = self.args_mut();
        for index in indexes {
            args.consume(Some(index));
        }
    }

    /// Whether any handler called through this context has succeeded.
    pub fn has_matches(&self) -> bool {
        self.matches.get() > 0
    }

    /// Render help for `path` (this context's runner path when `None`).
    /// Falls back to the whole help tree when the path has no entry.
    pub fn show_help(&self, path: Option<&str>) -> Result<()> {
        let path = path.unwrap_or(&self.path);
        let empty = Value::Object(Map::new());
        let full = self.root.help().unwrap_or(&empty);
        let sub = help::sub_help(full, path);

        match &self.root.show_help {
            Some(render) => render(sub, full, path, self),
            None => help::print(sub, full, path, self),
        }
    }

    pub fn exit(&self, code: i32) -> ! {
        std::process::exit(code)
    }

    pub(crate) fn fork(&self, path: String) -> RunContext {
        RunContext {
            root: Rc::clone(&self.root),
            args: Rc::clone(&self.args),
            values: Rc::clone(&self.values),
            scope: self.scope.clone(),
            path,
            matches: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn record_match(&self) {
        self.matches.set(self.matches.get() + 1);
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("path", &self.path)
            .field("scope", &self.scope)
            .field("args", &*self.args.borrow())
            .field("matches", &self.matches.get())
            .finish()
    }
}
