// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A line-oriented script host for driving the loader in tests.
//!
//! Each source line is one statement:
//!
//! - `exports.KEY = EXPR`, `module.exports = EXPR`, `process.env.KEY = EXPR`
//! - `throw "message"`
//!
//! Expressions are string or number literals, `{}`, `require("x")`,
//! `require.resolve("x")`, `require.cache.length`, `counter()`, and
//! `process`, `exports`, `__filename` or `__dirname` followed by `.key`
//! property accesses.

#![allow(dead_code)]

use anyhow::{anyhow, bail};
use requirefire_core::{
    BuiltinModules, Host, Loader, LoaderOptions, ModuleScope, NodeBuiltins, WrappedSource,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Str(String),
    Num(f64),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
}

impl Value {
    pub fn object() -> Self {
        Value::Object(Rc::new(RefCell::new(BTreeMap::new())))
    }

    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.borrow().get(key).cloned().unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    pub fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        match self {
            Value::Object(map) => {
                map.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            other => bail!("cannot set '{key}' on {other:?}"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Reference identity for objects
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or_default()),
            serde_json::Value::Object(entries) => {
                let object = Value::object();
                for (key, value) in entries {
                    object.set(key, Value::from_json(value)).unwrap();
                }
                object
            }
            _ => Value::Undefined,
        }
    }
}

#[derive(Default)]
struct HostState {
    builtins: RefCell<BTreeMap<String, Value>>,
    process: RefCell<Option<Value>>,
    globals: RefCell<Vec<String>>,
    units: RefCell<Vec<String>>,
    host_requests: RefCell<Vec<String>>,
    counter: Cell<u32>,
}

/// Clones share state, so a test can keep a handle after moving one into
/// a loader.
#[derive(Clone, Default)]
pub struct ScriptHost {
    state: Rc<HostState>,
}

impl ScriptHost {
    pub fn new() -> Self {
        let host = Self::default();
        let process = Value::object();
        process.set("env", Value::object()).unwrap();
        *host.state.process.borrow_mut() = Some(process);
        for name in ["fs", "path"] {
            let module = Value::object();
            module.set("name", Value::Str(name.to_string())).unwrap();
            host.state.builtins.borrow_mut().insert(name.to_string(), module);
        }
        *host.state.globals.borrow_mut() = ["console", "setTimeout", "process", "global"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        host
    }

    /// The host's own instance of a builtin
    pub fn builtin(&self, name: &str) -> Value {
        self.state.builtins.borrow()[name].clone()
    }

    /// The current process object
    pub fn process(&self) -> Value {
        self.state.process.borrow().clone().unwrap_or(Value::Undefined)
    }

    /// Swap in a different process object
    pub fn replace_process(&self, process: Value) {
        *self.state.process.borrow_mut() = Some(process);
    }

    /// Wrapped texts evaluated so far
    pub fn units(&self) -> Vec<String> {
        self.state.units.borrow().clone()
    }

    /// Requests handed to the host loader
    pub fn host_requests(&self) -> Vec<String> {
        self.state.host_requests.borrow().clone()
    }

    fn exec(&self, line: &str, scope: &ModuleScope<'_, Self>) -> anyhow::Result<()> {
        if let Some(message) = line.strip_prefix("throw ") {
            let message = string_literal(message).unwrap_or(message);
            bail!("{message}");
        }

        let (target, expr) = line
            .split_once(" = ")
            .ok_or_else(|| anyhow!("not a statement: {line}"))?;
        let value = self.eval(expr.trim().trim_end_matches(';'), scope)?;

        if target == "module.exports" {
            scope.set_exports(value);
            return Ok(());
        }
        let (object, key) = target
            .rsplit_once('.')
            .ok_or_else(|| anyhow!("cannot assign to {target}"))?;
        self.eval(object, scope)?.set(key, value)
    }

    fn eval(&self, expr: &str, scope: &ModuleScope<'_, Self>) -> anyhow::Result<Value> {
        if expr == "{}" {
            return Ok(Value::object());
        }
        if let Some(literal) = string_literal(expr) {
            return Ok(Value::Str(literal.to_string()));
        }
        if let Ok(number) = expr.parse::<f64>() {
            return Ok(Value::Num(number));
        }
        if expr == "counter()" {
            let next = self.state.counter.get() + 1;
            self.state.counter.set(next);
            return Ok(Value::Num(next as f64));
        }
        if expr == "require.cache.length" {
            return Ok(Value::Num(scope.require().cache()?.len() as f64));
        }
        if let Some(rest) = expr.strip_prefix("require.resolve(") {
            let request = call_argument(rest)?.0;
            return Ok(Value::Str(scope.require().resolve(request)?));
        }

        let (mut value, rest) = if let Some(rest) = expr.strip_prefix("require(") {
            let (request, rest) = call_argument(rest)?;
            (scope.require().call(request)?, rest)
        } else {
            let end = expr.find('.').unwrap_or(expr.len());
            let value = match &expr[..end] {
                "process" => scope.environment().clone(),
                "exports" => scope.exports(),
                "__filename" => path_value(scope.filename()),
                "__dirname" => path_value(scope.dirname()),
                other => bail!("{other} is not defined"),
            };
            (value, &expr[end..])
        };

        for key in rest.split('.').filter(|key| !key.is_empty()) {
            value = value.get(key);
        }
        Ok(value)
    }
}

impl BuiltinModules for ScriptHost {
    fn is_builtin(&self, request: &str) -> bool {
        NodeBuiltins::new().is_builtin(request)
    }
}

impl Host for ScriptHost {
    type Value = Value;

    fn new_exports(&self) -> Value {
        Value::object()
    }

    fn environment(&self) -> Value {
        self.process()
    }

    fn global_names(&self) -> Vec<String> {
        self.state.globals.borrow().clone()
    }

    fn require_host(&self, request: &str, _requester: Option<&Path>) -> anyhow::Result<Value> {
        self.state.host_requests.borrow_mut().push(request.to_string());
        let name = request.strip_prefix("node:").unwrap_or(request);
        if let Some(module) = self.state.builtins.borrow().get(name) {
            return Ok(module.clone());
        }
        let delegated = Value::object();
        delegated.set("delegated", Value::Str(request.to_string()))?;
        Ok(delegated)
    }

    fn evaluate(&self, unit: &WrappedSource, scope: &ModuleScope<'_, Self>) -> anyhow::Result<()> {
        self.state.units.borrow_mut().push(unit.text());
        for line in unit.source().lines() {
            let line = match line.find(" //") {
                Some(comment) => &line[..comment],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            self.exec(line, scope)?;
        }
        Ok(())
    }

    fn load_extension(
        &self,
        extension: &str,
        content: Option<&str>,
        scope: &ModuleScope<'_, Self>,
    ) -> anyhow::Result<()> {
        match (extension, content) {
            (".json", Some(text)) => {
                let json: serde_json::Value = serde_json::from_str(text)?;
                scope.set_exports(Value::from_json(&json));
                Ok(())
            }
            (_, None) => {
                scope.set_exports(Value::Str(format!("native:{}", path_str(scope.filename()))));
                Ok(())
            }
            (other, _) => bail!("no handler for {other}"),
        }
    }
}

fn string_literal(expr: &str) -> Option<&str> {
    expr.strip_prefix('"')?.strip_suffix('"')
}

/// Splits `"x")rest` into `x` and `rest`
fn call_argument(rest: &str) -> anyhow::Result<(&str, &str)> {
    let close = rest
        .find(')')
        .ok_or_else(|| anyhow!("unterminated call: {rest}"))?;
    let request =
        string_literal(&rest[..close]).ok_or_else(|| anyhow!("expected a string: {rest}"))?;
    Ok((request, &rest[close + 1..]))
}

fn path_str(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

fn path_value(path: Option<&Path>) -> Value {
    Value::Str(path_str(path))
}

/// A temporary project directory; the path is canonical so it compares
/// equal to resolved paths.
pub fn fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = std::fs::canonicalize(dir.path()).unwrap();
    (dir, root)
}

pub fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

/// A loader anchored at `<root>/index.js`
pub fn loader(host: &ScriptHost, root: &Path) -> Loader<ScriptHost> {
    let mut options = LoaderOptions::default();
    options.resolver.cwd = Some(root.to_path_buf());
    Loader::builder(host.clone())
        .options(options)
        .context(root.join("index.js"))
        .build()
}
