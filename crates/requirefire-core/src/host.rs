// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Contracts between the loader and the runtime that executes modules

use crate::module_system::{ModuleScope, WrappedSource};
use std::path::Path;

/// Built-in module names
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Built-in subpath modules
pub const BUILTIN_SUBPATHS: &[&str] = &[
    "assert/strict",
    "dns/promises",
    "fs/promises",
    "inspector/promises",
    "path/posix",
    "path/win32",
    "readline/promises",
    "stream/consumers",
    "stream/promises",
    "stream/web",
    "timers/promises",
    "util/types",
];

/// Built-ins that only exist with the `node:` scheme
pub const SCHEME_ONLY_MODULES: &[&str] = &["sea", "sqlite", "test", "test/reporters"];

/// Decides which requests name platform builtins.
///
/// Consulted once per resolution, before any file system access.
pub trait BuiltinModules {
    /// Whether `request` names a builtin
    fn is_builtin(&self, request: &str) -> bool;
}

/// The Node.js builtin module set, `node:` prefix aware
#[derive(Debug, Clone)]
pub struct NodeBuiltins {
    extra: Vec<String>,
}

impl NodeBuiltins {
    /// The standard builtin set
    pub fn new() -> Self {
        Self { extra: Vec::new() }
    }

    /// Treat an additional name as builtin
    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.extra.push(name.into());
        self
    }
}

impl Default for NodeBuiltins {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinModules for NodeBuiltins {
    fn is_builtin(&self, request: &str) -> bool {
        let (name, prefixed) = match request.strip_prefix("node:") {
            Some(name) => (name, true),
            None => (request, false),
        };
        BUILTIN_MODULES.contains(&name)
            || BUILTIN_SUBPATHS.contains(&name)
            || (prefixed && SCHEME_ONLY_MODULES.contains(&name))
            || self.extra.iter().any(|extra| extra == name)
    }
}

/// The runtime that executes loaded modules.
///
/// The loader owns resolution, caching and source wrapping; everything that
/// needs an actual script engine goes through this trait.
pub trait Host: BuiltinModules + Sized + 'static {
    /// A runtime value. Clones must share identity (a reference, not a copy)
    /// for cached exports to be observable as the same object.
    type Value: Clone + 'static;

    /// A fresh, empty exports object
    fn new_exports(&self) -> Self::Value;

    /// The environment context (process handle) as of now.
    ///
    /// Called once per loader, when the loader is built.
    fn environment(&self) -> Self::Value;

    /// Names of every overridable binding in the ambient global scope
    fn global_names(&self) -> Vec<String>;

    /// Load a module with the host's own loader. Used for builtins and for
    /// delegated requests; results are never tracked by the isolated cache.
    fn require_host(&self, request: &str, requester: Option<&Path>) -> anyhow::Result<Self::Value>;

    /// Resolve a delegated request with the host's own resolver
    fn resolve_host(&self, request: &str, _requester: Option<&Path>) -> anyhow::Result<String> {
        Ok(request.to_string())
    }

    /// Execute wrapped script source in the scope of `scope.module()`.
    ///
    /// The host must make [`REQUIRE_BINDING`](crate::module_system::REQUIRE_BINDING)
    /// and [`ENVIRONMENT_BINDING`](crate::module_system::ENVIRONMENT_BINDING)
    /// visible to the wrapped text, bound to `scope.require()` and
    /// `scope.environment()`.
    fn evaluate(&self, unit: &WrappedSource, scope: &ModuleScope<'_, Self>) -> anyhow::Result<()>;

    /// Populate exports for a non-script extension. `content` is the file
    /// text for text handlers and `None` for opaque ones.
    fn load_extension(
        &self,
        extension: &str,
        content: Option<&str>,
        scope: &ModuleScope<'_, Self>,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        let builtins = NodeBuiltins::new();
        assert!(builtins.is_builtin("fs"));
        assert!(builtins.is_builtin("path"));
        assert!(builtins.is_builtin("node:fs"));
        assert!(builtins.is_builtin("fs/promises"));
        assert!(builtins.is_builtin("node:test"));
        assert!(!builtins.is_builtin("test"));
        assert!(!builtins.is_builtin("lodash"));
        assert!(!builtins.is_builtin("./fs"));
    }

    #[test]
    fn test_extra_builtins() {
        let builtins = NodeBuiltins::new().with("electron");
        assert!(builtins.is_builtin("electron"));
        assert!(builtins.is_builtin("node:electron"));
    }
}
