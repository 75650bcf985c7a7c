// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolver and loader configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options controlling path resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Directories searched after every `node_modules` ancestor
    pub global_paths: Vec<PathBuf>,

    /// Installation prefix; adds `<prefix>/lib/node` to the global paths
    pub prefix: Option<PathBuf>,

    /// Keep symlinked paths instead of canonicalizing them
    pub preserve_symlinks: bool,

    /// Same as `preserve_symlinks`, for entry-point resolutions
    pub preserve_symlinks_main: bool,

    /// Conditions matched in `exports` (`default` always matches)
    pub conditions: Vec<String>,

    /// Directory used to anchor requests made without a requester file
    pub cwd: Option<PathBuf>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            global_paths: Vec::new(),
            prefix: None,
            preserve_symlinks: false,
            preserve_symlinks_main: false,
            conditions: vec![
                "require".to_string(),
                "node".to_string(),
                "node-addons".to_string(),
            ],
            cwd: None,
        }
    }
}

impl ResolverOptions {
    /// Global lookup directories in search order: configured paths, then
    /// `~/.node_modules`, `~/.node_libraries` and `<prefix>/lib/node`.
    pub fn lookup_globals(&self) -> Vec<PathBuf> {
        let mut paths = self.global_paths.clone();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".node_modules"));
            paths.push(home.join(".node_libraries"));
        }
        if let Some(prefix) = &self.prefix {
            paths.push(prefix.join("lib").join("node"));
        }
        paths
    }
}

/// Options for an isolated loader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Resolution options
    pub resolver: ResolverOptions,

    /// File the top-level requests are resolved from
    pub context: Option<PathBuf>,

    /// Identifier through which loaded code sees the environment context
    pub environment_binding: String,

    /// Extra global names never redeclared in the prelude
    pub reserved_globals: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            resolver: ResolverOptions::default(),
            context: None,
            environment_binding: "process".to_string(),
            reserved_globals: Vec::new(),
        }
    }
}

impl LoaderOptions {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.load_from_env();
        options
    }

    /// Apply `NODE_PATH`, `NODE_PRESERVE_SYMLINKS`,
    /// `NODE_PRESERVE_SYMLINKS_MAIN` and `REQUIREFIRE_*` variables
    pub fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            match key.as_str() {
                "NODE_PATH" => self.set("node-path", &value),
                "NODE_PRESERVE_SYMLINKS" => self.set("preserve-symlinks", &value),
                "NODE_PRESERVE_SYMLINKS_MAIN" => self.set("preserve-symlinks-main", &value),
                _ => {
                    if let Some(option) = key.strip_prefix("REQUIREFIRE_") {
                        let option = option.to_lowercase().replace('_', "-");
                        self.set(&option, &value);
                    }
                }
            }
        }
    }

    /// Set an option from its string form. Unknown keys are ignored.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "node-path" => {
                self.resolver.global_paths = std::env::split_paths(value)
                    .filter(|path| !path.as_os_str().is_empty())
                    .collect();
            }
            "prefix" => self.resolver.prefix = Some(PathBuf::from(value)),
            "preserve-symlinks" => self.resolver.preserve_symlinks = value == "1" || value == "true",
            "preserve-symlinks-main" => {
                self.resolver.preserve_symlinks_main = value == "1" || value == "true"
            }
            "conditions" => {
                self.resolver.conditions = value
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect();
            }
            "cwd" => self.resolver.cwd = Some(PathBuf::from(value)),
            "context" => self.context = Some(PathBuf::from(value)),
            "environment-binding" => self.environment_binding = value.to_string(),
            "reserved-globals" => {
                self.reserved_globals = value
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(String::from)
                    .collect();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LoaderOptions::default();
        assert_eq!(options.environment_binding, "process");
        assert_eq!(options.resolver.conditions, vec!["require", "node", "node-addons"]);
        assert!(!options.resolver.preserve_symlinks);
    }

    #[test]
    fn test_set() {
        let mut options = LoaderOptions::default();
        options.set("preserve-symlinks", "1");
        options.set("conditions", "require, development");
        options.set("environment-binding", "env");
        options.set("unknown", "ignored");
        assert!(options.resolver.preserve_symlinks);
        assert_eq!(options.resolver.conditions, vec!["require", "development"]);
        assert_eq!(options.environment_binding, "env");
    }

    #[cfg(unix)]
    #[test]
    fn test_node_path_and_prefix() {
        let mut options = LoaderOptions::default();
        options.set("node-path", "/opt/a::/opt/b");
        options.set("prefix", "/usr/local");
        assert_eq!(
            options.resolver.global_paths,
            vec![PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]
        );
        let globals = options.resolver.lookup_globals();
        assert_eq!(globals.first(), Some(&PathBuf::from("/opt/a")));
        assert_eq!(globals.last(), Some(&PathBuf::from("/usr/local/lib/node")));
    }

    #[test]
    fn test_deserialize_partial() {
        let options: LoaderOptions =
            serde_json::from_str(r#"{"environment_binding": "ctx", "resolver": {"preserve_symlinks": true}}"#)
                .unwrap();
        assert_eq!(options.environment_binding, "ctx");
        assert!(options.resolver.preserve_symlinks);
        assert_eq!(options.resolver.conditions.len(), 3);
    }
}
