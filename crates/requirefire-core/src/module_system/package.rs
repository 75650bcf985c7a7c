// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! package.json reading for resolution

use crate::error::{LoadError, Result};
use crate::fs::{FileSystem, Stat};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The fields of a package.json that matter for resolution
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    /// Location of the package.json itself
    #[serde(skip)]
    pub path: PathBuf,

    /// Declared package name
    #[serde(default, deserialize_with = "string_field")]
    pub name: Option<String>,

    /// CommonJS entry point
    #[serde(default, deserialize_with = "string_field")]
    pub main: Option<String>,

    /// Public entry points; `null` is treated as absent
    #[serde(default)]
    pub exports: Option<serde_json::Value>,

    /// Package-internal `#` imports; `null` is treated as absent
    #[serde(default)]
    pub imports: Option<serde_json::Value>,

    /// Module format (`commonjs` or `module`)
    #[serde(default, rename = "type", deserialize_with = "string_field")]
    pub package_type: Option<String>,
}

impl PackageManifest {
    /// Directory containing the manifest
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }

    /// The `main` entry, ignoring an empty string
    pub fn main_entry(&self) -> Option<&str> {
        self.main.as_deref().filter(|main| !main.is_empty())
    }
}

/// Keep string values, drop anything else (numbers, objects) silently
fn string_field<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Reads and memoizes package manifests per directory.
///
/// Absent manifests are cached too, so walking deep ancestor chains costs one
/// file system probe per directory for the lifetime of the reader.
pub struct PackageReader {
    fs: Rc<dyn FileSystem>,
    cache: RefCell<FxHashMap<PathBuf, Option<Rc<PackageManifest>>>>,
}

impl PackageReader {
    /// Create a reader over a file system
    pub fn new(fs: Rc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Read `dir/package.json`, if there is one
    pub fn read(&self, dir: &Path) -> Result<Option<Rc<PackageManifest>>> {
        let json_path = dir.join("package.json");
        if let Some(cached) = self.cache.borrow().get(&json_path) {
            return Ok(cached.clone());
        }

        let manifest = match self.fs.stat(&json_path) {
            Stat::File => {
                let text = self
                    .fs
                    .read_to_string(&json_path)
                    .map_err(|e| LoadError::io(&json_path, e))?;
                let mut manifest: PackageManifest =
                    serde_json::from_str(&text).map_err(|source| LoadError::ManifestParse {
                        path: json_path.clone(),
                        source,
                    })?;
                manifest.path = json_path.clone();
                Some(Rc::new(manifest))
            }
            _ => None,
        };

        self.cache.borrow_mut().insert(json_path, manifest.clone());
        Ok(manifest)
    }

    /// Find the nearest manifest enclosing `check_path` (a file path).
    ///
    /// The walk stops at a `node_modules` boundary: a file directly inside
    /// `node_modules` belongs to no package.
    pub fn read_scope(&self, check_path: &Path) -> Result<Option<Rc<PackageManifest>>> {
        let mut current = check_path.parent();
        while let Some(dir) = current {
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                return Ok(None);
            }
            if let Some(manifest) = self.read(dir)? {
                return Ok(Some(manifest));
            }
            current = dir.parent();
        }
        Ok(None)
    }

    /// Number of memoized directories (positive and negative)
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}
