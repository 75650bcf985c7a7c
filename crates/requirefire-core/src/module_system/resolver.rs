// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (Node.js CommonJS algorithm)

use crate::config::ResolverOptions;
use crate::error::{LoadError, Result};
use crate::fs::{FileSystem, Stat};
use crate::host::BuiltinModules;
use crate::module_system::exports::resolve_package_exports;
use crate::module_system::extensions::ExtensionRegistry;
use crate::module_system::lookup::{
    has_trailing_slash, node_module_paths, normalize, resolve_against, with_suffix,
};
use crate::module_system::package::{PackageManifest, PackageReader};
use crate::specifier::{is_relative, Specifier, SpecifierKind};
use regex::Regex;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

/// Package name followed by an optional `/subpath`
static EXPORTS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:@[^/\\%]+/)?[^./\\%][^/\\%]*)(/.*)?$").expect("exports pattern is valid")
});

/// The module on whose behalf a request is resolved
pub trait Requester {
    /// File of the requesting module, if it has one
    fn filename(&self) -> Option<&Path>;

    /// `node_modules` directories this module loads packages from
    fn lookup_paths(&self) -> &[PathBuf];

    /// This module followed by the modules that loaded it, innermost first
    fn require_stack(&self) -> Vec<PathBuf>;
}

/// A requester that is not a loaded module: a file or a working directory
/// used to anchor top-level requests.
#[derive(Debug, Clone)]
pub struct Anchor {
    filename: Option<PathBuf>,
    paths: Vec<PathBuf>,
}

impl Anchor {
    /// Anchor requests at a file, as if that file were requiring them
    pub fn file(filename: impl Into<PathBuf>) -> Self {
        let filename = normalize(&filename.into());
        let paths = node_module_paths(filename.parent().unwrap_or(Path::new("/")));
        Self {
            filename: Some(filename),
            paths,
        }
    }

    /// Anchor requests at a directory with no requesting file.
    ///
    /// Relative requests resolve against the resolver's working directory.
    pub fn directory(dir: impl AsRef<Path>) -> Self {
        Self {
            filename: None,
            paths: node_module_paths(dir.as_ref()),
        }
    }
}

impl Requester for Anchor {
    fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    fn lookup_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn require_stack(&self) -> Vec<PathBuf> {
        self.filename.iter().cloned().collect()
    }
}

/// Why a request is handed back to the host instead of being resolved here
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delegation {
    /// `#` request inside a package declaring `imports`
    PackageImports {
        /// The declaring manifest
        package_json: PathBuf,
    },
    /// A package requiring itself by name through its own `exports`
    SelfReference {
        /// The declaring manifest
        package_json: PathBuf,
    },
}

/// Result of module resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Platform builtin, returned unresolved
    Builtin(String),
    /// Canonical path of a file on disk
    File(PathBuf),
    /// Resolution is left to the host loader
    Delegated {
        /// The original request
        request: String,
        /// What triggered the delegation
        reason: Delegation,
    },
}

impl Resolution {
    /// The resolved file, if this is a file resolution
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(name) => f.write_str(name),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Delegated { request, .. } => f.write_str(request),
        }
    }
}

/// A non-fatal condition noticed during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveWarning {
    /// Deprecation code
    pub code: &'static str,
    /// Human readable description
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PathCacheKey {
    request: String,
    paths: Vec<PathBuf>,
}

/// Module resolver implementing the CommonJS resolution algorithm.
///
/// Owns every cache involved in resolution: resolved paths (including
/// misses), package manifests and canonical paths. None of them are ever
/// evicted; build a new resolver to observe a changed file system.
pub struct Resolver {
    fs: Rc<dyn FileSystem>,
    builtins: Rc<dyn BuiltinModules>,
    extensions: Rc<ExtensionRegistry>,
    packages: PackageReader,
    options: ResolverOptions,
    global_paths: Vec<PathBuf>,
    cwd: PathBuf,
    path_cache: RefCell<FxHashMap<PathCacheKey, Option<PathBuf>>>,
    realpath_cache: RefCell<FxHashMap<PathBuf, PathBuf>>,
    warnings: RefCell<Vec<ResolveWarning>>,
}

impl Resolver {
    /// Create a resolver over the given collaborators
    pub fn new(
        options: ResolverOptions,
        fs: Rc<dyn FileSystem>,
        extensions: Rc<ExtensionRegistry>,
        builtins: Rc<dyn BuiltinModules>,
    ) -> Self {
        let cwd = options
            .cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let global_paths = options.lookup_globals();

        Self {
            packages: PackageReader::new(fs.clone()),
            fs,
            builtins,
            extensions,
            options,
            global_paths,
            cwd,
            path_cache: RefCell::new(FxHashMap::default()),
            realpath_cache: RefCell::new(FxHashMap::default()),
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Working directory used for requests without a requester file
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Registered extensions, in probing order
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Resolve `request` on behalf of `requester`.
    ///
    /// `is_main` selects the entry-point symlink policy.
    pub fn resolve(
        &self,
        request: &str,
        requester: Option<&dyn Requester>,
        is_main: bool,
    ) -> Result<Resolution> {
        let specifier = Specifier::parse(request)?;

        if self.builtins.is_builtin(request) {
            trace!("'{}' is a builtin", request);
            return Ok(Resolution::Builtin(request.to_string()));
        }

        let parent_file = requester.and_then(|r| r.filename());

        if specifier.kind() == SpecifierKind::Internal {
            if let Some(file) = parent_file {
                if let Some(scope) = self.packages.read_scope(file)? {
                    if scope.imports.is_some() {
                        debug!("Delegating '{}' to the host (package imports)", request);
                        return Ok(Resolution::Delegated {
                            request: request.to_string(),
                            reason: Delegation::PackageImports {
                                package_json: scope.path.clone(),
                            },
                        });
                    }
                }
            }
        }

        if let Some(file) = parent_file {
            if let Some(scope) = self.self_reference_scope(file, request)? {
                debug!("Delegating '{}' to the host (self reference)", request);
                return Ok(Resolution::Delegated {
                    request: request.to_string(),
                    reason: Delegation::SelfReference {
                        package_json: scope.path.clone(),
                    },
                });
            }
        }

        let paths = self.lookup_paths(request, requester).unwrap_or_default();
        match self.find_path(request, &paths, is_main, requester)? {
            Some(path) => {
                debug!("Resolved '{}' to {}", request, path.display());
                Ok(Resolution::File(path))
            }
            None => {
                let require_stack = requester.map(|r| r.require_stack()).unwrap_or_default();
                Err(LoadError::module_not_found(request, require_stack))
            }
        }
    }

    /// Directories searched for `request`, or `None` when there is nothing to
    /// search (builtins, or a bare request with no lookup paths at all).
    pub fn lookup_paths(
        &self,
        request: &str,
        requester: Option<&dyn Requester>,
    ) -> Option<Vec<PathBuf>> {
        if self.builtins.is_builtin(request) {
            return None;
        }

        if !is_relative(request) {
            let mut paths: Vec<PathBuf> = requester
                .map(|r| r.lookup_paths().to_vec())
                .unwrap_or_default();
            paths.extend(self.global_paths.iter().cloned());
            return if paths.is_empty() { None } else { Some(paths) };
        }

        match requester.and_then(|r| r.filename()) {
            Some(file) => Some(vec![file.parent().unwrap_or(Path::new("/")).to_path_buf()]),
            None => Some(vec![PathBuf::from(".")]),
        }
    }

    /// Drain warnings recorded since the last call
    pub fn take_warnings(&self) -> Vec<ResolveWarning> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }

    /// Number of memoized `(request, paths)` resolutions, hits and misses
    pub fn path_cache_len(&self) -> usize {
        self.path_cache.borrow().len()
    }

    /// Nearest package manifest enclosing `file`
    pub fn package_scope(&self, file: &Path) -> Result<Option<Rc<PackageManifest>>> {
        self.packages.read_scope(file)
    }

    /// The package scope of `file`, if `request` names that package through
    /// its own `exports`
    fn self_reference_scope(
        &self,
        file: &Path,
        request: &str,
    ) -> Result<Option<Rc<PackageManifest>>> {
        let Some(scope) = self.packages.read_scope(file)? else {
            return Ok(None);
        };
        if scope.exports.is_none() {
            return Ok(None);
        }
        let Some(name) = scope.name.as_deref() else {
            return Ok(None);
        };
        let matches = request
            .strip_prefix(name)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        Ok(if matches { Some(scope) } else { None })
    }

    fn find_path(
        &self,
        request: &str,
        paths: &[PathBuf],
        is_main: bool,
        requester: Option<&dyn Requester>,
    ) -> Result<Option<PathBuf>> {
        let absolute = Path::new(request).is_absolute();
        let candidates: Vec<PathBuf> = if absolute {
            vec![PathBuf::new()]
        } else if paths.is_empty() {
            return Ok(None);
        } else {
            paths.to_vec()
        };

        let key = PathCacheKey {
            request: request.to_string(),
            paths: candidates.clone(),
        };
        if let Some(cached) = self.path_cache.borrow().get(&key) {
            trace!("Path cache hit for '{}'", request);
            return Ok(cached.clone());
        }

        let trailing_slash = has_trailing_slash(request);
        let inside = is_inside_path(request, absolute);

        let mut found = None;
        for dir in &candidates {
            let dir_exists = dir.as_os_str().is_empty()
                || self.fs.stat(&resolve_against(&self.cwd, dir, "")) == Stat::Directory;
            if inside && !dir_exists {
                continue;
            }

            if !absolute {
                if let Some(path) = self.resolve_exports(dir, request, is_main, requester)? {
                    found = Some(path);
                    break;
                }
            }

            let base = resolve_against(&self.cwd, dir, request);
            let stat = self.fs.stat(&base);
            trace!("Probing {}", base.display());

            let mut filename = None;
            if !trailing_slash {
                if stat == Stat::File {
                    filename = Some(self.to_real_path(&base, is_main)?);
                }
                if filename.is_none() {
                    filename = self.try_extensions(&base, is_main)?;
                }
            }
            if filename.is_none() && stat == Stat::Directory {
                filename = self.try_package(&base, is_main, request)?;
            }

            if filename.is_some() {
                found = filename;
                break;
            }
        }

        self.path_cache.borrow_mut().insert(key, found.clone());
        Ok(found)
    }

    /// Resolve a bare request through the `exports` of a package installed in
    /// `modules_dir`
    fn resolve_exports(
        &self,
        modules_dir: &Path,
        request: &str,
        is_main: bool,
        requester: Option<&dyn Requester>,
    ) -> Result<Option<PathBuf>> {
        let Some(captures) = EXPORTS_PATTERN.captures(request) else {
            return Ok(None);
        };
        let name = &captures[1];
        let expansion = captures.get(2).map_or("", |m| m.as_str());

        let package_dir = resolve_against(&self.cwd, modules_dir, name);
        let Some(manifest) = self.packages.read(&package_dir)? else {
            return Ok(None);
        };
        let Some(exports) = manifest.exports.as_ref() else {
            return Ok(None);
        };

        let subpath = format!(".{}", expansion);
        let target =
            resolve_package_exports(&manifest.path, &subpath, exports, &self.options.conditions)?;
        if self.fs.stat(&target) != Stat::File {
            let require_stack = requester.map(|r| r.require_stack()).unwrap_or_default();
            return Err(LoadError::module_not_found(
                target.display().to_string(),
                require_stack,
            ));
        }
        trace!("'{}' matched exports of {}", request, manifest.path.display());
        self.to_real_path(&target, is_main).map(Some)
    }

    fn try_package(&self, dir: &Path, is_main: bool, request: &str) -> Result<Option<PathBuf>> {
        let manifest = self.packages.read(dir)?;
        let Some(main) = manifest.as_ref().and_then(|m| m.main_entry()) else {
            return self.try_extensions(&dir.join("index"), is_main);
        };

        let filename = normalize(&dir.join(main));
        let mut actual = self.try_file(&filename, is_main)?;
        if actual.is_none() {
            actual = self.try_extensions(&filename, is_main)?;
        }
        if actual.is_none() {
            actual = self.try_extensions(&filename.join("index"), is_main)?;
        }
        if actual.is_some() {
            return Ok(actual);
        }

        let package_json = dir.join("package.json");
        match self.try_extensions(&dir.join("index"), is_main)? {
            Some(index) => {
                let message = format!(
                    "Invalid 'main' field in '{}' of '{}'. Please either fix that or report it to the module author",
                    package_json.display(),
                    main
                );
                warn!(code = "DEP0128", "{}", message);
                self.warnings.borrow_mut().push(ResolveWarning {
                    code: "DEP0128",
                    message,
                });
                Ok(Some(index))
            }
            None => Err(LoadError::InvalidPackageMain {
                main: filename,
                package_json,
                request: request.to_string(),
            }),
        }
    }

    fn try_file(&self, path: &Path, is_main: bool) -> Result<Option<PathBuf>> {
        if self.fs.stat(path) != Stat::File {
            return Ok(None);
        }
        self.to_real_path(path, is_main).map(Some)
    }

    fn try_extensions(&self, base: &Path, is_main: bool) -> Result<Option<PathBuf>> {
        for ext in self.extensions.keys() {
            if let Some(path) = self.try_file(&with_suffix(base, ext), is_main)? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn to_real_path(&self, path: &Path, is_main: bool) -> Result<PathBuf> {
        let preserve = if is_main {
            self.options.preserve_symlinks_main
        } else {
            self.options.preserve_symlinks
        };
        if preserve {
            return Ok(path.to_path_buf());
        }

        if let Some(real) = self.realpath_cache.borrow().get(path) {
            return Ok(real.clone());
        }
        let real = self
            .fs
            .realpath(path)
            .map_err(|e| LoadError::io(path, e))?;
        self.realpath_cache
            .borrow_mut()
            .insert(path.to_path_buf(), real.clone());
        Ok(real)
    }
}

/// Relative requests that stay below their base, and bare requests, may skip
/// lookup directories that do not exist. Absolute requests and requests
/// escaping upwards probe every candidate.
fn is_inside_path(request: &str, absolute: bool) -> bool {
    if absolute {
        return false;
    }
    if is_relative(request) {
        return !normalize(Path::new(request)).starts_with("..");
    }
    true
}
