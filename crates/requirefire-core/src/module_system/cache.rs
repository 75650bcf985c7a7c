// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Isolated module cache

use crate::host::Host;
use crate::module_system::loader::LoaderInner;
use crate::module_system::resolver::Requester;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

/// Lifecycle of a loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Inserted in the cache, exports still empty
    Created,
    /// Body executing; re-entrant requires see partial exports
    Evaluating,
    /// Body finished
    Settled,
}

/// One loaded module.
///
/// Identified by its canonical path. An artifact whose evaluation failed
/// stays in `Evaluating` and remains cached as-is.
pub struct Artifact<H: Host> {
    id: String,
    filename: Option<PathBuf>,
    paths: Vec<PathBuf>,
    parent: Option<Weak<Artifact<H>>>,
    exports: RefCell<H::Value>,
    environment: H::Value,
    state: Cell<ArtifactState>,
    children: RefCell<Vec<PathBuf>>,
    pub(crate) loader: Weak<LoaderInner<H>>,
}

impl<H: Host> Artifact<H> {
    pub(crate) fn new(
        filename: PathBuf,
        parent: &Rc<Artifact<H>>,
        exports: H::Value,
        environment: H::Value,
        loader: Weak<LoaderInner<H>>,
    ) -> Self {
        let dir = filename.parent().unwrap_or(Path::new("/"));
        Self {
            id: filename.display().to_string(),
            paths: super::lookup::node_module_paths(dir),
            filename: Some(filename),
            parent: Some(Rc::downgrade(parent)),
            exports: RefCell::new(exports),
            environment,
            state: Cell::new(ArtifactState::Created),
            children: RefCell::new(Vec::new()),
            loader,
        }
    }

    /// The artifact top-level requests are made from
    pub(crate) fn anchor(
        filename: Option<PathBuf>,
        paths: Vec<PathBuf>,
        exports: H::Value,
        environment: H::Value,
        loader: Weak<LoaderInner<H>>,
    ) -> Self {
        Self {
            id: filename
                .as_ref()
                .map_or_else(|| ".".to_string(), |f| f.display().to_string()),
            filename,
            paths,
            parent: None,
            exports: RefCell::new(exports),
            environment,
            state: Cell::new(ArtifactState::Settled),
            children: RefCell::new(Vec::new()),
            loader,
        }
    }

    /// Identifier (the filename, or `.` for a directory anchor)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Canonical path of the module file
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Directory containing the module file
    pub fn dirname(&self) -> Option<&Path> {
        self.filename.as_deref().and_then(Path::parent)
    }

    /// `node_modules` directories searched for this module's bare requests
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// The module that first loaded this one, while it is still alive
    pub fn parent(&self) -> Option<Rc<Artifact<H>>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Current exports value
    pub fn exports(&self) -> H::Value {
        self.exports.borrow().clone()
    }

    /// Replace the exports value (`module.exports = ...`)
    pub fn set_exports(&self, value: H::Value) {
        *self.exports.borrow_mut() = value;
    }

    /// Environment context captured for this module
    pub fn environment(&self) -> &H::Value {
        &self.environment
    }

    /// Lifecycle state
    pub fn state(&self) -> ArtifactState {
        self.state.get()
    }

    /// Whether evaluation finished
    pub fn is_loaded(&self) -> bool {
        self.state.get() == ArtifactState::Settled
    }

    pub(crate) fn set_state(&self, state: ArtifactState) {
        self.state.set(state);
    }

    /// Paths of modules loaded through this one
    pub fn children(&self) -> Vec<PathBuf> {
        self.children.borrow().clone()
    }

    pub(crate) fn add_child(&self, path: &Path) {
        let mut children = self.children.borrow_mut();
        if !children.iter().any(|child| child == path) {
            children.push(path.to_path_buf());
        }
    }
}

impl<H: Host> Requester for Artifact<H> {
    fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    fn lookup_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn require_stack(&self) -> Vec<PathBuf> {
        let mut stack: Vec<PathBuf> = self.filename.iter().cloned().collect();
        let mut cursor = self.parent();
        while let Some(module) = cursor {
            if let Some(filename) = module.filename() {
                stack.push(filename.to_path_buf());
            }
            cursor = module.parent();
        }
        stack
    }
}

impl<H: Host> fmt::Debug for Artifact<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("children", &self.children.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Handle to one loader's private module cache.
///
/// Clones share the same map. Removing an entry forces the next request for
/// that path to create and evaluate a new artifact; nothing that already
/// captured the old exports is touched.
pub struct ModuleCache<H: Host> {
    cache: Rc<RefCell<FxHashMap<PathBuf, Rc<Artifact<H>>>>>,
}

impl<H: Host> ModuleCache<H> {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: Rc::new(RefCell::new(FxHashMap::default())),
        }
    }

    /// Get a cached module by path
    pub fn get(&self, path: &Path) -> Option<Rc<Artifact<H>>> {
        self.cache.borrow().get(path).cloned()
    }

    /// Check if a module is cached
    pub fn has(&self, path: &Path) -> bool {
        self.cache.borrow().contains_key(path)
    }

    /// Add a module to the cache
    pub fn set(&self, path: PathBuf, module: Rc<Artifact<H>>) {
        self.cache.borrow_mut().insert(path, module);
    }

    /// Remove a module from the cache
    pub fn delete(&self, path: &Path) -> Option<Rc<Artifact<H>>> {
        self.cache.borrow_mut().remove(path)
    }

    /// Keep only the modules matching `keep`
    pub fn retain(&self, mut keep: impl FnMut(&Path, &Artifact<H>) -> bool) {
        self.cache
            .borrow_mut()
            .retain(|path, module| keep(path, module));
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Get all cached module paths
    pub fn keys(&self) -> Vec<PathBuf> {
        self.cache.borrow().keys().cloned().collect()
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Whether two handles refer to the same cache
    pub fn same_cache(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cache, &other.cache)
    }
}

impl<H: Host> Clone for ModuleCache<H> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<H: Host> Default for ModuleCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> fmt::Debug for ModuleCache<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.cache.borrow().keys()).finish()
    }
}
