// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Isolated module loader - resolves, caches and evaluates modules

use crate::config::LoaderOptions;
use crate::error::{LoadError, Result};
use crate::fs::{FileSystem, OsFileSystem};
use crate::host::{BuiltinModules, Host};
use crate::module_system::cache::{Artifact, ArtifactState, ModuleCache};
use crate::module_system::extensions::{ExtensionHandler, ExtensionRegistry};
use crate::module_system::lookup::{node_module_paths, normalize};
use crate::module_system::resolver::{Requester, Resolution, ResolveWarning, Resolver};
use crate::module_system::wrapper::{build_prelude, WrappedSource};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// A CommonJS loader with a private module cache.
///
/// Every module loaded through it, and everything those modules require in
/// turn, is evaluated again and tracked in this loader's cache only.
/// Builtins and delegated requests go to the host and are shared.
pub struct Loader<H: Host> {
    inner: Rc<LoaderInner<H>>,
}

pub(crate) struct LoaderInner<H: Host> {
    host: Rc<H>,
    fs: Rc<dyn FileSystem>,
    resolver: Resolver,
    extensions: Rc<ExtensionRegistry>,
    cache: ModuleCache<H>,
    environment: H::Value,
    context: Rc<Artifact<H>>,
    options: LoaderOptions,
}

/// Builder for [`Loader`]
pub struct LoaderBuilder<H: Host> {
    host: Rc<H>,
    options: LoaderOptions,
    fs: Rc<dyn FileSystem>,
    extensions: ExtensionRegistry,
}

impl<H: Host> LoaderBuilder<H> {
    /// Loader options
    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// File the top-level requests are resolved from
    pub fn context(mut self, file: impl Into<PathBuf>) -> Self {
        self.options.context = Some(file.into());
        self
    }

    /// File system used for probing and reading sources
    pub fn file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Rc::new(fs);
        self
    }

    /// Extension registry used for probing and dispatch
    pub fn extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    /// Build the loader, capturing the host's environment context now
    pub fn build(self) -> Loader<H> {
        let LoaderBuilder {
            host,
            options,
            fs,
            extensions,
        } = self;

        let extensions = Rc::new(extensions);
        let builtins: Rc<dyn BuiltinModules> = host.clone();
        let resolver = Resolver::new(
            options.resolver.clone(),
            fs.clone(),
            extensions.clone(),
            builtins,
        );
        let environment = host.environment();

        let (filename, paths) = match &options.context {
            Some(file) => {
                let file = normalize(&resolver.cwd().join(file));
                let paths = node_module_paths(file.parent().unwrap_or(Path::new("/")));
                (Some(file), paths)
            }
            None => (None, node_module_paths(resolver.cwd())),
        };
        debug!(
            "Creating isolated loader anchored at {}",
            filename
                .as_deref()
                .unwrap_or(resolver.cwd())
                .display()
        );

        let inner = Rc::new_cyclic(|weak: &Weak<LoaderInner<H>>| {
            let context = Rc::new(Artifact::anchor(
                filename,
                paths,
                host.new_exports(),
                environment.clone(),
                weak.clone(),
            ));
            LoaderInner {
                host,
                fs,
                resolver,
                extensions,
                cache: ModuleCache::new(),
                environment,
                context,
                options,
            }
        });

        Loader { inner }
    }
}

impl<H: Host> Loader<H> {
    /// A loader over the real file system, with default options
    pub fn new(host: H) -> Self {
        Self::builder(host).build()
    }

    /// Start configuring a loader
    pub fn builder(host: H) -> LoaderBuilder<H> {
        LoaderBuilder {
            host: Rc::new(host),
            options: LoaderOptions::default(),
            fs: Rc::new(OsFileSystem),
            extensions: ExtensionRegistry::default(),
        }
    }

    /// Load `request` from the loader's context and return its exports
    pub fn require(&self, request: &str) -> Result<H::Value> {
        self.inner.load(request, &self.inner.context)
    }

    /// Resolve `request` from the loader's context without loading it
    pub fn resolve(&self, request: &str) -> Result<String> {
        self.inner.resolve(request, &self.inner.context)
    }

    /// Lookup paths for `request` from the loader's context
    pub fn resolve_paths(&self, request: &str) -> Option<Vec<PathBuf>> {
        let requester: &dyn Requester = &*self.inner.context;
        self.inner.resolver.lookup_paths(request, Some(requester))
    }

    /// The isolated cache
    pub fn cache(&self) -> &ModuleCache<H> {
        &self.inner.cache
    }

    /// The artifact top-level requests are made from
    pub fn context(&self) -> &Rc<Artifact<H>> {
        &self.inner.context
    }

    /// The environment context captured when this loader was built
    pub fn environment(&self) -> &H::Value {
        &self.inner.environment
    }

    /// The evaluation host
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// The resolver owned by this loader
    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    /// The loader's options
    pub fn options(&self) -> &LoaderOptions {
        &self.inner.options
    }

    /// Drain resolution warnings recorded since the last call
    pub fn take_warnings(&self) -> Vec<ResolveWarning> {
        self.inner.resolver.take_warnings()
    }
}

impl<H: Host> LoaderInner<H> {
    pub(crate) fn load(self: &Rc<Self>, request: &str, parent: &Rc<Artifact<H>>) -> Result<H::Value> {
        let requester: &dyn Requester = &**parent;
        match self.resolver.resolve(request, Some(requester), false)? {
            Resolution::Builtin(name) => {
                trace!("Passing builtin '{}' to the host", name);
                self.host
                    .require_host(&name, parent.filename())
                    .map_err(LoadError::from_host)
            }
            Resolution::Delegated { request, .. } => self
                .host
                .require_host(&request, parent.filename())
                .map_err(LoadError::from_host),
            Resolution::File(path) => self.load_file(path, parent),
        }
    }

    pub(crate) fn resolve(&self, request: &str, parent: &Rc<Artifact<H>>) -> Result<String> {
        let requester: &dyn Requester = &**parent;
        match self.resolver.resolve(request, Some(requester), false)? {
            Resolution::Builtin(name) => Ok(name),
            Resolution::File(path) => Ok(path.display().to_string()),
            Resolution::Delegated { request, .. } => self
                .host
                .resolve_host(&request, parent.filename())
                .map_err(LoadError::from_host),
        }
    }

    fn load_file(self: &Rc<Self>, path: PathBuf, parent: &Rc<Artifact<H>>) -> Result<H::Value> {
        if let Some(cached) = self.cache.get(&path) {
            trace!("Module cache hit for {}", path.display());
            parent.add_child(&path);
            return Ok(cached.exports());
        }

        let module = Rc::new(Artifact::new(
            path.clone(),
            parent,
            self.host.new_exports(),
            self.environment.clone(),
            Rc::downgrade(self),
        ));
        // Inserted before evaluation so circular requires see the same artifact
        self.cache.set(path.clone(), module.clone());
        parent.add_child(&path);

        debug!("Evaluating {}", path.display());
        module.set_state(ArtifactState::Evaluating);
        self.evaluate(&module, &path)?;
        module.set_state(ArtifactState::Settled);

        Ok(module.exports())
    }

    fn evaluate(&self, module: &Rc<Artifact<H>>, path: &Path) -> Result<()> {
        let extension = self.extensions.longest_match(path);
        let handler = self
            .extensions
            .get(extension)
            .unwrap_or(ExtensionHandler::Source);
        let scope = ModuleScope { module };

        let outcome = match handler {
            ExtensionHandler::Source => {
                let source = self.read(path)?;
                let body = source.strip_prefix('\u{feff}').unwrap_or(&source);
                let prelude = build_prelude(
                    &self.host.global_names(),
                    &self.options.environment_binding,
                    &self.options.reserved_globals,
                );
                let unit = WrappedSource::new(prelude, body);
                self.host.evaluate(&unit, &scope)
            }
            ExtensionHandler::Text => {
                let content = self.read(path)?;
                self.host.load_extension(extension, Some(&content), &scope)
            }
            ExtensionHandler::Opaque => self.host.load_extension(extension, None, &scope),
        };
        outcome.map_err(LoadError::from_host)
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.fs
            .read_to_string(path)
            .map_err(|e| LoadError::io(path, e))
    }
}

/// What the host sees of the module being evaluated
pub struct ModuleScope<'a, H: Host> {
    module: &'a Rc<Artifact<H>>,
}

impl<'a, H: Host> ModuleScope<'a, H> {
    /// The module being evaluated
    pub fn module(&self) -> &'a Rc<Artifact<H>> {
        self.module
    }

    /// `__filename`
    pub fn filename(&self) -> Option<&'a Path> {
        self.module.filename()
    }

    /// `__dirname`
    pub fn dirname(&self) -> Option<&'a Path> {
        self.module.dirname()
    }

    /// Current `module.exports`
    pub fn exports(&self) -> H::Value {
        self.module.exports()
    }

    /// Assign `module.exports`
    pub fn set_exports(&self, value: H::Value) {
        self.module.set_exports(value);
    }

    /// The environment context to bind for this module
    pub fn environment(&self) -> &'a H::Value {
        self.module.environment()
    }

    /// The loading capability to bind as `require`
    pub fn require(&self) -> Require<H> {
        Require {
            module: self.module.clone(),
        }
    }
}

/// The `require` function seen by a loaded module.
///
/// Loads through the isolated loader with the module as requester. Holds
/// the loader weakly: once the [`Loader`] is dropped, calls fail with
/// [`LoadError::LoaderReleased`].
pub struct Require<H: Host> {
    module: Rc<Artifact<H>>,
}

impl<H: Host> Clone for Require<H> {
    fn clone(&self) -> Self {
        Self {
            module: self.module.clone(),
        }
    }
}

impl<H: Host> Require<H> {
    fn loader(&self) -> Result<Rc<LoaderInner<H>>> {
        self.module
            .loader
            .upgrade()
            .ok_or_else(|| LoadError::LoaderReleased(self.module.id().to_string()))
    }

    /// `require(request)`
    pub fn call(&self, request: &str) -> Result<H::Value> {
        self.loader()?.load(request, &self.module)
    }

    /// `require.resolve(request)`
    pub fn resolve(&self, request: &str) -> Result<String> {
        self.loader()?.resolve(request, &self.module)
    }

    /// `require.resolve.paths(request)`
    pub fn resolve_paths(&self, request: &str) -> Result<Option<Vec<PathBuf>>> {
        let requester: &dyn Requester = &*self.module;
        Ok(self.loader()?.resolver.lookup_paths(request, Some(requester)))
    }

    /// `require.cache`: the isolated cache, not the host's
    pub fn cache(&self) -> Result<ModuleCache<H>> {
        Ok(self.loader()?.cache.clone())
    }

    /// `require.extensions`, in probing order
    pub fn extensions(&self) -> Result<Vec<String>> {
        Ok(self.loader()?.extensions.keys().map(String::from).collect())
    }

    /// The requesting module
    pub fn module(&self) -> &Rc<Artifact<H>> {
        &self.module
    }
}
