// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # requirefire-core
//!
//! Isolated CommonJS module loading for embedding hosts.
//!
//! A [`Loader`] resolves requests with the Node.js CommonJS algorithm and
//! evaluates every file it finds into its own private module cache. Two
//! loaders never share a module instance, so requiring the same file from a
//! fresh loader re-runs it and yields new exports. Builtins stay shared with
//! the host.
//!
//! The script engine itself is supplied by the embedder through the
//! [`Host`] trait.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use requirefire_core::Loader;
//!
//! let loader = Loader::builder(MyHost::new())
//!     .context("/srv/app/index.js")
//!     .build();
//!
//! let config = loader.require("./config")?;
//! loader.cache().clear();
//! let fresh = loader.require("./config")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fs;
pub mod host;
pub mod module_system;
pub mod specifier;

// Re-exports
pub use config::{LoaderOptions, ResolverOptions};
pub use error::{LoadError, Result};
pub use fs::{FileSystem, OsFileSystem, Stat};
pub use host::{BuiltinModules, Host, NodeBuiltins};
pub use module_system::{
    Anchor, Artifact, ArtifactState, ExtensionHandler, ExtensionRegistry, Loader, LoaderBuilder,
    ModuleCache, ModuleScope, Require, Resolution, Resolver, WrappedSource,
};
pub use specifier::{Specifier, SpecifierKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
