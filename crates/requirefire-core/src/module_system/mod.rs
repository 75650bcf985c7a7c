// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Isolated CommonJS module system
//!
//! ## Resolution
//! - Relative, absolute and bare requests
//! - `node_modules` lookup, `package.json` `main` and `exports`
//! - Extension probing in registry order
//! - Path, manifest and realpath caches per resolver
//!
//! ## Loading
//! - A private module cache per [`Loader`]
//! - Source wrapped with a prelude that rebinds `require`
//! - Builtins and delegated requests passed to the host

mod cache;
pub mod exports;
mod extensions;
pub mod lookup;
mod loader;
mod package;
mod resolver;
mod wrapper;

pub use cache::{Artifact, ArtifactState, ModuleCache};
pub use extensions::{ExtensionHandler, ExtensionRegistry};
pub use loader::{Loader, LoaderBuilder, ModuleScope, Require};
pub use lookup::node_module_paths;
pub use package::PackageManifest;
pub use resolver::{Anchor, Delegation, Requester, Resolution, ResolveWarning, Resolver};
pub use wrapper::{
    build_prelude, is_valid_identifier, WrappedSource, ENVIRONMENT_BINDING, REQUIRE_BINDING,
};
