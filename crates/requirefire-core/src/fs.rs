// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! File system capability consumed by the resolver and the loader

use std::io;
use std::path::{Path, PathBuf};

/// What a path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    /// Nothing there (or not accessible)
    Missing,
    /// A regular file
    File,
    /// A directory
    Directory,
}

/// Synchronous file system operations needed for resolution and loading.
///
/// Implementations may be backed by the real disk or by a virtual tree.
pub trait FileSystem {
    /// Classify a path, following symlinks
    fn stat(&self, path: &Path) -> Stat;

    /// Read a file as UTF-8 text
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Canonicalize a path, resolving every symlink
    fn realpath(&self, path: &Path) -> io::Result<PathBuf>;
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn stat(&self, path: &Path) -> Stat {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Stat::Directory,
            Ok(_) => Stat::File,
            Err(_) => Stat::Missing,
        }
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn realpath(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}
