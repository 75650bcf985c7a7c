// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lookup path construction and lexical path helpers

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

const NODE_MODULES: &str = "node_modules";

/// Every `node_modules` directory a module in `from` may load packages from,
/// nearest first.
///
/// Ancestors that are themselves `node_modules` directories are skipped so
/// that `a/node_modules/b` looks in `a/node_modules/b/node_modules` and
/// `a/node_modules`, never in `a/node_modules/node_modules`.
pub fn node_module_paths(from: &Path) -> Vec<PathBuf> {
    let from = normalize(from);
    let mut paths = Vec::new();

    for ancestor in from.ancestors() {
        if ancestor.parent().is_none() {
            paths.push(ancestor.join(NODE_MODULES));
            break;
        }
        if ancestor.file_name().is_some_and(|name| name == NODE_MODULES) {
            continue;
        }
        paths.push(ancestor.join(NODE_MODULES));
    }

    paths
}

/// Lexically resolve `.` and `..` components without touching the disk.
///
/// Leading `..` components of a relative path are kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                out.push(component.as_os_str());
                depth = 0;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// `path.resolve(base, request)`: join onto `base` (made absolute against
/// `cwd`) and normalize.
pub fn resolve_against(cwd: &Path, base: &Path, request: &str) -> PathBuf {
    let joined = if base.is_absolute() {
        base.join(request)
    } else {
        cwd.join(base).join(request)
    };
    normalize(&joined)
}

/// Append an extension to the full file name (`a.min` + `.js` = `a.min.js`)
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Requests that must be treated as directories: a trailing separator, or
/// a final `.`/`..` segment.
pub fn has_trailing_slash(request: &str) -> bool {
    if request.ends_with('/') || (cfg!(windows) && request.ends_with('\\')) {
        return true;
    }
    let last = request
        .rsplit(|c| c == '/' || (cfg!(windows) && c == '\\'))
        .next()
        .unwrap_or(request);
    last == "." || last == ".."
}
