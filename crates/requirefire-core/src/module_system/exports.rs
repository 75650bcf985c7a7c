// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package `exports` map resolution for CommonJS consumers

use crate::error::{LoadError, Result};
use crate::module_system::lookup::normalize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Outcome of resolving one exports target
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// A concrete file path inside the package
    Found(PathBuf),
    /// Explicitly excluded with `null`
    Excluded,
    /// No condition matched
    Unmatched,
}

/// Resolves `subpath` (`.` or `./x`) through a package's `exports` field.
///
/// `package_json` is the manifest path; the package root is its parent.
pub fn resolve_package_exports(
    package_json: &Path,
    subpath: &str,
    exports: &Value,
    conditions: &[String],
) -> Result<PathBuf> {
    let resolver = ExportsResolver {
        package_json,
        package_dir: package_json.parent().unwrap_or(Path::new("/")),
        subpath,
        conditions,
    };
    resolver.resolve(exports)
}

struct ExportsResolver<'a> {
    package_json: &'a Path,
    package_dir: &'a Path,
    subpath: &'a str,
    conditions: &'a [String],
}

impl ExportsResolver<'_> {
    fn resolve(&self, exports: &Value) -> Result<PathBuf> {
        let sugar;
        let map = match exports {
            Value::Object(map) if !self.is_conditional_sugar(map)? => map,
            _ => {
                let mut wrapped = Map::new();
                wrapped.insert(".".to_string(), exports.clone());
                sugar = wrapped;
                &sugar
            }
        };

        if !self.subpath.contains('*') {
            if let Some(target) = map.get(self.subpath) {
                return self.finish(self.resolve_target(target, None)?);
            }
        }

        let mut best: Option<(&str, &str)> = None;
        for key in map.keys() {
            let Some(star) = key.find('*') else { continue };
            if key.rfind('*') != Some(star) {
                continue;
            }
            let (base, trailer) = (&key[..star], &key[star + 1..]);
            if !self.subpath.starts_with(base)
                || self.subpath.len() < key.len()
                || !self.subpath.ends_with(trailer)
            {
                continue;
            }
            if best.is_none_or(|(current, _)| pattern_key_wins(current, key)) {
                let matched = &self.subpath[star..self.subpath.len() - trailer.len()];
                best = Some((key.as_str(), matched));
            }
        }

        match best {
            Some((key, matched)) => self.finish(self.resolve_target(&map[key], Some(matched))?),
            None => Err(self.not_exported()),
        }
    }

    fn finish(&self, target: Target) -> Result<PathBuf> {
        match target {
            Target::Found(path) => Ok(path),
            Target::Excluded | Target::Unmatched => Err(self.not_exported()),
        }
    }

    /// A string, an array, or an object whose keys are all conditions is
    /// shorthand for `{ ".": exports }`. Mixing both kinds of key is invalid.
    fn is_conditional_sugar(&self, map: &Map<String, Value>) -> Result<bool> {
        let mut subpath_keys = 0;
        for key in map.keys() {
            if key.starts_with('.') {
                subpath_keys += 1;
            }
        }
        if subpath_keys == 0 {
            Ok(true)
        } else if subpath_keys == map.len() {
            Ok(false)
        } else {
            Err(LoadError::InvalidPackageConfig {
                package_json: self.package_json.to_path_buf(),
                reason: "\"exports\" cannot contain some keys starting with '.' and some not"
                    .to_string(),
            })
        }
    }

    fn resolve_target(&self, target: &Value, pattern: Option<&str>) -> Result<Target> {
        match target {
            Value::String(target) => self.resolve_string_target(target, pattern),
            Value::Array(targets) => {
                let mut last_error = None;
                let mut excluded = false;
                for target in targets {
                    match self.resolve_target(target, pattern) {
                        Ok(Target::Found(path)) => return Ok(Target::Found(path)),
                        Ok(Target::Excluded) => {
                            excluded = true;
                            last_error = None;
                        }
                        Ok(Target::Unmatched) => {}
                        Err(err @ LoadError::InvalidPackageTarget { .. }) => last_error = Some(err),
                        Err(err) => return Err(err),
                    }
                }
                match last_error {
                    Some(err) => Err(err),
                    None if excluded => Ok(Target::Excluded),
                    None => Ok(Target::Unmatched),
                }
            }
            Value::Object(conditions) => {
                for (key, value) in conditions {
                    if key.parse::<u32>().is_ok() {
                        return Err(LoadError::InvalidPackageConfig {
                            package_json: self.package_json.to_path_buf(),
                            reason: "\"exports\" cannot contain numeric property keys".to_string(),
                        });
                    }
                    if key == "default" || self.conditions.iter().any(|c| c == key) {
                        match self.resolve_target(value, pattern)? {
                            Target::Unmatched => continue,
                            resolved => return Ok(resolved),
                        }
                    }
                }
                Ok(Target::Unmatched)
            }
            Value::Null => Ok(Target::Excluded),
            other => Err(self.invalid_target(&other.to_string())),
        }
    }

    fn resolve_string_target(&self, target: &str, pattern: Option<&str>) -> Result<Target> {
        let Some(relative) = target.strip_prefix("./") else {
            return Err(self.invalid_target(target));
        };
        if has_invalid_segment(relative) {
            return Err(self.invalid_target(target));
        }

        let relative = match pattern {
            Some(matched) => {
                if has_invalid_segment(matched) {
                    return Err(self.invalid_target(target));
                }
                relative.replace('*', matched)
            }
            None => relative.to_string(),
        };

        let resolved = normalize(&self.package_dir.join(relative));
        if !resolved.starts_with(self.package_dir) {
            return Err(self.invalid_target(target));
        }
        Ok(Target::Found(resolved))
    }

    fn not_exported(&self) -> LoadError {
        LoadError::PackagePathNotExported {
            subpath: self.subpath.to_string(),
            package_json: self.package_json.to_path_buf(),
        }
    }

    fn invalid_target(&self, target: &str) -> LoadError {
        LoadError::InvalidPackageTarget {
            target: target.to_string(),
            subpath: self.subpath.to_string(),
            package_json: self.package_json.to_path_buf(),
        }
    }
}

/// Longer pattern base wins; on a tie, the longer key wins
fn pattern_key_wins(current: &str, candidate: &str) -> bool {
    let base_len = |key: &str| key.find('*').map_or(key.len(), |i| i + 1);
    let (current_base, candidate_base) = (base_len(current), base_len(candidate));
    candidate_base > current_base
        || (candidate_base == current_base && candidate.len() > current.len())
}

fn has_invalid_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.eq_ignore_ascii_case("node_modules")
    })
}
