// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Ordered registry of loadable file extensions

use std::path::Path;

/// How files with a given extension are turned into exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionHandler {
    /// Script source: wrapped with the isolation prelude and evaluated
    Source,
    /// Text content handed to the host as-is (e.g. JSON)
    Text,
    /// Handed to the host by path only (e.g. native addons)
    Opaque,
}

/// Extensions in registration order.
///
/// The order is the probing order: `./a` tries `a.js` before `a.json`.
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    entries: Vec<(String, ExtensionHandler)>,
}

impl ExtensionRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register an extension (including the leading dot).
    ///
    /// Re-registering keeps the original position and replaces the handler.
    pub fn register(&mut self, extension: impl Into<String>, handler: ExtensionHandler) {
        let extension = extension.into();
        match self.entries.iter_mut().find(|(ext, _)| *ext == extension) {
            Some(entry) => entry.1 = handler,
            None => self.entries.push((extension, handler)),
        }
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, extension: impl Into<String>, handler: ExtensionHandler) -> Self {
        self.register(extension, handler);
        self
    }

    /// Registered extensions, in probing order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(ext, _)| ext.as_str())
    }

    /// Handler for an exact extension
    pub fn get(&self, extension: &str) -> Option<ExtensionHandler> {
        self.entries
            .iter()
            .find(|(ext, _)| ext == extension)
            .map(|(_, handler)| *handler)
    }

    /// Number of registered extensions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no extension is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The longest registered extension of a file name, `.js` otherwise.
    ///
    /// `a.test.js` is checked as `.test.js` first, then `.js`. A leading dot
    /// (`.eslintrc`) does not start an extension.
    pub fn longest_match<'a>(&'a self, filename: &Path) -> &'a str {
        let name = filename
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut start = 0;
        while let Some(offset) = name[start..].find('.') {
            let index = start + offset;
            start = index + 1;
            if index == 0 {
                continue;
            }
            let candidate = &name[index..];
            if let Some((ext, _)) = self.entries.iter().find(|(ext, _)| ext == candidate) {
                return ext;
            }
        }
        ".js"
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::empty()
            .with(".js", ExtensionHandler::Source)
            .with(".json", ExtensionHandler::Text)
            .with(".node", ExtensionHandler::Opaque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let registry = ExtensionRegistry::default();
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec![".js", ".json", ".node"]);
        assert_eq!(registry.get(".json"), Some(ExtensionHandler::Text));
    }

    #[test]
    fn test_register_keeps_position() {
        let mut registry = ExtensionRegistry::default();
        registry.register(".cjs", ExtensionHandler::Source);
        registry.register(".js", ExtensionHandler::Text);
        assert_eq!(
            registry.keys().collect::<Vec<_>>(),
            vec![".js", ".json", ".node", ".cjs"]
        );
        assert_eq!(registry.get(".js"), Some(ExtensionHandler::Text));
    }

    #[test]
    fn test_longest_match() {
        let registry = ExtensionRegistry::default().with(".test.js", ExtensionHandler::Text);
        assert_eq!(registry.longest_match(Path::new("/a/b.test.js")), ".test.js");
        assert_eq!(registry.longest_match(Path::new("/a/b.json")), ".json");
        assert_eq!(registry.longest_match(Path::new("/a/.eslintrc")), ".js");
        assert_eq!(registry.longest_match(Path::new("/a/b.ts")), ".js");
    }
}
