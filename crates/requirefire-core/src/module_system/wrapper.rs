// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source wrapping for isolated evaluation
//!
//! Loaded source runs inside the host's usual CommonJS function wrapper, with
//! a prelude inserted before the module body:
//!
//! - every overridable global is redeclared as a local `var`, so loaded code
//!   can reassign it without touching the real global;
//! - `require` is rebound to the isolated loader's capability;
//! - the environment context is bound to the value captured by the loader;
//! - the body runs in an IIFE so its function declarations cannot collide
//!   with the redeclared globals.

/// Identifier the host binds to the module's [`Require`](super::Require) handle
pub const REQUIRE_BINDING: &str = "__requirefire__";

/// Identifier the host binds to the captured environment context
pub const ENVIRONMENT_BINDING: &str = "__requirefire_process__";

const OUTER_REQUIRE: &str = "__requirefire_outer_require__";

/// Names the prelude never redeclares: the real global object and the
/// wrapper's own parameters
const ALWAYS_RESERVED: &[&str] = &["global", "globalThis", "module", "exports", "require"];

const KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

const BODY_OPEN: &str = "(function () {\n";
const BODY_CLOSE: &str = "\n})();";

/// Module source with the isolation prelude and suffix around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedSource {
    prelude: String,
    source: String,
    suffix: String,
}

impl WrappedSource {
    /// Wrap `source` after `prelude`, closing the body scope
    pub fn new(prelude: String, source: impl Into<String>) -> Self {
        Self {
            prelude: format!("{}{}", prelude, BODY_OPEN),
            source: source.into(),
            suffix: BODY_CLOSE.to_string(),
        }
    }

    /// Everything inserted before the module body
    pub fn prelude(&self) -> &str {
        &self.prelude
    }

    /// The untouched module body
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Everything appended after the module body
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// The complete text to evaluate inside the CommonJS wrapper
    pub fn text(&self) -> String {
        let mut text =
            String::with_capacity(self.prelude.len() + self.source.len() + self.suffix.len());
        text.push_str(&self.prelude);
        text.push_str(&self.source);
        text.push_str(&self.suffix);
        text
    }
}

/// Build the prelude for one module.
///
/// `globals` is the host's registry of overridable global names; names that
/// are reserved or not valid identifiers are skipped.
pub fn build_prelude(globals: &[String], environment_binding: &str, reserved: &[String]) -> String {
    let mut src = String::new();

    for name in globals {
        let skip = ALWAYS_RESERVED.contains(&name.as_str())
            || name == environment_binding
            || name == REQUIRE_BINDING
            || name == ENVIRONMENT_BINDING
            || name == OUTER_REQUIRE
            || reserved.iter().any(|r| r == name);
        if skip || !is_valid_identifier(name) {
            continue;
        }
        src.push_str(&format!("var {name} = global.{name};\n"));
    }

    src.push_str(&format!(
        "const {outer} = require;\n\
         require = function (request) {{ return {capability}(request); }};\n\
         require.extensions = {outer}.extensions;\n\
         require.resolve = {capability}.resolve;\n\
         require.cache = {capability}.cache;\n",
        outer = OUTER_REQUIRE,
        capability = REQUIRE_BINDING,
    ));

    if is_valid_identifier(environment_binding) {
        src.push_str(&format!(
            "var {environment_binding} = {ENVIRONMENT_BINDING};\n"
        ));
    }

    src
}

/// Whether `name` can be declared with `var`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !is_id_start(first) || !chars.all(is_id_continue) {
        return false;
    }
    !KEYWORDS.contains(&name)
}

fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

fn is_id_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}
