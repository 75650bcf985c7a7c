// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

mod common;

use common::{fixture, loader, write, ScriptHost};
use requirefire_core::{
    Anchor, ExtensionHandler, ExtensionRegistry, LoadError, Loader, LoaderOptions, Resolution,
};

#[test]
fn package_main_resolves_to_entry() {
    let (_dir, root) = fixture();
    write(&root, "node_modules/pkg/package.json", r#"{"main": "lib/entry.js"}"#);
    let entry = write(&root, "node_modules/pkg/lib/entry.js", "exports.entry = 1\n");

    let host = ScriptHost::new();
    let loader = loader(&host, &root);
    assert_eq!(loader.resolve("pkg").unwrap(), entry.display().to_string());

    let module = loader.require("pkg").unwrap();
    assert_eq!(module.get("entry").as_num(), Some(1.0));
    assert!(loader.take_warnings().is_empty());
}

#[test]
fn missing_main_falls_back_to_index_with_warning() {
    let (_dir, root) = fixture();
    write(&root, "node_modules/pkg/package.json", r#"{"main": "lib/missing.js"}"#);
    let index = write(&root, "node_modules/pkg/index.js", "exports.index = 1\n");

    let host = ScriptHost::new();
    let loader = loader(&host, &root);
    let module = loader.require("pkg").unwrap();

    assert_eq!(module.get("index").as_num(), Some(1.0));
    assert!(loader.cache().has(&index));
    let warnings = loader.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, "DEP0128");
}

#[test]
fn missing_absolute_path_is_module_not_found() {
    let (_dir, root) = fixture();
    let missing = root.join("nope/never.js");
    let request = missing.to_str().unwrap();

    let host = ScriptHost::new();
    let loader = loader(&host, &root);
    let err = loader.require(request).unwrap_err();

    assert_eq!(err.code(), Some("MODULE_NOT_FOUND"));
    assert!(err.to_string().contains(request));
    assert!(loader.cache().is_empty());
}

#[test]
fn missing_package_is_module_not_found() {
    let (_dir, root) = fixture();
    let host = ScriptHost::new();
    let loader = loader(&host, &root);

    let err = loader
        .require("a-magical-package-that-does-everything")
        .unwrap_err();
    assert!(matches!(err, LoadError::ModuleNotFound { .. }));
    assert_eq!(err.require_stack(), &[root.join("index.js")]);
}

#[test]
fn malformed_specifier_is_rejected_before_probing() {
    let (_dir, root) = fixture();
    let host = ScriptHost::new();
    let loader = loader(&host, &root);

    for request in ["", "./a\0b"] {
        let err = loader.require(request).unwrap_err();
        assert!(matches!(err, LoadError::InvalidSpecifier(_)));
        assert_eq!(err.code(), Some("ERR_INVALID_ARG_VALUE"));
    }
    assert_eq!(loader.resolver().path_cache_len(), 0);
}

#[test]
fn exports_conditions_pick_the_require_branch() {
    let (_dir, root) = fixture();
    write(
        &root,
        "node_modules/dual/package.json",
        r#"{"exports": {".": {"import": "./esm.mjs", "default": "./cjs.js"}, "./features/*": "./src/features/*.js", "./internal/*": null}}"#,
    );
    write(&root, "node_modules/dual/cjs.js", "exports.kind = \"cjs\"\n");
    let feature = write(&root, "node_modules/dual/src/features/x.js", "");
    write(&root, "node_modules/dual/internal/secret.js", "");

    let host = ScriptHost::new();
    let loader = loader(&host, &root);
    assert_eq!(
        loader.require("dual").unwrap().get("kind").as_str(),
        Some("cjs")
    );
    assert_eq!(
        loader.resolve("dual/features/x").unwrap(),
        feature.display().to_string()
    );
    let err = loader.resolve("dual/internal/secret.js").unwrap_err();
    assert_eq!(err.code(), Some("ERR_PACKAGE_PATH_NOT_EXPORTED"));
}

#[test]
fn lookup_paths_from_the_context() {
    let (_dir, root) = fixture();
    let host = ScriptHost::new();
    let loader = loader(&host, &root);

    let paths = loader.resolve_paths("pkg").unwrap();
    assert_eq!(paths[0], root.join("node_modules"));
    assert_eq!(loader.resolve_paths("./x"), Some(vec![root.clone()]));
    assert_eq!(loader.resolve_paths("path"), None);
}

#[test]
fn custom_extension_is_probed_in_order() {
    let (_dir, root) = fixture();
    write(&root, "config.cjs", "exports.from = \"cjs\"\n");

    let host = ScriptHost::new();
    let mut options = LoaderOptions::default();
    options.resolver.cwd = Some(root.clone());
    let loader = Loader::builder(host.clone())
        .options(options)
        .context(root.join("index.js"))
        .extensions(ExtensionRegistry::default().with(".cjs", ExtensionHandler::Source))
        .build();

    let module = loader.require("./config").unwrap();
    assert_eq!(module.get("from").as_str(), Some("cjs"));
}

#[test]
fn resolver_is_usable_on_its_own() {
    let (_dir, root) = fixture();
    let file = write(&root, "src/util.js", "");

    let host = ScriptHost::new();
    let loader = loader(&host, &root);
    let anchor = Anchor::file(root.join("src/main.js"));
    assert_eq!(
        loader
            .resolver()
            .resolve("./util", Some(&anchor), false)
            .unwrap(),
        Resolution::File(file)
    );
    assert!(loader.cache().is_empty());
}
