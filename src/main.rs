// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! requirefire - inspect CommonJS module resolution
//!
//! ```bash
//! # Where does a request land?
//! requirefire resolve lodash/get --from ./src/index.js
//!
//! # Which directories are searched?
//! requirefire paths lodash --from ./src/index.js
//! ```

mod cli;

use clap::Parser;
use cli::{Cli, Commands, PathsArgs, ResolveArgs};
use owo_colors::OwoColorize;
use requirefire_core::{
    Anchor, ExtensionRegistry, LoadError, LoaderOptions, NodeBuiltins, OsFileSystem, Resolution,
    Resolver, Specifier,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("requirefire_core=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            if let Some(code) = e.downcast_ref::<LoadError>().and_then(LoadError::code) {
                eprintln!("  {} {}", "code:".dimmed(), code);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let resolver = build_resolver(cli)?;
    match &cli.command {
        Commands::Resolve(args) => resolve(&resolver, args),
        Commands::Paths(args) => paths(&resolver, args),
    }
}

fn build_resolver(cli: &Cli) -> anyhow::Result<Resolver> {
    let mut options = LoaderOptions::from_env();
    if let Some(conditions) = &cli.conditions {
        options.set("conditions", conditions);
    }
    if cli.preserve_symlinks {
        options.resolver.preserve_symlinks = true;
    }
    let cwd = match &cli.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };
    options.resolver.cwd = Some(cwd);

    Ok(Resolver::new(
        options.resolver,
        Rc::new(OsFileSystem),
        Rc::new(ExtensionRegistry::default()),
        Rc::new(NodeBuiltins::new()),
    ))
}

fn anchor(resolver: &Resolver, from: Option<&PathBuf>) -> Anchor {
    match from {
        Some(file) => Anchor::file(absolute(resolver.cwd(), file)),
        None => Anchor::directory(resolver.cwd()),
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn resolve(resolver: &Resolver, args: &ResolveArgs) -> anyhow::Result<()> {
    let specifier = Specifier::parse(&args.request)?;
    tracing::debug!("Resolving {:?} request '{}'", specifier.kind(), specifier);
    if let Some((name, subpath)) = specifier.package_parts() {
        tracing::debug!("Package '{}', subpath {:?}", name, subpath);
    }

    let anchor = anchor(resolver, args.from.as_ref());
    let resolution = resolver.resolve(&args.request, Some(&anchor), args.main)?;

    for warning in resolver.take_warnings() {
        eprintln!("{} [{}] {}", "warning".yellow().bold(), warning.code, warning.message);
    }

    match resolution {
        Resolution::File(path) => println!("{}", path.display().green()),
        Resolution::Builtin(name) => println!("{} {}", "builtin".cyan(), name),
        Resolution::Delegated { request, reason } => {
            println!("{} {} ({:?})", "host".yellow(), request, reason)
        }
    }
    Ok(())
}

fn paths(resolver: &Resolver, args: &PathsArgs) -> anyhow::Result<()> {
    Specifier::parse(&args.request)?;
    let anchor = anchor(resolver, args.from.as_ref());

    match resolver.lookup_paths(&args.request, Some(&anchor)) {
        Some(paths) => {
            for path in paths {
                println!("{}", path.display());
            }
        }
        None => println!("{}", "null".dimmed()),
    }
    Ok(())
}
