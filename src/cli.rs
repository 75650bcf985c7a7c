// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CLI argument parsing for requirefire

use clap::{Args, Parser, Subcommand};
use requirefire_core::VERSION;
use std::path::PathBuf;

/// Inspect how CommonJS requests resolve
#[derive(Parser, Debug)]
#[command(name = "requirefire", version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging for the resolver
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Working directory for requests made without --from
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Comma separated export conditions (default: require,node,node-addons)
    #[arg(long, global = true, env = "REQUIREFIRE_CONDITIONS")]
    pub conditions: Option<String>,

    /// Keep symlinked paths instead of canonicalizing them
    #[arg(long, global = true)]
    pub preserve_symlinks: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the file a request resolves to
    Resolve(ResolveArgs),

    /// Print the directories searched for a request
    Paths(PathsArgs),
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// The request, as passed to require()
    pub request: String,

    /// File the request is made from
    #[arg(long)]
    pub from: Option<PathBuf>,

    /// Resolve as the program entry point
    #[arg(long)]
    pub main: bool,
}

#[derive(Args, Debug)]
pub struct PathsArgs {
    /// The request, as passed to require.resolve.paths()
    pub request: String,

    /// File the request is made from
    #[arg(long)]
    pub from: Option<PathBuf>,
}
