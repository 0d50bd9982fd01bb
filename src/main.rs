// NL compiler CLI (§6): tokenize, parse, resolve identifiers, resolve
// types, then print the annotated AST to standard output. Exit code 0
// on success, nonzero if any diagnostic of kind `error` was emitted.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use nlc::driver;
use nlc::printer::print_file;
use nlc::source::Sources;

/// Front-end and compile-time evaluator for the NL language.
#[derive(Parser, Debug)]
#[command(name = "nlc", version, about)]
struct Args {
    /// Source file to compile.
    path: PathBuf,

    /// Raise the log level by one step per occurrence (warn -> info ->
    /// debug -> trace). With none given, only errors and warnings show.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(args.verbose))).init();

    let mut sources = Sources::new();
    let file_id = match sources.add_path(args.path.clone()) {
        Some(id) => id,
        None => {
            eprintln!("error: {} was already loaded", args.path.display());
            return ExitCode::FAILURE;
        }
    };
    let bytes = match sources.load(file_id) {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            eprintln!("error: could not read {}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    log::debug!("compiling {}", args.path.display());
    let result = driver::compile(&bytes, file_id);

    print!("{}", print_file(&result.file));
    let rendered = driver::render_diagnostics(&sources, &result.diagnostics);
    if !rendered.is_empty() {
        eprint!("{}", rendered);
    }

    if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
