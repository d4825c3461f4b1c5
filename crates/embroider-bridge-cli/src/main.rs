#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "embroider-bridge")]
#[command(author, version, about = "Run the embroider resolve hook adapter against a project tree", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve specifiers through the resolve hook
    Resolve {
        /// Specifiers to resolve (resolved concurrently)
        #[arg(required = true)]
        specifiers: Vec<String>,

        /// Directory the request is resolved from (defaults to cwd)
        #[arg(long)]
        context: Option<PathBuf>,

        /// Importing file
        #[arg(long)]
        issuer: Option<PathBuf>,

        /// Resolver rules JSON file
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Plugin options JSON file
        #[arg(long)]
        options: Option<PathBuf>,

        /// App root encoded into virtual module specifiers (defaults to cwd)
        #[arg(long)]
        app_root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Version => commands::version::run(),
        Commands::Resolve {
            specifiers,
            context,
            issuer,
            rules,
            options,
            app_root,
        } => {
            let absolute = |p: PathBuf| if p.is_absolute() { p } else { cwd.join(p) };
            let action = commands::resolve::ResolveAction {
                specifiers,
                context: context.map_or_else(|| cwd.clone(), absolute),
                issuer: issuer.map(absolute),
                rules: rules.map(absolute),
                options: options.map(absolute),
                app_root: app_root.map_or_else(|| cwd.clone(), absolute),
            };
            commands::resolve::run(action, cli.json)
        }
    }
}
