//! Weld command-line interface
//!
//! Builds Python extension modules from annotated C++ fragments

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

/// Display an error with optional backtrace information
fn display_error(err: &anyhow::Error, backtrace_enabled: bool) {
    eprintln!("error: {err}");

    // Show error chain
    let mut source = err.source();
    while let Some(err) = source {
        eprintln!("caused by: {err}");
        source = err.source();
    }

    // Show backtrace if enabled
    if backtrace_enabled {
        let backtrace = err.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            eprintln!("\nBacktrace:");
            eprintln!("{backtrace}");
        }
    }
}

#[derive(Parser)]
#[command(name = "weld")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build Python extension modules from annotated C++ fragments", long_about = None)]
#[command(disable_version_flag = true)]
pub(crate) struct Cli {
    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    _version: Option<bool>,

    /// Enable debug output (also `WELD_DEBUG=1`)
    #[arg(long, global = true)]
    debug: bool,

    /// Show a backtrace with errors (requires `RUST_BACKTRACE=1`)
    #[arg(long, global = true)]
    backtrace: bool,

    /// Use this config file instead of .weld.toml or ~/.config/weld/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not read any config file
    #[arg(long, global = true)]
    norc: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a module and load it
    Build {
        /// Module name (a bare identifier)
        name: String,

        /// File compiled as is
        #[arg(long = "source-file", value_name = "FILE")]
        source_files: Vec<PathBuf>,

        /// File scanned for declarations and extended with generated tables
        #[arg(long, value_name = "FILE")]
        preprocess: Vec<PathBuf>,

        /// Inline source text, preprocessed
        #[arg(long, value_name = "TEXT")]
        inline: Option<String>,

        /// Artifact path (default: <name> plus the platform's extension suffix)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Build directory (default: build, or WELD_BUILD_DIR)
        #[arg(long, value_name = "DIR")]
        build_dir: Option<PathBuf>,

        /// Add an include directory
        #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
        include_dirs: Vec<PathBuf>,

        /// Add a library directory
        #[arg(short = 'L', long = "library-dir", value_name = "DIR")]
        library_dirs: Vec<PathBuf>,

        /// Link a library
        #[arg(short = 'l', long = "library", value_name = "LIB")]
        libraries: Vec<String>,

        /// Define a macro
        #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
        defines: Vec<String>,

        /// Always rebuild (also `WELD_NO_CACHE=1`)
        #[arg(long)]
        no_cache: bool,

        /// Build the artifact without loading it
        #[arg(long)]
        no_load: bool,
    },

    /// Show the declarations recovered from source files
    Scan {
        /// Source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Module name used for assembly
        #[arg(long, default_value = "module")]
        name: String,
    },

    /// Print the generated code for source files without compiling
    Render {
        /// Module name (a bare identifier)
        name: String,

        /// Source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Prefix every line with its number
        #[arg(long)]
        numbered: bool,
    },

    /// Remove a module's workspace, objects and log
    Clean {
        /// Module name
        name: String,

        /// Build directory (default: build, or WELD_BUILD_DIR)
        #[arg(long, value_name = "DIR")]
        build_dir: Option<PathBuf>,

        /// Show what would be removed without actually removing
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    let backtrace = cli.backtrace;

    // Initialize debug mode
    weld::init_debug(cli.debug);

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Build {
            name,
            source_files,
            preprocess,
            inline,
            output,
            build_dir,
            include_dirs,
            library_dirs,
            libraries,
            defines,
            no_cache,
            no_load,
        } => commands::build::run(
            &commands::build::BuildFlags {
                name,
                source_files,
                preprocess,
                inline,
                output,
                build_dir,
                include_dirs,
                library_dirs,
                libraries,
                defines,
                no_cache,
                no_load,
            },
            config_path,
            cli.norc,
        ),
        Commands::Scan { files, name } => commands::scan::run(&files, &name),
        Commands::Render {
            name,
            files,
            numbered,
        } => commands::render::run(&name, &files, numbered),
        Commands::Clean {
            name,
            build_dir,
            dry_run,
        } => commands::clean::run(&name, build_dir.as_deref(), dry_run, config_path, cli.norc),
        Commands::Completion { shell } => commands::completion::run(shell),
    };

    if let Err(e) = result {
        // Display error with formatting
        display_error(&e, backtrace);
        process::exit(1);
    }
}

mod commands;
