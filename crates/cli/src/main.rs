//! luab: run Lua scripts through luabridge
//!
//! Loads each script with `do_file` in order, then optionally calls a global
//! function if the scripts defined one.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use luabridge::{BridgeConfig, BridgeError, Engine};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

#[derive(ClapParser)]
#[command(name = "luab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run Lua scripts through the luabridge engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more script files in a single engine
    Run {
        /// Script files, executed in order
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Global function to call (with no arguments) after the scripts ran
        #[arg(long, value_name = "NAME")]
        call: Option<String>,

        /// Bridge configuration file (TOML)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Print the operand stack after running
        #[arg(long)]
        dump_stack: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("luabridge=info".parse().expect("static directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scripts,
            call,
            config,
            dump_stack,
        } => {
            let status = run_scripts(&scripts, call.as_deref(), config.as_deref(), dump_stack);
            process::exit(status);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "luab", &mut io::stdout());
        }
    }
}

/// Returns the process exit status: 0 on success, 1 on any failure.
fn run_scripts(
    scripts: &[PathBuf],
    call: Option<&str>,
    config_path: Option<&Path>,
    dump_stack: bool,
) -> i32 {
    let config = match config_path {
        Some(path) => match BridgeConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        },
        None => BridgeConfig::default(),
    };

    let mut engine = match Engine::open(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let status = match run_in(&mut engine, scripts, call) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.status_code()
        }
    };

    if dump_stack {
        print!("{}", engine.stack_dump());
    }

    if let Err(e) = engine.close() {
        error!(error = %e, "engine teardown failed");
    }
    status
}

fn run_in(engine: &mut Engine, scripts: &[PathBuf], call: Option<&str>) -> Result<(), BridgeError> {
    for script in scripts {
        info!(script = %script.display(), "running script");
        engine.do_file(script)?;
    }

    let Some(name) = call else {
        return Ok(());
    };
    if !engine.does_func_exist(name)? {
        eprintln!("Warning: no function named '{}'", name);
        return Ok(());
    }
    engine.get_global(name)?;
    engine.call_function(0, 0)
}
