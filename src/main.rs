use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info, LevelFilter};
use std::io::Write;

use singularity_driver::executor::EXEC_FAILURE_EXIT_CODE;
use singularity_driver::{Driver, DriverConfig, EnvVar, SingularityDriver};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(help = "Image to test (e.g., ./alpine.sif or docker://alpine:3.19)")]
    image: String,

    #[arg(
        short,
        long,
        default_value = "singularity",
        help = "Runtime binary to drive (singularity or apptainer)"
    )]
    runtime: String,

    #[arg(
        long,
        default_value = "structure-test",
        help = "Prefix for the names of created instances"
    )]
    instance_prefix: String,

    #[arg(
        short,
        long = "env",
        value_name = "KEY=VALUE",
        help = "Environment variable applied before the command; values may reference $VARS"
    )]
    env: Vec<EnvVar>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a command inside the image
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print file information as JSON
    Stat { path: String },
    /// Print the contents of a file
    Cat { path: String },
    /// List the directories directly below a path as JSON
    Ls { path: String },
    /// Print the image configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity level
    let log_level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(log_level)
        .init();

    info!("Starting singularity-driver with image: {}", cli.image);
    debug!("Runtime: {}", cli.runtime);

    let config = DriverConfig {
        image: cli.image.clone(),
        runtime: cli.runtime.clone(),
        instance_prefix: cli.instance_prefix.clone(),
        ..DriverConfig::default()
    };
    let mut driver = SingularityDriver::new(config)
        .map_err(|e| anyhow!("Failed to initialize {} driver: {}", cli.runtime, e))?;

    let result = run(&mut driver, &cli);
    driver.destroy();

    let exit_code = result?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn run<D: Driver>(driver: &mut D, cli: &Cli) -> Result<i32> {
    driver.set_env(&cli.env)?;

    let mut stdout = std::io::stdout().lock();
    match &cli.command {
        Command::Exec { command } => match driver.process_command(&[], command) {
            Ok(output) => {
                stdout.write_all(output.stdout.as_bytes())?;
                eprint!("{}", output.stderr);
                return Ok(output.exit_code);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXEC_FAILURE_EXIT_CODE);
            }
        },
        Command::Stat { path } => {
            let info = driver.stat_file(path)?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&info)?)?;
        }
        Command::Cat { path } => {
            let content = driver.read_file(path)?;
            stdout.write_all(&content)?;
        }
        Command::Ls { path } => {
            let infos = driver.read_dir(path)?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&infos)?)?;
        }
        Command::Config => {
            let config = driver.get_config()?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&config)?)?;
        }
    }

    Ok(0)
}
