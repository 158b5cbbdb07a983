use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apigw_lambda_base::{build_app, Settings};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "apigw-lambda-base",
    about = "Synthesize the hello-world Lambda and REST API stack"
)]
struct Cli {
    /// Settings file name, without the .json extension
    #[arg(long, global = true, default_value = "project", env = "PROJECT_CONFIG")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the cloud assembly
    Synth {
        /// Output directory, overrides out_dir from the settings
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also print each stack template to stdout
        #[arg(long)]
        print: bool,
    },
    /// List the declared stacks
    List,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::new(&cli.config)
        .with_context(|| format!("failed to load settings from `{}`", cli.config))?;
    log::debug!("settings: {:?}", settings);

    let app = build_app(&settings).context("failed to declare stacks")?;

    match cli.command {
        Commands::List => {
            for stack in app.stacks() {
                println!("{}", stack.id());
            }
        }
        Commands::Synth { out, print } => {
            let out_dir = out.unwrap_or_else(|| settings.out_dir.clone());
            let assembly = app
                .synth(Path::new("."))
                .context("synthesis failed")?;
            assembly
                .write_to(&out_dir)
                .with_context(|| format!("failed to write {}", out_dir.display()))?;

            if print {
                for stack in &assembly.stacks {
                    println!("{}", stack.template.to_json_pretty()?);
                }
            }
        }
    }
    Ok(())
}
