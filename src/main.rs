use clap::{Parser, Subcommand, builder::styling};
use etl_relay::cli::{print_report, replicate_business_type, run_business_type, show_config};
use etl_relay::replication::RunStatus;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// ETL Relay: move records and replicate tables between databases by business type
#[derive(Parser)]
#[command(name = "relay", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// Directory holding <business_type>.yml files and databases.yml
    #[arg(short, long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extract, transform and load pipeline of a business type
    Run {
        /// Business type to run
        business_type: String,

        /// Query parameter as name=value, repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Override file merged over the business type's configuration
        #[arg(short = 'o', long = "override")]
        override_file: Option<PathBuf>,

        /// Input file for file sources
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file for file sinks
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Recreate and copy every table matching a business type's patterns
    Replicate {
        /// Business type to replicate
        business_type: String,

        /// Override file merged over the business type's configuration
        #[arg(short = 'o', long = "override")]
        override_file: Option<PathBuf>,
    },

    /// Print the resolved configuration of a business type
    ShowConfig {
        /// Business type to resolve
        business_type: String,

        /// Override file merged over the business type's configuration
        #[arg(short = 'o', long = "override")]
        override_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = dotenvy::from_filename(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if let Err(e) = dotenv {
        log::debug!("Not loading {}: {}", cli.env, e);
    }

    match cli.command {
        Commands::Run {
            business_type,
            params,
            override_file,
            input,
            output,
        } => {
            log::info!(
                "Running {} from {}",
                business_type.cyan(),
                cli.config_dir.display().bright_black()
            );
            let written = run_business_type(
                &cli.config_dir,
                &business_type,
                &params,
                override_file,
                input,
                output,
            )
            .await?;
            log::info!("Wrote {} records", written.cyan());
        }
        Commands::Replicate {
            business_type,
            override_file,
        } => {
            log::info!(
                "Replicating {} from {}",
                business_type.cyan(),
                cli.config_dir.display().bright_black()
            );
            let report =
                replicate_business_type(&cli.config_dir, &business_type, override_file.as_deref())
                    .await?;
            print_report(&report);
            if matches!(report.status(), RunStatus::Partial | RunStatus::AllFailed) {
                eyre::bail!("{} of {} tables failed", report.failed(), report.len());
            }
        }
        Commands::ShowConfig {
            business_type,
            override_file,
        } => {
            let rendered = show_config(&cli.config_dir, &business_type, override_file.as_deref())?;
            print!("{}", rendered);
        }
    }

    Ok(())
}
