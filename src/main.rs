use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxrates::core::config::AppConfig;
use fxrates::core::log::init_logging;
use fxrates::core::rate::ConversionRequest;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file (to --config-path if given)
    Setup,
    /// Run the HTTP service
    Serve,
    /// Convert an amount between two currencies
    Convert {
        from: String,
        to: String,
        #[arg(short, long, default_value_t = 1.0)]
        amount: f64,
        /// Use the rate of this day (YYYY-MM-DD) instead of the latest
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Display the latest rates for a base currency
    Latest {
        #[arg(short, long, default_value = "USD")]
        base: String,
    },
    /// Display daily rates between two dates (inclusive)
    Historical {
        from: String,
        to: String,
        start: String,
        end: String,
    },
}

impl From<Commands> for fxrates::AppCommand {
    fn from(cmd: Commands) -> fxrates::AppCommand {
        match cmd {
            Commands::Serve => fxrates::AppCommand::Serve,
            Commands::Convert {
                from,
                to,
                amount,
                date,
            } => fxrates::AppCommand::Convert(ConversionRequest {
                from,
                to,
                amount,
                date,
            }),
            Commands::Latest { base } => fxrates::AppCommand::Latest { base },
            Commands::Historical {
                from,
                to,
                start,
                end,
            } => fxrates::AppCommand::Historical {
                from,
                to,
                start,
                end,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Some(Commands::Setup) | None => AppConfig::default(),
        Some(_) => AppConfig::load(cli.config_path.as_deref())?,
    };
    init_logging(cli.verbose, &config.log_level);

    let result = match cli.command {
        Some(Commands::Setup) => {
            fxrates::cli::setup::setup(cli.config_path.as_deref()).map(|path| {
                println!("Wrote example configuration to {}", path.display());
            })
        }
        Some(cmd) => fxrates::run_command(cmd.into(), config).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
