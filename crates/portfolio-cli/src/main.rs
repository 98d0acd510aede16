//! Command-line interface for portfolio analysis
//!
//! # Usage
//!
//! ```bash
//! # Point at the analysis service (defaults to http://localhost:8080/api/portfolio)
//! export PORTFOLIO_API_BASE="http://localhost:8080/api/portfolio"
//!
//! # Analyse a 60/40 portfolio with a 10,000 initial investment
//! portfolio analyze AAPL,MSFT --start 2023-01 --end 2023-12-31 --weights 60,40 --amount 10000
//!
//! # Check that the service is up
//! portfolio health
//! ```

mod render;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use portfolio_client::{
    ClientConfig, ClientError, PortfolioClient, RawInput, RequestStrategy, WeightAllocation,
};
use portfolio_utils::{Config, LogFormat};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "portfolio")]
#[command(about = "Analyse portfolio returns against a portfolio analysis service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the analysis API
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Request strategy: consolidated or legacy
    #[arg(long, global = true)]
    strategy: Option<RequestStrategy>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log format: pretty or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an analysis and print the results
    Analyze(AnalyzeArgs),
    /// Ping the analysis service
    Health,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Comma separated ticker symbols
    tickers: String,

    /// Start date (YYYY-MM-DD or YYYY-MM)
    #[arg(short, long)]
    start: String,

    /// End date (YYYY-MM-DD or YYYY-MM)
    #[arg(short, long)]
    end: String,

    /// Per-ticker weights in percent, in ticker order
    #[arg(short, long, value_delimiter = ',')]
    weights: Vec<f64>,

    /// Split weights equally
    #[arg(long, conflicts_with = "normalize")]
    equalize: bool,

    /// Rescale weights so they add up to 100%
    #[arg(long)]
    normalize: bool,

    /// Include dividends in total return
    #[arg(short, long)]
    dividends: bool,

    /// Initial investment; enables amount tracking
    #[arg(short, long, default_value = "")]
    amount: String,

    /// Print the result as JSON instead of tables
    #[arg(long)]
    json: bool,
}

impl AnalyzeArgs {
    fn raw_input(&self) -> RawInput {
        RawInput::new(&self.tickers)
            .with_dates(&self.start, &self.end)
            .with_dividends(self.dividends)
            .with_initial_amount(&self.amount)
    }
}

/// Apply weight flags to a fresh allocation for `tickers`
fn build_allocation(
    tickers: &[String],
    weights: &[f64],
    equalize: bool,
    normalize: bool,
) -> anyhow::Result<WeightAllocation> {
    let mut allocation = WeightAllocation::rebuild(tickers);

    if !weights.is_empty() {
        if weights.len() != tickers.len() {
            bail!(
                "{} weights given for {} tickers",
                weights.len(),
                tickers.len()
            );
        }
        for (index, &percent) in weights.iter().enumerate() {
            allocation = allocation.edit_at(index, percent)?;
        }
    }

    if equalize {
        allocation = allocation.equalize();
    } else if normalize {
        allocation = allocation.normalize();
    }

    Ok(allocation)
}

fn client_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut builder = ClientConfig::builder().with_env()?;
    if let Some(api_base) = &cli.api_base {
        builder = builder.api_base(api_base);
    }
    if let Some(strategy) = cli.strategy {
        builder = builder.strategy(strategy);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

async fn analyze(client: &PortfolioClient, args: &AnalyzeArgs) -> anyhow::Result<()> {
    let input = args.raw_input();
    let allocation = build_allocation(
        &input.ticker_list(),
        &args.weights,
        args.equalize,
        args.normalize,
    )?;

    if !args.json {
        render::print_allocation(&allocation);
    }

    match client.submit(&input, &allocation).await {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&*result)?);
            } else {
                render::print_result(&result);
            }
            Ok(())
        }
        Err(err) => {
            if let ClientError::Analysis(analysis) = &err {
                if let Some(date) = analysis.suggested_start_date() {
                    let command = render::resubmit_command(
                        &input.with_start_date(date),
                        &args.weights,
                        args.equalize,
                        args.normalize,
                    );
                    render::print_date_suggestion(date, &command);
                }
            }
            Err(err.into())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut app = Config::default()
        .with_app_name("portfolio")
        .with_log_format(cli.log_format);
    if cli.verbose {
        app = app.with_log_filter("debug");
    }
    portfolio_utils::init_tracing_with(&app);
    debug!(app = %app.app_name, environment = %app.environment, "logging initialised");

    let config = client_config(&cli).context("invalid client configuration")?;
    debug!(api_base = %config.api_base, strategy = %config.strategy, "client configured");
    let client = PortfolioClient::new(config)?;

    match &cli.command {
        Commands::Analyze(args) => {
            info!(tickers = %args.tickers, "starting analysis");
            analyze(&client, args).await
        }
        Commands::Health => {
            let status = client.health().await?;
            println!("{status}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_client::WeightBalance;

    fn tickers(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "portfolio",
            "analyze",
            "AAPL,MSFT",
            "--start",
            "2023-01",
            "--end",
            "2023-12-31",
            "--weights",
            "60,40",
            "--amount",
            "1000",
            "--strategy",
            "legacy",
        ])
        .unwrap();

        assert_eq!(cli.strategy, Some(RequestStrategy::Legacy));
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.weights, vec![60.0, 40.0]);
                let input = args.raw_input();
                assert_eq!(input.ticker_list(), ["AAPL", "MSFT"]);
                assert_eq!(input.initial_amount, "1000");
            }
            Commands::Health => panic!("Expected analyze command"),
        }
    }

    #[test]
    fn test_cli_parses_global_verbose() {
        let cli = Cli::try_parse_from(["portfolio", "health", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Health));
    }

    #[test]
    fn test_equalize_conflicts_with_normalize() {
        let result = Cli::try_parse_from([
            "portfolio", "analyze", "AAPL", "-s", "2023-01", "-e", "2023-06", "--equalize",
            "--normalize",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_allocation_defaults_to_equal_split() {
        let allocation = build_allocation(&tickers(&["AAPL", "MSFT"]), &[], false, false).unwrap();
        assert_eq!(allocation.to_fractions(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_build_allocation_with_weights() {
        let allocation =
            build_allocation(&tickers(&["AAPL", "MSFT"]), &[30.0, 30.0], false, true).unwrap();
        assert_eq!(allocation.percent_of("AAPL"), Some(50.0));
        assert_eq!(allocation.balance(), WeightBalance::Balanced);

        let allocation =
            build_allocation(&tickers(&["AAPL", "MSFT"]), &[30.0, 30.0], false, false).unwrap();
        assert_eq!(allocation.balance(), WeightBalance::Under);
    }

    #[test]
    fn test_build_allocation_rejects_wrong_count() {
        assert!(build_allocation(&tickers(&["AAPL"]), &[50.0, 50.0], false, false).is_err());
    }
}
