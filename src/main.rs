// src/main.rs
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use solana_cycle_arb::{
    arbitrage::{
        accounting::{ExecutionSink, JsonlFileSink, LogSink, ProfitSplitter},
        bundle::BundleSubmitter,
        execution_engine::{ExecutionConfig, ExecutionEngine},
        jito_client::{JitoClient, JitoConfig},
        jupiter::JupiterClient,
        path_finder::{RouteSearchEngine, SearchParams, SearchSettings},
        quote::{ProviderRegistry, SwapProvider},
        ArbitrageCoordinator, CycleOutcome,
    },
    config::{load_config, Config},
    solana::{chain::ChainClient, health::spawn_health_prober, ResilientConnection},
    utils::{format_signed_amount, load_keypair, setup_logging, TokenAmount},
};
use solana_sdk::signer::Signer;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "cycle-arb", about = "Cyclic multi-hop arbitrage on Solana")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search once and print ranked viable routes.
    Search,
    /// Search and execute in a loop.
    Run {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
        /// Submit transactions (overrides DRY_RUN).
        #[arg(long)]
        execute: bool,
    },
}

fn search_params(config: &Config) -> anyhow::Result<SearchParams> {
    Ok(SearchParams {
        start_token: config.start_token()?,
        min_hops: config.min_hops,
        max_hops: config.max_hops,
        start_amount: config.start_amount,
        universe: config.universe()?,
        min_profit_threshold: config.min_profit_pct,
        max_price_impact: config.max_price_impact,
        max_slippage_bps: config.max_slippage_bps,
    })
}

fn search_engine(config: &Config, provider: Arc<dyn SwapProvider>) -> RouteSearchEngine {
    RouteSearchEngine::new(
        provider,
        SearchSettings {
            quote_batch_size: config.quote_batch_size,
            quote_timeout: Duration::from_millis(config.quote_timeout_ms),
            max_loss_per_hop: config.max_loss_per_hop,
        },
    )
}

fn sinks(config: &Config) -> Vec<Box<dyn ExecutionSink>> {
    let mut sinks: Vec<Box<dyn ExecutionSink>> = vec![Box::new(LogSink)];
    if let Some(path) = &config.execution_log_path {
        let sink = JsonlFileSink::new(path);
        info!("Execution records appended to {}", sink.path().display());
        sinks.push(Box::new(sink));
    }
    sinks
}

fn bundle_submitter(config: &Config) -> anyhow::Result<Option<Arc<dyn BundleSubmitter>>> {
    let Some(url) = &config.jito_block_engine_url else {
        return Ok(None);
    };
    let jito = JitoClient::new(JitoConfig {
        block_engine_url: url.clone(),
        tip_lamports: config.jito_tip_lamports,
        simulation_url: config.jito_simulation_url.clone(),
        ..JitoConfig::default()
    })
    .context("Failed to create Jito client")?;
    Ok(Some(Arc::new(jito)))
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling");
            token.cancel();
        }
    });
}

async fn run_search(config: &Config, provider: Arc<dyn SwapProvider>, cancel: CancellationToken) -> anyhow::Result<()> {
    let params = search_params(config)?;
    let engine = search_engine(config, provider);
    let routes = engine.find_routes(&params, &cancel).await?;

    let decimals = params.start_token.decimals;
    println!(
        "{} viable route(s) from {} {}",
        routes.len(),
        TokenAmount::new(params.start_amount, decimals),
        params.start_token.symbol
    );
    for (rank, route) in routes.iter().enumerate() {
        println!(
            "{:>2}. {}  out {}  profit {:.4}%  net {}  impact {:.4}%  confidence {:.2}",
            rank + 1,
            route.describe(),
            TokenAmount::new(route.total_output, decimals),
            route.profit_percentage * 100.0,
            format_signed_amount(route.net_profit, decimals),
            route.total_price_impact * 100.0,
            route.confidence
        );
    }
    Ok(())
}

async fn run_loop(
    config: Arc<Config>,
    provider: Arc<dyn SwapProvider>,
    once: bool,
    execute: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let dry_run = config.dry_run && !execute;
    let signer: Option<Arc<dyn Signer + Send + Sync>> = match &config.trader_wallet_keypair_path {
        Some(path) => Some(Arc::new(load_keypair(path)?) as Arc<dyn Signer + Send + Sync>),
        None if !dry_run => bail!("Live execution requires TRADER_WALLET_KEYPAIR_PATH"),
        None => None,
    };
    if let Some(signer) = &signer {
        info!("Trader wallet: {}", signer.pubkey());
    }

    let connection = Arc::new(
        ResilientConnection::new(
            config.rpc_endpoints(),
            config.retry_policy(),
            Duration::from_millis(config.rpc_timeout_ms),
        )
        .context("Failed to create RPC connection pool")?,
    );
    let prober = spawn_health_prober(
        Arc::clone(&connection),
        Duration::from_secs(config.health_check_interval_secs),
        Duration::from_millis(config.health_check_timeout_ms),
        cancel.child_token(),
    );

    let mut providers = ProviderRegistry::new();
    providers.register(Arc::clone(&provider));

    let chain: Arc<dyn ChainClient> = connection;
    let engine = ExecutionEngine::new(
        chain,
        providers,
        bundle_submitter(&config)?,
        ExecutionConfig {
            max_retries: config.rpc_max_retries,
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
            confirm_poll_interval: Duration::from_millis(config.confirm_poll_interval_ms),
            max_hops_per_transaction: config.max_hops_per_transaction,
            prefer_bundle: config.prefer_bundle,
        },
    );
    let splitter = match &config.profit_split {
        Some(raw) => ProfitSplitter::parse(raw)?,
        None => ProfitSplitter::default(),
    };

    let coordinator = ArbitrageCoordinator::new(
        search_engine(&config, provider),
        engine,
        search_params(&config)?,
        signer,
        config.urgency_tier()?,
        dry_run,
        splitter,
        sinks(&config),
    )
    .with_optimization(config.optimize_routes)
    .with_profit_distribution(config.distribute_profit);
    info!(
        "Coordinator ready: {} hops {}..={}, dry_run={}",
        coordinator.params().start_token,
        config.min_hops,
        config.max_hops,
        dry_run
    );

    if once {
        match coordinator.run_cycle(&cancel).await? {
            CycleOutcome::NoViableRoute => info!("No viable route found"),
            CycleOutcome::DryRun(route) => info!("Dry run, would execute {}", route.describe()),
            CycleOutcome::Executed { route, result } => info!(
                "Executed {}: success={}, stage={}, error={:?}",
                route.describe(),
                result.success,
                result.final_stage,
                result.error
            ),
        }
    } else {
        coordinator
            .run(Duration::from_secs(config.cycle_interval_seconds), cancel.clone())
            .await;
    }

    cancel.cancel();
    prober.await.ok();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config().context("Invalid configuration")?;
    setup_logging(&config.log_level).context("Failed to initialize logging")?;
    config.validate_and_log();
    info!("Solana cycle arbitrage starting");

    let provider: Arc<dyn SwapProvider> = Arc::new(
        JupiterClient::new(
            &config.quote_api_url,
            Duration::from_millis(config.quote_timeout_ms),
            config.quote_requests_per_second,
        )
        .context("Failed to create quote client")?,
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match cli.command {
        Command::Search => run_search(&config, provider, cancel).await,
        Command::Run { once, execute } => run_loop(config, provider, once, execute, cancel).await,
    }
}
