use alloy::primitives::{
    Address,
    utils::parse_ether,
};
use clap::{
    Parser,
    ValueEnum,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use lottery_client::{
    RpcController,
    RpcReader,
    RpcWallet,
    chain::DEFAULT_CONFIRMATION_POLL,
    controller::DEFAULT_MIN_ENTRY_ETH,
    deployment::{
        DeploymentRecord,
        DeploymentStore,
        Network,
        compute_code_hash,
        resolve_lottery_address,
    },
    format::{
        format_eth,
        short_address,
    },
    wallets::{
        find_wallet,
        list_wallets,
        prompt_and_unlock,
        resolve_wallet_dir,
    },
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;
use url::Url;

mod app;
mod ui;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Interactive terminal UI
    #[default]
    Play,
    /// Print the current lottery state once
    Show,
    /// Record the contract address and code hash for this network
    Pin,
    /// List keystores in the wallet directory
    Wallets,
}

#[derive(Parser, Debug)]
#[command(
    name = "lottery-client",
    about = "Enter the on-chain lottery, watch the draw and claim the prize",
    version
)]
struct Args {
    /// What to do (defaults to the interactive UI)
    #[arg(value_enum, default_value = "play")]
    action: Action,

    /// Chain the lottery lives on
    #[arg(long, value_enum, default_value = "sepolia")]
    network: Network,

    /// Override RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Infura project key used to build the RPC URL
    #[arg(long, env = "LOTTERY_INFURA_KEY", hide_env_values = true)]
    infura_key: Option<String>,

    /// Lottery contract address (defaults to the pinned deployment, then the built-in address)
    #[arg(long)]
    contract: Option<Address>,

    /// Keystore name to unlock before starting
    #[arg(long)]
    wallet: Option<String>,

    /// Override keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Smallest accepted entry, in ETH
    #[arg(long, default_value = DEFAULT_MIN_ENTRY_ETH)]
    min_entry: String,

    /// Seconds between background refreshes
    #[arg(long, default_value_t = 15)]
    refresh_secs: u64,

    /// Milliseconds between receipt polls while waiting for confirmation
    #[arg(long, default_value_t = DEFAULT_CONFIRMATION_POLL.as_millis() as u64)]
    confirm_poll_ms: u64,

    /// Directory for the rolling log file used by the UI
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn init_file_tracing(log_dir: &Path) -> WorkerGuard {
    let appender = rolling::daily(log_dir, "lottery-client.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

fn init_stderr_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Refuse to talk to an address whose bytecode differs from the pinned record.
async fn verify_deployment(
    reader: &RpcReader,
    record: Option<&DeploymentRecord>,
) -> Result<()> {
    let Some(record) = record else {
        return Ok(());
    };
    if record.code_hash.is_none() || record.address().ok() != Some(reader.lottery_address()) {
        return Ok(());
    }
    let code = reader
        .deployed_code()
        .await
        .wrap_err("Failed to fetch deployed bytecode")?;
    if code.is_empty() {
        return Err(eyre!(
            "No contract deployed at {}",
            reader.lottery_address()
        ));
    }
    let hash = compute_code_hash(&code);
    if !record.is_compatible_with_hash(&hash) {
        return Err(eyre!(
            "Bytecode at {} does not match the pinned deployment (expected {}, found {hash}); run `pin` again if the contract was redeployed",
            reader.lottery_address(),
            record.code_hash.as_deref().unwrap_or_default(),
        ));
    }
    tracing::info!(%hash, "deployed bytecode matches pinned record");
    Ok(())
}

async fn show(controller: &RpcController) -> Result<()> {
    let snapshot = controller.fetch_state().await?;
    println!("State:         {}", snapshot.status);
    println!("Entrance fee:  {} ETH", format_eth(snapshot.entrance_fee));
    println!("Participants:  {}", snapshot.participants.len());
    for participant in &snapshot.participants {
        println!("  {}", short_address(participant));
    }
    match &snapshot.winner {
        Some(winner) => println!(
            "Winner:        {} ({} ETH unclaimed)",
            winner.address,
            format_eth(winner.balance)
        ),
        None => println!("Winner:        No winner yet"),
    }
    if let Some(account) = controller.account() {
        let note = if controller.is_winner() {
            " (you won!)"
        } else {
            ""
        };
        println!("Wallet:        {account}{note}");
    }
    Ok(())
}

async fn pin(
    store: &DeploymentStore,
    reader: &RpcReader,
    rpc_url: Option<String>,
) -> Result<()> {
    let lottery = reader.lottery_address();
    let code = reader
        .deployed_code()
        .await
        .wrap_err("Failed to fetch deployed bytecode")?;
    if code.is_empty() {
        return Err(eyre!("No contract deployed at {lottery}"));
    }
    let hash = compute_code_hash(&code);
    let record = DeploymentRecord::new(lottery, rpc_url, Some(hash.clone()));
    store.save(&record).map_err(|e| eyre!("{e:#}"))?;
    println!(
        "Pinned {lottery} (code hash {hash}) in {}",
        store.path().display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let _guard = if args.action == Action::Play {
        Some(init_file_tracing(&args.log_dir))
    } else {
        init_stderr_tracing();
        None
    };

    let wallet_dir = resolve_wallet_dir(args.wallet_dir.as_deref())?;
    if args.action == Action::Wallets {
        let wallets = list_wallets(&wallet_dir)?;
        if wallets.is_empty() {
            println!("No keystores in {}", wallet_dir.display());
        }
        for wallet in wallets {
            println!("{}\t{}", wallet.name, wallet.path.display());
        }
        return Ok(());
    }

    let store = DeploymentStore::new(args.network).map_err(|e| eyre!("{e:#}"))?;
    let record = store.load().map_err(|e| eyre!("{e:#}"))?;
    let lottery = resolve_lottery_address(args.network, args.contract, record.as_ref())
        .map_err(|e| eyre!("{e:#}"))?;
    let endpoint: Url = args
        .network
        .rpc_url(args.rpc_url.as_deref(), args.infura_key.as_deref())
        .map_err(|e| eyre!("{e:#}"))?;
    tracing::info!(network = %args.network, %lottery, "using lottery contract");

    let reader = RpcReader::connect(endpoint.clone(), lottery);
    if args.action == Action::Pin {
        return pin(&store, &reader, args.rpc_url.clone()).await;
    }
    verify_deployment(&reader, record.as_ref()).await?;

    let min_entry = parse_ether(args.min_entry.trim())
        .wrap_err_with(|| format!("Invalid --min-entry '{}'", args.min_entry))?;
    let confirmation_poll = Duration::from_millis(args.confirm_poll_ms.max(1));
    let controller = Arc::new(RpcController::new(reader, min_entry));

    if let Some(name) = args.wallet.as_deref() {
        let descriptor = find_wallet(&wallet_dir, name)?;
        let signer = prompt_and_unlock(&descriptor)?;
        let session =
            RpcWallet::connect(endpoint.clone(), lottery, signer, confirmation_poll);
        controller.connect(session)?;
    }

    match args.action {
        Action::Show => show(&controller).await,
        _ => {
            app::run_app(
                controller,
                app::AppConfig {
                    network: args.network,
                    endpoint,
                    lottery,
                    wallet_dir,
                    refresh_interval: Duration::from_secs(args.refresh_secs.max(1)),
                    confirmation_poll,
                },
            )
            .await
        }
    }
}
