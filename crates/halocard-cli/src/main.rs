// ============================================================================
// halocard - token gate and card registry from the command line
// ============================================================================
// Usage:
//   halocard gate <WALLET> [--strict]             Evaluate the token gate
//   halocard card <WALLET>                        Show the wallet's HaloCard
//   halocard mint <WALLET> --name NAME            Gate check, then mint
//   halocard recent [--limit 6]                   Newest cards
//   halocard gallery [--search S] [--tier T]      Filtered gallery with counts
//   halocard config                               Print the effective config
// ============================================================================

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use halocard_core::gate::format_balance;
use halocard_core::mint::share_intent_url;
use halocard_core::registry::{GalleryFilter, TierCounts};
use halocard_core::{
    open_store, Card, CardView, GateStatus, HaloConfig, HaloService, MintOutcome, MintRequest,
    StoreChoice, Tier, WalletIdentity,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// HaloCard token gate and card registry
#[derive(Parser)]
#[command(name = "halocard", version, about = "Check the HaloCard token gate and manage cards")]
struct Cli {
    /// Path to the local card database (default: ~/.halocard/cards.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Card store backend: auto, atlas or local
    #[arg(long, global = true, default_value = "auto")]
    store: StoreChoice,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the token gate for a wallet
    Gate {
        wallet: String,

        /// Fail on oracle errors instead of reporting "not admitted"
        #[arg(long)]
        strict: bool,
    },

    /// Show the HaloCard owned by a wallet
    Card { wallet: String },

    /// Check the gate and mint a card for a wallet
    Mint {
        wallet: String,

        /// Display name (1-20 characters)
        #[arg(long)]
        name: String,

        /// Optional tagline (up to 60 characters)
        #[arg(long)]
        tagline: Option<String>,
    },

    /// List the most recently minted cards
    Recent {
        #[arg(long, default_value = "6")]
        limit: usize,
    },

    /// Browse cards with search and tier filters
    Gallery {
        /// Case-insensitive match on name or tagline
        #[arg(long)]
        search: Option<String>,

        /// Angel, Archangel or Cherubim
        #[arg(long)]
        tier: Option<Tier>,

        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Print the effective configuration
    Config,
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    let dotenv = dotenvy::dotenv();

    // Logs go to stderr so --json output stays parseable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("halocard_cli=info,halocard_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = HaloConfig::from_env()?;

    if let Commands::Config = cli.command {
        return cmd_config(&config, cli.json);
    }

    let store = open_store(&config, cli.store, cli.db_path.as_deref())?;
    let service = HaloService::from_config(&config, store)?;

    match cli.command {
        Commands::Gate { wallet, strict } => cmd_gate(&service, &wallet, strict, cli.json).await,
        Commands::Card { wallet } => cmd_card(&service, &wallet, cli.json).await,
        Commands::Mint {
            wallet,
            name,
            tagline,
        } => cmd_mint(&service, &wallet, &name, tagline.as_deref(), cli.json).await,
        Commands::Recent { limit } => cmd_recent(&service, limit, cli.json).await,
        Commands::Gallery {
            search,
            tier,
            limit,
        } => cmd_gallery(&service, GalleryFilter { search, tier }, limit, cli.json).await,
        Commands::Config => Ok(()),
    }
}

fn print_status(wallet: &WalletIdentity, status: &GateStatus) {
    println!("=== HaloCard Token Gate ===");
    let shown = if wallet.is_connected() { wallet.as_str() } else { "(not connected)" };
    println!("Wallet:   {}", shown);
    println!("Balance:  {}", status.balance_formatted());
    println!("Required: {}", format_balance(status.required_ui));
    println!("Admitted: {}", if status.admitted { "yes" } else { "no" });
    println!("Tier:     {}", status.tier);
    if !status.admitted {
        println!("Missing:  {}", format_balance(status.shortfall()));
    }
    if let (Some(next), Some(tokens)) = (status.next_tier, status.tokens_to_next_tier) {
        println!("Next:     {} ({} more)", next, format_balance(tokens));
    }
}

fn print_card(card: &Card) {
    let view = CardView::from(card);
    println!("{} [{}]", view.display_name, view.tier);
    println!("  Wallet:  {}", view.wallet_address);
    if let Some(tagline) = &view.tagline {
        println!("  Tagline: {}", tagline);
    }
    println!("  Minted:  {}", format_timestamp(&view.created_at));
}

async fn cmd_gate(service: &HaloService, wallet: &str, strict: bool, json: bool) -> Result<()> {
    let wallet = WalletIdentity::parse(wallet)?;
    let status = if strict {
        service.gate().try_evaluate(&wallet).await?
    } else {
        service.evaluate(&wallet).await
    };

    if json {
        return print_json(&status);
    }
    print_status(&wallet, &status);
    Ok(())
}

async fn cmd_card(service: &HaloService, wallet: &str, json: bool) -> Result<()> {
    let wallet = WalletIdentity::parse(wallet)?;
    let lookup = service.exists(&wallet).await?;

    if json {
        return print_json(&lookup);
    }
    match &lookup.card {
        Some(card) => print_card(card),
        None => println!("No HaloCard for {}", wallet),
    }
    Ok(())
}

async fn cmd_mint(
    service: &HaloService,
    wallet: &str,
    name: &str,
    tagline: Option<&str>,
    json: bool,
) -> Result<()> {
    let wallet = WalletIdentity::parse(wallet)?;
    let status = service.evaluate(&wallet).await;

    let flow = service.mint_flow();
    let outcome = flow.mint(&wallet, &status, MintRequest::new(name, tagline)).await?;

    if json {
        return print_json(&outcome);
    }

    match &outcome {
        MintOutcome::Created { card } => {
            println!("HaloCard minted!");
            print_card(card);
            println!("Share:   {}", share_intent_url(card.tier));
        }
        MintOutcome::AlreadyExists { .. } => {
            println!("You already created a HaloCard for this wallet.");
        }
        MintOutcome::Failed { message } => {
            anyhow::bail!("Mint failed: {}. Try again.", message);
        }
    }
    if let Some(path) = outcome.redirect() {
        println!("Profile: {}", path);
    }
    Ok(())
}

async fn cmd_recent(service: &HaloService, limit: usize, json: bool) -> Result<()> {
    let cards = service.list_recent(limit).await?;

    if json {
        return print_json(&cards);
    }
    if cards.is_empty() {
        println!("No cards minted yet.");
        return Ok(());
    }

    println!("{:<22}  {:<10}  {:<13}  {}", "MINTED", "TIER", "WALLET", "NAME");
    println!("{}", "-".repeat(70));
    for card in &cards {
        let view = CardView::from(card);
        println!(
            "{:<22}  {:<10}  {:<13}  {}",
            format_timestamp(&view.created_at),
            view.tier.to_string(),
            card.wallet_address.short(),
            view.display_name
        );
    }
    println!("\nTotal: {} cards", cards.len());
    Ok(())
}

async fn cmd_gallery(
    service: &HaloService,
    filter: GalleryFilter,
    limit: usize,
    json: bool,
) -> Result<()> {
    let cards = service.list_recent(limit).await?;
    let views: Vec<CardView> = cards.iter().map(CardView::from).collect();
    let counts = TierCounts::tally(&views);
    let shown = filter.apply(&views);

    if json {
        return print_json(&serde_json::json!({
            "counts": counts,
            "cards": shown,
        }));
    }

    println!(
        "All ({})  Angel ({})  Archangel ({})  Cherubim ({})",
        counts.all, counts.angel, counts.archangel, counts.cherubim
    );
    println!("Showing {} of {} HaloCards\n", shown.len(), views.len());

    for view in &shown {
        let tagline = view.tagline.as_deref().unwrap_or("-");
        println!("{:<20}  {:<10}  {}", view.display_name, view.tier.to_string(), tagline);
    }
    if shown.is_empty() && !views.is_empty() {
        println!("No cards match. Try adjusting your search terms or filters.");
    }
    Ok(())
}

fn cmd_config(config: &HaloConfig, json: bool) -> Result<()> {
    if json {
        return print_json(config);
    }

    let gate = &config.gate;
    let store = &config.store;
    println!("=== HaloCard Config ===");
    println!("RPC URL:          {}", gate.rpc_url);
    println!("Mint:             {}", gate.mint_address);
    println!("Decimals:         {}", gate.token_decimals);
    println!("Min holdings:     {} raw", gate.min_holdings_raw);
    println!("Archangel from:   {}", gate.archangel_threshold);
    println!("Cherubim from:    {}", gate.cherubim_threshold);
    println!("RPC timeout:      {}s", gate.rpc_timeout_secs);
    println!();
    match &store.atlas_app_id {
        Some(app_id) => println!("Atlas app:        {} ({})", app_id, store.atlas_base_url),
        None => println!("Atlas app:        (not configured)"),
    }
    println!("Collection:       {}.{}", store.database, store.collection);
    println!("Create function:  {}", store.create_function);
    match &store.db_path {
        Some(path) => println!("Local DB:         {}", path.display()),
        None => println!("Local DB:         ~/.halocard/cards.redb"),
    }
    Ok(())
}
