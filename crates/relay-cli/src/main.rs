//! Relay CLI
//!
//! Command-line interface for relaying signed instructions to ledger modules.

mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use relay_client::mock::{LiteAccountModule, MockLedger};
use relay_client::{
    Confirmation, ConfirmationPoller, JsonRpcLedger, LedgerClient, RelayClient, RelayConfig,
    RelayOptions, SubmissionReceipt,
};
use relay_core::codec::{sf, StObject};
use relay_core::instruction::{InstructionRecord, ListOperation, LitePayment, Proposal};
use relay_core::sequence::SequenceCounter;
use relay_core::{AccountId, Drops, Hash256, Tag};
use relay_crypto::KeyPair;
use relay_protocol::{ActorRecord, SignedEnvelope, TagIndex, VirtualLedger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::store::Store;

#[derive(Parser)]
#[command(name = "relay")]
#[command(version)]
#[command(about = "Relay signed instructions to ledger modules through carrier payments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "relay.toml")]
    config: PathBuf,

    /// Directory for sequence counters and the tag index
    #[arg(short, long, global = true, default_value = "~/.relay")]
    data_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 key pair for a virtual actor
    Keygen {
        /// File to write the secret to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create or credit the virtual actor owning a key
    Deposit {
        /// Secret of the actor, or a file holding it
        #[arg(short, long)]
        key: String,

        /// Drops to deposit
        #[arg(short, long)]
        amount: u64,
    },

    /// Pay out of a virtual actor's balance
    Pay {
        /// Secret of the paying actor, or a file holding it
        #[arg(short, long)]
        key: String,

        /// Destination address
        #[arg(long)]
        to: String,

        /// Destination tag
        #[arg(long)]
        dest_tag: Option<Tag>,

        /// Drops to send
        #[arg(short, long)]
        amount: u64,

        /// Tag of the paying actor, looked up when omitted
        #[arg(long)]
        tag: Option<Tag>,
    },

    /// Change a module-held account list
    List {
        #[command(subcommand)]
        operation: ListCommands,
    },

    /// Propose a payment from the module account to a notary module
    Propose {
        /// Destination of the proposed payment
        #[arg(long)]
        to: String,

        /// Drops the proposed payment sends
        #[arg(short, long)]
        amount: u64,

        /// Ledgers the proposal stays valid for
        #[arg(long, default_value = "200")]
        lifetime: u32,
    },

    /// Endorse a pending proposal
    Endorse {
        /// Proposal id (hex)
        id: String,
    },

    /// Show the virtual actors held by the module
    Dump {
        /// First tag to scan instead of reading the counter
        #[arg(long, requires = "to_tag")]
        from_tag: Option<Tag>,

        /// Last tag to scan
        #[arg(long, requires = "from_tag")]
        to_tag: Option<Tag>,
    },

    /// Wait for the module's verdict on a transaction
    Confirm {
        /// Transaction id (hex)
        tx: String,

        /// Ledgers to wait before giving up
        #[arg(long, default_value = "20")]
        ledgers: u32,
    },

    /// Run a deposit, a payment and its replay against an in-memory ledger
    Simulate,
}

#[derive(Subcommand)]
enum ListCommands {
    /// Add accounts to the list
    Add {
        /// Admin secret, or a file holding it
        #[arg(short, long)]
        key: String,

        accounts: Vec<String>,
    },
    /// Remove accounts from the list
    Remove {
        /// Admin secret, or a file holding it
        #[arg(short, long)]
        key: String,

        accounts: Vec<String>,
    },
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false),
        )
        .init();
}

fn expand_path(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Secret given inline or as a path to a file holding it
fn load_key(text: &str) -> anyhow::Result<KeyPair> {
    let path = expand_path(Path::new(text));
    let secret = if path.is_file() {
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?
    } else {
        text.to_string()
    };
    Ok(KeyPair::from_secret_text(&secret)?)
}

fn parse_accounts(accounts: &[String]) -> anyhow::Result<Vec<AccountId>> {
    if accounts.is_empty() {
        bail!("no accounts given");
    }
    accounts
        .iter()
        .map(|a| a.parse::<AccountId>().with_context(|| format!("invalid account {}", a)))
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn report<L: LedgerClient + ?Sized>(
    relay: &RelayClient<L>,
    receipt: &SubmissionReceipt,
) -> anyhow::Result<Confirmation> {
    println!("Submitted: {} ({})", receipt.tx_id, receipt.code);
    let confirmation = relay.confirm(receipt).await?;
    match &confirmation {
        Confirmation::Found(outcome) => {
            print_json(outcome)?;
            println!("Result: {:?}", outcome.classify());
        }
        Confirmation::NotFound => println!("Validated without a module execution"),
    }
    Ok(confirmation)
}

/// Tag of `key`, from the local index or the module's state
fn resolve_tag(index: &mut TagIndex, view: &VirtualLedger, key: &KeyPair) -> anyhow::Result<Tag> {
    if let Some(tag) = index.tag_of(key.public_key()) {
        return Ok(tag);
    }
    index.refresh(view)?;
    index
        .tag_of(key.public_key())
        .with_context(|| format!("no virtual actor holds key {}", key.public_key()))
}

fn print_actors(actors: &[ActorRecord]) {
    if actors.is_empty() {
        println!("No virtual actors");
        return;
    }
    println!("{:>8}  {:<64}  {:>12}  {:>20}", "TAG", "PUBLIC KEY", "SEQUENCE", "BALANCE");
    for actor in actors {
        println!(
            "{:>8}  {:<64}  {:>12}  {:>20}",
            actor.tag,
            actor.public_key.to_hex(),
            actor.sequence.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            actor.balance.map(|b| b.0.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
}

fn connect(config: &RelayConfig) -> anyhow::Result<RelayClient<JsonRpcLedger>> {
    let ledger = Arc::new(JsonRpcLedger::new(&config.ledger.endpoint, config.request_timeout())?);
    tracing::debug!(endpoint = ledger.endpoint(), "ledger client ready");
    Ok(RelayClient::from_config(ledger, config)?)
}

async fn simulate() -> anyhow::Result<()> {
    let carrier = AccountId::new([0x11; 20]);
    let module = AccountId::new([0x22; 20]);
    let ledger = Arc::new(MockLedger::new(1));
    ledger.fund(carrier);
    ledger.install(module, Arc::new(LiteAccountModule::new()));
    let relay = RelayClient::new(
        ledger.clone(),
        carrier,
        KeyPair::generate(),
        module,
        RelayOptions::default(),
        Default::default(),
    );

    let actor = KeyPair::generate();
    println!("Actor key: {}", actor.public_key());
    let receipt = relay.deposit(actor.public_key(), Drops(5 * Drops::PER_UNIT)).await?;
    report(&relay, &receipt).await?;

    let view = relay.virtual_ledger().await?;
    let mut index = TagIndex::new();
    let tag = resolve_tag(&mut index, &view, &actor)?;
    let mut counter = SequenceCounter::default();
    let record: InstructionRecord = LitePayment {
        sequence: view.next_sequence_for(tag, &mut counter)?,
        source_tag: tag,
        public_key: actor.public_key().to_prefixed(),
        destination: AccountId::new([0x33; 20]),
        destination_tag: None,
        amount: Drops(Drops::PER_UNIT),
    }
    .into();
    let envelope = SignedEnvelope::sign_record(&record, &actor)?;

    println!("Payment:");
    let receipt = relay.relay(&envelope, relay.options().value).await?;
    report(&relay, &receipt).await?;

    println!("Replay of the same envelope:");
    let receipt = relay.relay(&envelope, relay.options().value).await?;
    report(&relay, &receipt).await?;

    print_actors(&relay.virtual_ledger().await?.enumerate()?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = expand_path(&cli.config);
    let load_config = || -> anyhow::Result<RelayConfig> {
        RelayConfig::load(Some(&config_path))
            .with_context(|| format!("loading {}", config_path.display()))
    };
    let open_store = || Store::open(&expand_path(&cli.data_dir));

    match cli.command {
        Commands::Keygen { output } => {
            let pair = KeyPair::generate();
            match output {
                Some(path) => {
                    let path = expand_path(&path);
                    std::fs::write(&path, pair.secret_hex())?;
                    println!("Secret written to {:?}", path);
                }
                None => println!("Secret: {}", pair.secret_hex()),
            }
            println!("Public key: {}", pair.public_key());
        }

        Commands::Deposit { key, amount } => {
            let config = load_config()?;
            let store = open_store()?;
            let actor = load_key(&key)?;
            let relay = connect(&config)?;

            let receipt = relay.deposit(actor.public_key(), Drops(amount)).await?;
            report(&relay, &receipt).await?;

            let mut index = store.tags()?;
            let view = relay.virtual_ledger().await?;
            if let Ok(tag) = resolve_tag(&mut index, &view, &actor) {
                println!("Tag: {}", tag);
            }
            store.save_tags(&index)?;
        }

        Commands::Pay {
            key,
            to,
            dest_tag,
            amount,
            tag,
        } => {
            let config = load_config()?;
            let store = open_store()?;
            let actor = load_key(&key)?;
            let destination: AccountId = to.parse().with_context(|| format!("invalid destination {}", to))?;
            let relay = connect(&config)?;

            let view = relay.virtual_ledger().await?;
            let mut index = store.tags()?;
            let tag = match tag {
                Some(tag) => tag,
                None => resolve_tag(&mut index, &view, &actor)?,
            };
            store.save_tags(&index)?;

            let mut counter = store.sequence(actor.public_key())?;
            let sequence = view.next_sequence_for(tag, &mut counter)?;
            store.save_sequence(actor.public_key(), counter)?;

            let record: InstructionRecord = LitePayment {
                sequence,
                source_tag: tag,
                public_key: actor.public_key().to_prefixed(),
                destination,
                destination_tag: dest_tag,
                amount: Drops(amount),
            }
            .into();
            let receipt = relay.relay_record(&record, &actor).await?;
            report(&relay, &receipt).await?;
        }

        Commands::List { operation } => {
            let (operation, key, accounts) = match operation {
                ListCommands::Add { key, accounts } => (ListOperation::Add, key, accounts),
                ListCommands::Remove { key, accounts } => (ListOperation::Remove, key, accounts),
            };
            let config = load_config()?;
            let store = open_store()?;
            let admin = load_key(&key)?;
            let accounts = parse_accounts(&accounts)?;
            let relay = connect(&config)?;

            let mut counter = store.sequence(admin.public_key())?;
            let submitted = relay.update_list(operation, accounts, &admin, &mut counter).await;
            store.save_sequence(admin.public_key(), counter)?;
            report(&relay, &submitted?).await?;
        }

        Commands::Propose { to, amount, lifetime } => {
            let config = load_config()?;
            let relay = connect(&config)?;
            let destination: AccountId = to.parse().with_context(|| format!("invalid destination {}", to))?;
            let current = relay.ledger().current_ledger().await?;

            let transaction = StObject::new()
                .with(sf::TRANSACTION_TYPE, relay_protocol::PAYMENT_TRANSACTION_TYPE)?
                .with(sf::ACCOUNT, *relay.module())?
                .with(sf::DESTINATION, destination)?
                .with(sf::AMOUNT, Drops(amount))?
                .with(sf::LAST_LEDGER_SEQUENCE, current.saturating_add(lifetime))?;
            let (id, receipt) = relay.propose(&Proposal { transaction }).await?;
            println!("Proposal id: {}", id);
            report(&relay, &receipt).await?;
        }

        Commands::Endorse { id } => {
            let config = load_config()?;
            let relay = connect(&config)?;
            let id = Hash256::from_hex(&id).with_context(|| format!("invalid proposal id {}", id))?;
            let receipt = relay.endorse(&id).await?;
            report(&relay, &receipt).await?;
        }

        Commands::Dump { from_tag, to_tag } => {
            let config = load_config()?;
            let store = open_store()?;
            let relay = connect(&config)?;
            let view = relay.virtual_ledger().await?;

            println!("Module: {}", relay.module());
            println!("Counter: {}", view.counter()?);
            let actors = match (from_tag, to_tag) {
                (Some(from), Some(to)) => view.scan(from..=to)?,
                _ => view.enumerate()?,
            };
            print_actors(&actors);

            let mut index = store.tags()?;
            let added = index.refresh(&view)?;
            store.save_tags(&index)?;
            println!("Tag index: {} entries ({} new) in {}", index.len(), added, store.dir().display());
        }

        Commands::Confirm { tx, ledgers } => {
            let config = load_config()?;
            let tx_id = Hash256::from_hex(&tx).with_context(|| format!("invalid transaction id {}", tx))?;
            let ledger = Arc::new(JsonRpcLedger::new(&config.ledger.endpoint, config.request_timeout())?);
            let poller = ConfirmationPoller::new(ledger, config.poll_settings());
            match poller.confirm(&tx_id, &config.module_account()?, ledgers).await? {
                Confirmation::Found(outcome) => {
                    print_json(&outcome)?;
                    println!("Result: {:?}", outcome.classify());
                }
                Confirmation::NotFound => println!("Validated without a module execution"),
            }
        }

        Commands::Simulate => simulate().await?,
    }

    Ok(())
}
