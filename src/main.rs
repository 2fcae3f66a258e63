use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardwars::address::Address;
use cardwars::auth::SignedCall;
use cardwars::config::LedgerConfig;
use cardwars::ledger::Ledger;
use cardwars::runtime::Call;
use cardwars::script::Script;

/// Card ledger toolbox
#[derive(Parser, Debug)]
#[command(name = "cardwars")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON script of transactions against a fresh deployment
    Run {
        script: PathBuf,

        /// Ledger config (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Battle RNG seed (default: random)
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Print the metadata URI of a token
    Uri {
        id: u64,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate an ed25519 key pair and its address
    Keygen,

    /// Sign a call (JSON) for submission
    Sign {
        /// 32-byte secret key, hex
        #[arg(long)]
        sk_hex: String,

        #[arg(long, default_value = "0")]
        nonce: u64,

        /// Call as JSON, e.g. '{"mint":{"payment":1}}'
        call: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<LedgerConfig, String> {
    match path {
        Some(path) => LedgerConfig::load(path).map_err(|e| format!("{}: {e}", path.display())),
        None => Ok(LedgerConfig::default()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("encode output: {e}"))
}

fn run(command: Commands) -> Result<(), String> {
    match command {
        Commands::Run {
            script,
            config,
            seed,
        } => {
            let config = load_config(config.as_deref())?;
            let raw = fs::read_to_string(&script)
                .map_err(|e| format!("read {}: {e}", script.display()))?;
            let script: Script =
                serde_json::from_str(&raw).map_err(|e| format!("parse script: {e}"))?;
            let report = script.run(&config, seed).map_err(|e| e.to_string())?;
            for step in &report.steps {
                println!("{}", to_json(step)?);
            }
            println!("{}", to_json(&report.snapshot)?);
            Ok(())
        }
        Commands::Uri { id, config } => {
            let config = load_config(config.as_deref())?;
            // uri() only reads the base URI, any admin will do
            let ledger = Ledger::new(&config, Address::new([1u8; 20])).map_err(|e| e.to_string())?;
            println!("{}", ledger.uri(id));
            Ok(())
        }
        Commands::Keygen => {
            let sk = SigningKey::generate(&mut OsRng);
            let vk = sk.verifying_key();
            println!("secret:  {}", hex::encode(sk.to_bytes()));
            println!("public:  {}", hex::encode(vk.to_bytes()));
            println!("address: {}", Address::from_verifying_key(&vk));
            Ok(())
        }
        Commands::Sign {
            sk_hex,
            nonce,
            call,
        } => {
            let raw = hex::decode(sk_hex.trim()).map_err(|e| format!("invalid --sk-hex: {e}"))?;
            let secret: [u8; 32] = raw
                .as_slice()
                .try_into()
                .map_err(|_| "--sk-hex must be exactly 32 bytes".to_string())?;
            let sk = SigningKey::from_bytes(&secret);
            let call: Call = serde_json::from_str(&call).map_err(|e| format!("parse call: {e}"))?;
            let signed = SignedCall::sign(call, nonce, &sk).map_err(|e| e.to_string())?;
            println!("{}", to_json(&signed)?);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
