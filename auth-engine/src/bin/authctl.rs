use anyhow::{anyhow, Context, Result};
use auth_engine::{AuthEngine, AuthSettings};
use clap::{Parser, Subcommand};
use common_auth::{SessionStatus, SessionTokens};
use common_crypto::generate_secret;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Operate the session authentication engine", long_about = None)]
struct Options {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a bcrypt hash suitable for AUTH_PASSWORD_HASH
    HashPassword {
        #[arg(long)]
        password: String,
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
    /// Print a random URL-safe secret suitable for AUTH_SECRET
    GenerateSecret {
        #[arg(long, default_value_t = 48)]
        bytes: usize,
    },
    /// Resolve configuration from the environment and print a redacted summary
    CheckConfig,
    /// Sign a session token with the configured secret
    Issue {
        /// Claim to embed (repeatable); values are parsed as JSON when possible
        #[arg(long = "claim", value_name = "KEY=VALUE")]
        claims: Vec<String>,
        /// Lifetime override, e.g. 1h or 7d
        #[arg(long)]
        ttl: Option<String>,
    },
    /// Verify a session token with the configured secret
    Verify { token: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let opts = Options::parse();
    match opts.command {
        Command::HashPassword { password, cost } => {
            let hash = bcrypt::hash(&password, cost).context("Failed to hash password")?;
            println!("{hash}");
        }
        Command::GenerateSecret { bytes } => {
            if bytes < common_crypto::MIN_SECRET_LENGTH {
                return Err(anyhow!(
                    "Secrets must be at least {} bytes",
                    common_crypto::MIN_SECRET_LENGTH
                ));
            }
            println!("{}", generate_secret(bytes));
        }
        Command::CheckConfig => {
            let engine = AuthEngine::new(AuthSettings::new());
            let config = engine.config()?;
            println!("{config:#?}");
        }
        Command::Issue { claims, ttl } => {
            let engine = AuthEngine::new(AuthSettings::new());
            let config = engine.config()?;
            let payload = parse_claims(&claims)?;
            let tokens = SessionTokens::new(&config.secret_key);
            let token = tokens.sign(payload, ttl.as_deref().unwrap_or(&config.token_ttl))?;
            println!("{token}");
        }
        Command::Verify { token } => {
            let engine = AuthEngine::new(AuthSettings::new());
            match engine.verify_session(Some(token.trim()))? {
                SessionStatus::Valid(claims) => {
                    println!("{}", serde_json::to_string_pretty(&claims.to_payload())?);
                }
                SessionStatus::Invalid(reason) => {
                    return Err(anyhow!("Session {reason}"));
                }
            }
        }
    }

    Ok(())
}

fn parse_claims(raw: &[String]) -> Result<Map<String, Value>> {
    let mut payload = Map::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid claim '{item}', expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("Invalid claim '{item}', key is empty"));
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        payload.insert(key.to_string(), value);
    }
    Ok(payload)
}
