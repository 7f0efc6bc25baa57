use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::PasswordDisplayMode;
use memovault::envelope;
use memovault::invitation::InvitationAuthority;
use memovault::multiblock;
use memovault::secret::Password;
use memovault::store::{EndpointVault, FileStore, Pinned};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand)]
pub enum Commands {
    /// Seal text into a password envelope token.
    Seal {
        /// Text to seal; read from stdin when omitted.
        #[arg(short, long)]
        text: Option<String>,

        #[arg(short, long, env = "MEMOVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Open an envelope token.
    Open {
        /// Token to open; read from stdin when omitted.
        #[arg(short, long)]
        token: Option<String>,

        #[arg(short, long, env = "MEMOVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Encrypt data so that either of two passwords opens it.
    Lock {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, env = "MEMOVAULT_PASSWORD_A", hide_env_values = true)]
        password_a: Option<String>,

        #[arg(long, env = "MEMOVAULT_PASSWORD_B", hide_env_values = true)]
        password_b: Option<String>,
    },

    /// Decrypt a dual-password container with either password.
    Unlock {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, env = "MEMOVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Verify an invitation and pin its endpoint in the local store.
    Redeem {
        /// Invitation JSON file.
        #[arg(short, long)]
        invitation: PathBuf,

        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "MEMOVAULT_STORE", default_value = "memovault.json")]
        store: PathBuf,

        #[arg(short, long, env = "MEMOVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Issuer public key (JWK) replacing the built-in one.
        #[arg(long)]
        public_key: Option<PathBuf>,

        /// Issuer passphrase replacing the built-in one.
        #[arg(long, env = "MEMOVAULT_SYSTEM_PASSPHRASE", hide_env_values = true)]
        system_passphrase: Option<String>,
    },
}

#[derive(Parser)]
#[command(name = "memovault", version = "26.1.0", about = "Password envelopes, dual-password containers and signed invitations for memo services.")]
pub struct App {
    #[command(subcommand)]
    command: Commands,
}

impl App {
    pub fn init() -> Result<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(Self::parse())
    }

    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Seal { text, password } => {
                let text = match text {
                    Some(text) => text,
                    None => String::from_utf8(read_input(None).await?).context("input is not utf-8")?,
                };
                let password = resolve_password(password, "Envelope password")?;
                let token = envelope::seal_blocking(text, password).await.context("sealing failed")?;
                write_output(None, format!("{token}\n").as_bytes()).await
            }
            Commands::Open { token, password } => {
                let token = match token {
                    Some(token) => token,
                    None => String::from_utf8(read_input(None).await?).context("input is not utf-8")?,
                };
                let password = resolve_password(password, "Envelope password")?;
                let text = envelope::open_blocking(token.trim().to_owned(), password).await.context("opening failed")?;
                write_output(None, format!("{text}\n").as_bytes()).await
            }
            Commands::Lock { input, output, password_a, password_b } => {
                let data = read_input(input.as_deref()).await?;
                let password_a = resolve_password(password_a, "First password")?;
                let password_b = resolve_password(password_b, "Second password")?;
                let encoded = tokio::task::spawn_blocking(move || multiblock::encrypt(&password_a, &password_b, &data)).await?.context("encryption failed")?;
                write_output(output.as_deref(), encoded.as_bytes()).await
            }
            Commands::Unlock { input, output, password } => {
                let encoded = String::from_utf8(read_input(input.as_deref()).await?).context("input is not utf-8")?;
                let password = resolve_password(password, "Password")?;
                let data = tokio::task::spawn_blocking(move || multiblock::decrypt(&password, &encoded)).await?.context("decryption failed")?;
                match data {
                    Some(data) => write_output(output.as_deref(), &data).await,
                    None => bail!("decryption failed: the password opens no block"),
                }
            }
            Commands::Redeem { invitation, username, store, password, public_key, system_passphrase } => Self::redeem(&invitation, &username, &store, password, public_key.as_deref(), system_passphrase).await,
        }
    }

    async fn redeem(invitation: &Path, username: &str, store: &Path, password: Option<String>, public_key: Option<&Path>, system_passphrase: Option<String>) -> Result<()> {
        let authority = match (public_key, system_passphrase) {
            (None, None) => InvitationAuthority::system()?,
            (public_key, passphrase) => {
                let jwk = match public_key {
                    Some(path) => tokio::fs::read_to_string(path).await.with_context(|| format!("failed to read {}", path.display()))?,
                    None => memovault::config::SYSTEM_PUBLIC_KEY_JWK.to_owned(),
                };
                let passphrase = passphrase.unwrap_or_else(|| memovault::config::SYSTEM_PASSPHRASE.to_owned());
                InvitationAuthority::new(Password::from_string(passphrase), &jwk)?
            }
        };

        let raw = tokio::fs::read_to_string(invitation).await.with_context(|| format!("failed to read {}", invitation.display()))?;
        let store = FileStore::open(store).await.with_context(|| format!("failed to open store {}", store.display()))?;
        let vault = EndpointVault::new(&store);
        let password = resolve_password(password, "Account password")?;

        let redeemed = authority.redeem(&raw, username, &vault, &password).await.with_context(|| format!("invitation rejected for {username}"))?;

        match redeemed.pinned {
            Pinned::Stored => eprintln!("invitation accepted; endpoint stored in {}", store.path().display()),
            Pinned::Matched => eprintln!("invitation accepted; endpoint matches {}", store.path().display()),
        }

        Ok(())
    }
}

fn resolve_password(given: Option<String>, prompt: &str) -> Result<Password> {
    if let Some(password) = given {
        return Ok(Password::from_string(password));
    }

    let password = inquire::Password::new(prompt).without_confirmation().with_display_mode(PasswordDisplayMode::Masked).prompt().context("password prompt failed")?;

    Ok(Password::from_string(password))
}

async fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await.context("failed to read stdin")?;
            Ok(data)
        }
    }
}

async fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, data).await.with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(data).await.context("failed to write stdout")?;
            stdout.flush().await.context("failed to flush stdout")
        }
    }
}
