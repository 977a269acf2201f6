use anyhow::{bail, Context, Result};
use axum::serve;
use clap::{Parser, Subcommand};
use doctree::api::{self, tenants::cleanup_task, AppState, ServiceAccountDir};
use doctree::config::{Config, DEFAULT_CONFIG_PATH};
use doctree::console::{admit, Browser};
use doctree_core::auth::{FirebaseVerifier, Hs256Verifier, TokenVerifier};
use doctree_core::credentials::ServiceAccountKey;
use doctree_core::store::RestStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EMULATOR_ENV: &str = "FIRESTORE_EMULATOR_HOST";
const HS256_ENV: &str = "DOCTREE_HS256_SECRET";
const CLEANUP_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Parser)]
#[command(name = "doctree")]
#[command(about = "Browse and restructure hierarchical document databases")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "DOCTREE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the service-account key and administrators
    Init {
        /// Service-account key file (JSON)
        #[arg(long)]
        service_account: PathBuf,

        /// Project to use instead of the one named in the key
        #[arg(long)]
        project_id: Option<String>,

        /// Email allowed to open the browser; repeatable
        #[arg(long = "admin-email")]
        admin_emails: Vec<String>,
    },

    /// Open the interactive browser
    Browse {
        /// Identity token of the administrator
        #[arg(long, env = "DOCTREE_ID_TOKEN")]
        id_token: String,
    },

    /// Serve the HTTP API
    Serve {
        /// Listen address, overrides the config
        #[arg(short, long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli { config, command } = Cli::parse();
    match command {
        Commands::Init {
            service_account,
            project_id,
            admin_emails,
        } => init(&config, service_account, project_id, admin_emails),
        Commands::Browse { id_token } => browse(Config::load_or_default(&config)?, &id_token).await,
        Commands::Serve { listen } => run_server(Config::load_or_default(&config)?, listen).await,
    }
}

fn init(
    config_path: &Path,
    service_account: PathBuf,
    project_id: Option<String>,
    admin_emails: Vec<String>,
) -> Result<()> {
    let key = ServiceAccountKey::load(&service_account)
        .with_context(|| format!("reading {}", service_account.display()))?;
    let service_account = std::fs::canonicalize(&service_account)?;
    let mut config = Config::load_or_default(config_path)?;
    config.service_account = Some(service_account);
    config.project_id = project_id;
    if !admin_emails.is_empty() {
        config.admin_emails = admin_emails;
    }
    config.save(config_path)?;
    println!(
        "Configuration for project '{}' written to {}",
        config.project_id.as_deref().unwrap_or(&key.project_id),
        config_path.display()
    );
    Ok(())
}

fn load_key(config: &Config) -> Result<Option<ServiceAccountKey>> {
    let Some(path) = &config.service_account else {
        return Ok(None);
    };
    let mut key = ServiceAccountKey::load(path)
        .with_context(|| format!("reading service account {}", path.display()))?;
    if let Some(project) = &config.project_id {
        key.project_id = project.clone();
    }
    Ok(Some(key))
}

fn project_id(config: &Config) -> Result<String> {
    if let Some(project) = &config.project_id {
        return Ok(project.clone());
    }
    match load_key(config)? {
        Some(key) => Ok(key.project_id),
        None => bail!("no project configured; run `doctree init` first"),
    }
}

fn open_store(config: &Config) -> Result<RestStore> {
    if let Ok(host) = std::env::var(EMULATOR_ENV) {
        info!(%host, "using emulator");
        return Ok(RestStore::emulator(&host, project_id(config)?));
    }
    match load_key(config)? {
        Some(key) => Ok(RestStore::new(key)),
        None => bail!("no service account configured; run `doctree init` first"),
    }
}

fn token_verifier(config: &Config) -> Result<Arc<dyn TokenVerifier>> {
    if let Ok(secret) = std::env::var(HS256_ENV) {
        return Ok(Arc::new(Hs256Verifier::new(secret)));
    }
    Ok(Arc::new(FirebaseVerifier::new(project_id(config)?)))
}

async fn browse(config: Config, id_token: &str) -> Result<()> {
    let store = open_store(&config)?;
    let verifier = token_verifier(&config)?;
    let email = admit(verifier.as_ref(), id_token, &config).await?;
    info!(%email, project = store.project_id(), "browser session started");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    Browser::new(&store, stdin.lock(), stdout.lock())
        .with_operator(email)
        .with_limits(config.batch_size, config.max_depth)
        .run()
        .await
}

async fn run_server(config: Config, listen: Option<String>) -> Result<()> {
    let verifier = token_verifier(&config)?;
    let registry = Arc::new(
        ServiceAccountDir::open(
            &config.service_accounts_dir,
            Duration::from_secs(config.upload_ttl_secs),
        )?
        .with_emulator(std::env::var(EMULATOR_ENV).ok()),
    );
    tokio::spawn(cleanup_task(registry.clone(), CLEANUP_PERIOD));

    let state = AppState::new(registry, verifier).with_limits(config.batch_size, config.max_depth);
    let app = api::router(state);

    let addr = listen.unwrap_or(config.listen);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
