//! `japa` -- terminal client for the JAPA visa onboarding service.
//!
//! Signs in, walks the onboarding wizards from a JSON answers file,
//! manages documents, and talks to travel agents and the assistant.
//!
//! # Environment variables
//!
//! | Variable                    | Required | Default                                      | Description                       |
//! |-----------------------------|----------|----------------------------------------------|-----------------------------------|
//! | `JAPA_API_URL`              | no       | `http://localhost:8000`                      | Backend base URL                  |
//! | `JAPA_STORAGE_URL`          | no       | `https://firebasestorage.googleapis.com`     | Object storage REST base URL      |
//! | `JAPA_STORAGE_BUCKET`       | uploads  | --                                           | Bucket for uploaded documents     |
//! | `JAPA_GOOGLE_CLIENT_ID`     | Google   | --                                           | OAuth client id                   |
//! | `JAPA_OAUTH_REDIRECT_URI`   | no       | `http://localhost:5173/auth/google/callback` | OAuth redirect                    |
//! | `JAPA_DATA_DIR`             | no       | `./.japa`                                    | Session and snapshot directory    |
//! | `JAPA_REQUEST_TIMEOUT_SECS` | no       | `30`                                         | Per-request timeout               |
//! | `JAPA_POLL_INTERVAL_SECS`   | no       | `3`                                          | Conversation refresh interval     |
//! | `JAPA_LOG_FORMAT`           | no       | `text`                                       | `json` for structured logs        |

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use japa_client::api::ApiClient;
use japa_client::config::ClientConfig;
use japa_client::persist::FileSnapshotStore;
use japa_client::session::{FileSessionStore, GoogleSettings, SessionContext};
use japa_core::auth::User;
use japa_core::documents::StatusFilter;
use japa_core::types::DbId;

#[derive(Parser)]
#[command(name = "japa", version, about = "JAPA visa onboarding client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Register as a travel agent
        #[arg(long)]
        agent: bool,
    },

    /// Sign in with Google; paste the redirect URL when prompted
    Google {
        /// Create new accounts as travel agents
        #[arg(long)]
        agent: bool,
    },

    /// Forget the saved session
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Print the saved onboarding profile
    Profile,

    /// Run the applicant intake wizard with answers from a JSON file
    Onboard { answers: PathBuf },

    /// Run the travel agent wizard with answers from a JSON file
    AgentOnboard { answers: PathBuf },

    /// Show visa recommendations for the saved profile
    Recommendations {
        /// Accept a cached result
        #[arg(long)]
        cached: bool,
        /// Also show the step-by-step checklist for option N (1-based)
        #[arg(long)]
        checklist: Option<usize>,
    },

    /// Show past recommendation runs
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Manage uploaded documents
    Documents {
        #[command(subcommand)]
        action: DocumentsCommand,
    },

    /// Browse travel agents
    Agents {
        #[arg(long, default_value = "")]
        country: String,
        #[arg(long, default_value = "")]
        destination: String,
        #[arg(long, default_value = "")]
        specialization: String,
    },

    /// List conversations
    Conversations,

    /// Start a conversation with an agent
    Contact {
        agent_id: DbId,
        /// Optional first message
        message: Option<String>,
    },

    /// Follow a conversation until Ctrl-C
    Watch { conversation_id: DbId },

    /// Send a message to a conversation
    Send {
        conversation_id: DbId,
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Ask the assistant a question
    Ask { question: Vec<String> },
}

#[derive(Subcommand)]
enum DocumentsCommand {
    /// List documents, optionally by status
    List {
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },

    /// Upload a file and register it
    Upload {
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        doc_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a document and its stored file
    Delete { id: DbId },
}

/// Shared state for one invocation.
struct App {
    config: ClientConfig,
    session: SessionContext,
    snapshots: Arc<FileSnapshotStore>,
}

impl App {
    fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let api = ApiClient::new(&config)?;
        let snapshots = Arc::new(FileSnapshotStore::new(&config.data_dir));
        let session = SessionContext::init(api, Arc::new(FileSessionStore::new(&config.data_dir)))
            .with_snapshots(snapshots.clone())
            .with_google(GoogleSettings {
                client_id: config.google_client_id.clone(),
                redirect_uri: config.oauth_redirect_uri.clone(),
            });
        Ok(Self {
            config,
            session,
            snapshots,
        })
    }

    fn api(&self) -> &ApiClient {
        self.session.api()
    }

    fn require_user(&self) -> anyhow::Result<User> {
        self.session
            .user()
            .context("Not signed in. Run `japa login` first.")
    }
}

fn init_tracing() {
    let json = std::env::var("JAPA_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "japa_cli=info,japa_client=info,japa_core=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    tracing::debug!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "Loaded configuration");

    let app = App::new(config)?;
    commands::run(&app, cli.command).await
}
