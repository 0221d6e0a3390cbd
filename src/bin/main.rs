use std::sync::Arc;
use std::time::Duration;

use alumni_portal::auth::validation::normalize_email;
use alumni_portal::auth::DEFAULT_TOKEN_TTL_DAYS;
use alumni_portal::client::{AuthOutcome, FileStorage, PortalApi, SessionContext};
use alumni_portal::config::{DEFAULT_API_URL, DEFAULT_BIND, resolve_state_dir};
use alumni_portal::{ApiContext, ClientConfig, DatabaseConfig, PortalConfig, create_router};
use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alumni-portal")]
#[command(about = "Alumni portal API and client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DbArgs {
    /// Database URL (`memory` for an embedded throwaway store)
    #[arg(long, env = "PORTAL_DB_URL", default_value = "memory")]
    db_url: String,
}

impl DbArgs {
    fn config(self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.db_url,
            ..Default::default()
        }
    }

    /// Config for commands whose writes must outlive the process.
    fn persistent_config(self) -> Result<DatabaseConfig> {
        let config = self.config();
        if config.is_ephemeral() {
            bail!("This command needs a persistent database; pass --db-url or set PORTAL_DB_URL");
        }
        Ok(config)
    }
}

#[derive(Args)]
struct ClientArgs {
    #[arg(long, env = "PORTAL_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Give up on requests that take longer than this
    #[arg(long, env = "PORTAL_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl ClientArgs {
    fn session(self) -> Result<SessionContext> {
        let mut config = ClientConfig::new(&self.api_url)?;
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        let api = PortalApi::new(&config)?;
        let storage = FileStorage::new(resolve_state_dir());
        Ok(SessionContext::new(api, Box::new(storage)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: String,
        #[command(flatten)]
        db: DbArgs,
        /// Secret used to sign bearer tokens
        #[arg(long, env = "PORTAL_JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,
        #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_DAYS)]
        token_ttl_days: i64,
        /// Include internal detail in server error responses
        #[arg(long, default_value_t = false)]
        dev: bool,
    },
    /// Initialize the database
    Init {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Create an admin user, or promote an existing one
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "User")]
        last_name: String,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Report whether an email belongs to an admin
    CheckAdmin {
        email: String,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Sign in against a running server and remember the token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Show the signed-in user
    Whoami {
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Forget the stored token
    Logout {
        #[command(flatten)]
        client: ClientArgs,
    },
}

/// Context for offline admin commands. The JWT secret is never used to sign
/// anything here, so a placeholder is enough.
async fn offline_context(db: DbArgs) -> Result<Arc<ApiContext>> {
    let mut config = PortalConfig::new("offline");
    config.database = db.persistent_config()?;
    ApiContext::connect(&config).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("alumni_portal=info".parse()?))
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            db,
            jwt_secret,
            token_ttl_days,
            dev,
        } => {
            let config = PortalConfig {
                bind,
                jwt_secret,
                token_ttl_days,
                dev_mode: dev,
                database: db.config(),
            };
            info!("Using database url for REST server: {}", config.database.url);
            if config.dev_mode {
                info!("Development mode: error responses include internal detail");
            }

            let state = ApiContext::connect(&config).await?;
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(&config.bind).await?;
            info!("Portal API listening on http://{}", config.bind);
            axum::serve(listener, app).await?;
        }
        Commands::Init { db } => {
            let config = db.persistent_config()?;
            info!("Initializing database at {}", config.url);
            let conn = alumni_portal::create_connection(config).await?;
            alumni_portal::ensure_schema(&conn).await?;
            println!("Database initialized successfully");
        }
        Commands::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
            db,
        } => {
            let ctx = offline_context(db).await?;
            let (user, created) = ctx
                .auth
                .ensure_admin(&email, &password, &first_name, &last_name)
                .await?;

            if created {
                println!("Created admin {} ({})", user.email, user.uid);
            } else {
                println!("Promoted existing user {} ({}) to admin", user.email, user.uid);
            }
        }
        Commands::CheckAdmin { email, db } => {
            let ctx = offline_context(db).await?;
            let email = normalize_email(&email);
            match ctx.users.get_user_by_email(&email).await? {
                Some(user) if user.is_admin => println!("{} is an admin", user.email),
                Some(user) => println!("{} is not an admin", user.email),
                None => bail!("No user with email {}", email),
            }
        }
        Commands::Login {
            email,
            password,
            client,
        } => {
            let session = client.session()?;
            match session.login(&email, &password).await {
                AuthOutcome::Success => {
                    if let Some(user) = session.user() {
                        println!("Signed in as {} {} <{}>", user.first_name, user.last_name, user.email);
                    }
                }
                AuthOutcome::Failure { message } => bail!(message),
            }
        }
        Commands::Whoami { client } => {
            let session = client.session()?;
            session.bootstrap().await;
            match session.user() {
                Some(user) => {
                    let member = session.check_membership().await;
                    println!("{} {} <{}>", user.first_name, user.last_name, user.email);
                    println!("  Admin: {}", user.is_admin);
                    println!("  Member: {}", member);
                }
                None => println!("Not signed in"),
            }
        }
        Commands::Logout { client } => {
            client.session()?.logout();
            println!("Signed out");
        }
    }

    Ok(())
}
