use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use http::Method;
use tracing::{error, info, warn};

use stockgate::config::{load_config, load_config_from, print_schema};
use stockgate::gateway::SessionListener;
use stockgate::models::ApiRequest;
use stockgate::routes::{navigation_links, RouteDecision};
use stockgate::startup::build_client;
use stockgate::state::ClientState;
use stockgate::utils::logger::init_logging;

#[derive(Parser)]
#[command(name = "stockgate")]
#[command(about = "Session-aware client for the inventory dashboard API")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $STOCKGATE_CONFIG, then ./config.yaml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    schema: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Clear the stored session
    Logout,
    /// Show who is logged in and which views they can reach
    Whoami,
    /// Send an authenticated request through the gateway
    Request {
        /// HTTP method, e.g. GET or POST
        method: String,
        /// Path relative to the API base URL
        path: String,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Check whether the current session may open a dashboard route
    Route { path: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.schema {
        if let Err(e) = print_schema() {
            eprintln!("Failed to print schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let config = match config {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let Some(command) = cli.command else {
        error!("No command given; see --help");
        std::process::exit(2);
    };

    let listener: Arc<dyn SessionListener> = Arc::new(|login_path: &str| {
        warn!(
            event_name = "cli.session.invalidated",
            event_domain = "cli",
            "Session ended; log in again (login page: {})",
            login_path
        );
    });
    let client = match build_client(config, listener) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&client, command).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(client: &ClientState, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Login { username, password } => {
            let session = client.auth.login(&username, &password).await?;
            info!(
                "Logged in as {} ({})",
                session.display_name.as_deref().unwrap_or(&username),
                session.role.map(|r| r.as_str()).unwrap_or("no role")
            );
        }
        Command::Logout => client.auth.logout(),
        Command::Whoami => match client.auth.current_user() {
            Some(user) => {
                println!(
                    "{} ({})",
                    user.display_name.as_deref().unwrap_or("unknown"),
                    user.role.map(|r| r.as_str()).unwrap_or("no role")
                );
                for link in navigation_links(&client.store.get()) {
                    println!("  {:<12} {}", link.label, link.path);
                }
            }
            None => println!("Not logged in"),
        },
        Command::Request { method, path, body } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = ApiRequest::new(method, path);
            if let Some(body) = body {
                request = request.with_body(serde_json::from_str(&body)?);
            }
            let response = client.gateway.send(&request).await?;
            println!("{}", response.status);
            println!("{}", response.text());
        }
        Command::Route { path } => match client.guard.navigate(&path) {
            RouteDecision::Render(view) => println!("render {:?}", view),
            RouteDecision::Redirect(to) => println!("redirect {}", to),
            RouteDecision::AccessDenied(denied) => {
                println!("access denied: {}", denied.message);
                println!("home: {}", denied.home);
            }
        },
    }
    Ok(())
}
