//! Cloud Shield Console - Entry Point
//!
//! Modes:
//! - login / register / logout / whoami: session management
//! - alerts / logs / rules / reload: one-shot resource queries
//! - watch: live monitoring feed until Ctrl-C

use std::sync::Arc;

use cloudshield_client::console::{render_alert, render_event, render_log, render_rule};
use cloudshield_client::services::{AlertFilter, AlertStatus, LogFilter, RegisterRequest};
use cloudshield_client::{
    ActivityBoard, ApiClient, ClientConfig, ClientError, FeedEvent, GuardState, LiveFeedClient,
    Navigator, SessionContext, SessionGuard, TokenStore,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Rows fetched by the list modes
const LIST_LIMIT: u32 = 50;

/// "Go to login" on a terminal means telling the user how to log in again
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn redirect(&self, route: &str) {
        info!("Redirect requested: {}", route);
        eprintln!("Authentication required. Run `cloudshield login <email> <password>`.");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().skip(1).collect();
    let json_logs = args.iter().any(|a| a == "--json");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let positional = positional_args(&args);

    if help_mode || positional.is_empty() {
        print_help();
        return Ok(());
    }

    let watch_mode = positional[0] == "watch";

    // Logs go to stderr; stdout is for command output
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(if watch_mode { Level::INFO } else { Level::WARN });

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config = ClientConfig::from_env()?;
    let store = Arc::new(TokenStore::from_config(&config)?);
    let session = SessionContext::new(store, Arc::new(ConsoleNavigator));
    let api = ApiClient::new(&config, session)?;

    if let Err(e) = run(&positional, &api, &config).await {
        match e.downcast_ref::<ClientError>() {
            // Navigator has already told the user what to do
            Some(ClientError::AuthRejected) => {}
            Some(ClientError::Http(http)) => eprintln!("Error: {}", http.detail),
            _ => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: &[&str], api: &ApiClient, config: &ClientConfig) -> anyhow::Result<()> {
    match args {
        ["login", email, password] => {
            let response = api.auth().login(email, password).await?;
            println!("Logged in as {}", response.user.display_name());
        }
        ["register", email, password, name @ ..] if !name.is_empty() => {
            let request = RegisterRequest::new(email, password, &name.join(" "));
            let user = api.auth().register(&request).await?;
            println!(
                "Registered {}. Run `cloudshield login {} <password>` to sign in.",
                user.display_name(),
                email
            );
        }
        ["logout"] => {
            api.auth().logout()?;
            println!("Logged out");
        }
        ["whoami"] => {
            require_session(api)?;
            let user = api.auth().current_user().await?;
            match &user.email {
                Some(email) => println!("{} <{}>", user.display_name(), email),
                None => println!("{}", user.display_name()),
            }
        }
        ["alerts", rest @ ..] => {
            require_session(api)?;
            let status = match rest.first() {
                Some(status) => Some(status.parse::<AlertStatus>().map_err(anyhow::Error::msg)?),
                None => None,
            };
            let filter = AlertFilter {
                limit: Some(LIST_LIMIT),
                status,
                ..Default::default()
            };
            for alert in api.alerts().get_alerts(&filter).await? {
                println!("{}", render_alert(&alert));
            }
        }
        ["logs", rest @ ..] => {
            require_session(api)?;
            let filter = LogFilter {
                limit: Some(LIST_LIMIT),
                severity: rest.first().map(|s| s.to_string()),
                ..Default::default()
            };
            for log in api.logs().get_logs(&filter).await? {
                println!("{}", render_log(&log));
            }
        }
        ["rules"] => {
            require_session(api)?;
            for rule in api.suricata().get_rules(false).await? {
                println!("{}", render_rule(&rule));
            }
        }
        ["reload"] => {
            require_session(api)?;
            let result = api.suricata().reload().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ["watch"] => watch(api, config).await?,
        _ => {
            print_help();
            anyhow::bail!("Unknown command: {}", args.join(" "));
        }
    }

    Ok(())
}

/// Mount a guard for one-shot protected commands
fn require_session(api: &ApiClient) -> anyhow::Result<()> {
    let mut guard = SessionGuard::new(api.session().clone());
    match guard.mount() {
        GuardState::Authenticated(_) => Ok(()),
        _ => anyhow::bail!("Not logged in"),
    }
}

/// Stream live monitoring events until Ctrl-C, the feed closes, or the
/// session ends
async fn watch(api: &ApiClient, config: &ClientConfig) -> anyhow::Result<()> {
    let session = api.session().clone();
    let mut changes = session.store().subscribe();
    let mut guard = SessionGuard::new(session.clone());

    let user = match guard.mount() {
        GuardState::Authenticated(user) => user.clone(),
        _ => anyhow::bail!("Not logged in"),
    };
    let token = session
        .store()
        .token()
        .ok_or_else(|| anyhow::anyhow!("Session has no token"))?;

    println!("Watching live activity as {}", user.display_name());

    match api.monitoring().get_metrics().await {
        Ok(metrics) => println!("metrics   {}", metrics),
        Err(ClientError::AuthRejected) => return Ok(()),
        Err(e) => warn!("Initial metrics unavailable: {}", e),
    }

    let mut feed = LiveFeedClient::new(config).open(&token)?;
    let mut board = ActivityBoard::new(config.activity_limit);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            event = feed.next_event() => match event {
                Some(FeedEvent::Message(message)) => {
                    let event = board.apply(&message);
                    println!("{}", render_event(&event));
                }
                Some(FeedEvent::Error(e)) => eprintln!("Live feed error: {}", e),
                None => {
                    println!("Live feed closed");
                    break;
                }
            },
            state = guard.follow(&mut changes) => {
                if !matches!(state, Some(GuardState::Authenticated(_))) {
                    break;
                }
            }
        }
    }

    feed.shutdown().await;
    info!(
        "Watch ended after {} frames ({} unrecognized)",
        board.frames(),
        board.unknown_frames()
    );
    Ok(())
}

/// Everything except the known flags, so values such as passwords may start with '-'
fn positional_args(args: &[String]) -> Vec<&str> {
    args.iter()
        .map(String::as_str)
        .filter(|a| !matches!(*a, "--json" | "--help" | "-h"))
        .collect()
}

fn print_help() {
    println!("Cloud Shield Console v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: cloudshield [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  login <email> <password>               Log in and store the session");
    println!("  register <email> <password> <name...>  Create an account");
    println!("  logout                                 Forget the stored session");
    println!("  whoami                                 Show the logged-in user");
    println!("  alerts [status]                        List alerts (open, investigating, ...)");
    println!("  logs [severity]                        List logs");
    println!("  rules                                  List Suricata rules");
    println!("  reload                                 Reload Suricata rules");
    println!("  watch                                  Stream live monitoring events");
    println!();
    println!("Options:");
    println!("  --json      Log as JSON");
    println!("  --help, -h  Show this help");
    println!();
    println!("Environment variables:");
    println!("  CLOUDSHIELD_API_URL             API origin (default: http://localhost:8000)");
    println!("  CLOUDSHIELD_SESSION_FILE        Session file path");
    println!("  CLOUDSHIELD_HTTP_TIMEOUT        Request timeout in seconds (default: 30)");
    println!("  CLOUDSHIELD_WS_CONNECT_TIMEOUT  Feed connect timeout in seconds (default: 10)");
    println!("  CLOUDSHIELD_FEED_BUFFER         Feed channel capacity (default: 256)");
    println!("  CLOUDSHIELD_ACTIVITY_LIMIT      Rolling buffer size in watch mode (default: 50)");
    println!("  RUST_LOG                        trace, debug, info, warn, error");
}
