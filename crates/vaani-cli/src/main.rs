use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vaani_core::{
    ApiClient, CapabilityRegistry, ClassifierConfig, CompositeResolver, ContactDirectory,
    ConversationHistory, ConversationalResponder, Coordinator, FileLocator, IntentClassifier,
    LanguageModel, MessageComposer, RoutedResponse,
};
use vaani_gateway::GatewayServer;

mod config;

use config::VaaniConfig;

#[derive(Parser)]
#[command(name = "vaani")]
#[command(version)]
#[command(about = "Vaani, a natural-language command router")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// Route a single utterance and print the response
    Ask {
        /// The utterance to route
        message: String,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session reading utterances from stdin
    Chat,

    /// Serve the HTTP gateway
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `ask --json` stays parseable
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Ask { message, json } => cmd_ask(&cli.config, &message, json).await,
        Commands::Chat => cmd_chat(&cli.config).await,
        Commands::Serve { port } => cmd_serve(&cli.config, port).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        info!("Created default config at {}", config_path.display());
    }

    println!("Vaani initialized at {}", config_dir.display());
    println!(
        "Set GROQ_API_KEY or edit {} to enable the language model.",
        config_path.display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let mut cfg = VaaniConfig::load(config_path)?;
    cfg.llm.api_key = config::mask_secret(&cfg.llm.api_key);
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, message: &str, json: bool) -> Result<()> {
    let cfg = VaaniConfig::load(config_path)?;
    let coordinator = build_coordinator(&cfg);

    let response = coordinator.handle(message).await;
    print_response(&response, json)?;
    Ok(())
}

async fn cmd_chat(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = VaaniConfig::load(config_path)?;
    let coordinator = build_coordinator(&cfg);

    println!("Vaani is listening. Type 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let response = coordinator.handle(line).await;
        print_response(&response, false)?;
    }

    println!("Goodbye!");
    Ok(())
}

async fn cmd_serve(config_path: &Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let cfg = VaaniConfig::load(config_path)?;
    let coordinator = Arc::new(build_coordinator(&cfg));

    let port = port.unwrap_or(cfg.gateway.port);
    let bind: SocketAddr = format!("{}:{}", cfg.gateway.bind, port)
        .parse()
        .with_context(|| format!("Invalid gateway bind address: {}:{}", cfg.gateway.bind, port))?;

    let server = GatewayServer::new(bind, coordinator);
    info!("Starting Vaani gateway...");

    tokio::select! {
        result = server.run() => result?,
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Vaani gateway stopped");
    Ok(())
}

fn print_response(response: &RoutedResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    println!("{}", response.message);
    if let Some(link) = response.payload.get("link").and_then(|l| l.as_str()) {
        println!("Open: {}", link);
    }
    Ok(())
}

/// Wire the capabilities, classifier and resolver from config
fn build_coordinator(cfg: &VaaniConfig) -> Coordinator {
    let model: Option<Arc<dyn LanguageModel>> = if cfg.llm.enabled() {
        let api = ApiClient::new(cfg.llm.api_key.clone(), Some(cfg.llm.model.clone()))
            .with_max_tokens(cfg.llm.max_tokens)
            .with_temperature(cfg.llm.temperature)
            .with_base_url(cfg.llm.base_url.clone());
        info!("Language model enabled (model: {})", cfg.llm.model);
        Some(Arc::new(api))
    } else {
        warn!("No API key configured, using keyword routing and template replies only");
        None
    };

    let directory = if cfg.contacts.use_mock_directory {
        ContactDirectory::default()
    } else {
        ContactDirectory::empty()
    }
    .with_contacts(&cfg.contacts.entries);
    info!("Contact directory loaded ({} contacts)", directory.len());

    let locator = FileLocator::new(cfg.files.roots.clone())
        .with_max_depth(cfg.files.max_depth)
        .with_max_results(cfg.files.max_results);
    let history = Arc::new(ConversationHistory::new(cfg.conversation.history_size));

    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(
        MessageComposer::new(directory).with_link_base(cfg.messaging.link_base.clone()),
    ));
    registry.register(Arc::new(locator));
    registry.register(Arc::new(
        ConversationalResponder::new(model.clone(), history)
            .with_context_turns(cfg.conversation.context_turns),
    ));
    let registry = Arc::new(registry);
    info!("Registered {} capabilities", registry.len());

    let cues = Arc::new(cfg.router.cues.clone());
    let classifier = IntentClassifier::new(
        cues.clone(),
        model.clone(),
        ClassifierConfig {
            use_model_fallback: cfg.router.use_model_fallback,
        },
    );
    let resolver = CompositeResolver::new(registry.clone(), cues, model);

    Coordinator::new(classifier, resolver, registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_coordinator_without_key() {
        let cfg = VaaniConfig::parse("[files]\nroots = []").unwrap();
        let coordinator = build_coordinator(&cfg);

        assert_eq!(coordinator.capabilities().len(), 3);
        let r = coordinator.handle("Send WhatsApp to Jay: Hello").await;
        assert!(r.success);
        assert_eq!(r.payload["link"], "https://wa.me/919321781905?text=Hello");
    }

    #[tokio::test]
    async fn test_configured_contacts_and_link_base() {
        let cfg = VaaniConfig::parse(
            r#"
            [files]
            roots = []

            [contacts]
            use_mock_directory = false

            [contacts.entries]
            sarah = "+1 555 0100"

            [messaging]
            link_base = "https://chat.example.com/"
            "#,
        )
        .unwrap();
        let coordinator = build_coordinator(&cfg);

        let r = coordinator.handle("Send WhatsApp to Sarah: hi there").await;
        assert!(r.success, "{:?}", r);
        assert_eq!(r.payload["link"], "https://chat.example.com/15550100?text=hi%20there");

        let r = coordinator.handle("Send WhatsApp to Jay: hi").await;
        assert!(!r.success);
    }

    #[test]
    fn test_cli_parses_ask() {
        let cli = Cli::try_parse_from(["vaani", "ask", "hello", "--json"]).unwrap();
        match cli.command {
            Commands::Ask { message, json } => {
                assert_eq!(message, "hello");
                assert!(json);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_cli_parses_serve_port() {
        let cli = Cli::try_parse_from(["vaani", "-d", "serve", "--port", "9000"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000) }));
    }
}
