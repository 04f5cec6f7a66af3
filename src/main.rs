use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use integration_flows::backend::HttpBackend;
use integration_flows::config::IntegrationConfig;
use integration_flows::conversation::{ConversationSink, InlineTranscript};
use integration_flows::design_url::DesignUrlParser;
use integration_flows::flow::FlowStep;
use integration_flows::redirect::{FileKeyValueStore, PageUrl, RedirectMarkerStore};
use integration_flows::{IntegrationOrchestrator, OrchestratorDeps, ProviderId};

/// Prints handed-off resources to stdout.
struct StdoutConversation;

#[async_trait]
impl ConversationSink for StdoutConversation {
    async fn send_to_conversation(&self, text: String) {
        println!("\n{text}\n");
    }
}

/// Prints inline assistant turns to stderr.
struct StderrTranscript;

#[async_trait]
impl InlineTranscript for StderrTranscript {
    async fn add_inline_message(&self, text: String, metadata: serde_json::Value) {
        eprintln!("assistant [{}]: {text}", metadata["kind"].as_str().unwrap_or("inline"));
    }
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  integration-flows                      show connection status");
    eprintln!("  integration-flows <provider>           import a resource");
    eprintln!("  integration-flows connect <provider>   start authorization");
    eprintln!();
    eprintln!("Providers: source_host_a, source_host_b, design_host, video_host");
    std::process::exit(2);
}

fn parse_provider(raw: &str) -> ProviderId {
    raw.parse().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        usage();
    })
}

async fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    eprint!("{prompt}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines
        .next_line()
        .await?
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = IntegrationConfig::from_env()?;

    // Stand-in for the browser location after a redirect back.
    let page = match std::env::var("INTEGRATIONS_PAGE_URL") {
        Ok(url) => PageUrl::new(&url),
        Err(_) => PageUrl::empty(),
    };

    eprintln!("🔌 Integration flows v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_url);
    eprintln!("   State: {}", config.state_file.display());

    let redirects = RedirectMarkerStore::new(
        Arc::new(FileKeyValueStore::new(config.state_file.clone())),
        Arc::new(page),
        config.marker_ttl,
    );

    let orchestrator = IntegrationOrchestrator::new(OrchestratorDeps {
        backend: Arc::new(HttpBackend::from_config(&config)),
        redirects,
        design_urls: DesignUrlParser::new(
            config.design_domain.clone(),
            config.design_sites_domain.clone(),
        ),
        conversation: Arc::new(StdoutConversation),
        interaction: None,
        inline: Some(Arc::new(StderrTranscript)),
    });

    let args: Vec<String> = std::env::args().skip(1).collect();

    let provider = match args.as_slice() {
        [cmd, raw] if cmd == "connect" => {
            let provider = parse_provider(raw);
            let url = orchestrator.begin_authorization(provider).await?;
            eprintln!("Open this page to connect {}:", provider.display_name());
            println!("{url}");
            return Ok(());
        }
        [raw] => Some(parse_provider(raw)),
        [] => None,
        _ => usage(),
    };

    let resumed = orchestrator.resume_pending_redirect().await;

    let snapshot = orchestrator.check_connections().await;
    eprintln!();
    for (p, status) in &snapshot.statuses {
        let label = match status {
            Some(true) => "connected",
            Some(false) => "not connected",
            None => "unknown",
        };
        eprintln!("   {:<14} {label}", p.display_name());
    }
    eprintln!();

    let Some(provider) = provider.or(resumed) else {
        return Ok(());
    };

    if resumed != Some(provider) {
        orchestrator.start_flow(provider).await;
    }

    let state = orchestrator.flow_state(provider).await;
    match state.step {
        FlowStep::Connect => {
            eprintln!("{}", state.message);
            eprintln!("Run: integration-flows connect {provider}");
        }
        FlowStep::Install => {
            eprintln!("{}", state.message);
            if let Some(url) = orchestrator.install_url(provider).await {
                println!("{url}");
            }
        }
        FlowStep::Select if provider == ProviderId::DesignHost => {
            let Some(link) = read_line("link> ").await? else {
                orchestrator.cancel_flow().await;
                return Ok(());
            };
            if let Err(e) = orchestrator.import_url_flow(&link).await {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        FlowStep::Select => {
            let resources = orchestrator.visible_resources(provider).await;
            if resources.is_empty() {
                eprintln!("Nothing to import from {}.", provider.display_name());
                orchestrator.cancel_flow().await;
                return Ok(());
            }
            eprintln!("{}", state.message);
            for (i, resource) in resources.iter().enumerate() {
                eprintln!("  {:>3}. {}  {}", i + 1, resource.name(), resource.url());
            }
            let choice = read_line("number> ")
                .await?
                .and_then(|l| l.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| resources.get(i).cloned());
            match choice {
                Some(resource) => {
                    orchestrator.select_resource(resource).await;
                }
                None => orchestrator.cancel_flow().await,
            }
        }
        _ => {
            if let Some(error) = state.error {
                eprintln!("Error: {error}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
