use anyhow::{Context, bail};
use braid::{
    AppState, BraidConfig, BraidConfigManager, SearchEvent, SearchService, ServiceHandle,
    api::routes::build_app,
    cli::{Cli, Commands, output::Output},
    types::{SearchRequest, SearchResponse},
};
use std::{path::Path, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        None | Some(Commands::Serve) => serve(&cli.config, cli.verbose, &output).await,
        Some(Commands::Search {
            query,
            stream,
            json,
            no_web,
        }) => {
            init_tracing("warn", cli.verbose);
            let config = BraidConfig::load(&cli.config)
                .with_context(|| format!("loading {}", cli.config.display()))?;
            let service = SearchService::from_config(&config)?;
            let request = SearchRequest {
                query,
                prior_turns: vec![],
                is_entitled: !no_web,
            };
            if stream {
                search_streaming(&service, request, json, &output).await
            } else {
                let response = service.search(request, &CancellationToken::new()).await?;
                print_response(&response, json, &output)
            }
        }
        Some(Commands::Config { full, validate }) => show_config(&cli.config, full, validate, &output),
    }
}

/// `RUST_LOG` wins; otherwise `level`, or `debug` with `--verbose`.
/// Logs go to stderr so `search --json` output stays machine-readable.
fn init_tracing(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("braid={level},braid_server={level},tower_http={level}"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

async fn serve(config_path: &Path, verbose: bool, output: &Output) -> anyhow::Result<()> {
    output.banner();

    let mut manager = BraidConfigManager::new(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_tracing(&manager.config().server.log_level, verbose);
    for warning in manager.config().validate_with_warnings()? {
        output.warning(&warning.message);
    }
    manager.start_watching()?;
    let manager = Arc::new(manager);

    let config = manager.config();
    let search = ServiceHandle::from_manager(Arc::clone(&manager))?;
    let state = AppState {
        config_manager: Arc::clone(&manager),
        search: Arc::new(search),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    output.success(&format!("Listening on http://{}", addr));
    tracing::info!(%addr, sources = config.enabled_sources().count(), "Braid server started");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.stop_watching();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

async fn search_streaming(
    service: &SearchService,
    request: SearchRequest,
    json: bool,
    output: &Output,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel(64);
    let token = CancellationToken::new();

    let printer = async {
        let mut last = None;
        while let Some(event) = rx.recv().await {
            match event {
                SearchEvent::Delta(update) if !json => output.delta(&update.delta),
                SearchEvent::Delta(_) => {}
                SearchEvent::Result(response) => last = Some(response),
                SearchEvent::Error(message) => output.error(&message),
            }
        }
        last
    };

    let (result, last) = tokio::join!(service.search_streaming(request, &token, tx), printer);
    result?;

    let Some(response) = last else {
        bail!("search finished without a result");
    };
    if json {
        return print_response(&response, true, output);
    }

    output.newline();
    output.citations(&response.fusion.citations, response.fusion.more_citations);
    output.kv("duration", &format!("{} ms", response.duration_ms));
    Ok(())
}

fn print_response(response: &SearchResponse, json: bool, output: &Output) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    let fusion = &response.fusion;
    output.headline(&fusion.headline);
    output.body(&fusion.body, &fusion.placements);
    output.citations(&fusion.citations, fusion.more_citations);

    output.subheader("Sources");
    for (id, result) in &response.sources {
        let status = if result.succeeded { "live" } else { "fallback" };
        output.kv(id.as_str(), &format!("{} items ({})", result.items.len(), status));
    }
    output.kv("duration", &format!("{} ms", response.duration_ms));
    Ok(())
}

fn show_config(path: &Path, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    output.header("Configuration");
    output.kv("path", &path.display().to_string());

    let config = match BraidConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            output.error(&e.to_string());
            bail!("invalid configuration");
        }
    };

    if validate {
        let warnings = config.validate_with_warnings()?;
        output.success("Configuration is valid");
        for warning in &warnings {
            output.warning(&warning.message);
        }
    }

    output.subheader("Server");
    output.kv("address", &format!("{}:{}", config.server.host, config.server.port));
    output.kv("log_level", &config.server.log_level);

    output.subheader("Synthesis");
    output.kv(
        "endpoint",
        config.synthesis.base_url.as_deref().unwrap_or("(offline template)"),
    );
    output.kv("fast_model", &config.synthesis.fast_model);
    output.kv("web_model", &config.synthesis.web_model);
    output.kv("word_budget", &config.synthesis.word_budget.to_string());

    output.subheader("Sources");
    if config.sources.is_empty() {
        output.info("No sources configured");
    }
    for (id, source) in &config.sources {
        let state = if source.enabled { "enabled" } else { "disabled" };
        output.list_item(&format!(
            "{} ({}) {}",
            id,
            state,
            source.endpoint.as_deref().unwrap_or("-")
        ));
    }

    if full {
        output.subheader("Full configuration");
        println!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}
