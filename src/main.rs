use anyhow::Context;
use mioo::{
    agents::AgentSelector,
    api::routes::create_app,
    cli::{output::Output, Cli, Commands},
    utils::toml_config::LogFormat,
    AppState, MiooConfig,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = match MiooConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            output.error(&format!("{}: {}", cli.config.display(), e));
            std::process::exit(1);
        }
    };

    let serving = matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(&config, cli.verbose, serving);

    match cli.command {
        None => serve(config, None, None, &output).await,
        Some(Commands::Serve { host, port }) => serve(config, host, port, &output).await,
        Some(Commands::Turn {
            user,
            message,
            json,
        }) => run_turn(config, &user, &message, json, &output).await,
        Some(Commands::Reset { user, agent }) => reset(config, &user, &agent, &output).await,
        Some(Commands::Delete { user, agent }) => delete(config, &user, &agent, &output).await,
        Some(Commands::Check) => {
            check(&config, &output);
            Ok(())
        }
    }
}

/// `RUST_LOG` wins over the configured level. One-shot commands log to
/// stderr and stay quiet unless `--verbose`.
fn init_tracing(config: &MiooConfig, verbose: bool, serving: bool) {
    let default_level = match (serving, verbose) {
        (_, true) => "debug",
        (true, false) => config.server.log_level.as_str(),
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("mioo={0},mioo_server={0},tower_http={0}", default_level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

async fn serve(
    config: MiooConfig,
    host: Option<String>,
    port: Option<u16>,
    output: &Output,
) -> anyhow::Result<()> {
    output.banner();

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);

    let state = AppState::from_config(config)
        .await
        .context("Failed to initialize application state")?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    output.success(&format!("Listening on http://{}", addr));
    output.info(&format!("OpenAPI document at http://{}/api/openapi.json", addr));
    info!(%addr, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn run_turn(
    config: MiooConfig,
    user: &str,
    message: &str,
    json: bool,
    output: &Output,
) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let turn = state.orchestrator.process_turn(user, message).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&turn.payload)?);
        return Ok(());
    }

    output.flow(&turn.flow, turn.state);
    output.payload(&turn.payload);
    Ok(())
}

async fn reset(config: MiooConfig, user: &str, agent: &str, output: &Output) -> anyhow::Result<()> {
    let selector: AgentSelector = agent.parse()?;
    let state = AppState::from_config(config).await?;

    for (agent, summary) in state.orchestrator.reset_conversation(user, selector).await? {
        output.kv(agent.as_str(), &summary);
    }
    output.success(&format!("Reset conversations of {}", user));
    Ok(())
}

async fn delete(config: MiooConfig, user: &str, agent: &str, output: &Output) -> anyhow::Result<()> {
    let selector: AgentSelector = agent.parse()?;
    let state = AppState::from_config(config).await?;

    let deleted = state.orchestrator.delete_conversation(user, selector).await?;
    output.success(&format!("Deleted {} conversation(s) of {}", deleted, user));
    Ok(())
}

fn check(config: &MiooConfig, output: &Output) {
    output.success("Configuration is valid");

    let mut providers: Vec<_> = config.providers.iter().collect();
    providers.sort_by(|a, b| a.0.cmp(b.0));
    for (name, provider) in providers {
        output.kv(
            &format!("provider {}", name),
            &format!("{:?} prefixes={:?}", provider.kind, provider.model_prefixes),
        );
    }

    let mut agents: Vec<_> = config.agents.iter().collect();
    agents.sort_by(|a, b| a.0.cmp(b.0));
    for (name, agent) in agents {
        let provider = config.provider_for_model(&agent.model).unwrap_or("?");
        output.kv(
            &format!("agent {}", name),
            &format!("{:?} model={} via {}", agent.capability, agent.model, provider),
        );
    }

    match config.database_provider() {
        Ok(db) => output.kv("database", &db.describe()),
        Err(e) => output.warning(&e.to_string()),
    }
}
