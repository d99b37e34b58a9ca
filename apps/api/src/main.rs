mod config;
mod errors;
mod llm_client;
mod models;
mod outreach;
mod queue;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, ModelConfig, StrategyKind};
use crate::llm_client::{ChatModel, LlmClient, ProviderConfig};
use crate::outreach::agent::AgentStrategy;
use crate::outreach::delivery::WebhookSink;
use crate::outreach::pipeline::{BatchPipeline, OutreachStrategy, ScriptedStrategy};
use crate::outreach::steps::{OutreachSteps, StepModels};
use crate::queue::{QueueWorker, WorkQueue};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Missing API keys are fatal before anything is served
    let config = Arc::new(Config::from_env()?);
    let settings = &config.settings;

    let level = if settings.output.debug_mode {
        "debug"
    } else if !settings.output.verbose {
        "warn"
    } else {
        config.rust_log.as_str()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={level},tower_http={level}", env!("CARGO_CRATE_NAME")))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Outreach API v{}", env!("CARGO_PKG_VERSION"));

    // LLM providers: OpenAI for scoring, writing and judging; Perplexity for research
    let timeout = settings.api.llm_timeout_secs.map(Duration::from_secs);
    let openai = ProviderConfig {
        base_url: config.openai_base_url.clone(),
        api_key: config.openai_api_key.clone(),
        timeout,
        max_attempts: settings.api.llm_max_attempts,
        log_prompts: settings.output.show_prompts,
    };
    let perplexity = ProviderConfig {
        base_url: config.perplexity_base_url.clone(),
        api_key: config.perplexity_api_key.clone(),
        ..openai.clone()
    };

    let models = &settings.models;
    let agent_model = chat_model(&openai, &models.agent)?;
    let step_models = StepModels {
        research: chat_model(&perplexity, &models.research)?,
        scorer: Arc::clone(&agent_model),
        generator: chat_model(&openai, &models.generator)?,
        selector: Arc::new(LlmClient::new(&openai, models.agent.model.clone(), Some(0.0))?),
    };
    info!(
        "LLM models: research={} generator={} agent={}",
        step_models.research.model_name(),
        step_models.generator.model_name(),
        agent_model.model_name()
    );

    let steps = Arc::new(OutreachSteps::new(step_models, config.prompts.clone(), settings));
    let top_n = settings.api.max_targets_per_company;
    let strategy: Arc<dyn OutreachStrategy> = match settings.api.strategy {
        StrategyKind::Scripted => Arc::new(ScriptedStrategy::new(steps, top_n)),
        StrategyKind::Agent => Arc::new(AgentStrategy::new(
            steps,
            agent_model,
            top_n,
            settings.api.agent_max_steps,
            settings.output.show_tool_calls,
        )),
    };
    info!("Batch strategy: {}", strategy.name());

    let sink = Arc::new(WebhookSink::new(Duration::from_secs(
        settings.api.webhook_timeout_secs,
    ))?);
    let pipeline = Arc::new(BatchPipeline::new(
        strategy,
        sink,
        settings.api.message_delay(),
    ));

    // Single background worker draining the queue
    let (queue, receiver) = WorkQueue::new();
    let worker = QueueWorker::new(receiver, pipeline, settings.api.batch_delay()).spawn();

    let state = AppState {
        queue: queue.clone(),
        strategy: settings.api.strategy,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Batches already accepted are finished before exit
    info!("Waiting for {} queued batch(es) to finish", queue.depth());
    queue.shutdown()?;
    if let Err(e) = worker.await {
        error!("Queue worker ended abnormally: {e}");
    }

    Ok(())
}

fn chat_model(provider: &ProviderConfig, model: &ModelConfig) -> Result<Arc<dyn ChatModel>> {
    Ok(Arc::new(LlmClient::new(
        provider,
        model.model.clone(),
        model.temperature,
    )?))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received shutdown signal, starting graceful shutdown");
}
