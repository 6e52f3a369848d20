use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use dragoman::application::ports::{EventBus, GlossaryRepository, JobRepository};
use dragoman::application::services::{
    JobService, Orchestrator, StageWorker, StreamConsumer, TranslationStage,
};
use dragoman::domain::StreamName;
use dragoman::infrastructure::event_bus::{InMemoryEventBus, RedisEventBus};
use dragoman::infrastructure::observability::{TracingConfig, init_tracing};
use dragoman::infrastructure::persistence::{
    InMemoryGlossaryRepository, InMemoryJobRepository, PgGlossaryRepository, PgJobRepository,
    create_pool, run_migrations,
};
use dragoman::infrastructure::storage::BlobStoreFactory;
use dragoman::infrastructure::translation::MockTranslationEngine;
use dragoman::presentation::config::EventBusProviderSetting;
use dragoman::presentation::{AppState, Environment, Settings, create_router};

const TRANSLATION_GROUP: &str = "translation-workers";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    let mut tracing_config = TracingConfig::new(environment.file_suffix(), settings.logging.json);
    if let Some(filter) = &settings.logging.filter {
        tracing_config = tracing_config.with_default_filter(filter);
    }
    init_tracing(&tracing_config, "dragoman");

    let (repository, glossaries): (Arc<dyn JobRepository>, Arc<dyn GlossaryRepository>) =
        match &settings.database.url {
            Some(url) => {
                let pool = create_pool(url, settings.database.max_connections).await?;
                run_migrations(&pool).await?;
                (
                    Arc::new(PgJobRepository::new(pool.clone())),
                    Arc::new(PgGlossaryRepository::new(pool)),
                )
            }
            None => {
                tracing::warn!("No database configured, job records are kept in memory");
                (
                    Arc::new(InMemoryJobRepository::new()),
                    Arc::new(InMemoryGlossaryRepository::new()),
                )
            }
        };

    let bus: Arc<dyn EventBus> = match settings.event_bus.provider {
        EventBusProviderSetting::Redis => Arc::new(
            RedisEventBus::connect(&settings.event_bus.url, &settings.event_bus.prefix).await?,
        ),
        EventBusProviderSetting::Memory => {
            tracing::warn!("Using the in-process event bus, external workers cannot connect");
            Arc::new(InMemoryEventBus::new())
        }
    };

    let store = BlobStoreFactory::create(&settings.storage)?;

    let shutdown = CancellationToken::new();
    let mut consumers = JoinSet::new();
    let mut state = AppState::new(
        Arc::new(JobService::new(
            Arc::clone(&repository),
            Arc::clone(&bus),
            Arc::clone(&store),
        )),
        Arc::clone(&bus),
    );

    if settings.workers.orchestrator {
        let group = settings.consumer.group.clone();
        let orchestrator = Orchestrator::new(Arc::clone(&repository), Arc::clone(&bus));
        if settings.workers.resume_after_secs > 0 {
            let stale_after = Duration::from_secs(settings.workers.resume_after_secs);
            match orchestrator.resume_stalled(stale_after).await {
                Ok(resumed) => tracing::info!(resumed, "Stalled job sweep finished"),
                Err(e) => tracing::warn!(error = %e, "Stalled job sweep failed"),
            }
        }
        let consumer = StreamConsumer::new(
            Arc::clone(&bus),
            StreamName::Events,
            Arc::new(orchestrator),
            settings.consumer.to_consumer_config(&group),
        );
        consumers.spawn({
            let shutdown = shutdown.clone();
            async move { consumer.run(shutdown).await }
        });
        state = state.with_monitored_group(StreamName::Events, group);
    }

    if settings.workers.translation {
        let stage = TranslationStage::new(
            Arc::new(MockTranslationEngine),
            Arc::clone(&repository),
            glossaries,
            Arc::clone(&store),
        );
        let worker = StageWorker::new(Arc::new(stage), Arc::clone(&repository), Arc::clone(&bus));
        let stream = worker.stream();
        let consumer = StreamConsumer::new(
            Arc::clone(&bus),
            stream,
            Arc::new(worker),
            settings.consumer.to_consumer_config(TRANSLATION_GROUP),
        );
        consumers.spawn({
            let shutdown = shutdown.clone();
            async move { consumer.run(shutdown).await }
        });
        state = state.with_monitored_group(stream, TRANSLATION_GROUP);
    }

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    while consumers.join_next().await.is_some() {}
    tracing::info!("Shutdown complete");

    Ok(())
}
