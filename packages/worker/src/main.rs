use std::sync::Arc;

use anyhow::Context;
use common::planner::validate_variants;
use common::{CdnSyncJob, LogJob, ResizeJob, RoutingKey};
use mq::{MqConfig, MqRouter, QueueRouter, init_mq};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use worker::consumer::consume;
use worker::{Pipeline, WorkerAppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = WorkerAppConfig::load().context("Failed to load config")?;
    info!("Worker starting: {}", config.worker.id);

    validate_variants(&config.pipeline.variants).context("Invalid variant configuration")?;

    let mq = Arc::new(
        init_mq(MqConfig::from(&config.mq))
            .await
            .context("Failed to initialize MQ")?,
    );
    info!(
        channels = ?config.worker.channels,
        concurrency = config.worker.concurrency,
        "MQ connected"
    );

    let pipeline = Arc::new(
        Pipeline::from_config(&config)
            .await
            .context("Failed to build pipeline")?,
    );
    let router: Arc<dyn QueueRouter> = Arc::new(MqRouter::new(Arc::clone(&mq), config.mq.clone()));

    let mut consumers = JoinSet::new();
    for key in &config.worker.channels {
        let queue = config.mq.queue_name(*key).to_string();
        let mq = Arc::clone(&mq);
        let pipeline = Arc::clone(&pipeline);
        let router = Arc::clone(&router);
        let concurrency = config.worker.concurrency;

        match key {
            RoutingKey::Resize => consumers.spawn(consume::<ResizeJob>(
                mq,
                queue,
                concurrency,
                pipeline,
                router,
            )),
            RoutingKey::Log => {
                consumers.spawn(consume::<LogJob>(mq, queue, concurrency, pipeline, router))
            }
            RoutingKey::CdnSync => consumers.spawn(consume::<CdnSyncJob>(
                mq,
                queue,
                concurrency,
                pipeline,
                router,
            )),
        };
    }

    while let Some(joined) = consumers.join_next().await {
        match joined {
            Ok(Ok(())) => warn!("Consumer exited"),
            Ok(Err(e)) => error!(error = %e, "Consumer stopped unexpectedly"),
            Err(e) => error!(error = %e, "Consumer task panicked"),
        }
    }

    Ok(())
}
