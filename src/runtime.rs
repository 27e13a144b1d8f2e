//! Wires the consumer, handlers and outbox dispatcher together under one
//! shutdown signal.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::broker::{EventProducer, InMemoryBroker, Producer, Subscriber};
use crate::config::Config;
use crate::consumer::{Consumer, ConsumerStats};
use crate::error::Result;
use crate::handlers::EventHandlers;
use crate::media::{CdnService, InMemoryMediaCatalog, MediaCommandService, PrefixCdn};
use crate::outbox::{
    DispatcherStats, InMemoryOutboxStore, OutboxDispatcher, OutboxPublisher, OutboxStore,
};
use crate::pipeline::{InMemoryPipelineRepository, PipelineRepository, PipelineService};

/// External systems the pipeline runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaCommandService>,
    pub pipelines: Arc<dyn PipelineRepository>,
    pub outbox: Arc<dyn OutboxStore>,
    pub producer: Arc<dyn Producer>,
    pub subscriber: Arc<dyn Subscriber>,
    /// Defaults to a [`PrefixCdn`] over `Config::cdn_prefix`.
    pub cdn: Option<Arc<dyn CdnService>>,
}

impl Collaborators {
    /// Everything in memory, sharing one broker for both directions.
    pub fn in_memory(
        broker: &InMemoryBroker,
        media: &InMemoryMediaCatalog,
        pipelines: &InMemoryPipelineRepository,
        outbox: &InMemoryOutboxStore,
    ) -> Self {
        Self {
            media: Arc::new(media.clone()),
            pipelines: Arc::new(pipelines.clone()),
            outbox: Arc::new(outbox.clone()),
            producer: Arc::new(broker.clone()),
            subscriber: Arc::new(broker.clone()),
            cdn: None,
        }
    }

    /// Use `cdn` instead of a prefix CDN built from the config.
    pub fn with_cdn(mut self, cdn: Arc<dyn CdnService>) -> Self {
        self.cdn = Some(cdn);
        self
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub consumer: ConsumerStats,
    /// `None` when the outbox is disabled.
    pub dispatcher: Option<DispatcherStats>,
}

pub struct MediaPipeline {
    handlers: EventHandlers,
    consumer: Arc<Consumer>,
    dispatcher: Option<Arc<OutboxDispatcher>>,
    shutdown: CancellationToken,
}

impl MediaPipeline {
    /// Validate `config` and wire every component. Nothing runs until [`Self::start`].
    pub fn build(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let shutdown = CancellationToken::new();

        let producer = EventProducer::new(collaborators.producer, config.source.clone());
        let cdn: Arc<dyn CdnService> = match collaborators.cdn {
            Some(cdn) => cdn,
            None => Arc::new(PrefixCdn::new(config.cdn_prefix.clone())),
        };

        let mut publisher = OutboxPublisher::direct(producer.clone());
        let dispatcher = if config.outbox_enabled {
            publisher = publisher.with_store(Arc::clone(&collaborators.outbox));
            let dispatcher =
                OutboxDispatcher::new(collaborators.outbox, producer, config.dispatcher.clone())?
                    .with_shutdown(shutdown.child_token());
            Some(Arc::new(dispatcher))
        } else {
            None
        };

        let handlers = EventHandlers::new(
            collaborators.media,
            cdn,
            PipelineService::new(collaborators.pipelines),
            Arc::new(publisher),
        );
        let consumer = Consumer::new(
            collaborators.subscriber,
            handlers.clone(),
            config.consumer.clone(),
        )?
        .with_shutdown(shutdown.child_token());

        tracing::info!(
            source = %config.source,
            outbox_enabled = config.outbox_enabled,
            "media pipeline assembled"
        );
        Ok(Self {
            handlers,
            consumer: Arc::new(consumer),
            dispatcher,
            shutdown,
        })
    }

    /// Entry point for externally initiated work such as
    /// [`EventHandlers::request_transcode`].
    pub fn handlers(&self) -> &EventHandlers {
        &self.handlers
    }

    /// Cancelling this token stops every loop, same as [`Self::shutdown`]
    /// without waiting.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start the outbox dispatcher (when enabled) and the consumer loops.
    pub async fn start(&self) -> Result<()> {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.start();
        }
        self.consumer.start().await?;
        Ok(())
    }

    /// Stop the consumer, drain the outbox one last time, then stop the
    /// dispatcher.
    pub async fn shutdown(&self) -> RuntimeStats {
        let consumer = self.consumer.stop().await;
        let dispatcher = match &self.dispatcher {
            Some(dispatcher) => {
                if let Err(err) = dispatcher.dispatch_once().await {
                    tracing::warn!(error = %err, "final outbox drain failed");
                }
                Some(dispatcher.stop().await)
            }
            None => None,
        };
        self.shutdown.cancel();

        tracing::info!(
            handled = consumer.handled,
            dropped = consumer.dropped,
            retried = consumer.retried,
            "media pipeline stopped"
        );
        RuntimeStats {
            consumer,
            dispatcher,
        }
    }
}
