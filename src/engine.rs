//! Shipper - the buffer-and-flush engine
//!
//! Owns one buffer directory, one scheduler and the capture policy. Built with
//! `ShipperBuilder`; missing collaborators are reported at `build()` time.

use std::sync::Arc;

use axum::http::request::Parts;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::buffer::BufferStore;
use crate::capture::{CapturePolicy, FieldResolver, RequestFilter, StrictFields};
use crate::config::ShipperConfig;
use crate::error::{ConfigError, ShipperResult};
use crate::flush::{FlushOutcome, FlushPolicy, Scheduler, UploadPipeline};
use crate::sink::RemoteSink;
use crate::types::EventRecord;

/// Request log shipper engine
pub struct Shipper {
    config: ShipperConfig,
    scheduler: Scheduler,
    capture: CapturePolicy,
}

impl Shipper {
    pub fn builder(config: ShipperConfig) -> ShipperBuilder {
        ShipperBuilder::new(config)
    }

    pub fn config(&self) -> &ShipperConfig {
        &self.config
    }

    pub fn capture(&self) -> &CapturePolicy {
        &self.capture
    }

    pub fn store(&self) -> &BufferStore {
        self.scheduler.store()
    }

    pub fn is_flushing(&self) -> bool {
        self.scheduler.is_flushing()
    }

    /// Buffer a finished record and flush if thresholds are met
    ///
    /// Never fails: IO and delivery errors are logged inside the engine.
    pub async fn on_event(&self, record: EventRecord) -> FlushOutcome {
        self.scheduler.on_event(&record).await
    }

    /// Run the flush check now, outside the timer
    pub async fn trigger_now(&self) -> FlushOutcome {
        self.scheduler.on_timer().await
    }

    /// Spawn the periodic flush task
    ///
    /// The first tick fires one interval after start. A tick that is still
    /// draining when the next one is due delays the schedule rather than
    /// stacking up extra ticks.
    pub fn start(self: &Arc<Self>) -> FlushTaskHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let shipper = Arc::clone(self);
        let period = self.config.interval();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                dir = %shipper.store().dir().display(),
                interval_secs = period.as_secs(),
                "Flush timer started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        shipper.scheduler.on_timer().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            // Last chance to ship anything that already meets a threshold
            shipper.scheduler.on_timer().await;
            info!("Flush timer stopped");
        });

        FlushTaskHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to the periodic flush task started by `Shipper::start`
///
/// Dropping the handle also stops the timer.
pub struct FlushTaskHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl FlushTaskHandle {
    /// Stop the timer after any in-progress drain settles, then wait for it
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Flush task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Builder for `Shipper`
///
/// The sink, filter, identity resolver and resource resolver are required.
pub struct ShipperBuilder {
    config: ShipperConfig,
    sink: Option<Arc<dyn RemoteSink>>,
    filter: Option<RequestFilter>,
    identity: Option<FieldResolver>,
    resource: Option<FieldResolver>,
    strict: StrictFields,
}

impl ShipperBuilder {
    pub fn new(config: ShipperConfig) -> Self {
        Self {
            config,
            sink: None,
            filter: None,
            identity: None,
            resource: None,
            strict: StrictFields::new(),
        }
    }

    pub fn sink(mut self, sink: Arc<dyn RemoteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Parts) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn identity_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Parts) -> Option<String> + Send + Sync + 'static,
    {
        self.identity = Some(Arc::new(resolver));
        self
    }

    pub fn resource_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Parts) -> Option<String> + Send + Sync + 'static,
    {
        self.resource = Some(Arc::new(resolver));
        self
    }

    pub fn strict(mut self, strict: StrictFields) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> ShipperResult<Arc<Shipper>> {
        let sink = self
            .sink
            .ok_or(ConfigError::MissingCollaborator("remote sink"))?;
        let filter = self
            .filter
            .ok_or(ConfigError::MissingCollaborator("request filter"))?;
        let identity = self
            .identity
            .ok_or(ConfigError::MissingCollaborator("identity resolver"))?;
        let resource = self
            .resource
            .ok_or(ConfigError::MissingCollaborator("resource resolver"))?;
        self.config.validate()?;

        let store = BufferStore::new(&self.config.local_path);
        let pipeline = UploadPipeline::new(store.clone(), sink, self.config.invalid_name_policy);
        let policy = FlushPolicy::new(self.config.thresholds());

        let capture = CapturePolicy {
            filter,
            identity,
            resource,
            strict: self.strict,
            body_size_limit: self.config.body_size_limit,
        };

        Ok(Arc::new(Shipper {
            scheduler: Scheduler::new(store, policy, pipeline),
            capture,
            config: self.config,
        }))
    }
}
