//! Background worker that turns queued images into stored variants.
//!
//! One long-lived consuming loop `select!`s over the message stream, the
//! broker's terminal error stream and a cancellation token. Each message is
//! handed to a supervisor task that decodes the payload once, then fans out
//! one task per quality level: level 100 persists the original bytes
//! verbatim, levels 75/50/25 resize, re-encode and persist. Fan-out
//! concurrency is bounded by a shared semaphore and every spawned task is
//! registered on a tracker so shutdown can drain in-flight work under a
//! timeout.
//!
//! Failure policy: a payload that cannot be decoded is acked and dropped; a
//! level failure never blocks its siblings; a message with any failed level
//! is requeued once and then dropped; a broker stream error is fatal for the
//! whole worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::broker::{ImageSource, QueuedImage};
use crate::codec;
use crate::compressor::Compressor;
use crate::error::{Error, Result};
use crate::store::{FileStore, QualityLevel};

/// Tunables for the worker's fan-out behavior.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Upper bound on concurrently running level tasks across all messages.
    pub max_inflight: usize,
    /// How long shutdown waits for in-flight tasks before abandoning them.
    pub drain_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_inflight: 16,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// The orchestration core: consumes queued images and persists their
/// variants.
pub struct Worker {
    source: Arc<dyn ImageSource>,
    store: Arc<FileStore>,
    compressor: Compressor,
    settings: WorkerSettings,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    semaphore: Arc<Semaphore>,
}

impl Worker {
    /// Build a worker from its dependencies.
    ///
    /// All collaborators are required; the settings are validated here so a
    /// misconfigured worker fails at construction rather than at first use.
    pub fn new(
        source: Arc<dyn ImageSource>,
        store: Arc<FileStore>,
        compressor: Compressor,
        settings: WorkerSettings,
    ) -> Result<Self> {
        if settings.max_inflight == 0 {
            return Err(Error::Config("worker max_inflight must be at least 1".into()));
        }
        if settings.drain_timeout.is_zero() {
            return Err(Error::Config("worker drain_timeout must be non-zero".into()));
        }

        let semaphore = Arc::new(Semaphore::new(settings.max_inflight));
        Ok(Self {
            source,
            store,
            compressor,
            settings,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            semaphore,
        })
    }

    /// Token that stops the consuming loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the consuming loop until cancellation or a fatal broker error,
    /// then drain in-flight fan-out tasks under the configured timeout.
    ///
    /// No ordering is guaranteed across messages or across levels of one
    /// message.
    pub async fn run(self) -> Result<()> {
        let (mut messages, mut errors) = self.source.subscribe().await?;
        info!("worker started");

        let mut fatal: Option<Error> = None;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown signal received, stopping consumer");
                    break;
                }

                message = messages.recv() => {
                    match message {
                        Some(message) => self.dispatch(message),
                        None => {
                            // The forwarding task closes the message channel
                            // and emits one terminal error.
                            let err = errors.recv().await.unwrap_or(Error::ChannelClosed);
                            error!(error = %err, "message stream ended");
                            fatal = Some(err);
                            break;
                        }
                    }
                }

                Some(err) = errors.recv() => {
                    error!(error = %err, "broker stream error, halting worker");
                    fatal = Some(err);
                    break;
                }
            }
        }

        self.tracker.close();
        if tokio::time::timeout(self.settings.drain_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.tracker.len(),
                "drain timeout elapsed, abandoning in-flight tasks"
            );
        }

        match fatal {
            Some(err) => Err(err),
            None => {
                info!("worker stopped");
                Ok(())
            }
        }
    }

    /// Hand one message to a supervisor task without waiting for it, so
    /// consumption of the next message overlaps the fan-out.
    fn dispatch(&self, message: QueuedImage) {
        let store = self.store.clone();
        let compressor = self.compressor;
        let semaphore = self.semaphore.clone();
        self.tracker
            .spawn(async move { process_message(message, store, compressor, semaphore).await });
    }
}

/// Decode once, fan out one task per quality level, then settle the
/// delivery: ack when every level succeeded, requeue once otherwise.
async fn process_message(
    message: QueuedImage,
    store: Arc<FileStore>,
    compressor: Compressor,
    semaphore: Arc<Semaphore>,
) {
    let image_id = message.image_id.clone();

    let body = message.body.clone();
    let decoded = tokio::task::spawn_blocking(move || codec::decode(&body)).await;
    let (img, content_type) = match decoded {
        Ok(Ok(decoded)) => decoded,
        Ok(Err(err)) => {
            // Permanently bad payload: requeueing would redeliver it forever.
            warn!(image_id = %image_id, error = %err, "skipping undecodable message");
            if let Err(err) = message.ack().await {
                warn!(image_id = %image_id, error = %err, "failed to settle dropped message");
            }
            return;
        }
        Err(err) => {
            error!(image_id = %image_id, error = %err, "decode task panicked");
            let _ = message.reject(false).await;
            return;
        }
    };

    let img = Arc::new(img);
    let mut tasks: JoinSet<(QualityLevel, Result<()>)> = JoinSet::new();

    for &level in QualityLevel::all() {
        // On redelivery, variants that already landed are not rewritten.
        if message.redelivered && store.exists(&image_id, level.as_str()) {
            debug!(image_id = %image_id, level = %level, "variant already stored, skipping");
            continue;
        }

        let store = store.clone();
        let semaphore = semaphore.clone();
        let image_id = image_id.clone();
        let img = img.clone();
        let original = message.body.clone();

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (level, Err(Error::internal("fan-out semaphore closed"))),
            };

            let result = tokio::task::spawn_blocking(move || match level {
                QualityLevel::Full => store.create_image(&original, &image_id, level.as_str()),
                _ => {
                    let scaled = compressor.scale(&img, level.percent());
                    let encoded = codec::encode(&scaled, content_type)?;
                    store.create_image(&encoded, &image_id, level.as_str())
                }
            })
            .await
            .unwrap_or_else(|e| Err(Error::internal(format!("level task panicked: {e}"))));

            (level, result)
        });
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((level, Err(err))) => {
                failed += 1;
                warn!(image_id = %image_id, level = %level, error = %err, "variant task failed");
            }
            Err(err) => {
                failed += 1;
                error!(image_id = %image_id, error = %err, "variant task aborted");
            }
        }
    }

    let settled = if failed == 0 {
        debug!(image_id = %image_id, "all variants stored");
        message.ack().await
    } else if !message.redelivered {
        warn!(image_id = %image_id, failed, "requeueing message for one retry");
        message.reject(true).await
    } else {
        error!(image_id = %image_id, failed, "redelivery failed again, dropping message");
        message.reject(false).await
    };
    if let Err(err) = settled {
        warn!(image_id = %image_id, error = %err, "failed to settle delivery");
    }
}
