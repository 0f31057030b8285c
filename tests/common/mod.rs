//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires a tempdir-backed [`FileStore`] and a
//! recording fake broker into a full [`AppContext`]. The [`with_server`]
//! constructor starts Axum on a random port for HTTP-level testing;
//! [`ChannelSource`] feeds the worker from plain tokio channels.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use pixeldrop::broker::{ImagePublisher, ImageSource, QueuedImage, Settle};
use pixeldrop::error::{Error, Result};
use pixeldrop::server::{create_router, AppContext};
use pixeldrop::store::FileStore;

/// One message captured by [`RecordingPublisher`].
#[derive(Clone)]
pub struct PublishedMessage {
    pub body: Bytes,
    pub image_id: String,
    pub content_type: String,
}

/// Publish-side fake that records every message instead of talking to a
/// broker.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedMessage>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImagePublisher for RecordingPublisher {
    async fn publish(&self, body: Bytes, image_id: &str, content_type: &str) -> Result<()> {
        self.published.lock().unwrap().push(PublishedMessage {
            body,
            image_id: image_id.to_string(),
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}

/// Consume-side fake backed by plain tokio channels.
///
/// `subscribe` hands out the receivers exactly once; the test drives the
/// worker through the returned senders. Dropping both senders ends the
/// message stream the same way a closed broker channel does.
pub struct ChannelSource {
    receivers: Mutex<Option<(mpsc::Receiver<QueuedImage>, mpsc::Receiver<Error>)>>,
}

impl ChannelSource {
    pub fn new() -> (Arc<Self>, mpsc::Sender<QueuedImage>, mpsc::Sender<Error>) {
        let (message_tx, message_rx) = mpsc::channel(16);
        let (error_tx, error_rx) = mpsc::channel(1);
        let source = Arc::new(Self {
            receivers: Mutex::new(Some((message_rx, error_rx))),
        });
        (source, message_tx, error_tx)
    }
}

#[async_trait]
impl ImageSource for ChannelSource {
    async fn subscribe(&self) -> Result<(mpsc::Receiver<QueuedImage>, mpsc::Receiver<Error>)> {
        self.receivers
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::internal("subscription is not restartable"))
    }
}

/// How a [`RecordingSettle`] observed its message being settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettleOutcome {
    Acked,
    Requeued,
    Dropped,
}

/// Settle fake recording whether the worker acked, requeued or dropped the
/// message it was attached to.
#[derive(Default)]
pub struct RecordingSettle {
    outcome: Mutex<Option<SettleOutcome>>,
}

impl RecordingSettle {
    pub fn outcome(&self) -> Option<SettleOutcome> {
        *self.outcome.lock().unwrap()
    }
}

#[async_trait]
impl Settle for RecordingSettle {
    async fn ack(&self) -> Result<()> {
        *self.outcome.lock().unwrap() = Some(SettleOutcome::Acked);
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<()> {
        *self.outcome.lock().unwrap() = Some(if requeue {
            SettleOutcome::Requeued
        } else {
            SettleOutcome::Dropped
        });
        Ok(())
    }
}

/// Test harness wrapping a tempdir-backed store and a recording publisher.
pub struct TestHarness {
    pub dir: tempfile::TempDir,
    pub store: Arc<FileStore>,
    pub publisher: Arc<RecordingPublisher>,
}

impl TestHarness {
    /// Create a new harness with a fresh temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let store = Arc::new(FileStore::new(dir.path()).expect("failed to create store"));
        Self {
            dir,
            store,
            publisher: Arc::new(RecordingPublisher::default()),
        }
    }

    /// The axum context for this harness.
    pub fn ctx(&self) -> AppContext {
        AppContext {
            store: self.store.clone(),
            publisher: self.publisher.clone(),
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = create_router(harness.ctx());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}

/// Synthesize a solid-color JPEG of the given dimensions.
pub fn jpeg_image(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([180, 90, 45]),
    ));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

/// Synthesize a solid-color PNG of the given dimensions.
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([30, 160, 220, 255]),
    ));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}
