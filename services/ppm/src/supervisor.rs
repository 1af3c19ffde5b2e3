//! The bootstrap/consume loop.
//!
//! One outer loop re-establishes the subscription whenever the consumer
//! drops out; one inner loop serially polls, filters, and republishes.
//! Signal handlers only flip the [`ShutdownFlags`]; both loops observe them
//! at the top of each iteration, so the message in flight always finishes
//! before the process winds down.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, trace, warn};

use bsm_filter::{BsmHandler, Geofence};
use cv_geo::entity::Shape;
use cv_geo::mapfile::CsvShapeReader;
use cv_geo::Quad;

use crate::bus::{BusConsumer, BusError, BusMessage, BusProducer};
use crate::config::PpmConfig;

/// Delay between reconnect attempts in the bootstrap loop.
const BOOTSTRAP_RETRY_DELAY: Duration = Duration::from_millis(1500);

/// Process-wide shutdown state, set by signal handlers and read by the
/// loops. `bsms_available` drops the inner consume loop; `bootstrap` drops
/// the outer reconnect loop.
#[derive(Debug)]
pub struct ShutdownFlags {
    bootstrap: AtomicBool,
    bsms_available: AtomicBool,
}

impl ShutdownFlags {
    pub fn new() -> Self {
        Self {
            bootstrap: AtomicBool::new(true),
            bsms_available: AtomicBool::new(true),
        }
    }

    pub fn request_shutdown(&self) {
        self.bsms_available.store(false, Ordering::Relaxed);
        self.bootstrap.store(false, Ordering::Relaxed);
    }

    pub fn bootstrap(&self) -> bool {
        self.bootstrap.load(Ordering::Relaxed)
    }

    pub fn bsms_available(&self) -> bool {
        self.bsms_available.load(Ordering::Relaxed)
    }

    fn set_bsms_available(&self, value: bool) {
        self.bsms_available.store(value, Ordering::Relaxed);
    }

    fn stop_consuming(&self) {
        self.bsms_available.store(false, Ordering::Relaxed);
    }
}

impl Default for ShutdownFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Message and byte counters, reported at shutdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub received: u64,
    pub received_bytes: u64,
    pub published: u64,
    pub published_bytes: u64,
    pub suppressed: u64,
    pub suppressed_bytes: u64,
}

/// Read the shape file and build the spatial index over the configured
/// root bounds.
pub fn build_geofence(config: &PpmConfig) -> anyhow::Result<Geofence> {
    trace!("starting geofence build");
    let shapes = CsvShapeReader::new()
        .load(&config.mapfile)
        .with_context(|| format!("building geofence from {}", config.mapfile.display()))?;

    let mut quad = Quad::new(config.fence_sw, config.fence_ne);
    let mut accepted = 0usize;
    let total = shapes.circles.len() + shapes.edges.len() + shapes.grids.len();
    for circle in shapes.circles {
        accepted += usize::from(quad.insert(&shapes.network, Arc::new(Shape::Circle(circle))));
    }
    for edge in shapes.edges {
        accepted += usize::from(quad.insert(&shapes.network, Arc::new(Shape::Edge(edge))));
    }
    for grid in shapes.grids {
        accepted += usize::from(quad.insert(&shapes.network, Arc::new(Shape::Grid(grid))));
    }
    if accepted < total {
        warn!(accepted, total, "some shapes fell outside the geofence bounds");
    }
    info!(accepted, total, "geofence built");
    Ok(Geofence::new(quad, shapes.network))
}

/// The consume-filter-produce pipeline over abstract bus endpoints.
pub struct Supervisor<C, P> {
    config: PpmConfig,
    handler: BsmHandler,
    consumer: C,
    producer: P,
    flags: Arc<ShutdownFlags>,
    exit_on_eof: bool,
    partition_count: usize,
    eof_partitions: HashSet<i32>,
    counters: Counters,
}

impl<C: BusConsumer, P: BusProducer> Supervisor<C, P> {
    pub fn new(
        config: PpmConfig,
        handler: BsmHandler,
        consumer: C,
        producer: P,
        flags: Arc<ShutdownFlags>,
        exit_on_eof: bool,
    ) -> Self {
        Self {
            config,
            handler,
            consumer,
            producer,
            flags,
            exit_on_eof,
            partition_count: 1,
            eof_partitions: HashSet::new(),
            counters: Counters::default(),
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Run until shutdown is requested (or EOF, when `exit_on_eof` is set).
    pub async fn run(&mut self) -> anyhow::Result<()> {
        while self.flags.bootstrap() {
            self.flags.set_bsms_available(true);

            if !self.wait_for_topic().await {
                continue;
            }
            match self.consumer.subscribe(&self.config.consumed_topic).await {
                Ok(partitions) => {
                    self.partition_count = partitions.max(1);
                    self.eof_partitions.clear();
                    info!(
                        topic = %self.config.consumed_topic,
                        partitions = self.partition_count,
                        "consumer subscribed"
                    );
                }
                Err(err) => {
                    error!(%err, topic = %self.config.consumed_topic, "failed to subscribe");
                    tokio::time::sleep(BOOTSTRAP_RETRY_DELAY).await;
                    continue;
                }
            }

            while self.flags.bsms_available() {
                match self.consumer.poll(self.config.consumer_timeout).await {
                    Ok(message) => self.handle_message(message).await,
                    Err(BusError::TimedOut) => {
                        trace!("waiting for more BSMs from the upstream producer");
                    }
                    Err(BusError::PartitionEof(partition)) => {
                        info!(partition, "consumer partition end of file, PPM still alive");
                        if self.exit_on_eof {
                            self.eof_partitions.insert(partition);
                            if self.eof_partitions.len() >= self.partition_count {
                                info!(
                                    partitions = self.partition_count,
                                    "EOF reached for all partitions; shutting down"
                                );
                                self.flags.request_shutdown();
                            }
                        }
                    }
                    Err(err) => {
                        error!(%err, "cannot consume; dropping back to bootstrap");
                        self.flags.stop_consuming();
                    }
                }
            }
        }

        self.consumer.close().await;
        let c = self.counters;
        info!("PPM operations complete; shutting down");
        info!(messages = c.received, bytes = c.received_bytes, "PPM consumed");
        info!(messages = c.published, bytes = c.published_bytes, "PPM published");
        info!(messages = c.suppressed, bytes = c.suppressed_bytes, "PPM suppressed");
        Ok(())
    }

    /// Block until the consumer topic shows up in the bus metadata, backing
    /// off between probes. False when shutdown interrupted the wait.
    async fn wait_for_topic(&mut self) -> bool {
        loop {
            if !self.flags.bootstrap() || !self.flags.bsms_available() {
                return false;
            }
            match self.consumer.topic_exists(&self.config.consumed_topic).await {
                Ok(true) => {
                    info!(topic = %self.config.consumed_topic, "topic found in bus metadata");
                    return true;
                }
                Ok(false) => {
                    trace!(topic = %self.config.consumed_topic, "waiting for consumer topic");
                }
                Err(err) => {
                    error!(%err, "cannot retrieve bus metadata");
                }
            }
            tokio::time::sleep(BOOTSTRAP_RETRY_DELAY).await;
        }
    }

    async fn handle_message(&mut self, message: BusMessage) {
        self.counters.received += 1;
        self.counters.received_bytes += message.payload.len() as u64;
        // A delivery means this partition is no longer at end of file.
        self.eof_partitions.remove(&message.partition);
        trace!(
            partition = message.partition,
            offset = message.offset,
            timestamp = message.timestamp,
            key = message.key.as_deref(),
            "read message"
        );

        let payload = match std::str::from_utf8(&message.payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, offset = message.offset, "message payload is not UTF-8");
                self.counters.suppressed += 1;
                self.counters.suppressed_bytes += message.payload.len() as u64;
                return;
            }
        };

        if self.handler.process(payload) {
            info!(bsm = %self.handler.bsm(), "BSM [RETAINED]");
            let retained = self.handler.json().as_bytes();
            match self
                .producer
                .produce(&self.config.published_topic, self.config.partition, retained)
                .await
            {
                Ok(()) => {
                    self.counters.published += 1;
                    self.counters.published_bytes += retained.len() as u64;
                    trace!("produced BSM");
                }
                Err(err) => {
                    // No retry and no dead letter; the message is dropped.
                    error!(%err, "failed to produce retained BSM");
                }
            }
        } else {
            info!(
                reason = %self.handler.result(),
                bsm = %self.handler.bsm(),
                "BSM [SUPPRESSED]"
            );
            self.counters.suppressed += 1;
            self.counters.suppressed_bytes += message.payload.len() as u64;
        }
    }
}
