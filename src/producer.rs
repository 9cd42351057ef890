//! The refresh loop: poll telemetry, aggregate, publish.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, info_span};

use crate::aggregator::TripAggregator;
use crate::config::ProducerConfig;
use crate::errors::{Diagnostic, ProducerError};
use crate::feed::{
    EntityIdScheme, IncrementalFeedStore, trip_update_entities, vehicle_position_entities,
};
use crate::positions::PositionTranslator;
use crate::schedule::ScheduleIndex;
use crate::stats::FeedSummary;
use crate::telemetry::{TelemetryCycle, TelemetrySource};

/// What one successful cycle published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub trip_updates_index: u64,
    pub vehicle_positions_index: u64,
    pub trip_updates: usize,
    pub vehicle_positions: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Owns the two published feeds and everything needed to refresh them.
///
/// Only [`Producer::run_cycle`] writes to the stores, and it takes `&mut self`,
/// so cycles never overlap.
pub struct Producer {
    index: Arc<ScheduleIndex>,
    source: Box<dyn TelemetrySource>,
    aggregator: TripAggregator,
    translator: PositionTranslator,
    trip_updates: Arc<IncrementalFeedStore>,
    vehicle_positions: Arc<IncrementalFeedStore>,
    timezone: Tz,
    entity_ids: EntityIdScheme,
    fetch_timeout: Duration,
    refresh_interval: Duration,
    cycles: u64,
}

impl Producer {
    pub fn new(
        index: Arc<ScheduleIndex>,
        source: Box<dyn TelemetrySource>,
        config: &ProducerConfig,
    ) -> Result<Self> {
        let trip_updates = Arc::new(IncrementalFeedStore::new(config.heartbeat_interval_secs));
        let vehicle_positions = Arc::new(IncrementalFeedStore::new(config.heartbeat_interval_secs));
        trip_updates.set_feed_header_defaults(config.header_defaults());
        vehicle_positions.set_feed_header_defaults(config.header_defaults());

        Ok(Self {
            index,
            source,
            aggregator: TripAggregator::new(config.aggregator()?),
            translator: PositionTranslator,
            trip_updates,
            vehicle_positions,
            timezone: config.tz()?,
            entity_ids: config.entity_ids,
            fetch_timeout: config.fetch_timeout(),
            refresh_interval: config.refresh_interval(),
            cycles: 0,
        })
    }

    pub fn trip_updates(&self) -> &Arc<IncrementalFeedStore> {
        &self.trip_updates
    }

    pub fn vehicle_positions(&self) -> &Arc<IncrementalFeedStore> {
        &self.vehicle_positions
    }

    pub fn aggregator(&self) -> &TripAggregator {
        &self.aggregator
    }

    /// Runs one refresh cycle.
    ///
    /// A failed or timed-out fetch returns before anything is published, so
    /// the previous snapshots stay current.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ProducerError> {
        let cycle = self.poll().await?;
        let service = self
            .index
            .service_calendar()
            .service_for(service_date(cycle.response_timestamp, self.timezone))
            .cloned();

        let output = self.aggregator.aggregate(
            &self.index,
            service.as_ref(),
            &cycle.predictions,
            cycle.response_timestamp,
        );
        let positions = self.translator.translate(&cycle.locations);

        let trip_entities = trip_update_entities(&output.aggregates, self.entity_ids);
        let vehicle_entities = vehicle_position_entities(positions, self.entity_ids);
        let report = CycleReport {
            trip_updates: trip_entities.len(),
            vehicle_positions: vehicle_entities.len(),
            trip_updates_index: self.trip_updates.apply_full_update(trip_entities),
            vehicle_positions_index: self.vehicle_positions.apply_full_update(vehicle_entities),
            diagnostics: output.diagnostics,
        };

        let summary = FeedSummary::from_feed(self.trip_updates.current_snapshot().message());
        info!(
            service = service.as_ref().map(|s| s.as_str()).unwrap_or("none"),
            index = report.trip_updates_index,
            trip_updates = summary.trip_updates,
            stop_time_updates = summary.stop_time_updates,
            unknown_stops = summary.unknown_stop_sequences,
            vehicles = report.vehicle_positions,
            "Feeds published"
        );
        Ok(report)
    }

    async fn poll(&self) -> Result<TelemetryCycle, ProducerError> {
        match tokio::time::timeout(self.fetch_timeout, self.source.poll()).await {
            Ok(result) => result,
            Err(_) => Err(ProducerError::FetchFailure(format!(
                "no response within {}s",
                self.fetch_timeout.as_secs()
            ))),
        }
    }

    /// Runs cycles until one fails with an error that is not cycle-scoped.
    ///
    /// The next cycle starts `refresh_interval` after the previous one ends.
    pub async fn run(&mut self) -> Result<(), ProducerError> {
        info!(
            refresh_interval_secs = self.refresh_interval.as_secs(),
            "Starting refresh loop"
        );

        loop {
            self.cycles += 1;
            let span = info_span!("refresh_cycle", cycle = self.cycles);

            match self.run_cycle().instrument(span.clone()).await {
                Ok(_) => {}
                Err(e) if e.is_cycle_scoped() => {
                    span.in_scope(|| error!(error = %e, "Cycle aborted, keeping previous feeds"));
                }
                Err(e) => {
                    span.in_scope(|| error!(error = %e, "Fatal error, stopping"));
                    return Err(e);
                }
            }

            tokio::time::sleep(self.refresh_interval).await;
        }
    }
}

/// The date whose service is running: the vendor's response time in the
/// agency zone, or now when the vendor sent no usable timestamp.
fn service_date(response_timestamp: i64, tz: Tz) -> NaiveDate {
    let instant = DateTime::<Utc>::from_timestamp(response_timestamp, 0)
        .filter(|_| response_timestamp > 0)
        .unwrap_or_else(Utc::now);
    instant.with_timezone(&tz).date_naive()
}
