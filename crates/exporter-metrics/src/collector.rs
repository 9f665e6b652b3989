//! Collection orchestrator
//!
//! Runs one pass per scrape: refresh workload correlation, scan the hardware, emit. The
//! collector only holds shared read-only state; everything a pass builds is owned by that
//! pass, so concurrent scrapes never observe each other.

use crate::catalog::{MetricCatalog, DATA_DESC_LABEL, DATA_DESC_NAME, HELP};
use crate::emission::EmissionEngine;
use crate::observation::Observation;
use crate::{MetricsError, Result};
use exporter_core::{DeviceKeyMap, DeviceRegistry, PassContext, TelemetrySource, WorkloadCorrelator};
use prometheus::core::Desc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

pub struct AmdCollector {
    engine: EmissionEngine,
    registry: Arc<DeviceRegistry>,
    telemetry: Arc<dyn TelemetrySource>,
    correlator: Option<WorkloadCorrelator>,
    descriptor: Desc,
}

impl AmdCollector {
    /// Collector without workload correlation
    pub fn new(
        catalog: Arc<MetricCatalog>,
        registry: Arc<DeviceRegistry>,
        telemetry: Arc<dyn TelemetrySource>,
    ) -> Result<Self> {
        let descriptor = Desc::new(
            DATA_DESC_NAME.to_string(),
            HELP.to_string(),
            vec![DATA_DESC_LABEL.to_string()],
            HashMap::new(),
        )
        .map_err(|e| MetricsError::Registry(format!("Failed to build descriptor: {}", e)))?;

        Ok(Self {
            engine: EmissionEngine::new(catalog),
            registry,
            telemetry,
            correlator: None,
            descriptor,
        })
    }

    /// Attach workloads to accelerator samples through `correlator`
    pub fn with_correlator(mut self, correlator: WorkloadCorrelator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    /// Prefix for sanitized workload label names
    pub fn with_label_prefix(mut self, label_prefix: impl Into<String>) -> Self {
        self.engine = self.engine.with_label_prefix(label_prefix);
        self
    }

    pub fn correlation_enabled(&self) -> bool {
        self.correlator.is_some()
    }

    /// The single static descriptor advertised to registries
    pub fn describe(&self) -> Vec<&Desc> {
        vec![&self.descriptor]
    }

    /// Run one collection pass.
    ///
    /// Never fails: correlation problems degrade to base labels. The scan starts before
    /// correlation and is always awaited, so the pass deadline only bounds the workload lookups.
    pub async fn collect(&self, ctx: &PassContext) -> Vec<Observation> {
        let span = info_span!("collect", pass = %ctx.id());

        async {
            debug!("Collecting metrics");

            let telemetry = Arc::clone(&self.telemetry);
            let scan = tokio::task::spawn_blocking(move || telemetry.scan());

            let bindings = match &self.correlator {
                Some(correlator) => Some(self.correlate(correlator, ctx).await),
                None => None,
            };

            let snapshot = match scan.await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!("Telemetry scan did not complete: {}", e);
                    return Vec::new();
                }
            };

            let observations = self.engine.emit(&snapshot, &self.registry, bindings.as_ref());
            debug!(observations = observations.len(), "Collected metrics");
            observations
        }
        .instrument(span)
        .await
    }

    async fn correlate(&self, correlator: &WorkloadCorrelator, ctx: &PassContext) -> DeviceKeyMap {
        match correlator.correlate(ctx).await {
            Ok(bindings) => bindings,
            Err(e) => {
                error!(category = e.category(), "Scanning workload resources failed: {}", e);
                info!("Continuing without workload resources");
                DeviceKeyMap::empty()
            }
        }
    }
}
