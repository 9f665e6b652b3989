//! A single emitted sample

use crate::catalog::{MetricDefinition, MetricKind};
use exporter_core::LabelSet;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Fully-qualified family name
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub value: f64,
    #[serde(serialize_with = "serialize_labels")]
    pub labels: LabelSet,
}

impl Observation {
    /// Sample of `definition`, with the family's divisor applied to `raw`
    pub fn new(definition: &MetricDefinition, raw: f64, labels: LabelSet) -> Self {
        Self {
            name: definition.fq_name(),
            help: definition.help.clone(),
            kind: definition.kind,
            value: definition.transform(raw),
            labels,
        }
    }

    /// Value of label `name`
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name)
    }
}

fn serialize_labels<S: serde::Serializer>(labels: &LabelSet, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(labels.pairs())
}
