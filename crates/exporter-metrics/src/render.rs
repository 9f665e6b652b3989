//! Prometheus text exposition of observations

use crate::catalog::MetricKind;
use crate::observation::Observation;
use crate::{MetricsError, Result};
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

/// Group observations into metric families, keeping emission order.
///
/// Consecutive observations with the same name form one family.
pub fn to_metric_families(observations: &[Observation]) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();
    let mut current: Option<(MetricFamily, Vec<Metric>)> = None;

    for observation in observations {
        let starts_family = current
            .as_ref()
            .map_or(true, |(family, _)| family.get_name() != observation.name);

        if starts_family {
            if let Some(done) = current.take() {
                families.push(finish(done));
            }
            current = Some((family_of(observation), Vec::new()));
        }

        if let Some((_, metrics)) = current.as_mut() {
            metrics.push(metric_of(observation));
        }
    }

    if let Some(done) = current {
        families.push(finish(done));
    }
    families
}

/// Render observations in the Prometheus text format
pub fn encode_text(observations: &[Observation]) -> Result<String> {
    encode_families(&to_metric_families(observations))
}

/// Render already built families, in the order given
pub fn encode_families(metric_families: &[MetricFamily]) -> Result<String> {
    let encoder = TextEncoder::new();

    let mut buffer = Vec::new();
    encoder
        .encode(metric_families, &mut buffer)
        .map_err(|e| MetricsError::Export(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| MetricsError::Export(format!("Failed to convert metrics to string: {}", e)))
}

/// Content type of [`encode_text`] output
pub fn text_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

fn family_of(observation: &Observation) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(observation.name.clone());
    family.set_help(observation.help.clone());
    family.set_field_type(match observation.kind {
        MetricKind::Counter => MetricType::COUNTER,
        MetricKind::Gauge => MetricType::GAUGE,
    });
    family
}

fn finish((mut family, metrics): (MetricFamily, Vec<Metric>)) -> MetricFamily {
    family.set_metric(metrics.into());
    family
}

fn metric_of(observation: &Observation) -> Metric {
    let labels: Vec<LabelPair> = observation
        .labels
        .pairs()
        .iter()
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.clone());
            pair
        })
        .collect();

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    match observation.kind {
        MetricKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(observation.value);
            metric.set_counter(counter);
        }
        MetricKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(observation.value);
            metric.set_gauge(gauge);
        }
    }
    metric
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MetricCatalog;
    use exporter_core::LabelSet;

    fn observation(name: &str, raw: f64, labels: LabelSet) -> Observation {
        let catalog = MetricCatalog::build();
        Observation::new(catalog.get(name).unwrap(), raw, labels)
    }

    #[test]
    fn test_families_follow_emission_order() {
        let observations = vec![
            observation("core_energy", 1.0, LabelSet::new().with("thread", "0")),
            observation("core_energy", 2.0, LabelSet::new().with("thread", "1")),
            observation("boost_limit", 3500.0, LabelSet::new().with("thread", "0")),
            observation("num_gpus", 0.0, LabelSet::new().with("num_gpus", "")),
        ];

        let families = to_metric_families(&observations);

        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert_eq!(names, vec!["amd_core_energy", "amd_boost_limit", "amd_num_gpus"]);
        assert_eq!(families[0].get_metric().len(), 2);
        assert_eq!(families[0].get_field_type(), MetricType::COUNTER);
        assert_eq!(families[1].get_field_type(), MetricType::GAUGE);
    }

    #[test]
    fn test_encode_text() {
        let observations = vec![
            observation("gpu_power", 301.0, LabelSet::new().with("gpu_power", "0").with("productname", "mi250").with("device", "amd0")),
            observation("num_gpus", 1.0, LabelSet::new().with("num_gpus", "")),
        ];

        let text = encode_text(&observations).unwrap();

        assert!(text.contains("# HELP amd_gpu_power AMD Params"));
        assert!(text.contains("# TYPE amd_gpu_power counter"));
        assert!(text.contains(r#"amd_gpu_power{gpu_power="0",productname="mi250",device="amd0"} 0.000301"#));
        assert!(text.contains("# TYPE amd_num_gpus gauge"));
        assert!(text.contains(r#"amd_num_gpus{num_gpus=""} 1"#));
        assert!(text.find("amd_gpu_power").unwrap() < text.find("amd_num_gpus").unwrap());
    }

    #[test]
    fn test_sentinel_is_rendered_verbatim() {
        let observations = vec![observation("socket_power", -1.0, LabelSet::new().with("socket", "0"))];

        let text = encode_text(&observations).unwrap();

        assert!(text.contains(r#"amd_socket_power{socket="0"} -1"#));
    }

    #[test]
    fn test_no_observations() {
        assert_eq!(encode_text(&[]).unwrap(), "");
    }

    #[test]
    fn test_content_type() {
        assert!(text_content_type().starts_with("text/plain"));
    }
}
