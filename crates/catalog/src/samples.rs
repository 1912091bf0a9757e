use crate::error::Result;
use crate::model::Procedure;
use crate::validate::validate_batch;

const BUILTIN_SAMPLES: &str = include_str!("../../../catalog/samples.json");

/// Built-in procedures for Kafka consumer lag, Elasticsearch performance,
/// generic latency triage and Logstash pipelines.
pub fn sample_procedures() -> Result<Vec<Procedure>> {
    let procedures: Vec<Procedure> = serde_json::from_str(BUILTIN_SAMPLES)?;
    validate_batch(&procedures)?;
    Ok(procedures)
}
