use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::config::OutputFormat;
use crate::protocol::Reading;
use crate::utils::error::PublishError;

pub trait PayloadFormatter: Send + Sync {
    fn format(&self, reading: &Reading) -> Result<String, PublishError>;
    fn name(&self) -> &str;
}

pub fn formatter_for(format: OutputFormat, interval_seconds: u64) -> Box<dyn PayloadFormatter> {
    match format {
        OutputFormat::Plain => Box::new(PlainFormatter),
        OutputFormat::Json => Box::new(JsonFormatter { interval_seconds }),
    }
}

pub struct PlainFormatter;

impl PayloadFormatter for PlainFormatter {
    fn format(&self, reading: &Reading) -> Result<String, PublishError> {
        Ok(reading.cpm.to_string())
    }

    fn name(&self) -> &str {
        "plain"
    }
}

/// Structured payload. Every value is a string, field names are capitalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpmDocument {
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Cpm")]
    pub cpm: String,
    #[serde(rename = "Sleep")]
    pub sleep: String,
}

impl CpmDocument {
    pub fn new(reading: &Reading, interval_seconds: u64) -> Self {
        Self {
            time: reading.captured_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            cpm: reading.cpm.to_string(),
            sleep: interval_seconds.to_string(),
        }
    }
}

pub struct JsonFormatter {
    pub interval_seconds: u64,
}

impl PayloadFormatter for JsonFormatter {
    fn format(&self, reading: &Reading) -> Result<String, PublishError> {
        let document = CpmDocument::new(reading, self.interval_seconds);

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        document.serialize(&mut serializer)?;

        String::from_utf8(buffer).map_err(|e| PublishError::Serialization(e.to_string()))
    }

    fn name(&self) -> &str {
        "json"
    }
}
