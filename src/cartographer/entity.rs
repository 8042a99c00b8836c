//! Exchange quotes as they arrive from the outside world.

use serde::{Deserialize, Deserializer, Serialize};

/// External vertex identifier (token id).
pub type VertexId = i64;

/// A directed exchange quote: one unit of `origin` buys `rate` units of
/// `destination`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "EntityId")]
    pub id: String,
    #[serde(rename = "Id1")]
    pub origin: VertexId,
    #[serde(rename = "Id2")]
    pub destination: VertexId,
    #[serde(rename = "Relation", deserialize_with = "rate_from_number_or_str")]
    pub rate: f64,
}

impl Entity {
    pub fn new(id: impl Into<String>, origin: VertexId, destination: VertexId, rate: f64) -> Self {
        Self {
            id: id.into(),
            origin,
            destination,
            rate,
        }
    }

    /// Rate must be positive and finite, otherwise -ln(rate) is meaningless.
    pub fn has_valid_rate(&self) -> bool {
        self.rate > 0.0 && self.rate.is_finite()
    }
}

/// Feeds publish rates either as JSON numbers or as decimal strings.
fn rate_from_number_or_str<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
