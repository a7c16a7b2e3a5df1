use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::str::FromStr;

use super::{DomainDistance, NoteDomain, SerendipityScore};

/// How a discovered pair relates, derived from similarity and domain distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    UnexpectedSimilarity,
    BridgingConcept,
    Contrasting,
    Analogical,
}

impl ConnectionType {
    /// Rules are checked in order; first match wins.
    pub fn infer(similarity: f64, domain_distance: f64) -> Self {
        if similarity > 0.8 && domain_distance > 0.8 {
            ConnectionType::UnexpectedSimilarity
        } else if similarity > 0.6 && domain_distance > 0.5 {
            ConnectionType::BridgingConcept
        } else if similarity < 0.5 && domain_distance > 0.7 {
            ConnectionType::Contrasting
        } else {
            ConnectionType::Analogical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionType::UnexpectedSimilarity => "unexpected similarity",
            ConnectionType::BridgingConcept => "bridging concept",
            ConnectionType::Contrasting => "contrasting",
            ConnectionType::Analogical => "analogical",
        }
    }
}

impl Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unexpected similarity" => Ok(ConnectionType::UnexpectedSimilarity),
            "bridging concept" => Ok(ConnectionType::BridgingConcept),
            "contrasting" => Ok(ConnectionType::Contrasting),
            "analogical" => Ok(ConnectionType::Analogical),
            other => Err(format!("unknown connection type '{other}'")),
        }
    }
}

/// Result of the similarity-first engine.
#[derive(Debug, Clone)]
pub struct Connection {
    pub source: NoteDomain,
    pub target: NoteDomain,
    pub score: SerendipityScore,
    pub domain_distance: DomainDistance,
    pub similarity: f64,
    pub connection_type: ConnectionType,
    pub discovered_at: DateTime<Utc>,
    explanation: Option<String>,
}

impl Connection {
    pub fn new(
        source: NoteDomain,
        target: NoteDomain,
        score: SerendipityScore,
        domain_distance: DomainDistance,
        similarity: f64,
        connection_type: ConnectionType,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            target,
            score,
            domain_distance,
            similarity,
            connection_type,
            discovered_at,
            explanation: None,
        }
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Attach an explanation. Returns `false` if one was already attached.
    pub fn attach_explanation(&mut self, text: impl Into<String>) -> bool {
        if self.explanation.is_some() {
            return false;
        }
        self.explanation = Some(text.into());
        true
    }
}

/// Result of the LLM-first engine. The explanation is always present.
#[derive(Debug, Clone)]
pub struct DeepConnection {
    pub source: NoteDomain,
    pub target: NoteDomain,
    pub quality_score: f64,
    pub explanation: String,
    pub domain_distance: DomainDistance,
    pub discovered_at: DateTime<Utc>,
}
