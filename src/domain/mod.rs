//! Value objects shared by the classifier and the discovery engines.

mod connection;
mod distance;
mod note;
mod score;

pub use connection::{Connection, ConnectionType, DeepConnection};
pub use distance::DomainDistance;
pub use note::NoteDomain;
pub use score::{count_generic_terms, ScoreParams, ScoreTier, SerendipityScore};
