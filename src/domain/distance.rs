//! Domain distance between two notes.
//!
//! Three interchangeable formulas produce the same value type:
//! - taxonomy lookup (identical / same parent / unrelated)
//! - tag-set Jaccard distance
//! - folder-path prefix overlap
//!
//! Every constructor clamps into [0.0, 1.0].

use std::collections::{HashMap, HashSet};

/// Distance when two domains share a parent category in the taxonomy.
const SAME_PARENT_DISTANCE: f64 = 0.5;

/// Normalized distance between two domains. 0 = identical, 1 = maximally distant.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct DomainDistance {
    value: f64,
}

impl DomainDistance {
    /// Coarse three-level distance between two domain labels.
    ///
    /// `taxonomy` maps a domain to its parent category.
    pub fn calculate(
        domain_a: &str,
        domain_b: &str,
        taxonomy: Option<&HashMap<String, String>>,
    ) -> Self {
        if domain_a == domain_b {
            return Self::from_value(0.0);
        }

        if let Some(taxonomy) = taxonomy {
            let parents = (taxonomy.get(domain_a), taxonomy.get(domain_b));
            if let (Some(parent_a), Some(parent_b)) = parents {
                if parent_a == parent_b {
                    return Self::from_value(SAME_PARENT_DISTANCE);
                }
            }
        }

        Self::from_value(1.0)
    }

    /// Jaccard distance between two tag sets.
    ///
    /// Two untagged notes are treated as maximally distant, not identical.
    pub fn from_tag_jaccard<S: AsRef<str>>(tags_a: &[S], tags_b: &[S]) -> Self {
        let set_a: HashSet<&str> = tags_a.iter().map(|t| t.as_ref()).collect();
        let set_b: HashSet<&str> = tags_b.iter().map(|t| t.as_ref()).collect();

        if set_a.is_empty() && set_b.is_empty() {
            return Self::from_value(1.0);
        }

        let union = set_a.union(&set_b).count();
        if union == 0 {
            return Self::from_value(1.0);
        }

        let intersection = set_a.intersection(&set_b).count();
        Self::from_value(1.0 - intersection as f64 / union as f64)
    }

    /// Distance from the length of the shared leading folder segments.
    pub fn from_folder_path(path_a: &str, path_b: &str) -> Self {
        let segments_a: Vec<&str> = path_a.split('/').filter(|s| !s.is_empty()).collect();
        let segments_b: Vec<&str> = path_b.split('/').filter(|s| !s.is_empty()).collect();

        let longest = segments_a.len().max(segments_b.len());
        if longest == 0 {
            return Self::from_value(1.0);
        }

        let common = segments_a
            .iter()
            .zip(segments_b.iter())
            .take_while(|(a, b)| a == b)
            .count();

        Self::from_value(1.0 - common as f64 / longest as f64)
    }

    /// Rebuild from a raw number, e.g. when hydrating cached results.
    ///
    /// Non-finite input becomes 0.0.
    pub fn from_value(value: f64) -> Self {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}
