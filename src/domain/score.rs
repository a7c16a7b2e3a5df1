//! Composite serendipity score.
//!
//! score = (0.4 * similarity + 0.6 * domain_distance)
//!         * novelty_penalty * specificity_penalty
//!
//! clamped into [0.0, 1.0].

use std::fmt::Display;

const SIMILARITY_WEIGHT: f64 = 0.4;
const DISTANCE_WEIGHT: f64 = 0.6;

/// Multiplier applied when the two notes already link to each other.
const ALREADY_LINKED_PENALTY: f64 = 0.5;

/// Each generic term costs this fraction of the base score.
const GENERIC_TERM_PENALTY: f64 = 0.15;

/// The specificity penalty never drops below this multiplier.
const MIN_SPECIFICITY: f64 = 0.3;

const HIGH_TIER: f64 = 0.7;
const MEDIUM_TIER: f64 = 0.4;

/// Inputs to [`SerendipityScore::calculate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreParams {
    pub similarity: f64,
    pub domain_distance: f64,
    pub is_already_linked: bool,
    pub generic_terms_count: usize,
}

/// Display tier of a score. Boundary values belong to the higher tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    High,
    Medium,
    Low,
}

impl Display for ScoreTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ScoreTier::High => "high",
            ScoreTier::Medium => "medium",
            ScoreTier::Low => "low",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SerendipityScore {
    value: f64,
}

impl SerendipityScore {
    pub fn calculate(params: ScoreParams) -> Self {
        let base = params.similarity * SIMILARITY_WEIGHT + params.domain_distance * DISTANCE_WEIGHT;

        let novelty_penalty = if params.is_already_linked {
            ALREADY_LINKED_PENALTY
        } else {
            1.0
        };

        let specificity_penalty =
            (1.0 - params.generic_terms_count as f64 * GENERIC_TERM_PENALTY).max(MIN_SPECIFICITY);

        Self::from_value(base * novelty_penalty * specificity_penalty)
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

    pub fn tier(&self) -> ScoreTier {
        if self.value >= HIGH_TIER {
            ScoreTier::High
        } else if self.value >= MEDIUM_TIER {
            ScoreTier::Medium
        } else {
            ScoreTier::Low
        }
    }

    /// Whole-percent rendering, e.g. `"73%"`.
    pub fn percentage(&self) -> String {
        format!("{:.0}%", self.value * 100.0)
    }
}

/// Count generic terms in a note's title and tags.
///
/// Every term contained (case-insensitively) in the title counts once, and
/// once more for each tag that contains it.
pub fn count_generic_terms<S: AsRef<str>>(
    title: &str,
    tags: &[S],
    generic_terms: &[String],
) -> usize {
    let title = title.to_lowercase();
    let tags: Vec<String> = tags.iter().map(|t| t.as_ref().to_lowercase()).collect();

    generic_terms
        .iter()
        .map(|term| term.to_lowercase())
        .filter(|term| !term.is_empty())
        .map(|term| {
            let in_title = usize::from(title.contains(&term));
            let in_tags = tags.iter().filter(|tag| tag.contains(&term)).count();
            in_title + in_tags
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(similarity: f64, domain_distance: f64) -> ScoreParams {
        ScoreParams {
            similarity,
            domain_distance,
            ..Default::default()
        }
    }

    #[test]
    fn test_base_formula_without_penalties() {
        let grid = [0.0, 0.25, 0.5, 0.9, 1.0];
        for s in grid {
            for d in grid {
                let score = SerendipityScore::calculate(params(s, d));
                let expected = (0.4 * s + 0.6 * d).clamp(0.0, 1.0);
                assert!((score.value() - expected).abs() < 1e-12, "s={s} d={d}");
            }
        }
    }

    #[test]
    fn test_non_finite_values_become_zero() {
        assert_eq!(SerendipityScore::from_value(f64::NAN).value(), 0.0);
        assert_eq!(SerendipityScore::from_value(f64::INFINITY).value(), 0.0);

        let nan_similarity = SerendipityScore::calculate(ScoreParams {
            similarity: f64::NAN,
            domain_distance: 1.0,
            ..ScoreParams::default()
        });
        assert_eq!(nan_similarity.value(), 0.0);
        assert_eq!(nan_similarity.percentage(), SerendipityScore::from_value(0.0).percentage());
    }

    #[test]
    fn test_clamps_out_of_range_inputs() {
        assert_eq!(SerendipityScore::calculate(params(5.0, 5.0)).value(), 1.0);
        assert_eq!(SerendipityScore::calculate(params(-3.0, 0.0)).value(), 0.0);
        let v = SerendipityScore::calculate(params(-0.5, 1.0)).value();
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn test_already_linked_halves_score() {
        let free = SerendipityScore::calculate(params(0.8, 0.8));
        let linked = SerendipityScore::calculate(ScoreParams {
            is_already_linked: true,
            ..params(0.8, 0.8)
        });
        assert!((linked.value() - free.value() * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_specificity_penalty_and_floor() {
        let base = SerendipityScore::calculate(params(1.0, 1.0)).value();
        assert_eq!(base, 1.0);

        let two = SerendipityScore::calculate(ScoreParams {
            generic_terms_count: 2,
            ..params(1.0, 1.0)
        });
        assert!((two.value() - 0.7).abs() < 1e-12);

        // 10 terms would be negative, floored at 0.3
        let many = SerendipityScore::calculate(ScoreParams {
            generic_terms_count: 10,
            ..params(1.0, 1.0)
        });
        assert!((many.value() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(SerendipityScore::from_value(0.7).tier(), ScoreTier::High);
        assert_eq!(SerendipityScore::from_value(0.6999).tier(), ScoreTier::Medium);
        assert_eq!(SerendipityScore::from_value(0.4).tier(), ScoreTier::Medium);
        assert_eq!(SerendipityScore::from_value(0.3999).tier(), ScoreTier::Low);
        assert_eq!(SerendipityScore::from_value(0.0).tier(), ScoreTier::Low);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(SerendipityScore::from_value(0.734).percentage(), "73%");
        assert_eq!(SerendipityScore::from_value(1.0).percentage(), "100%");
    }

    #[test]
    fn test_count_generic_terms() {
        let terms = vec!["note".to_string(), "idea".to_string()];
        assert_eq!(count_generic_terms("Quantum tunnelling", &["physics"], &terms), 0);
        assert_eq!(count_generic_terms("Random Notes", &["physics"], &terms), 1);
        assert_eq!(
            count_generic_terms("Idea dump: notes", &["ideas", "fleeting-note"], &terms),
            4
        );
    }
}
