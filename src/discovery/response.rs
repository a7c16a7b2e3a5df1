//! Prompt and response contract for pair evaluation.
//!
//! The evaluator answers in three marked lines:
//!
//! ```text
//! CONNECTION_POSSIBLE: YES
//! QUALITY_SCORE: 0.8
//! ANALOGY: both describe feedback loops that stabilise a system
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::NoteDomain;

const POSSIBLE_MARKER: &str = "CONNECTION_POSSIBLE:";
const SCORE_MARKER: &str = "QUALITY_SCORE:";
const ANALOGY_MARKER: &str = "ANALOGY:";
const AFFIRMATIVE: &str = "YES";

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("valid number regex"));

pub const EVALUATION_SYSTEM_PROMPT: &str = "You look for meaningful, non-obvious connections \
between notes from different fields of knowledge. Be strict: most pairs of unrelated notes do \
not share a useful connection, and a forced analogy is worse than none. Always answer in the \
exact format requested.";

/// The evaluator's verdict on one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairJudgement {
    pub possible: bool,
    pub score: f64,
    pub text: String,
}

/// Build the evaluation prompt for a cross-domain pair.
pub fn evaluation_prompt(
    source: &NoteDomain,
    source_excerpt: &str,
    target: &NoteDomain,
    target_excerpt: &str,
) -> String {
    format!(
        "Note A ({source_domain}): \"{source_title}\"\n\
         {source_excerpt}\n\n\
         Note B ({target_domain}): \"{target_title}\"\n\
         {target_excerpt}\n\n\
         Is there a meaningful conceptual connection, analogy or shared structure between these \
         two notes, even though they come from different domains?\n\n\
         Answer in exactly this format:\n\
         {POSSIBLE_MARKER} YES or NO\n\
         {SCORE_MARKER} a number between 0.0 and 1.0 with one decimal\n\
         {ANALOGY_MARKER} one or two sentences describing the connection",
        source_domain = source.primary_domain,
        source_title = source.title,
        target_domain = target.primary_domain,
        target_title = target.title,
    )
}

/// Parse an evaluator response. Never fails; missing fields take empty values.
pub fn parse_judgement(response: &str) -> PairJudgement {
    let mut possible = false;
    let mut score = 0.0;
    let mut text: Option<String> = None;

    for line in response.lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(POSSIBLE_MARKER) {
            possible = rest.to_uppercase().contains(AFFIRMATIVE);
        } else if let Some(rest) = line.strip_prefix(SCORE_MARKER) {
            score = NUMBER
                .find(rest)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix(ANALOGY_MARKER) {
            text = Some(rest.trim().to_string());
        }
    }

    // looser output: marker mid-line, explanation spanning several lines
    let text = text.unwrap_or_else(|| {
        response
            .find(ANALOGY_MARKER)
            .map(|pos| response[pos + ANALOGY_MARKER.len()..].trim().to_string())
            .unwrap_or_default()
    });

    PairJudgement {
        possible,
        score,
        text,
    }
}
