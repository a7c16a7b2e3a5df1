use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use super::*;
use crate::{
    config::DeepConfig,
    discovery::DeepDiscoveryEngine,
    domain::DeepConnection,
    sources::EvaluatorResponse,
};

fn deep_engine(
    notes: Arc<MemoryNotes>,
    evaluator: Arc<ScriptedEvaluator>,
    discovery: DiscoveryConfig,
    deep: DeepConfig,
) -> DeepDiscoveryEngine {
    let mut embeddings = MemoryEmbeddings::new();
    for note in notes.scan().unwrap() {
        embeddings = embeddings.with(&note.id, &[1.0, 0.0]);
    }

    let classifier = classifier(&notes, &discovery);
    DeepDiscoveryEngine::new(
        Arc::new(embeddings),
        classifier,
        notes,
        evaluator,
        discovery,
        deep,
    )
    .with_rng(StdRng::seed_from_u64(7))
}

/// `per_domain` notes in each folder, titled `<folder>-<n>`.
fn notes_in(folders: &[&str], per_domain: usize) -> Arc<MemoryNotes> {
    let mut notes = MemoryNotes::new();
    for folder in folders {
        for n in 0..per_domain {
            let id = format!("{folder}-{n}");
            notes = notes.with(&id, &format!("{folder}/{id}.md"), &id, &[]);
        }
    }
    Arc::new(notes)
}

fn folder_config() -> DiscoveryConfig {
    discovery_config(ClassificationMethod::Folder)
}

fn ids(found: &[DeepConnection]) -> Vec<(String, String)> {
    found
        .iter()
        .map(|c| (c.source.id.to_string(), c.target.id.to_string()))
        .collect()
}

#[test]
fn test_single_domain_yields_nothing() {
    let evaluator = Arc::new(ScriptedEvaluator::always(judgement(true, 0.9, "x")));
    let engine = deep_engine(
        notes_in(&["science"], 4),
        evaluator.clone(),
        folder_config(),
        DeepConfig::default(),
    );

    assert!(engine.discover().unwrap().is_empty());
    assert_eq!(evaluator.calls(), 0);
}

#[test]
fn test_judged_pairs_are_filtered_and_sorted() {
    let notes = Arc::new(
        MemoryNotes::new()
            .with("a", "arts/a.md", "Fugue", &[])
            .with("s1", "science/s1.md", "Feedback", &[])
            .with("s2", "science/s2.md", "Entropy", &[])
            .with("s3", "science/s3.md", "Mitosis", &[]),
    );
    let evaluator = Arc::new(ScriptedEvaluator::new(|prompt| {
        if prompt.contains("\"Feedback\"") {
            judgement(true, 0.6, "both loop back on themselves")
        } else if prompt.contains("\"Entropy\"") {
            judgement(true, 0.9, "resolution as decreasing tension")
        } else {
            judgement(true, 0.3, "weak")
        }
    }));
    let deep = DeepConfig {
        min_quality_score: 0.5,
        ..DeepConfig::default()
    };

    let found = deep_engine(notes, evaluator.clone(), folder_config(), deep)
        .discover()
        .unwrap();

    assert_eq!(evaluator.calls(), 3);
    assert_eq!(
        ids(&found),
        vec![
            ("a".to_string(), "s2".to_string()),
            ("a".to_string(), "s1".to_string())
        ]
    );
    assert_eq!(found[0].quality_score, 0.9);
    assert_eq!(found[0].explanation, "resolution as decreasing tension");
    // constant cross-domain distance, not refined by tags
    assert!(found.iter().all(|c| c.domain_distance.value() == 1.0));
}

#[test]
fn test_negative_or_zero_judgements_dropped() {
    let notes = Arc::new(
        MemoryNotes::new()
            .with("a", "arts/a.md", "Fugue", &[])
            .with("s1", "science/s1.md", "Feedback", &[])
            .with("s2", "science/s2.md", "Entropy", &[]),
    );
    let evaluator = Arc::new(ScriptedEvaluator::new(|prompt| {
        if prompt.contains("\"Feedback\"") {
            judgement(false, 0.9, "no")
        } else {
            judgement(true, 0.0, "nothing")
        }
    }));
    let deep = DeepConfig {
        min_quality_score: 0.0,
        ..DeepConfig::default()
    };

    let found = deep_engine(notes, evaluator, folder_config(), deep)
        .discover()
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_evaluator_failure_drops_only_that_pair() {
    let notes = Arc::new(
        MemoryNotes::new()
            .with("a", "arts/a.md", "Fugue", &[])
            .with("s1", "science/s1.md", "Feedback", &[])
            .with("s2", "science/s2.md", "Entropy", &[]),
    );
    let evaluator = Arc::new(ScriptedEvaluator::new(|prompt| {
        if prompt.contains("\"Feedback\"") {
            EvaluatorResponse::failed()
        } else {
            judgement(true, 0.7, "tension and release")
        }
    }));

    let found = deep_engine(notes, evaluator.clone(), folder_config(), DeepConfig::default())
        .discover()
        .unwrap();

    assert_eq!(evaluator.calls(), 2);
    assert_eq!(ids(&found), vec![("a".to_string(), "s2".to_string())]);
}

#[test]
fn test_pair_budget_caps_evaluator_calls() {
    let evaluator = Arc::new(ScriptedEvaluator::always(judgement(true, 0.8, "x")));
    let deep = DeepConfig {
        max_pairs_to_evaluate: 5,
        ..DeepConfig::default()
    };

    let found = deep_engine(
        notes_in(&["arts", "music", "science"], 3),
        evaluator.clone(),
        folder_config(),
        deep,
    )
    .discover()
    .unwrap();

    // 3 domain pairs * 3 * 3 candidates, cut to the budget
    assert_eq!(evaluator.calls(), 5);
    assert_eq!(found.len(), 5);
}

#[test]
fn test_samples_per_domain_bounds_candidates() {
    let evaluator = Arc::new(ScriptedEvaluator::always(judgement(true, 0.8, "x")));
    let deep = DeepConfig {
        max_pairs_to_evaluate: 100,
        samples_per_domain: 3,
        ..DeepConfig::default()
    };
    let discovery = DiscoveryConfig {
        max_results: 100,
        ..folder_config()
    };

    let found = deep_engine(notes_in(&["arts", "science"], 6), evaluator.clone(), discovery, deep)
        .discover()
        .unwrap();

    assert_eq!(evaluator.calls(), 9);
    assert_eq!(found.len(), 9);
    for connection in &found {
        assert_ne!(connection.source.primary_domain, connection.target.primary_domain);
    }
}

#[test]
fn test_seeded_sampling_picks_expected_pairs() {
    let evaluator = Arc::new(ScriptedEvaluator::always(judgement(true, 0.8, "x")));
    let deep = DeepConfig {
        max_pairs_to_evaluate: 100,
        samples_per_domain: 3,
        ..DeepConfig::default()
    };
    let discovery = DiscoveryConfig {
        max_results: 100,
        ..folder_config()
    };

    let found = deep_engine(notes_in(&["arts", "science"], 6), evaluator.clone(), discovery, deep)
        .discover()
        .unwrap();

    // arts is sampled first, then science, from the same seeded stream
    let mut rng = StdRng::seed_from_u64(7);
    let arts = rand::seq::index::sample(&mut rng, 6, 3).into_vec();
    let science = rand::seq::index::sample(&mut rng, 6, 3).into_vec();
    let mut expected: Vec<(String, String)> = arts
        .iter()
        .flat_map(|a| science.iter().map(move |s| (format!("arts-{a}"), format!("science-{s}"))))
        .collect();
    expected.sort();

    let mut pairs = ids(&found);
    pairs.sort();
    assert_eq!(pairs, expected);

    let prompts = evaluator.prompts();
    assert_eq!(prompts.len(), 9);
    for (source, target) in &expected {
        let asked = prompts
            .iter()
            .filter(|p| {
                p.contains(&format!("\"{source}\"")) && p.contains(&format!("\"{target}\""))
            })
            .count();
        assert_eq!(asked, 1, "pair {source},{target}");
    }
}

#[test]
fn test_results_truncated_to_max_results() {
    let evaluator = Arc::new(ScriptedEvaluator::always(judgement(true, 0.8, "x")));
    let discovery = DiscoveryConfig {
        max_results: 2,
        ..folder_config()
    };

    let found = deep_engine(
        notes_in(&["arts", "science"], 2),
        evaluator.clone(),
        discovery,
        DeepConfig::default(),
    )
    .discover()
    .unwrap();

    assert_eq!(evaluator.calls(), 4);
    assert_eq!(found.len(), 2);
}

#[test]
fn test_progress_reports_each_evaluation() {
    let evaluator = Arc::new(ScriptedEvaluator::always(judgement(true, 0.8, "x")));
    let engine = deep_engine(
        notes_in(&["arts", "science"], 2),
        evaluator,
        folder_config(),
        DeepConfig::default(),
    );

    let mut reports = vec![];
    engine
        .discover_with_progress(|done, total| reports.push((done, total)))
        .unwrap();
    assert_eq!(reports, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

#[test]
fn test_prompt_carries_titles_and_excerpts() {
    let notes = Arc::new(
        MemoryNotes::new()
            .with("a", "arts/a.md", "Fugue", &[])
            .with("s", "science/s.md", "Feedback", &[]),
    );
    let evaluator = Arc::new(ScriptedEvaluator::always(judgement(true, 0.8, "x")));

    deep_engine(notes, evaluator.clone(), folder_config(), DeepConfig::default())
        .discover()
        .unwrap();

    let prompts = evaluator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("\"Fugue\""));
    assert!(prompts[0].contains("Body of Feedback."));
    assert!(prompts[0].contains("CONNECTION_POSSIBLE:"));
}
