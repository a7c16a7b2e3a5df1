//! Assigns every note a primary domain.
//!
//! The strategy is picked once from configuration:
//! - `tag`: first tag under a domain prefix, else the folder strategy
//! - `folder`: top-level folder, skipping numbered organisational folders
//! - `cluster`: a unique label per note, so no two notes share a domain
//!
//! The id -> path index is rebuilt wholesale on `refresh_index` and swapped in,
//! so readers see either the old or the new index, never a partial one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    config::{ClassificationMethod, DiscoveryConfig},
    domain::NoteDomain,
    errors::DiscoveryError,
    note_id::NoteId,
    sources::NoteSource,
};

/// Folders such as "03_Resources" or "10 - Projects".
static NUMBERED_FOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s*[-_. ]").expect("valid numbered folder regex"));

const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Strategy {
    Tag,
    Folder,
    Cluster,
}

impl From<ClassificationMethod> for Strategy {
    fn from(method: ClassificationMethod) -> Self {
        match method {
            ClassificationMethod::Tag => Strategy::Tag,
            ClassificationMethod::Folder => Strategy::Folder,
            ClassificationMethod::Cluster => Strategy::Cluster,
        }
    }
}

pub struct DomainClassifier {
    source: Arc<dyn NoteSource>,
    strategy: Strategy,
    prefixes: Vec<String>,
    index: RwLock<Arc<HashMap<NoteId, String>>>,
}

impl DomainClassifier {
    /// Create a classifier and build its index with one corpus scan.
    pub fn new(source: Arc<dyn NoteSource>, config: &DiscoveryConfig) -> anyhow::Result<Self> {
        let classifier = Self {
            source,
            strategy: config.classification_method.into(),
            prefixes: config
                .domain_tag_prefixes
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
            index: RwLock::new(Arc::new(HashMap::new())),
        };
        classifier.refresh_index()?;
        Ok(classifier)
    }

    /// Rescan the corpus and replace the index. Returns the number of notes indexed.
    ///
    /// Call on note create/delete/rename; lookups between refreshes may be stale.
    pub fn refresh_index(&self) -> anyhow::Result<usize> {
        let fresh: HashMap<NoteId, String> = self
            .source
            .scan()?
            .into_iter()
            .map(|note| (note.id, note.path))
            .collect();
        let count = fresh.len();

        let mut guard = self
            .index
            .write()
            .map_err(|e| anyhow::anyhow!("index lock poisoned: {e}"))?;
        *guard = Arc::new(fresh);

        log::debug!("classifier index rebuilt notes={count}");
        Ok(count)
    }

    fn snapshot(&self) -> Arc<HashMap<NoteId, String>> {
        match self.index.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn path_for_id(&self, id: &NoteId) -> Option<String> {
        self.snapshot().get(id).cloned()
    }

    pub fn id_for_path(&self, path: &str) -> Option<NoteId> {
        self.snapshot()
            .iter()
            .find(|(_, p)| p.as_str() == path)
            .map(|(id, _)| id.clone())
    }

    pub fn indexed_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Classify a note. Unknown ids yield `DiscoveryError::NotFound`.
    pub fn classify(
        &self,
        id: &NoteId,
        embedding: Option<Vec<f32>>,
    ) -> Result<NoteDomain, DiscoveryError> {
        let path = self
            .path_for_id(id)
            .ok_or_else(|| DiscoveryError::NotFound(id.clone()))?;

        let tags: Vec<String> = self
            .source
            .tags(&path)
            .into_iter()
            .map(|t| t.trim_start_matches('#').to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let title = self.source.title(&path);

        let tag_domains = self.tag_domains(&tags);

        let primary_domain = match self.strategy {
            Strategy::Tag => tag_domains
                .first()
                .cloned()
                .unwrap_or_else(|| folder_domain(&path)),
            Strategy::Folder => folder_domain(&path),
            Strategy::Cluster => format!("cluster-{id}"),
        };

        let secondary_domains = tag_domains
            .into_iter()
            .filter(|d| *d != primary_domain)
            .collect();

        Ok(NoteDomain {
            id: id.clone(),
            path,
            title,
            primary_domain,
            secondary_domains,
            tags,
            embedding,
        })
    }

    /// Domain labels from tags under any configured prefix, in tag order.
    /// Labels are lowercased.
    fn tag_domains(&self, tags: &[String]) -> Vec<String> {
        let mut domains: Vec<String> = Vec::new();
        for tag in tags {
            let lower = tag.to_lowercase();
            let domain = self
                .prefixes
                .iter()
                .find_map(|prefix| lower.strip_prefix(prefix.as_str()))
                .map(|rest| rest.trim_matches('/').to_string())
                .filter(|rest| !rest.is_empty());

            if let Some(domain) = domain {
                if !domains.contains(&domain) {
                    domains.push(domain);
                }
            }
        }
        domains
    }
}

/// Top-level folder of a path, or the second one under a numbered folder.
fn folder_domain(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    // last segment is the file itself
    let folders = &segments[..segments.len().saturating_sub(1)];

    match folders {
        [] => UNCATEGORIZED.to_string(),
        [first, second, ..] if NUMBERED_FOLDER.is_match(first) => second.to_string(),
        [first, ..] => first.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::NoteRef;

    struct StaticNotes {
        notes: RwLock<Vec<(NoteRef, Vec<String>)>>,
    }

    impl StaticNotes {
        fn new(notes: &[(&str, &str, &[&str])]) -> Self {
            Self {
                notes: RwLock::new(
                    notes
                        .iter()
                        .map(|(id, path, tags)| {
                            (
                                NoteRef {
                                    id: NoteId::from(*id),
                                    path: path.to_string(),
                                },
                                tags.iter().map(|t| t.to_string()).collect(),
                            )
                        })
                        .collect(),
                ),
            }
        }
    }

    impl NoteSource for StaticNotes {
        fn scan(&self) -> anyhow::Result<Vec<NoteRef>> {
            Ok(self.notes.read().unwrap().iter().map(|(n, _)| n.clone()).collect())
        }

        fn tags(&self, path: &str) -> Vec<String> {
            self.notes
                .read()
                .unwrap()
                .iter()
                .find(|(n, _)| n.path == path)
                .map(|(_, tags)| tags.clone())
                .unwrap_or_default()
        }

        fn title(&self, path: &str) -> String {
            path.rsplit('/').next().unwrap_or(path).trim_end_matches(".md").to_string()
        }

        fn excerpt(&self, _path: &str, _max_chars: usize) -> String {
            String::new()
        }
    }

    fn classifier(method: ClassificationMethod, notes: Arc<StaticNotes>) -> DomainClassifier {
        let config = DiscoveryConfig {
            classification_method: method,
            ..Default::default()
        };
        DomainClassifier::new(notes, &config).unwrap()
    }

    #[test]
    fn test_folder_domain() {
        assert_eq!(folder_domain("biology/cells.md"), "biology");
        assert_eq!(folder_domain("03_Resources/biology/cells.md"), "biology");
        assert_eq!(folder_domain("10 - Projects/garden/plan.md"), "garden");
        // numbered folder with nothing below it stays as is
        assert_eq!(folder_domain("03_Resources/cells.md"), "03_Resources");
        assert_eq!(folder_domain("cells.md"), UNCATEGORIZED);
    }

    #[test]
    fn test_tag_strategy_uses_first_domain_tag() {
        let notes = Arc::new(StaticNotes::new(&[(
            "a",
            "inbox/a.md",
            &["#misc", "domain/Philosophy", "domain/ethics"],
        )]));
        let c = classifier(ClassificationMethod::Tag, notes);

        let note = c.classify(&NoteId::from("a"), None).unwrap();
        assert_eq!(note.primary_domain, "philosophy");
        assert_eq!(note.secondary_domains, vec!["ethics".to_string()]);
        assert_eq!(note.tags, vec!["misc", "domain/Philosophy", "domain/ethics"]);
        assert_eq!(note.title, "a");
    }

    #[test]
    fn test_tag_domains_ignore_case() {
        let notes = Arc::new(StaticNotes::new(&[(
            "a",
            "inbox/a.md",
            &["Domain/Ethics", "domain/ethics", "domain/LOGIC"],
        )]));
        let c = classifier(ClassificationMethod::Tag, notes);

        let note = c.classify(&NoteId::from("a"), None).unwrap();
        assert_eq!(note.primary_domain, "ethics");
        assert_eq!(note.secondary_domains, vec!["logic".to_string()]);
    }

    #[test]
    fn test_tag_strategy_falls_back_to_folder() {
        let notes = Arc::new(StaticNotes::new(&[("a", "biology/a.md", &["genes"])]));
        let c = classifier(ClassificationMethod::Tag, notes);
        assert_eq!(c.classify(&NoteId::from("a"), None).unwrap().primary_domain, "biology");
    }

    #[test]
    fn test_folder_strategy_ignores_tags() {
        let notes = Arc::new(StaticNotes::new(&[("a", "biology/a.md", &["domain/physics"])]));
        let c = classifier(ClassificationMethod::Folder, notes);

        let note = c.classify(&NoteId::from("a"), None).unwrap();
        assert_eq!(note.primary_domain, "biology");
        assert_eq!(note.secondary_domains, vec!["physics".to_string()]);
    }

    #[test]
    fn test_cluster_strategy_is_unique_per_note() {
        let notes = Arc::new(StaticNotes::new(&[
            ("a", "biology/a.md", &[]),
            ("b", "biology/b.md", &[]),
        ]));
        let c = classifier(ClassificationMethod::Cluster, notes);

        let a = c.classify(&NoteId::from("a"), None).unwrap();
        let b = c.classify(&NoteId::from("b"), None).unwrap();
        assert_ne!(a.primary_domain, b.primary_domain);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let notes = Arc::new(StaticNotes::new(&[]));
        let c = classifier(ClassificationMethod::Tag, notes);
        assert!(matches!(
            c.classify(&NoteId::from("missing"), None),
            Err(DiscoveryError::NotFound(_))
        ));
    }

    #[test]
    fn test_refresh_index_picks_up_new_notes() {
        let notes = Arc::new(StaticNotes::new(&[("a", "biology/a.md", &[])]));
        let c = classifier(ClassificationMethod::Folder, notes.clone());
        assert!(c.path_for_id(&NoteId::from("b")).is_none());

        notes.notes.write().unwrap().push((
            NoteRef {
                id: NoteId::from("b"),
                path: "physics/b.md".to_string(),
            },
            vec![],
        ));
        // stale until refreshed
        assert!(c.path_for_id(&NoteId::from("b")).is_none());

        assert_eq!(c.refresh_index().unwrap(), 2);
        assert_eq!(c.path_for_id(&NoteId::from("b")).as_deref(), Some("physics/b.md"));
        assert_eq!(c.id_for_path("physics/b.md"), Some(NoteId::from("b")));
    }
}
