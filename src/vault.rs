//! Markdown vault on the local filesystem.
//!
//! Supplies note paths, tags, titles and excerpts, and answers link queries.
//! Each `scan` rereads the vault and swaps in a new snapshot.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use crate::{
    note_id::NoteId,
    semantic::truncate_chars,
    sources::{LinkChecker, NoteRef, NoteSource},
};

static INLINE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)#([\p{L}\p{N}_\-/]+)").expect("valid inline tag regex")
});

/// `[[target]]`, `[[target|alias]]`, `[[target#heading]]`
static WIKILINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\]|#]+)(?:#[^\]|]*)?(?:\|[^\]]*)?\]\]").expect("valid wikilink regex")
});

/// `[text](some/note.md)`
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\(([^)\s]+\.md)\)").expect("valid markdown link regex"));

#[derive(Debug, Clone)]
struct VaultNote {
    id: NoteId,
    title: String,
    tags: Vec<String>,
    body: String,
    raw_links: Vec<String>,
}

#[derive(Debug, Default)]
struct Snapshot {
    /// vault-relative path -> note
    notes: HashMap<String, VaultNote>,
    /// directed (from, to) pairs of vault-relative paths
    links: HashSet<(String, String)>,
}

pub struct Vault {
    root: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Vault {
    /// Open a vault. Nothing is read until the first `scan`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    fn current(&self) -> Arc<Snapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Title and body of every note, for embedding.
    pub fn contents(&self) -> Vec<(NoteId, String, String)> {
        let snapshot = self.current();
        let mut contents: Vec<_> = snapshot
            .notes
            .values()
            .map(|n| (n.id.clone(), n.title.clone(), n.body.clone()))
            .collect();
        contents.sort_by(|a, b| a.0.cmp(&b.0));
        contents
    }

    fn load(&self) -> anyhow::Result<Snapshot> {
        let mut files = Vec::new();
        collect_markdown_files(&self.root, &mut files)
            .with_context(|| format!("failed to read vault at {}", self.root.display()))?;

        let notes: HashMap<String, VaultNote> = files
            .par_iter()
            .filter_map(|path| {
                let rel = relative_path(&self.root, path)?;
                match std::fs::read_to_string(path) {
                    Ok(content) => Some((rel.clone(), parse_note(&rel, &content))),
                    Err(e) => {
                        log::warn!("path={rel} outcome=skip err={e}");
                        None
                    }
                }
            })
            .collect();

        let links = resolve_links(&notes);
        Ok(Snapshot { notes, links })
    }
}

impl NoteSource for Vault {
    fn scan(&self) -> anyhow::Result<Vec<NoteRef>> {
        let fresh = Arc::new(self.load()?);

        let mut refs: Vec<NoteRef> = fresh
            .notes
            .iter()
            .map(|(path, note)| NoteRef {
                id: note.id.clone(),
                path: path.clone(),
            })
            .collect();
        refs.sort_by(|a, b| a.path.cmp(&b.path));

        let mut guard = self
            .snapshot
            .write()
            .map_err(|e| anyhow::anyhow!("vault lock poisoned: {e}"))?;
        *guard = fresh;

        log::info!("scanned vault notes={}", refs.len());
        Ok(refs)
    }

    fn tags(&self, path: &str) -> Vec<String> {
        self.current()
            .notes
            .get(path)
            .map(|n| n.tags.clone())
            .unwrap_or_default()
    }

    fn title(&self, path: &str) -> String {
        self.current()
            .notes
            .get(path)
            .map(|n| n.title.clone())
            .unwrap_or_else(|| file_stem(path).to_string())
    }

    fn excerpt(&self, path: &str, max_chars: usize) -> String {
        self.current()
            .notes
            .get(path)
            .map(|n| truncate_chars(n.body.trim(), max_chars))
            .unwrap_or_default()
    }
}

impl LinkChecker for Vault {
    fn exists(&self, path_a: &str, path_b: &str) -> bool {
        let snapshot = self.current();
        snapshot.links.contains(&(path_a.to_string(), path_b.to_string()))
            || snapshot.links.contains(&(path_b.to_string(), path_a.to_string()))
    }
}

fn collect_markdown_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');

        if path.is_dir() {
            if !hidden {
                collect_markdown_files(&path, files)?;
            }
        } else if !hidden && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name)
}

/// Split YAML frontmatter from the body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    match rest.find("\n---") {
        Some(end) => {
            let after = &rest[end + 4..];
            let body = after.split_once('\n').map(|(_, b)| b).unwrap_or("");
            (Some(&rest[..end]), body)
        }
        None => (None, content),
    }
}

fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#').trim().to_lowercase();
    // purely numeric tokens are issue numbers, not tags
    if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(tag)
}

fn frontmatter_tags(value: &serde_yml::Value) -> Vec<String> {
    match value.get("tags").or_else(|| value.get("tag")) {
        Some(serde_yml::Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter_map(normalize_tag)
            .collect(),
        Some(serde_yml::Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter_map(normalize_tag)
            .collect(),
        _ => vec![],
    }
}

fn parse_note(rel_path: &str, content: &str) -> VaultNote {
    let (frontmatter, body) = split_frontmatter(content);

    let meta: Option<serde_yml::Value> = frontmatter.and_then(|fm| match serde_yml::from_str(fm) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("path={rel_path} frontmatter unreadable: {e}");
            None
        }
    });

    let mut tags: Vec<String> = meta.as_ref().map(frontmatter_tags).unwrap_or_default();
    for cap in INLINE_TAG.captures_iter(body) {
        if let Some(tag) = normalize_tag(&cap[1]) {
            tags.push(tag);
        }
    }
    let mut seen = HashSet::new();
    tags.retain(|t| seen.insert(t.clone()));

    let title = meta
        .as_ref()
        .and_then(|m| m.get("title"))
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            body.lines()
                .find_map(|line| line.strip_prefix("# "))
                .map(|h| h.trim().to_string())
        })
        .unwrap_or_else(|| file_stem(rel_path).to_string());

    let raw_links = WIKILINK
        .captures_iter(body)
        .map(|cap| cap[1].trim().to_string())
        .chain(
            MARKDOWN_LINK
                .captures_iter(body)
                .map(|cap| cap[1].replace("%20", " ")),
        )
        .collect();

    VaultNote {
        id: NoteId::derive(rel_path, content),
        title,
        tags,
        body: body.to_string(),
        raw_links,
    }
}

/// Collapse `.` and `..` segments. `None` if the path climbs out of the vault.
fn normalize_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Resolve raw link targets to vault paths.
///
/// A target with a folder matches by path (from the vault root, then from
/// the linking note's folder); a bare name matches by file stem.
fn resolve_links(notes: &HashMap<String, VaultNote>) -> HashSet<(String, String)> {
    let mut by_stem: HashMap<String, Vec<&String>> = HashMap::new();
    for path in notes.keys() {
        by_stem
            .entry(file_stem(path).to_lowercase())
            .or_default()
            .push(path);
    }

    let mut links = HashSet::new();
    for (from, note) in notes {
        let folder = from.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");

        for raw in &note.raw_links {
            let target = raw.trim_start_matches("./");
            let with_ext = if target.ends_with(".md") {
                target.to_string()
            } else {
                format!("{target}.md")
            };

            let resolved = if target.contains('/') {
                let from_folder = if folder.is_empty() {
                    with_ext.clone()
                } else {
                    format!("{folder}/{with_ext}")
                };
                [with_ext, from_folder]
                    .iter()
                    .filter_map(|candidate| normalize_path(candidate))
                    .find(|candidate| notes.contains_key(candidate))
            } else {
                by_stem
                    .get(&file_stem(&with_ext).to_lowercase())
                    .and_then(|paths| paths.iter().min().map(|p| (*p).clone()))
            };

            if let Some(to) = resolved {
                if &to != from {
                    links.insert((from.clone(), to));
                }
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn sample_vault() -> (tempfile::TempDir, Vault) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        write(
            root,
            "biology/mycelium.md",
            "---\ntitle: Mycelial Networks\ntags: [domain/biology, fungi]\n---\n\
             Fungi trade nutrients. #ecology #42\nSee [[Routing]].\n",
        );
        write(
            root,
            "tech/routing.md",
            "# Packet Routing\nRouters forward packets. #networks\n",
        );
        write(
            root,
            "philosophy/stoics.md",
            "---\ntags: \"domain/philosophy, ethics\"\n---\n\
             Virtue is enough. [notes](../tech/routing.md)\n",
        );
        write(root, "philosophy/kant.md", "Duty.\n");
        write(root, ".obsidian/workspace.md", "ignored");
        write(root, "biology/readme.txt", "ignored");

        let vault = Vault::new(root);
        (tmp, vault)
    }

    #[test]
    fn test_scan_lists_markdown_notes() {
        let (_tmp, vault) = sample_vault();
        let refs = vault.scan().unwrap();

        let paths: Vec<&str> = refs.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "biology/mycelium.md",
                "philosophy/kant.md",
                "philosophy/stoics.md",
                "tech/routing.md"
            ]
        );
    }

    #[test]
    fn test_tags_from_frontmatter_and_body() {
        let (_tmp, vault) = sample_vault();
        vault.scan().unwrap();

        assert_eq!(
            vault.tags("biology/mycelium.md"),
            vec!["domain/biology", "fungi", "ecology"]
        );
        assert_eq!(
            vault.tags("philosophy/stoics.md"),
            vec!["domain/philosophy", "ethics"]
        );
        assert!(vault.tags("philosophy/kant.md").is_empty());
    }

    #[test]
    fn test_titles() {
        let (_tmp, vault) = sample_vault();
        vault.scan().unwrap();

        assert_eq!(vault.title("biology/mycelium.md"), "Mycelial Networks");
        assert_eq!(vault.title("tech/routing.md"), "Packet Routing");
        assert_eq!(vault.title("philosophy/kant.md"), "kant");
    }

    #[test]
    fn test_links_are_bidirectional() {
        let (_tmp, vault) = sample_vault();
        vault.scan().unwrap();

        assert!(vault.exists("biology/mycelium.md", "tech/routing.md"));
        assert!(vault.exists("tech/routing.md", "biology/mycelium.md"));
        assert!(vault.exists("philosophy/stoics.md", "tech/routing.md"));
        assert!(!vault.exists("philosophy/kant.md", "tech/routing.md"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/../b/c.md").as_deref(), Some("b/c.md"));
        assert_eq!(normalize_path("./a/./b.md").as_deref(), Some("a/b.md"));
        assert_eq!(normalize_path("../outside.md"), None);
    }

    #[test]
    fn test_excerpt_skips_frontmatter() {
        let (_tmp, vault) = sample_vault();
        vault.scan().unwrap();

        let excerpt = vault.excerpt("biology/mycelium.md", 1000);
        assert!(excerpt.starts_with("Fungi trade nutrients."));
        assert!(!excerpt.contains("title:"));
        assert_eq!(vault.excerpt("biology/mycelium.md", 10).chars().count(), 10);
    }

    #[test]
    fn test_rescan_changes_id_on_edit() {
        let (tmp, vault) = sample_vault();
        let before = vault.scan().unwrap();

        write(tmp.path(), "philosophy/kant.md", "Duty, revised.\n");
        let after = vault.scan().unwrap();

        let id_of = |refs: &[NoteRef]| {
            refs.iter()
                .find(|r| r.path == "philosophy/kant.md")
                .map(|r| r.id.clone())
        };
        assert_ne!(id_of(&before), id_of(&after));
    }
}
