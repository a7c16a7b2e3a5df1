use std::collections::HashSet;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::error::InquireResult;
use serde::Serialize;

use crate::{
    app::AppContext,
    cache::{CacheError, ConnectionCache, PersistedConnection, PersistedDeepConnection},
    cli::errors::{CliError, CliResult},
    config::ClassificationMethod,
    domain::Connection,
    note_id::NoteId,
    semantic::{note_text, EMBED_BATCH_SIZE},
    sources::EmbeddingStore,
};

use super::CacheArgs;

#[derive(Serialize)]
struct EmbedSummary {
    embedded: usize,
    pruned: usize,
    skipped: usize,
    total: usize,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_connections(connections: &[Connection]) -> CliResult<()> {
    let persisted: Vec<PersistedConnection> =
        connections.iter().map(PersistedConnection::from).collect();
    print_json(&persisted)
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb
}

fn store_or_warn(result: Result<(), CacheError>, key: &str) {
    if let Err(e) = result {
        log::warn!("cache key={key} outcome=write-failed err={e}");
    }
}

pub fn handle_embed(ctx: &AppContext) -> Result<()> {
    let model = ctx.embedding_model()?;
    let storage = ctx.vector_storage();
    let index = storage.load_or_empty(model.name(), model.dimensions())?;

    let contents = ctx.vault().contents();
    let keep: HashSet<NoteId> = contents.iter().map(|(id, _, _)| id.clone()).collect();
    let pruned = index.retain_ids(&keep);

    let mut skipped = 0;
    let pending: Vec<(NoteId, String)> = contents
        .into_iter()
        .filter(|(id, _, _)| !index.contains(id))
        .filter_map(|(id, title, body)| match note_text(&title, &body) {
            Some(text) => Some((id, text)),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();

    let pb = progress_bar(pending.len(), "Embedding");
    let mut embedded = 0;
    for chunk in pending.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
        let vectors = model.embed_batch(&texts)?;

        for ((id, _), vector) in chunk.iter().zip(vectors) {
            match index.insert(id.clone(), vector) {
                Ok(()) => embedded += 1,
                Err(e) => {
                    log::warn!("note={id} outcome=skip err={e}");
                    skipped += 1;
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    storage.save(&index)?;
    log::info!("saved embeddings path={}", storage.path().display());

    print_json(&EmbedSummary {
        embedded,
        pruned,
        skipped,
        total: index.len(),
    })?;
    Ok(())
}

pub fn handle_classify(ctx: &AppContext, note: &str) -> CliResult<()> {
    let id = ctx.resolve_note(note)?;

    let method = ctx.config().discovery.classification_method;
    let embedding = if method == ClassificationMethod::Cluster {
        ctx.load_embeddings()?.get(&id)?
    } else {
        None
    };

    let domain = ctx.classifier().classify(&id, embedding)?;
    print_json(&domain)
}

pub fn handle_discover(
    ctx: &AppContext,
    note: &str,
    explain: bool,
    no_cache: bool,
) -> CliResult<()> {
    let id = ctx.resolve_note(note)?;
    let key = ConnectionCache::discover_key(&id);
    let cache = ctx.cache().filter(|_| !no_cache);

    let (mut connections, mut changed) = match cache.and_then(|c| c.get_connections(&key)) {
        Some(cached) => (cached, false),
        None => {
            let engine = ctx.standard_engine(ctx.load_embeddings()?, None);
            (engine.discover(&id)?, true)
        }
    };

    if explain && !connections.is_empty() {
        let explained = ctx.explainer(ctx.evaluator()?).explain_all(&mut connections);
        log::info!("explained={explained} of {}", connections.len());
        changed |= explained > 0;
    }

    if let Some(cache) = cache.filter(|_| changed) {
        store_or_warn(cache.put_connections(&key, &connections), &key);
    }

    print_connections(&connections)
}

pub fn handle_top(
    ctx: &AppContext,
    limit: usize,
    explain: bool,
    no_cache: bool,
    seed: Option<u64>,
) -> CliResult<()> {
    if limit == 0 {
        return Err(CliError::invalid_input("--limit must be greater than 0"));
    }

    let key = ConnectionCache::top_key(limit);
    let cache = ctx.cache().filter(|_| !no_cache && seed.is_none());

    let (mut connections, mut changed) = match cache.and_then(|c| c.get_connections(&key)) {
        Some(cached) => (cached, false),
        None => {
            let engine = ctx.standard_engine(ctx.load_embeddings()?, seed);
            (engine.find_top_serendipitous_connections(limit)?, true)
        }
    };

    if explain && !connections.is_empty() {
        changed |= ctx.explainer(ctx.evaluator()?).explain_all(&mut connections) > 0;
    }

    if let Some(cache) = cache.filter(|_| changed) {
        store_or_warn(cache.put_connections(&key, &connections), &key);
    }

    print_connections(&connections)
}

pub fn handle_deep(ctx: &AppContext, seed: Option<u64>, no_cache: bool) -> CliResult<()> {
    let key = ConnectionCache::deep_key();
    let cache = ctx.cache().filter(|_| !no_cache && seed.is_none());

    let connections = match cache.and_then(|c| c.get_deep_connections(&key)) {
        Some(cached) => cached,
        None => {
            let engine = ctx.deep_engine(ctx.load_embeddings()?, ctx.evaluator()?, seed);

            let pb = progress_bar(0, "Evaluating");
            let found = engine.discover_with_progress(|done, total| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            })?;
            pb.finish_and_clear();

            if let Some(cache) = cache {
                store_or_warn(cache.put_deep_connections(&key, &found), &key);
            }
            found
        }
    };

    let persisted: Vec<PersistedDeepConnection> =
        connections.iter().map(PersistedDeepConnection::from).collect();
    print_json(&persisted)
}

pub fn handle_cache(ctx: &AppContext, action: CacheArgs) -> CliResult<()> {
    match action {
        CacheArgs::Clear { yes } => {
            let Some(cache) = ctx.cache() else {
                println!("Cache is disabled");
                return Ok(());
            };

            if !yes {
                match inquire::prompt_confirmation("Remove every cached result?") {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Err(CliError::UserCancelled),
                    InquireResult::Err(err) => {
                        return Err(CliError::invalid_input(format!("An error occurred: {}", err)))
                    }
                }
            }

            let count = cache.clear()?;
            println!("{} entries removed", count);
            Ok(())
        }
    }
}
