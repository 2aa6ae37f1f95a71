use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::error::{FileError, SyncError};
use crate::model::entry::{ContentEntry, EntryKind};
use crate::model::job::{SyncJob, SyncOptions};
use crate::model::report::{FileOutcome, SyncReport};
use crate::services::ai::Translator;
use crate::services::{encoding, fingerprint, storage, walker};

/// What a run would do with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Copy,
    Translate,
    Skip,
    /// The walk could not read this path; its state is unknown.
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub path: String,
    pub action: Action,
}

/// Skip iff the target's embedded fingerprint equals `source_hash`.
///
/// A missing, unreadable or unmarked target has no record and is stale.
pub fn staleness(source_hash: &str, target: &Path) -> Action {
    let record = match storage::read_optional(target) {
        Ok(Some(bytes)) => fingerprint::extract_marker_bytes(&bytes),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(error = %e, "target unreadable, treating as untranslated");
            None
        }
    };

    match record {
        Some(hash) if hash == source_hash => Action::Skip,
        _ => Action::Translate,
    }
}

/// Sync one (source, target, language) triple.
///
/// Only a missing or non-directory source root, or a target root that cannot
/// be created, fails the run; every other problem is counted against the file
/// it happened to.
pub fn run<T>(job: &SyncJob, opts: &SyncOptions, translator: &T) -> Result<SyncReport, SyncError>
where
    T: Translator + ?Sized,
{
    check_source(&job.source)?;
    fs::create_dir_all(&job.target).map_err(|source| SyncError::TargetRoot {
        path: job.target.clone(),
        source,
    })?;

    let started = Instant::now();
    let mut report = SyncReport::default();

    for item in walker::walk(&job.source, opts) {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(language = %job.language, error = %err, "walk failed");
                report.record_failure(walk_error_path(&job.source, &err), err);
                continue;
            }
        };

        if entry.is_dir() {
            // files below report their own failure if this did not work
            if let Err(err) = storage::ensure_dir(&entry.target_path(&job.target)) {
                tracing::warn!(path = %entry.display_path(), error = %err, "mkdir failed");
            }
            continue;
        }

        match process_file(&entry, job, opts, translator) {
            Ok(outcome) => report.record(outcome),
            Err(err) => {
                tracing::warn!(
                    language = %job.language,
                    path = %entry.display_path(),
                    error = %err,
                    "failed"
                );
                report.record_failure(entry.display_path(), err);
            }
        }
    }

    report.elapsed = started.elapsed();
    Ok(report)
}

/// Run every job in order. A job that cannot start does not stop the others.
pub fn run_jobs<T>(
    jobs: &[SyncJob],
    opts: &SyncOptions,
    translator: &T,
) -> Vec<(SyncJob, Result<SyncReport, SyncError>)>
where
    T: Translator + ?Sized,
{
    jobs.iter()
        .map(|job| {
            tracing::info!(
                source = %job.source.display(),
                target = %job.target.display(),
                language = %job.language,
                "sync started"
            );
            let result = run(job, opts, translator);
            if let Err(err) = &result {
                tracing::error!(language = %job.language, error = %err, "sync aborted");
            }
            (job.clone(), result)
        })
        .collect()
}

/// Classify every file of a job without contacting the provider.
pub fn plan(job: &SyncJob, opts: &SyncOptions) -> Result<Vec<PlanItem>, SyncError> {
    check_source(&job.source)?;

    let mut items = Vec::new();
    for item in walker::walk(&job.source, opts) {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(language = %job.language, error = %err, "walk failed");
                items.push(PlanItem {
                    path: walk_error_path(&job.source, &err),
                    action: Action::Unreadable,
                });
                continue;
            }
        };

        let action = match entry.kind {
            EntryKind::Directory => continue,
            EntryKind::Passthrough => Action::Copy,
            EntryKind::Translatable => match fs::read(entry.source_path(&job.source)) {
                Ok(bytes) => staleness(
                    &fingerprint::fingerprint(&bytes),
                    &entry.target_path(&job.target),
                ),
                Err(e) => {
                    tracing::warn!(path = %entry.display_path(), error = %e, "unreadable source");
                    Action::Translate
                }
            },
        };

        items.push(PlanItem {
            path: entry.display_path(),
            action,
        });
    }

    Ok(items)
}

fn check_source(source: &Path) -> Result<(), SyncError> {
    match fs::metadata(source) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::NotADirectory(source.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(SyncError::SourceMissing(source.to_path_buf()))
        }
        Err(e) => Err(SyncError::SourceUnreadable {
            path: source.to_path_buf(),
            source: e,
        }),
    }
}

fn process_file<T>(
    entry: &ContentEntry,
    job: &SyncJob,
    opts: &SyncOptions,
    translator: &T,
) -> Result<FileOutcome, FileError>
where
    T: Translator + ?Sized,
{
    let source = entry.source_path(&job.source);
    let target = entry.target_path(&job.target);
    let path = entry.display_path();

    if entry.kind == EntryKind::Passthrough {
        storage::copy_file(&source, &target)?;
        progress(opts, &job.language, &path, "copied");
        return Ok(FileOutcome::Copied);
    }

    let bytes = fs::read(&source).map_err(|e| FileError::io(&source, e))?;
    let hash = fingerprint::fingerprint(&bytes);

    if staleness(&hash, &target) == Action::Skip {
        progress(opts, &job.language, &path, "skipped (hash match)");
        return Ok(FileOutcome::Skipped);
    }

    progress(opts, &job.language, &path, "translating");

    let decoded = encoding::decode(&bytes).map_err(|encoding| FileError::Decode {
        path: source.clone(),
        encoding,
    })?;
    if decoded.encoding != "utf-8" {
        tracing::debug!(path = %path, encoding = %decoded.encoding, "decoded source");
    }

    let translated = translator.translate(&decoded.text, &job.language)?;

    // written only after the provider answered, with the hash of the bytes sent
    storage::write_atomic(&target, fingerprint::append_marker(&translated, &hash).as_bytes())?;

    progress(opts, &job.language, &path, "translated");
    Ok(FileOutcome::Translated)
}

fn progress(opts: &SyncOptions, language: &str, path: &str, what: &str) {
    if opts.verbose {
        tracing::info!(language = %language, path = %path, "{what}");
    } else {
        tracing::debug!(language = %language, path = %path, "{what}");
    }
}

fn walk_error_path(root: &Path, err: &FileError) -> String {
    match err {
        FileError::Walk(w) => w.path().map(|p| display_relative(root, p)),
        _ => None,
    }
    .unwrap_or_default()
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
