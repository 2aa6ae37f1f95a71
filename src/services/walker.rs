use std::ffi::OsStr;
use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::error::FileError;
use crate::model::entry::{ContentEntry, EntryKind};
use crate::model::job::SyncOptions;

/// Depth-first walk of `root`, lazily yielding entries relative to it.
///
/// A directory is yielded before its children, siblings are sorted by file
/// name so runs are reproducible. The root itself is not yielded. Symlinks
/// are followed; a link back to an ancestor is yielded as an error instead of
/// being descended into.
pub fn walk<'a>(
    root: &'a Path,
    opts: &'a SyncOptions,
) -> impl Iterator<Item = Result<ContentEntry, FileError>> + 'a {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .map(move |res| -> Result<ContentEntry, FileError> {
            let dent = res?;
            let rel = dent
                .path()
                .strip_prefix(root)
                .unwrap_or(dent.path())
                .to_path_buf();
            let kind = classify(&rel, dent.file_type().is_dir(), opts);
            Ok(ContentEntry::new(rel, kind))
        })
}

/// Kind of a path relative to the source root.
pub fn classify(relative: &Path, is_dir: bool, opts: &SyncOptions) -> EntryKind {
    if is_dir {
        return EntryKind::Directory;
    }

    if in_passthrough_subtree(relative, opts) {
        return EntryKind::Passthrough;
    }

    match relative.extension().and_then(OsStr::to_str) {
        Some(ext) if opts.is_translatable_extension(ext) => EntryKind::Translatable,
        _ => EntryKind::Passthrough,
    }
}

fn in_passthrough_subtree(relative: &Path, opts: &SyncOptions) -> bool {
    let Some(segment) = opts.passthrough_segment.as_deref() else {
        return false;
    };
    if segment.is_empty() {
        return false;
    }

    relative.components().any(|c| match c {
        Component::Normal(name) => name == OsStr::new(segment),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::PathBuf;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, rel).unwrap();
    }

    #[test]
    fn classifies_by_extension_and_reserved_segment() {
        let opts = SyncOptions::default();
        assert_eq!(classify(Path::new("a.md"), false, &opts), EntryKind::Translatable);
        assert_eq!(classify(Path::new("b/c.MDX"), false, &opts), EntryKind::Translatable);
        assert_eq!(classify(Path::new("logo.png"), false, &opts), EntryKind::Passthrough);
        assert_eq!(classify(Path::new("README"), false, &opts), EntryKind::Passthrough);
        assert_eq!(classify(Path::new("LLMs/guide.md"), false, &opts), EntryKind::Passthrough);
        assert_eq!(classify(Path::new("x/LLMs/y/z.md"), false, &opts), EntryKind::Passthrough);
        assert_eq!(classify(Path::new("LLMs"), true, &opts), EntryKind::Directory);
    }

    #[test]
    fn reserved_segment_must_match_whole_component() {
        let opts = SyncOptions::default();
        assert_eq!(classify(Path::new("LLMs-intro.md"), false, &opts), EntryKind::Translatable);
        assert_eq!(classify(Path::new("myLLMs/a.md"), false, &opts), EntryKind::Translatable);

        let no_reserved = SyncOptions {
            passthrough_segment: None,
            ..SyncOptions::default()
        };
        assert_eq!(classify(Path::new("LLMs/a.md"), false, &no_reserved), EntryKind::Translatable);
    }

    #[test]
    fn directories_come_before_their_children_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.md");
        touch(dir.path(), "a/z.png");
        touch(dir.path(), "a/y.md");

        let opts = SyncOptions::default();
        let entries: Vec<ContentEntry> = walk(dir.path(), &opts).map(Result::unwrap).collect();

        assert_eq!(
            entries,
            vec![
                ContentEntry::new(PathBuf::from("a"), EntryKind::Directory),
                ContentEntry::new(PathBuf::from("a/y.md"), EntryKind::Translatable),
                ContentEntry::new(PathBuf::from("a/z.png"), EntryKind::Passthrough),
                ContentEntry::new(PathBuf::from("b.md"), EntryKind::Translatable),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_descended() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("src");
        touch(dir.path(), "shared/x.md");
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(dir.path().join("shared"), root.join("linked")).unwrap();

        let opts = SyncOptions::default();
        let entries: Vec<ContentEntry> = walk(&root, &opts).map(Result::unwrap).collect();

        assert_eq!(
            entries,
            vec![
                ContentEntry::new(PathBuf::from("linked"), EntryKind::Directory),
                ContentEntry::new(PathBuf::from("linked/x.md"), EntryKind::Translatable),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn link_to_an_ancestor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.md");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let opts = SyncOptions::default();
        let results: Vec<_> = walk(dir.path(), &opts).collect();

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &ContentEntry::new(PathBuf::from("a.md"), EntryKind::Translatable)
        );
        assert!(matches!(results[1], Err(FileError::Walk(_))));
    }
}
