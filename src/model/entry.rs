use std::path::{Path, PathBuf};

/// A node found while walking the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    /// Path relative to the source root; identical in the target tree.
    pub relative_path: PathBuf,

    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Translatable,
    Passthrough,
}

impl ContentEntry {
    pub fn new(relative_path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            relative_path: relative_path.into(),
            kind,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn source_path(&self, source_root: &Path) -> PathBuf {
        source_root.join(&self.relative_path)
    }

    pub fn target_path(&self, target_root: &Path) -> PathBuf {
        target_root.join(&self.relative_path)
    }

    /// Forward-slash form used in progress lines, stable across platforms.
    pub fn display_path(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
