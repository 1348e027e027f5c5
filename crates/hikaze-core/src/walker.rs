//! Cycle-safe enumeration of model files under a set of roots.
//!
//! Symlinks and junctions are followed. Every directory is canonicalized
//! before it is entered and a directory whose canonical path was already seen
//! during this walk is skipped, so link cycles and roots that overlap each
//! other yield each file once.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions of files the catalog indexes, lower-case without the dot.
pub const MODEL_EXTENSIONS: &[&str] = &["safetensors", "ckpt", "pth", "pt", "bin"];

/// Whether the file name carries one of [`MODEL_EXTENSIONS`].
pub fn has_model_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| MODEL_EXTENSIONS.contains(&e.as_str()))
}

/// Lazily walk `roots` in order.
pub fn walk<I, P>(roots: I) -> ModelWalker
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    ModelWalker::new(roots)
}

/// Iterator over model file paths below a list of roots.
///
/// The visited set lives in the walker, so two walks never influence each
/// other. Unreadable entries are logged at debug level and skipped.
pub struct ModelWalker {
    pending: VecDeque<PathBuf>,
    current: Option<walkdir::IntoIter>,
    visited: HashSet<PathBuf>,
}

impl ModelWalker {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            pending: roots.into_iter().map(Into::into).collect(),
            current: None,
            visited: HashSet::new(),
        }
    }
}

impl Iterator for ModelWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let Some(entries) = self.current.as_mut() else {
                let root = self.pending.pop_front()?;
                debug!("Walking model root {}", root.display());
                self.current = Some(WalkDir::new(root).follow_links(true).into_iter());
                continue;
            };

            let entry = match entries.next() {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Err(e)) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
                Some(Ok(entry)) => entry,
            };

            if entry.file_type().is_dir() {
                match std::fs::canonicalize(entry.path()) {
                    Ok(canonical) => {
                        if !self.visited.insert(canonical) {
                            debug!("Already visited {}", entry.path().display());
                            entries.skip_current_dir();
                        }
                    }
                    Err(e) => {
                        debug!("Cannot resolve {}: {}", entry.path().display(), e);
                        entries.skip_current_dir();
                    }
                }
                continue;
            }

            if entry.file_type().is_file() && has_model_extension(entry.path()) {
                return Some(entry.into_path());
            }
        }
    }
}
