//! Input directory scanning.

use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use tracing::{debug, warn};

use crate::models::Document;

/// Recursively list the files under `dir` whose extension is in
/// `extensions` (case-insensitive), sorted by path.
pub fn discover(dir: &Path, extensions: &[String]) -> Vec<Document> {
    let mut paths: Vec<PathBuf> = walk(dir)
        .into_iter()
        .filter(|p| has_extension(p, extensions))
        .collect();
    paths.sort();
    debug!("Discovered {} documents in {}", paths.len(), dir.display());
    paths.into_iter().map(Document::new).collect()
}

/// Locate a document by basename anywhere under `dir`.
pub fn find_by_archivo(dir: &Path, archivo: &str) -> Option<Document> {
    let mut matches: Vec<PathBuf> = walk(dir)
        .into_iter()
        .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy() == archivo))
        .collect();
    matches.sort();
    matches.into_iter().next().map(Document::new)
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
    match glob(&pattern) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect(),
        Err(err) => {
            warn!("Invalid input directory {}: {}", dir.display(), err);
            Vec::new()
        }
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}
