//! Bundled file supplier: walks a workspace and yields document events.
//!
//! The engine itself accepts arbitrary [`FileEvent`]s; this supplier is the
//! default producer, doing a gitignore-aware walk with binary and size
//! filtering and extension-based language detection.

use crate::error::Result;
use crate::types::Ticks;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// One source file ready for indexing.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the workspace root (the document key).
    pub relative_path: String,
    pub content: String,
    pub modified: Ticks,
    pub size: u64,
    pub language: Option<String>,
}

/// Supplier configuration.
#[derive(Debug, Clone)]
pub struct SupplierConfig {
    /// Include hidden files
    pub include_hidden: bool,
    /// Follow symlinks
    pub follow_symlinks: bool,
    /// Maximum file size to read (bytes)
    pub max_file_size: u64,
    /// File extensions to index (empty = all non-binary files)
    pub extensions: Vec<String>,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            include_hidden: false,
            follow_symlinks: false,
            max_file_size: 1024 * 1024, // 1MB
            extensions: vec![
                "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "c", "cpp", "h", "hpp", "rb",
                "php", "swift", "kt", "scala", "cs", "fs", "ml", "hs", "clj", "ex", "exs", "erl",
                "lua", "sh", "bash", "zsh", "fish", "ps1", "bat", "md", "txt", "json", "yaml",
                "yml", "toml", "xml", "html", "css", "scss", "sql", "graphql", "proto",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Gitignore-aware workspace walker.
pub struct FileSupplier {
    root: PathBuf,
    config: SupplierConfig,
}

impl FileSupplier {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            config: SupplierConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(root: PathBuf, config: SupplierConfig) -> Self {
        Self { root, config }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the workspace and reads every indexable file.
    ///
    /// Unreadable or binary files are skipped with a debug log; the walk
    /// itself never fails on individual entries.
    ///
    /// # Errors
    ///
    /// Currently infallible at the walk level; the `Result` covers future
    /// walk-configuration failures.
    pub fn collect(&self) -> Result<Vec<FileEvent>> {
        let paths: Vec<PathBuf> = WalkBuilder::new(&self.root)
            .hidden(!self.config.include_hidden)
            .follow_links(self.config.follow_symlinks)
            .max_filesize(Some(self.config.max_file_size))
            .build()
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_some_and(|t| t.is_file()) => Some(e.into_path()),
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!(%err, "walk entry failed; skipping");
                    None
                }
            })
            .filter(|p| self.wants(p))
            .collect();

        let mut events: Vec<FileEvent> = paths
            .par_iter()
            .filter_map(|p| self.read_event(p))
            .collect();
        // Deterministic order keeps incremental runs and tests stable.
        events.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(events)
    }

    fn wants(&self, path: &Path) -> bool {
        if self.config.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.config.extensions.iter().any(|e| *e == ext)
            })
    }

    fn read_event(&self, path: &Path) -> Option<FileEvent> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(err) => {
                tracing::debug!(%err, path = %path.display(), "read failed; skipping");
                return None;
            }
        };
        if bytes.contains(&0) {
            tracing::debug!(path = %path.display(), "binary file; skipping");
            return None;
        }
        let content = String::from_utf8_lossy(&bytes).into_owned();

        let relative_path = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let meta = std::fs::metadata(path).ok();
        let modified = meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| Ticks::new(d.as_millis() as u64))
            .unwrap_or_default();
        let size = meta.map_or(bytes.len() as u64, |m| m.len());

        Some(FileEvent {
            path: path.to_path_buf(),
            language: language_for(&relative_path).map(str::to_owned),
            relative_path,
            content,
            modified,
            size,
        })
    }
}

/// Maps a file extension to its language name.
#[must_use]
pub fn language_for(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    let lang = match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" | "zsh" => "shell",
        "md" => "markdown",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "sql" => "sql",
        "html" => "html",
        "css" | "scss" => "css",
        _ => return None,
    };
    Some(lang)
}
