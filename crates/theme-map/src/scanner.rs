use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use theme_protocol::FileRecord;

/// Loads a theme directory from disk into file records (.gitignore aware).
pub struct ThemeScanner {
    root: PathBuf,
}

impl ThemeScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scan(&self) -> Vec<FileRecord> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if !Self::is_theme_file(path) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if meta.len() > MAX_FILE_SIZE_BYTES {
                    log::debug!("Skipping large file {} ({} bytes)", path.display(), meta.len());
                    continue;
                }
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    // ids are assigned after sorting
                    let mut record = FileRecord::new(String::new(), relative, content);
                    if let Some(ms) = entry
                        .metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .and_then(|d| u64::try_from(d.as_millis()).ok())
                    {
                        record = record.with_updated_at(ms);
                    }
                    files.push(record);
                }
                Err(e) => log::debug!("Skipping unreadable {}: {e}", path.display()),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        for (idx, file) in files.iter_mut().enumerate() {
            file.id = (idx + 1).to_string();
        }
        log::info!("Found {} theme files under {}", files.len(), self.root.display());
        files
    }

    fn is_theme_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                THEME_EXTENSIONS.contains(&ext.as_str())
            })
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        relative.components().any(|component| {
            matches!(component, std::path::Component::Normal(name)
                if IGNORED_SCOPES.contains(&name.to_string_lossy().to_lowercase().as_str()))
        })
    }
}

const IGNORED_SCOPES: &[&str] = &["node_modules", ".git", ".theme-map", "dist", "build", ".cache"];

const MAX_FILE_SIZE_BYTES: u64 = 4 * 1_048_576;

const THEME_EXTENSIONS: &[&str] = &[
    "liquid", "css", "scss", "sass", "js", "mjs", "cjs", "ts", "tsx", "jsx", "json",
];
