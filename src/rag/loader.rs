use log::{ debug, info };
use std::collections::BTreeMap;
use std::fs;
use std::path::{ Path, PathBuf };
use thiserror::Error;
use walkdir::WalkDir;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "rst", "csv", "json", "html", "htm", "xml"];

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path relative to the data directory.
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("data directory '{0}' does not exist")]
    MissingDirectory(PathBuf),
    #[error("no readable documents found in '{0}'")]
    NoDocuments(PathBuf),
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{0}' is not valid UTF-8 text")]
    Decode(PathBuf),
}

impl LoaderError {
    /// Failures that just mean "nothing to index yet".
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LoaderError::MissingDirectory(_) | LoaderError::NoDocuments(_))
    }
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reads every supported text file under `dir`, recursively, in path order.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>, LoaderError> {
    if !dir.is_dir() {
        return Err(LoaderError::MissingDirectory(dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            LoaderError::Io { path, source }
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || is_hidden(path, dir) {
            continue;
        }
        if !is_supported(path) {
            debug!("Skipping unsupported file {}", path.display());
            continue;
        }

        let bytes = fs::read(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| LoaderError::Decode(path.to_path_buf()))?;

        let relative = path.strip_prefix(dir).unwrap_or(path);
        let id = relative.to_string_lossy().replace('\\', "/");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());

        let mut metadata = BTreeMap::new();
        metadata.insert("file_name".to_string(), file_name);
        metadata.insert("file_path".to_string(), path.to_string_lossy().into_owned());
        documents.push(Document { id, text, metadata });
    }

    if documents.is_empty() {
        return Err(LoaderError::NoDocuments(dir.to_path_buf()));
    }
    info!("Loaded {} documents from {}", documents.len(), dir.display());
    Ok(documents)
}
