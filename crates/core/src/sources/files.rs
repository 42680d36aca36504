use crate::error::IngestError;
use crate::models::{Document, SourceKind};
use crate::sources::{FetchReport, SkippedSource};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const TEXT_EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Recursively finds text/markdown files under a folder, sorted for
/// deterministic ingestion order.
pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                TEXT_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if matches {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Reads every discovered file as one document. Unreadable files are skipped
/// with a reason; an empty folder is an argument error.
pub fn load_folder(folder: &Path) -> Result<FetchReport, IngestError> {
    let files = discover_text_files(folder);
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no text files found in {}",
            folder.display()
        )));
    }

    let mut report = FetchReport::default();
    for path in files {
        match fs::read_to_string(&path) {
            Ok(text) => report.documents.push(Document {
                text,
                source: path.to_string_lossy().to_string(),
                kind: SourceKind::File,
            }),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                report.skipped.push(SkippedSource {
                    source: path.to_string_lossy().to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }
    Ok(report)
}
