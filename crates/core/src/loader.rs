use crate::extractor::{decode_text, LopdfExtractor, PdfExtractor};
use crate::{DocType, Document, LoadError, UploadedFile};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const CONTENT_PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Copies uploads into a working directory and extracts their text.
pub struct DocumentLoader {
    upload_dir: PathBuf,
    extractor: Box<dyn PdfExtractor>,
}

impl DocumentLoader {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            extractor: Box::new(LopdfExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Fails on the first file that cannot be turned into text.
    pub fn load(&self, files: &[UploadedFile]) -> Result<Vec<Document>, LoadError> {
        let mut documents = Vec::new();
        for file in files {
            documents.extend(self.load_file(file)?);
        }
        Ok(documents)
    }

    /// Loads every readable file and reports the rest instead of failing the batch.
    pub fn load_best_effort(&self, files: &[UploadedFile]) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        for file in files {
            match self.load_file(file) {
                Ok(documents) => report.documents.extend(documents),
                Err(error) => {
                    warn!(file = %file.name, reason = %error, "skipped upload");
                    report.skipped.push(SkippedFile {
                        name: file.name.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    pub fn load_file(&self, file: &UploadedFile) -> Result<Vec<Document>, LoadError> {
        let source_id = sanitize_file_name(&file.name)?;
        let stored = self.store(&source_id, &file.bytes)?;
        let doc_type = DocType::from_file_name(&source_id);

        debug!(file = %source_id, stored = %stored.display(), ?doc_type, "stored upload");

        let documents = match doc_type {
            DocType::Pdf => self
                .extractor
                .extract_pages(&stored)?
                .into_iter()
                .map(|page| Document {
                    source_id: source_id.clone(),
                    text: page.text,
                    doc_type,
                    page: Some(page.number),
                })
                .collect(),
            DocType::Text => vec![Document {
                source_id: source_id.clone(),
                text: decode_text(&source_id, &file.bytes)?,
                doc_type,
                page: None,
            }],
        };

        Ok(documents)
    }

    fn store(&self, source_id: &str, bytes: &[u8]) -> Result<PathBuf, LoadError> {
        fs::create_dir_all(&self.upload_dir)
            .map_err(|error| LoadError::io(self.upload_dir.display().to_string(), error))?;

        let path = self
            .upload_dir
            .join(format!("{}-{source_id}", content_prefix(bytes)));
        fs::write(&path, bytes).map_err(|error| LoadError::io(source_id, error))?;
        Ok(path)
    }
}

/// Reduces an untrusted upload name to a single safe path component.
pub fn sanitize_file_name(name: &str) -> Result<String, LoadError> {
    let unsafe_chars = Regex::new(r"[^A-Za-z0-9._-]")?;
    let last_component = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = unsafe_chars.replace_all(last_component, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        Ok("upload".to_string())
    } else {
        Ok(cleaned.to_string())
    }
}

fn content_prefix(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    digest[..CONTENT_PREFIX_LEN].to_string()
}

/// Expands folders into the `.pdf` and `.txt` files under them; plain file paths pass through.
pub fn discover_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found = WalkDir::new(path)
            .into_iter()
            .filter_map(|item| item.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("txt")
                    })
            })
            .map(|entry| entry.path().to_path_buf())
            .collect::<Vec<_>>();

        found.sort_unstable();
        files.extend(found);
    }

    files
}

pub fn read_upload(path: &Path) -> Result<UploadedFile, LoadError> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = fs::read(path).map_err(|error| LoadError::io(name.clone(), error))?;
    Ok(UploadedFile { name, bytes })
}
