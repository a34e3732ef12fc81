use crate::error::LoadError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, LoadError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, LoadError> {
        let file = display_name(path);
        let document = Document::load(path).map_err(|error| LoadError::PdfParse {
            file: file.clone(),
            details: error.to_string(),
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| LoadError::PdfParse {
                    file: file.clone(),
                    details: format!("page {page_no}: {error}"),
                })?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(LoadError::PdfParse {
                file,
                details: "pdf had no readable page text".to_string(),
            });
        }

        Ok(pages)
    }
}

/// Strict UTF-8 decoding; a leading byte-order mark is dropped.
pub fn decode_text(file: &str, bytes: &[u8]) -> Result<String, LoadError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|_| LoadError::Decode {
        file: file.to_string(),
    })?;

    if text.trim().is_empty() {
        return Err(LoadError::EmptyText {
            file: file.to_string(),
        });
    }

    Ok(text.to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
