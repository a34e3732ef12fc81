use crate::error::IndexError;
use crate::models::{IndexMode, ScoredChunk, VectorRecord};
use crate::traits::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub const INDEX_FILE_NAME: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexManifest {
    format_version: u32,
    collection_id: Uuid,
    built_at: DateTime<Utc>,
    embedding_model: Option<String>,
    dimensions: Option<usize>,
    records: Vec<VectorRecord>,
}

/// Read ahead of the full manifest so any other layout version is reported as such.
#[derive(Deserialize)]
struct ManifestHeader {
    format_version: u32,
}

impl IndexManifest {
    fn empty() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            collection_id: Uuid::new_v4(),
            built_at: Utc::now(),
            embedding_model: None,
            dimensions: None,
            records: Vec::new(),
        }
    }
}

/// Exact cosine-similarity index kept in memory and persisted as JSON.
#[derive(Debug)]
pub struct LocalVectorIndex {
    dir: PathBuf,
    manifest: IndexManifest,
}

impl LocalVectorIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            manifest: IndexManifest::empty(),
        }
    }

    /// Reads a previously persisted index; a directory without one yields an empty index.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let dir = dir.into();
        let path = dir.join(INDEX_FILE_NAME);

        if !path.exists() {
            debug!(path = %path.display(), "no persisted index");
            return Ok(Self::new(dir));
        }

        let bytes = fs::read(&path)?;
        let header: ManifestHeader = serde_json::from_slice(&bytes)?;
        if header.format_version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(header.format_version));
        }
        let manifest: IndexManifest = serde_json::from_slice(&bytes)?;

        info!(
            path = %path.display(),
            records = manifest.records.len(),
            collection_id = %manifest.collection_id,
            "loaded persisted index"
        );
        Ok(Self { dir, manifest })
    }

    /// Index to process into: append continues the persisted one, rebuild
    /// starts empty and never reads what is on disk.
    pub fn open(dir: impl Into<PathBuf>, mode: IndexMode) -> Result<Self, IndexError> {
        match mode {
            IndexMode::Append => Self::load(dir),
            IndexMode::Rebuild => Ok(Self::new(dir)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn collection_id(&self) -> Uuid {
        self.manifest.collection_id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.manifest.built_at
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.manifest.dimensions
    }

    fn check_dimensions(
        expected: Option<usize>,
        records: &[VectorRecord],
    ) -> Result<Option<usize>, IndexError> {
        let mut dimensions = expected;
        for record in records {
            let found = record.embedding.len();
            match dimensions {
                Some(expected) if expected != found => {
                    return Err(IndexError::DimensionMismatch { expected, found });
                }
                _ => dimensions = Some(found),
            }
        }
        Ok(dimensions)
    }
}

impl VectorIndex for LocalVectorIndex {
    fn rebuild(
        &mut self,
        embedding_model: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), IndexError> {
        let dimensions = Self::check_dimensions(None, &records)?;

        self.manifest = IndexManifest {
            embedding_model: Some(embedding_model.to_string()),
            dimensions,
            records,
            ..IndexManifest::empty()
        };

        info!(
            collection_id = %self.manifest.collection_id,
            records = self.manifest.records.len(),
            "rebuilt index"
        );
        Ok(())
    }

    fn add(&mut self, embedding_model: &str, records: Vec<VectorRecord>) -> Result<(), IndexError> {
        if self.manifest.records.is_empty() {
            return self.rebuild(embedding_model, records);
        }

        if let Some(indexed) = &self.manifest.embedding_model {
            if indexed != embedding_model {
                return Err(IndexError::ModelMismatch {
                    indexed: indexed.clone(),
                    configured: embedding_model.to_string(),
                });
            }
        }

        self.manifest.dimensions = Self::check_dimensions(self.manifest.dimensions, &records)?;
        self.manifest.records.extend(records);
        self.manifest.built_at = Utc::now();

        info!(
            collection_id = %self.manifest.collection_id,
            records = self.manifest.records.len(),
            "appended to index"
        );
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.manifest.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.manifest.dimensions {
            if expected != vector.len() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    found: vector.len(),
                });
            }
        }

        let mut scored = self
            .manifest
            .records
            .iter()
            .map(|record| ScoredChunk {
                chunk_text: record.chunk_text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(&record.embedding, vector),
            })
            .collect::<Vec<_>>();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }

    fn persist(&self) -> Result<(), IndexError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(INDEX_FILE_NAME);
        let staging = self.dir.join(format!("{INDEX_FILE_NAME}.tmp"));
        fs::write(&staging, serde_json::to_vec(&self.manifest)?)?;
        fs::rename(&staging, &path)?;

        info!(
            path = %path.display(),
            records = self.manifest.records.len(),
            "persisted index"
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.manifest.records.len()
    }

    fn embedding_model(&self) -> Option<&str> {
        self.manifest.embedding_model.as_deref()
    }
}

/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
