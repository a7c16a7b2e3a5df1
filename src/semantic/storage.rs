//! Binary storage for note embeddings.
//!
//! File format: vectors.bin
//!
//! Header (47 bytes):
//! - version: u8 (2)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated):
//! - id_len: u16 (little-endian)
//! - id: [u8; id_len] (utf-8 note id)
//! - updated_at: i64 (unix millis, little-endian)
//! - embedding: [f32; dimensions] (little-endian)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::note_id::NoteId;
use crate::semantic::embeddings::model_id_hash;
use crate::semantic::index::{EmbeddingIndex, EmbeddingRecord};

const FORMAT_VERSION: u8 = 2;

/// version(1) + model_id(32) + dimensions(2) + entry_count(8) + checksum(4)
const HEADER_SIZE: usize = 47;

#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}

pub struct VectorStorage {
    path: PathBuf,
}

impl VectorStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Vector width recorded in the file header.
    pub fn stored_dimensions(&self) -> Result<usize, VectorStorageError> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        Ok(read_header(&mut reader)?.dimensions as usize)
    }

    /// Load embeddings written for `model` with `dimensions`.
    pub fn load(
        &self,
        model: &str,
        dimensions: usize,
    ) -> Result<EmbeddingIndex, VectorStorageError> {
        let mut reader = BufReader::new(File::open(&self.path)?);

        let header = read_header(&mut reader)?;
        if header.version != FORMAT_VERSION {
            return Err(VectorStorageError::VersionMismatch(header.version, FORMAT_VERSION));
        }
        if header.model_id != model_id_hash(model) {
            return Err(VectorStorageError::ModelMismatch);
        }
        if header.dimensions as usize != dimensions {
            return Err(VectorStorageError::DimensionMismatch {
                expected: dimensions,
                got: header.dimensions as usize,
            });
        }

        let index = EmbeddingIndex::new(model, dimensions);
        for _ in 0..header.entry_count {
            let record = read_entry(&mut reader, model, dimensions)?;
            // zero-norm vectors are skipped
            if let Err(e) = index.insert_record(record) {
                log::debug!("skipping stored vector: {e}");
            }
        }

        Ok(index)
    }

    /// Load, or start empty when the file is missing or was written for another model.
    pub fn load_or_empty(
        &self,
        model: &str,
        dimensions: usize,
    ) -> Result<EmbeddingIndex, VectorStorageError> {
        if !self.exists() {
            log::info!("no stored embeddings, starting fresh");
            return Ok(EmbeddingIndex::new(model, dimensions));
        }

        match self.load(model, dimensions) {
            Ok(index) => {
                log::info!("loaded {} vectors from storage", index.len());
                Ok(index)
            }
            Err(VectorStorageError::ModelMismatch)
            | Err(VectorStorageError::DimensionMismatch { .. }) => {
                log::warn!("model changed, starting with empty embeddings");
                Ok(EmbeddingIndex::new(model, dimensions))
            }
            Err(VectorStorageError::VersionMismatch(file_ver, _)) => {
                log::warn!(
                    "storage version {file_ver} unsupported, starting with empty embeddings"
                );
                Ok(EmbeddingIndex::new(model, dimensions))
            }
            Err(e) => Err(e),
        }
    }

    /// Write temp file, fsync, rename.
    pub fn save(&self, index: &EmbeddingIndex) -> Result<(), VectorStorageError> {
        let temp_path = self.path.with_extension("tmp");

        if let Err(e) = write_to_file(&temp_path, index) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn write_to_file(path: &Path, index: &EmbeddingIndex) -> Result<(), VectorStorageError> {
    let dimensions = u16::try_from(index.dimensions()).map_err(|_| {
        VectorStorageError::InvalidFormat(format!(
            "{} dimensions do not fit u16",
            index.dimensions()
        ))
    })?;

    let records = index.records();
    let mut writer = BufWriter::new(File::create(path)?);

    let mut header_bytes = [0u8; HEADER_SIZE];
    header_bytes[0] = FORMAT_VERSION;
    header_bytes[1..33].copy_from_slice(&model_id_hash(index.model()));
    header_bytes[33..35].copy_from_slice(&dimensions.to_le_bytes());
    header_bytes[35..43].copy_from_slice(&(records.len() as u64).to_le_bytes());
    let checksum = crc32fast::hash(&header_bytes[0..43]);
    header_bytes[43..47].copy_from_slice(&checksum.to_le_bytes());
    writer.write_all(&header_bytes)?;

    for record in &records {
        let id = record.id.as_bytes();
        let id_len = u16::try_from(id.len()).map_err(|_| {
            VectorStorageError::InvalidFormat(format!("note id too long: {}", record.id))
        })?;

        writer.write_all(&id_len.to_le_bytes())?;
        writer.write_all(id)?;
        writer.write_all(&record.updated_at.timestamp_millis().to_le_bytes())?;
        for &value in &record.vector {
            writer.write_all(&value.to_le_bytes())?;
        }
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    Ok(())
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header, VectorStorageError> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;

    let stored_checksum = u32::from_le_bytes([bytes[43], bytes[44], bytes[45], bytes[46]]);
    if crc32fast::hash(&bytes[0..43]) != stored_checksum {
        return Err(VectorStorageError::ChecksumMismatch);
    }

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&bytes[1..33]);

    let mut count = [0u8; 8];
    count.copy_from_slice(&bytes[35..43]);

    Ok(Header {
        version: bytes[0],
        model_id,
        dimensions: u16::from_le_bytes([bytes[33], bytes[34]]),
        entry_count: u64::from_le_bytes(count),
    })
}

fn read_entry<R: Read>(
    reader: &mut R,
    model: &str,
    dimensions: usize,
) -> Result<EmbeddingRecord, VectorStorageError> {
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes)?;

    let mut id_bytes = vec![0u8; u16::from_le_bytes(len_bytes) as usize];
    reader.read_exact(&mut id_bytes)?;
    let id = String::from_utf8(id_bytes)
        .map_err(|e| VectorStorageError::InvalidFormat(format!("note id is not utf-8: {e}")))?;

    let mut millis = [0u8; 8];
    reader.read_exact(&mut millis)?;
    let updated_at = DateTime::<Utc>::from_timestamp_millis(i64::from_le_bytes(millis))
        .ok_or_else(|| VectorStorageError::InvalidFormat("timestamp out of range".to_string()))?;

    let mut vector = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        let mut float_bytes = [0u8; 4];
        reader.read_exact(&mut float_bytes)?;
        vector.push(f32::from_le_bytes(float_bytes));
    }

    Ok(EmbeddingRecord {
        id: NoteId::from(id),
        vector,
        model: model.to_string(),
        updated_at,
    })
}
