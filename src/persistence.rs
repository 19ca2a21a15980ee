//! Artifact persistence
//!
//! Writes vocabularies, split dictionaries, n-hop sets and the adjacency matrix
//! into one output directory. Each artifact is hashed with blake3 while it is
//! written; `manifest.json` lists every artifact and is written last, so an
//! output directory without a manifest (or with a manifest whose digests no
//! longer match) is an incomplete run.

use crate::config::{ArtifactFormat, PrepConfig};
use crate::error::{PrepError, Result};
use crate::pipeline::PipelineSummary;
use ndarray::Array2;
use ndarray_npy::WriteNpyExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ADJACENCY_STEM: &str = "kg_adj_mat";

/// One written artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub file: String,
    pub bytes: u64,
    pub blake3: String,
}

/// Index of a complete output set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub created_epoch_s: u64,
    pub format: ArtifactFormat,
    pub config: PrepConfig,
    pub summary: PipelineSummary,
    pub artifacts: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let file = File::open(&path).map_err(|e| PrepError::io(&path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| PrepError::encode(&path, e))
    }

    /// Names of artifacts whose size or digest no longer matches
    pub fn verify(&self, dir: &Path) -> Result<Vec<String>> {
        let mut mismatched = Vec::new();
        for entry in &self.artifacts {
            let path = dir.join(&entry.file);
            let (bytes, digest) = hash_file(&path)?;
            if bytes != entry.bytes || digest != entry.blake3 {
                log::warn!("Artifact {} does not match manifest", path.display());
                mismatched.push(entry.name.clone());
            }
        }
        Ok(mismatched)
    }

    pub fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.artifacts.iter().find(|e| e.name == name)
    }
}

/// Writes artifacts into the output directory and records them for the manifest
pub struct ArtifactWriter {
    dir: PathBuf,
    format: ArtifactFormat,
    entries: Vec<ManifestEntry>,
}

impl ArtifactWriter {
    /// Create the output directory if it does not exist yet. A manifest left
    /// by an earlier run is removed, so a run that fails part way leaves none.
    pub fn new(dir: &Path, format: ArtifactFormat) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| PrepError::io(dir, e))?;
        let stale = dir.join(MANIFEST_FILE);
        match std::fs::remove_file(&stale) {
            Ok(()) => log::debug!("Removed previous manifest {}", stale.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PrepError::io(&stale, e)),
        }
        log::info!("Writing artifacts to {} ({})", dir.display(), format);
        Ok(Self {
            dir: dir.to_path_buf(),
            format,
            entries: Vec::new(),
        })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Serialize `value` as `<stem>.<ext>` in the configured format
    pub fn write<T: Serialize + ?Sized>(&mut self, stem: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.{}", stem, self.format.extension()));
        let format = self.format;
        self.write_with(stem, &path, |writer| match format {
            ArtifactFormat::Bincode => {
                bincode::serialize_into(writer, value).map_err(|e| e.to_string())
            }
            ArtifactFormat::Json => {
                serde_json::to_writer_pretty(writer, value).map_err(|e| e.to_string())
            }
        })?;
        Ok(path)
    }

    /// Write a dense matrix as `<stem>.npy`
    pub fn write_matrix(&mut self, stem: &str, matrix: &Array2<u8>) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.npy", stem));
        self.write_with(stem, &path, |writer| {
            matrix.write_npy(writer).map_err(|e| e.to_string())
        })?;
        Ok(path)
    }

    fn write_with<F>(&mut self, name: &str, path: &Path, encode: F) -> Result<()>
    where
        F: FnOnce(&mut HashingWriter<BufWriter<File>>) -> std::result::Result<(), String>,
    {
        let file = File::create(path).map_err(|e| PrepError::io(path, e))?;
        let mut writer = HashingWriter::new(BufWriter::new(file));
        encode(&mut writer).map_err(|reason| PrepError::encode(path, reason))?;
        writer.flush().map_err(|e| PrepError::io(path, e))?;

        let entry = ManifestEntry {
            name: name.to_string(),
            file: file_name(path),
            bytes: writer.bytes,
            blake3: writer.hasher.finalize().to_hex().to_string(),
        };
        log::info!("Wrote {} ({} bytes)", path.display(), entry.bytes);
        self.entries.push(entry);
        Ok(())
    }

    /// Write `manifest.json`, marking the output set complete
    pub fn finish(self, config: &PrepConfig, summary: &PipelineSummary) -> Result<Manifest> {
        let manifest = Manifest {
            created_epoch_s: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            format: self.format,
            config: config.clone(),
            summary: summary.clone(),
            artifacts: self.entries,
        };

        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| PrepError::encode(&path, e))?;
        std::fs::write(&path, json).map_err(|e| PrepError::io(&path, e))?;
        log::info!("Wrote manifest with {} artifacts", manifest.artifacts.len());
        Ok(manifest)
    }
}

/// Load an artifact written by [`ArtifactWriter::write`]
pub fn read_artifact<T: DeserializeOwned>(path: &Path, format: ArtifactFormat) -> Result<T> {
    let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
    let reader = BufReader::new(file);
    match format {
        ArtifactFormat::Bincode => {
            bincode::deserialize_from(reader).map_err(|e| PrepError::encode(path, e))
        }
        ArtifactFormat::Json => {
            serde_json::from_reader(reader).map_err(|e| PrepError::encode(path, e))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn hash_file(path: &Path) -> Result<(u64, String)> {
    let mut file = File::open(path).map_err(|e| PrepError::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf).map_err(|e| PrepError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((total, hasher.finalize().to_hex().to_string()))
}

/// Forwards writes while hashing and counting them
struct HashingWriter<W> {
    inner: W,
    hasher: blake3::Hasher,
    bytes: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            bytes: 0,
        }
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawId, Vocab};
    use tempfile::tempdir;

    #[test]
    fn test_creates_missing_output_dir() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("results");
        let writer = ArtifactWriter::new(&out, ArtifactFormat::Bincode).unwrap();
        assert!(out.is_dir());
        assert!(writer.entries().is_empty());
    }

    #[test]
    fn test_new_removes_previous_manifest() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join(MANIFEST_FILE);
        std::fs::write(&stale, "{}").unwrap();

        let _writer = ArtifactWriter::new(dir.path(), ArtifactFormat::Bincode).unwrap();
        assert!(!stale.exists());
        assert!(Manifest::load(dir.path()).is_err());
    }

    #[test]
    fn test_write_and_read_back_vocab() {
        let dir = tempdir().unwrap();
        let vocab: Vocab<RawId> = [101, 55, 9].into_iter().collect();

        for format in [ArtifactFormat::Bincode, ArtifactFormat::Json] {
            let mut writer = ArtifactWriter::new(dir.path(), format).unwrap();
            let path = writer.write("item_vocab", &vocab).unwrap();
            let back: Vocab<RawId> = read_artifact(&path, format).unwrap();
            assert_eq!(back, vocab);
            assert_eq!(writer.entries()[0].file, format!("item_vocab.{}", format.extension()));
        }
    }

    #[test]
    fn test_matrix_is_npy() {
        let dir = tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path(), ArtifactFormat::Bincode).unwrap();
        let matrix = Array2::<u8>::eye(3);
        let path = writer.write_matrix(ADJACENCY_STEM, &matrix).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..6], b"\x93NUMPY");
        assert_eq!(writer.entries()[0].bytes, bytes.len() as u64);
    }

    #[test]
    fn test_manifest_detects_tampering() {
        let dir = tempdir().unwrap();
        let config = PrepConfig {
            output_dir: dir.path().to_path_buf(),
            ..PrepConfig::default()
        };
        let mut writer = ArtifactWriter::new(dir.path(), ArtifactFormat::Json).unwrap();
        let vocab: Vocab<String> = ["rel_a".to_string()].into_iter().collect();
        let path = writer.write("relation_vocab", &vocab).unwrap();
        writer.finish(&config, &PipelineSummary::default()).unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.entry("relation_vocab").is_some());
        assert!(manifest.verify(dir.path()).unwrap().is_empty());

        std::fs::write(&path, "{}").unwrap();
        assert_eq!(manifest.verify(dir.path()).unwrap(), vec!["relation_vocab".to_string()]);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        assert!(matches!(Manifest::load(dir.path()), Err(PrepError::Io { .. })));
    }
}
