use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CacheEntry, CacheKey};
use crate::error::CacheError;
use crate::types::{AlignmentResult, AudioBuffer, DocumentId, Speed, VoiceId};

/// Unbounded tier keyed by (document, unit) that survives restarts.
///
/// Implementations must tolerate concurrent writers for different units.
pub trait PersistentStore: Send + Sync {
    /// `Ok(None)` when nothing usable is stored for `key`, including a record
    /// written under another voice or speed.
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Stores an entry that carries an alignment.
    fn store(&self, key: &CacheKey, audio: &AudioBuffer, alignment: &AlignmentResult)
        -> Result<(), CacheError>;

    fn remove_document(&self, document_id: &DocumentId) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;
}

/// On-disk alignment record, `<root>/<document>/<unit>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub voice: VoiceId,
    pub speed: Speed,
    pub alignment: AlignmentResult,
}

/// Directory-per-document store with a JSON record and a float WAV per unit.
pub struct FileStore {
    root: PathBuf,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn document_dir(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(dir_name(document_id))
    }

    pub fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.document_dir(&key.document_id)
            .join(format!("{}.json", key.unit_index))
    }

    pub fn audio_path(&self, key: &CacheKey) -> PathBuf {
        self.document_dir(&key.document_id)
            .join(format!("{}.wav", key.unit_index))
    }

    fn read_record(&self, key: &CacheKey) -> Result<Option<AlignmentRecord>, CacheError> {
        let data = match fs::read_to_string(self.record_path(key)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io("read alignment record", e)),
        };
        let record: AlignmentRecord = serde_json::from_str(&data)
            .map_err(|e| CacheError::json("parse alignment record", e))?;
        Ok(Some(record))
    }
}

impl PersistentStore for FileStore {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let Some(record) = self.read_record(key)? else {
            return Ok(None);
        };
        if record.voice != key.voice || record.speed != key.speed {
            tracing::debug!(
                document = %key.document_id,
                unit_index = key.unit_index,
                stored_voice = %record.voice,
                stored_speed = %record.speed,
                "cache: persistent record belongs to other settings"
            );
            return Ok(None);
        }
        if record.alignment.unit_index != key.unit_index {
            tracing::debug!(
                document = %key.document_id,
                unit_index = key.unit_index,
                stored_unit = record.alignment.unit_index,
                "cache: persistent record unit index mismatch"
            );
            return Ok(None);
        }

        let audio_path = self.audio_path(key);
        if !audio_path.exists() {
            return Ok(None);
        }
        let audio = read_wav(&audio_path)?;
        Ok(Some(CacheEntry {
            audio: Arc::new(audio),
            alignment: Some(Arc::new(record.alignment)),
        }))
    }

    fn store(
        &self,
        key: &CacheKey,
        audio: &AudioBuffer,
        alignment: &AlignmentResult,
    ) -> Result<(), CacheError> {
        let dir = self.document_dir(&key.document_id);
        fs::create_dir_all(&dir).map_err(|e| CacheError::io("create document directory", e))?;

        // Audio first: a visible record always has its audio next to it.
        let audio_tmp = temp_path(&dir, key.unit_index, "wav");
        if let Err(err) = write_wav(&audio_tmp, audio) {
            let _ = fs::remove_file(&audio_tmp);
            return Err(err);
        }
        fs::rename(&audio_tmp, self.audio_path(key))
            .map_err(|e| CacheError::io("publish audio file", e))?;

        let record = AlignmentRecord {
            voice: key.voice.clone(),
            speed: key.speed,
            alignment: alignment.clone(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| CacheError::json("serialize alignment record", e))?;
        let record_tmp = temp_path(&dir, key.unit_index, "json");
        if let Err(e) = fs::write(&record_tmp, json) {
            let _ = fs::remove_file(&record_tmp);
            return Err(CacheError::io("write alignment record", e));
        }
        fs::rename(&record_tmp, self.record_path(key))
            .map_err(|e| CacheError::io("publish alignment record", e))?;
        Ok(())
    }

    fn remove_document(&self, document_id: &DocumentId) -> Result<(), CacheError> {
        match fs::remove_dir_all(self.document_dir(document_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io("remove document directory", e)),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CacheError::io("list cache root", e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io("list cache root", e))?;
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)
                    .map_err(|e| CacheError::io("remove document directory", e))?;
            }
        }
        Ok(())
    }
}

/// Document ids become directory names: anything outside `[A-Za-z0-9_-]` is
/// replaced so ids cannot escape the cache root.
fn dir_name(document_id: &DocumentId) -> String {
    let name: String = document_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}

fn temp_path(dir: &Path, unit_index: usize, ext: &str) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        ".{unit_index}.{ext}.{}-{n}.tmp",
        std::process::id()
    ))
}

fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<(), CacheError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate_hz,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| CacheError::wav("create audio file", e))?;
    for &sample in &audio.samples {
        writer
            .write_sample(sample)
            .map_err(|e| CacheError::wav("write audio samples", e))?;
    }
    writer
        .finalize()
        .map_err(|e| CacheError::wav("finalize audio file", e))
}

fn read_wav(path: &Path) -> Result<AudioBuffer, CacheError> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| CacheError::wav("open audio file", e))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CacheError::wav("read audio samples", e))?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << spec.bits_per_sample.saturating_sub(1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CacheError::wav("read audio samples", e))?
        }
    };
    Ok(AudioBuffer {
        samples,
        sample_rate_hz: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlignmentPrecision, WordTiming};

    fn key(doc: &str, unit: usize, voice: &str) -> CacheKey {
        CacheKey::new(DocumentId::new(doc), unit, VoiceId::new(voice), Speed::NORMAL)
    }

    fn audio() -> AudioBuffer {
        AudioBuffer {
            samples: vec![0.0, 0.25, -0.5, 1.0],
            sample_rate_hz: 16_000,
        }
    }

    fn alignment(unit_index: usize) -> AlignmentResult {
        AlignmentResult {
            unit_index,
            total_duration_secs: 0.5,
            words: vec![WordTiming {
                word: "hi".to_string(),
                start_secs: 0.0,
                duration_secs: 0.5,
                range: 0..2,
            }],
            precision: AlignmentPrecision::Phoneme,
        }
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let k = key("book", 4, "alto");
        store.store(&k, &audio(), &alignment(4)).unwrap();
        assert!(store.record_path(&k).exists());
        assert!(store.audio_path(&k).exists());

        let entry = store.load(&k).unwrap().expect("stored entry");
        assert_eq!(*entry.audio, audio());
        assert_eq!(entry.alignment.as_deref(), Some(&alignment(4)));
    }

    #[test]
    fn other_voice_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store
            .store(&key("book", 0, "alto"), &audio(), &alignment(0))
            .unwrap();
        assert!(store.load(&key("book", 0, "bass")).unwrap().is_none());
        let faster = CacheKey::new(
            DocumentId::new("book"),
            0,
            VoiceId::new("alto"),
            Speed::new(1.5),
        );
        assert!(store.load(&faster).unwrap().is_none());
    }

    #[test]
    fn missing_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("never-created"));
        assert!(store.load(&key("book", 0, "alto")).unwrap().is_none());
        store.remove_document(&DocumentId::new("book")).unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let k = key("book", 0, "alto");
        fs::create_dir_all(store.document_dir(&k.document_id)).unwrap();
        fs::write(store.record_path(&k), "{not json").unwrap();
        assert!(matches!(store.load(&k), Err(CacheError::Json { .. })));
    }

    #[test]
    fn remove_document_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.store(&key("a", 0, "v"), &audio(), &alignment(0)).unwrap();
        store.store(&key("b", 0, "v"), &audio(), &alignment(0)).unwrap();

        store.remove_document(&DocumentId::new("a")).unwrap();
        assert!(store.load(&key("a", 0, "v")).unwrap().is_none());
        assert!(store.load(&key("b", 0, "v")).unwrap().is_some());

        store.clear().unwrap();
        assert!(store.load(&key("b", 0, "v")).unwrap().is_none());
    }

    #[test]
    fn document_ids_stay_inside_root() {
        let store = FileStore::new("/cache");
        let dir = store.document_dir(&DocumentId::new("../etc/passwd"));
        assert_eq!(dir, PathBuf::from("/cache/___etc_passwd"));
        assert_eq!(
            store.document_dir(&DocumentId::new("")),
            PathBuf::from("/cache/_")
        );
    }
}
