//! Known-faces registry backed by one vector file per name.
//!
//! # Responsibility
//! - Load every `*.json` vector file from the registry directory at startup.
//! - Persist inserts/removals to disk before updating the in-memory map.
//! - Answer first-match queries against the loaded vectors.
//!
//! # Invariants
//! - At most one vector per name; insert overwrites silently.
//! - Each file stores the full name next to its values. The file name is a
//!   bounded escaped prefix of the name plus a SHA-256 digest of it, so its
//!   length does not depend on the name and distinct names never share a file.
//! - Iteration (and therefore first-match) order is ascending name order.

use crate::model::face::FaceEncoding;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const ENCODING_FILE_EXTENSION: &str = "json";
/// Upper bound on the escaped part of a vector file name, in bytes.
const READABLE_PREFIX_MAX: usize = 64;
/// Digest bytes kept in the file name (hex doubles it).
const NAME_DIGEST_BYTES: usize = 16;

/// On-disk layout of one vector file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEncoding {
    name: String,
    #[serde(flatten)]
    encoding: FaceEncoding,
}

/// Error raised by vector file persistence.
#[derive(Debug)]
pub enum FaceStoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Encode {
        name: String,
        source: serde_json::Error,
    },
}

impl Display for FaceStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "face store I/O failed at `{}`: {source}", path.display())
            }
            Self::Encode { name, source } => {
                write!(f, "cannot serialize face vector for `{name}`: {source}")
            }
        }
    }
}

impl Error for FaceStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode { source, .. } => Some(source),
        }
    }
}

/// Name → face vector registry owning its on-disk directory.
#[derive(Debug)]
pub struct FaceRegistry {
    dir: PathBuf,
    known: BTreeMap<String, FaceEncoding>,
}

impl FaceRegistry {
    /// Opens (creating if needed) the registry directory and loads all vectors.
    ///
    /// Files that cannot be decoded are skipped with a warning so a single
    /// damaged file does not take identification down.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FaceStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| FaceStoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let entries = fs::read_dir(&dir).map_err(|source| FaceStoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut known = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| FaceStoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let Some(file_name) = path
                .file_name()
                .and_then(|value| value.to_str())
                .filter(|value| is_encoding_file(value))
            else {
                continue;
            };

            match read_encoding(&path) {
                Ok(stored) if encoding_file_name(&stored.name) != file_name => {
                    warn!(
                        "event=face_registry_load module=face status=skipped path={} error=file name does not match stored name",
                        path.display()
                    );
                }
                Ok(stored) => {
                    known.insert(stored.name, stored.encoding);
                }
                Err(message) => {
                    warn!(
                        "event=face_registry_load module=face status=skipped path={} error={}",
                        path.display(),
                        message
                    );
                }
            }
        }

        info!(
            "event=face_registry_load module=face status=ok dir={} known={}",
            dir.display(),
            known.len()
        );
        Ok(Self { dir, known })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FaceEncoding> {
        self.known.get(name)
    }

    /// Registered names in iteration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.known.keys().map(String::as_str)
    }

    /// Stores `encoding` under `name`, overwriting any previous vector.
    ///
    /// Returns the replaced vector so callers can undo the insert.
    pub fn insert(
        &mut self,
        name: &str,
        encoding: FaceEncoding,
    ) -> Result<Option<FaceEncoding>, FaceStoreError> {
        self.write_file(name, &encoding)?;
        let previous = self.known.insert(name.to_string(), encoding);
        debug!(
            "event=face_registry_insert module=face status=ok replaced={}",
            previous.is_some()
        );
        Ok(previous)
    }

    /// Deletes the vector for `name`. Absence is not an error.
    ///
    /// Returns whether a vector was present.
    pub fn remove(&mut self, name: &str) -> Result<bool, FaceStoreError> {
        let path = self.file_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(FaceStoreError::Io { path, source }),
        }
        Ok(self.known.remove(name).is_some())
    }

    /// Puts `name` back to an earlier state returned by [`insert`](Self::insert).
    pub fn restore(
        &mut self,
        name: &str,
        previous: Option<FaceEncoding>,
    ) -> Result<(), FaceStoreError> {
        match previous {
            Some(encoding) => self.insert(name, encoding).map(|_| ()),
            None => self.remove(name).map(|_| ()),
        }
    }

    /// Linear scan returning the first name whose vector lies within
    /// `tolerance` of `probe`.
    ///
    /// This is first-satisfying-match, not nearest-neighbour: when several
    /// names qualify, the one earliest in name order wins.
    pub fn find_first_match(&self, probe: &FaceEncoding, tolerance: f64) -> Option<&str> {
        self.known
            .iter()
            .find(|(_, known)| known.matches(probe, tolerance))
            .map(|(name, _)| name.as_str())
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(encoding_file_name(name))
    }

    fn write_file(&self, name: &str, encoding: &FaceEncoding) -> Result<(), FaceStoreError> {
        let path = self.file_path(name);
        let staging = path.with_extension(format!("{ENCODING_FILE_EXTENSION}.tmp"));
        let stored = StoredEncoding {
            name: name.to_string(),
            encoding: encoding.clone(),
        };
        let payload = serde_json::to_vec(&stored).map_err(|source| FaceStoreError::Encode {
            name: name.to_string(),
            source,
        })?;

        fs::write(&staging, payload).map_err(|source| FaceStoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| FaceStoreError::Io { path, source })
    }
}

fn read_encoding(path: &Path) -> Result<StoredEncoding, String> {
    let bytes = fs::read(path).map_err(|err| err.to_string())?;
    let stored: StoredEncoding =
        serde_json::from_slice(&bytes).map_err(|err| err.to_string())?;
    if stored.name.is_empty() {
        return Err("empty name".to_string());
    }
    if stored.encoding.is_empty() {
        return Err("empty vector".to_string());
    }
    Ok(stored)
}

fn is_encoding_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext == ENCODING_FILE_EXTENSION)
}

/// Vector file name for `name`.
///
/// The readable part keeps ASCII alphanumerics, `-` and `_` and writes every
/// other UTF-8 byte as `%XX`, stopping before it would exceed
/// 64 bytes. The first 16 bytes of the SHA-256 of the full name follow in hex.
pub fn encoding_file_name(name: &str) -> String {
    let mut prefix = String::new();
    for ch in name.chars() {
        let mut piece = String::new();
        let mut buf = [0u8; 4];
        for byte in ch.encode_utf8(&mut buf).bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                piece.push(char::from(byte));
            } else {
                piece.push_str(&format!("%{byte:02X}"));
            }
        }
        if prefix.len() + piece.len() > READABLE_PREFIX_MAX {
            break;
        }
        prefix.push_str(&piece);
    }

    let digest = Sha256::digest(name.as_bytes());
    let digest = hex::encode(&digest[..NAME_DIGEST_BYTES]);
    format!("{prefix}~{digest}.{ENCODING_FILE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_stay_short_and_distinct() {
        let long = "अ".repeat(200);
        let names = ["Alice", "Mary Jane", "a/b", "a_b", "A B", "A%20B", "José", &long];
        let files: Vec<String> = names.iter().map(|name| encoding_file_name(name)).collect();
        for file in &files {
            assert!(!file.contains('/'));
            assert!(file.len() <= 128, "{file}");
            assert!(is_encoding_file(file));
        }
        for (i, file) in files.iter().enumerate() {
            assert!(!files[i + 1..].contains(file), "{file}");
        }
        assert!(encoding_file_name("Alice").starts_with("Alice~"));
        assert_eq!(encoding_file_name(&long), encoding_file_name(&long));
    }

    #[test]
    fn foreign_files_are_ignored() {
        assert!(!is_encoding_file("Alice.npy"));
        assert!(!is_encoding_file("Alice~00.json.tmp"));
        assert!(is_encoding_file("Alice~00.json"));
    }

    #[test]
    fn stored_name_wins_over_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = FaceRegistry::open(dir.path()).unwrap();
        registry
            .insert("Mary Jane", FaceEncoding::new(vec![0.5, 0.5]))
            .unwrap();

        let raw = fs::read_to_string(dir.path().join(encoding_file_name("Mary Jane"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["name"], "Mary Jane");
        assert_eq!(value["values"], serde_json::json!([0.5, 0.5]));

        fs::write(
            dir.path().join("Renamed~0.json"),
            br#"{"name":"Ghost","values":[0.1]}"#,
        )
        .unwrap();
        let reloaded = FaceRegistry::open(dir.path()).unwrap();
        assert_eq!(reloaded.names().collect::<Vec<_>>(), vec!["Mary Jane"]);
    }

    #[test]
    fn first_match_follows_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = FaceRegistry::open(dir.path()).unwrap();
        registry
            .insert("Zoe", FaceEncoding::new(vec![0.1, 0.0]))
            .unwrap();
        registry
            .insert("Adam", FaceEncoding::new(vec![0.0, 0.1]))
            .unwrap();

        let probe = FaceEncoding::new(vec![0.0, 0.0]);
        assert_eq!(registry.find_first_match(&probe, 0.6), Some("Adam"));
        assert_eq!(registry.find_first_match(&probe, 0.05), None);
    }

    #[test]
    fn restore_undoes_insert() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = FaceRegistry::open(dir.path()).unwrap();
        let first = FaceEncoding::new(vec![1.0]);
        registry.insert("Bob", first.clone()).unwrap();

        let previous = registry.insert("Bob", FaceEncoding::new(vec![2.0])).unwrap();
        registry.restore("Bob", previous).unwrap();
        assert_eq!(registry.get("Bob"), Some(&first));

        let previous = registry.insert("Eve", FaceEncoding::new(vec![3.0])).unwrap();
        registry.restore("Eve", previous).unwrap();
        assert_eq!(registry.get("Eve"), None);
        assert!(!dir.path().join(encoding_file_name("Eve")).exists());
    }
}
