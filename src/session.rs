use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::models::Candidate;

pub const CANDIDATE_ID_KEY: &str = "candidateId";
pub const UUID_KEY: &str = "uuid";
pub const EMAIL_KEY: &str = "email";

/// Key-value storage carrying identity between flows. Injected rather
/// than ambient, so flows can run against an in-memory store in tests.
/// No validation logic lives here.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn clear(&mut self);
}

/// Process-lifetime store, also the test backend.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: BTreeMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

/// JSON-file-backed store, so separate invocations share one session
/// until an explicit sign-out.
pub struct FileSession {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSession {
    pub fn open() -> Result<Self> {
        Self::open_at(Self::default_path())
    }

    pub fn open_at(path: PathBuf) -> Result<Self> {
        let values = match std::fs::read_to_string(&path) {
            // A corrupt session file reads as signed out.
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read session file {}", path.display()));
            }
        };
        Ok(Self { path, values })
    }

    fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "applicant") {
            proj_dirs.data_dir().join("session.json")
        } else {
            PathBuf::from("session.json")
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        Ok(())
    }
}

impl SessionStore for FileSession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        if let Err(err) = self.save() {
            eprintln!("warning: could not persist session: {err:#}");
        }
    }

    fn clear(&mut self) {
        self.values.clear();
        if let Err(err) = self.save() {
            eprintln!("warning: could not persist session: {err:#}");
        }
    }
}

/// The candidate subset that survives in the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub candidate_id: i64,
    pub uuid: String,
    pub email: String,
}

impl SessionIdentity {
    /// None unless a parseable `candidateId` is present; flows gate on
    /// that field alone.
    pub fn load(store: &dyn SessionStore) -> Option<Self> {
        let candidate_id = store.get(CANDIDATE_ID_KEY)?.parse().ok()?;
        Some(Self {
            candidate_id,
            uuid: store.get(UUID_KEY).unwrap_or_default(),
            email: store.get(EMAIL_KEY).unwrap_or_default(),
        })
    }

    /// Persists the identity subset, candidate id in decimal string form.
    pub fn persist(store: &mut dyn SessionStore, candidate: &Candidate) {
        store.set(CANDIDATE_ID_KEY, &candidate.candidate_id.to_string());
        store.set(UUID_KEY, &candidate.uuid);
        store.set(EMAIL_KEY, &candidate.email);
    }
}
