//! Collaborator stores consulted by the engine
//!
//! The pipeline holds no ambient state. Replay detection reads a signature
//! index and the proof chain reads the athlete's latest hash; both are
//! injected behind these traits. The in-memory implementations allow
//! concurrent reads and serialize writes, and can be snapshotted to JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Index of blueprint signatures already accepted as legitimate assessments
pub trait SignatureIndex: Send + Sync {
    /// Assessment that first recorded `signature`, if any
    fn owner_of(&self, signature: &str) -> Option<String>;

    /// Register `signature` for `assessment_id` if it is not already present.
    ///
    /// Returns `false` when a different assessment already owns it. Must be
    /// atomic: of two concurrent calls with the same signature and different
    /// ids, at most one returns `true`.
    fn record_signature(&self, signature: &str, assessment_id: &str) -> bool;

    fn has_seen_signature(&self, signature: &str) -> bool {
        self.owner_of(signature).is_some()
    }
}

/// Latest proof hash per athlete
pub trait HashLedger: Send + Sync {
    fn previous_hash(&self, athlete_id: &str) -> Option<String>;

    fn append(&self, athlete_id: &str, hash: &str);
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe in-memory signature index
#[derive(Debug, Default)]
pub struct InMemorySignatureIndex {
    signatures: RwLock<BTreeMap<String, String>>,
}

#[derive(Serialize, Deserialize)]
struct SignatureSnapshot {
    signatures: BTreeMap<String, String>,
}

impl InMemorySignatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read(&self.signatures).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.signatures).is_empty()
    }

    /// Load index from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: SignatureSnapshot = serde_json::from_str(json)?;
        Ok(Self {
            signatures: RwLock::new(snapshot.signatures),
        })
    }

    /// Serialize index to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot = SignatureSnapshot {
            signatures: read(&self.signatures).clone(),
        };
        serde_json::to_string_pretty(&snapshot)
    }
}

impl SignatureIndex for InMemorySignatureIndex {
    fn owner_of(&self, signature: &str) -> Option<String> {
        read(&self.signatures).get(signature).cloned()
    }

    fn record_signature(&self, signature: &str, assessment_id: &str) -> bool {
        let mut signatures = write(&self.signatures);
        match signatures.get(signature) {
            Some(owner) => owner == assessment_id,
            None => {
                signatures.insert(signature.to_string(), assessment_id.to_string());
                true
            }
        }
    }
}

/// Thread-safe in-memory hash ledger
#[derive(Debug, Default)]
pub struct InMemoryHashLedger {
    latest: RwLock<BTreeMap<String, String>>,
}

#[derive(Serialize, Deserialize)]
struct LedgerSnapshot {
    latest: BTreeMap<String, String>,
}

impl InMemoryHashLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load ledger from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: LedgerSnapshot = serde_json::from_str(json)?;
        Ok(Self {
            latest: RwLock::new(snapshot.latest),
        })
    }

    /// Serialize ledger to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot = LedgerSnapshot {
            latest: read(&self.latest).clone(),
        };
        serde_json::to_string_pretty(&snapshot)
    }
}

impl HashLedger for InMemoryHashLedger {
    fn previous_hash(&self, athlete_id: &str) -> Option<String> {
        read(&self.latest).get(athlete_id).cloned()
    }

    fn append(&self, athlete_id: &str, hash: &str) {
        write(&self.latest).insert(athlete_id.to_string(), hash.to_string());
    }
}

/// In-memory stores persisted together as one JSON document
#[derive(Debug, Clone, Default)]
pub struct EngineStores {
    pub signatures: Arc<InMemorySignatureIndex>,
    pub ledger: Arc<InMemoryHashLedger>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoresSnapshot {
    #[serde(default)]
    signatures: BTreeMap<String, String>,
    #[serde(default)]
    latest_hashes: BTreeMap<String, String>,
}

impl EngineStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load stores from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: StoresSnapshot = serde_json::from_str(json)?;
        Ok(Self {
            signatures: Arc::new(InMemorySignatureIndex {
                signatures: RwLock::new(snapshot.signatures),
            }),
            ledger: Arc::new(InMemoryHashLedger {
                latest: RwLock::new(snapshot.latest_hashes),
            }),
        })
    }

    /// Serialize stores to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot = StoresSnapshot {
            signatures: read(&self.signatures.signatures).clone(),
            latest_hashes: read(&self.ledger.latest).clone(),
        };
        serde_json::to_string_pretty(&snapshot)
    }
}
