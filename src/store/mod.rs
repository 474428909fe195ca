//! JSON snapshot persistence for the ledger state file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::ledger::{compute_state_digest, Ledger, LedgerSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file {path} already exists, refusing to overwrite")]
    AlreadyExists { path: PathBuf },
    #[error("state file {path} not found")]
    NotFound { path: PathBuf },
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed state file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("state digest mismatch in {path}: stored {stored}, computed {computed}")]
    DigestMismatch {
        path: PathBuf,
        stored: String,
        computed: String,
    },
    #[error("total supply {total_supply} does not match the sum of balances {sum} in {path}")]
    SupplyMismatch {
        path: PathBuf,
        total_supply: u64,
        sum: u64,
    },
}

/// Read the snapshot, check its integrity, and rebuild the ledger.
pub fn load(path: &Path) -> Result<Ledger, StoreError> {
    let snapshot = read_snapshot(path)?;
    Ok(Ledger::restore(snapshot))
}

/// Parse and integrity-check a snapshot without rebuilding the ledger.
/// Returns the verified digest for display.
pub fn verify(path: &Path) -> Result<String, StoreError> {
    let snapshot = read_snapshot(path)?;
    Ok(snapshot.state_digest)
}

/// Persist the ledger, replacing an existing state file. The snapshot is
/// written to a sibling temp file first and renamed into place so a crash
/// mid-write never leaves a truncated state file behind.
pub fn save(path: &Path, ledger: &Ledger) -> Result<(), StoreError> {
    let snapshot = ledger.snapshot();
    let body = serde_json::to_string_pretty(&snapshot).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, body.as_bytes()).map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist a freshly deployed ledger; fails if the state file exists.
pub fn create_new(path: &Path, ledger: &Ledger) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    save(path, ledger)
}

fn read_snapshot(path: &Path) -> Result<LedgerSnapshot, StoreError> {
    let body = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let snapshot: LedgerSnapshot =
        serde_json::from_str(&body).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    let computed = hex::encode(compute_state_digest(
        &snapshot.meta,
        &snapshot.admin,
        snapshot.total_supply,
        &snapshot.balances,
        &snapshot.allowances,
    ));
    if computed != snapshot.state_digest {
        return Err(StoreError::DigestMismatch {
            path: path.to_path_buf(),
            stored: snapshot.state_digest,
            computed,
        });
    }
    let sum: u64 = snapshot.balances.values().sum();
    if sum != snapshot.total_supply {
        return Err(StoreError::SupplyMismatch {
            path: path.to_path_buf(),
            total_supply: snapshot.total_supply,
            sum,
        });
    }
    Ok(snapshot)
}
