//! CheckpointStore trait and implementations
//!
//! Persists the poller watermark so a restarted listener resumes where it
//! stopped. The seen-set is never persisted.

use crate::records::Checkpoint;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::collections::HashMap;
use std::path::Path;

const CHECKPOINTS_CF: &str = "checkpoints";

/// Storage for per-contract checkpoints.
pub trait CheckpointStore: Send {
    /// Last checkpoint written for `contract`.
    fn load(&self, contract: Address) -> Result<Option<Checkpoint>>;

    /// Replace the checkpoint for `checkpoint.contract`.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()>;
}

/// RocksDB-backed checkpoint store.
///
/// One column family, keyed by the 20-byte contract address.
pub struct RocksCheckpointStore {
    db: DB,
}

impl RocksCheckpointStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let column_families = vec![ColumnFamilyDescriptor::new(
            CHECKPOINTS_CF,
            Options::default(),
        )];

        let db = DB::open_cf_descriptors(&opts, path, column_families)
            .context("Failed to open RocksDB database")?;

        Ok(Self { db })
    }

    fn get_cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CHECKPOINTS_CF)
            .with_context(|| format!("Column family '{}' not found", CHECKPOINTS_CF))
    }
}

impl CheckpointStore for RocksCheckpointStore {
    fn load(&self, contract: Address) -> Result<Option<Checkpoint>> {
        let cf = self.get_cf()?;
        match self
            .db
            .get_cf(cf, contract.as_slice())
            .context("Failed to get checkpoint")?
        {
            Some(bytes) => Ok(Some(Checkpoint::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        let cf = self.get_cf()?;
        let value = checkpoint.encode()?;
        self.db
            .put_cf(cf, checkpoint.contract.as_slice(), &value)
            .context("Failed to put checkpoint")?;
        Ok(())
    }
}

/// In-memory checkpoint store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: HashMap<Address, Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, contract: Address) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.get(&contract).cloned())
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints.insert(checkpoint.contract, checkpoint.clone());
        Ok(())
    }
}
