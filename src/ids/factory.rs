//! Factories creating and handing out id generators keyed by entity type.
//!
//! The table of opened generators is owned by the factory, whose lifetime is
//! tied to the store-open scope; there is no process-wide registry. Each
//! entry has its own synchronization domain, so concurrent allocation across
//! different id types never contends.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::ids::{IdGenerator, IdType};

/// Creates, opens, and retrieves [`IdGenerator`]s keyed by [`IdType`].
///
/// `get` for a type that was never opened or created is a programming error
/// in the store-opening sequence and panics.
pub trait IdGeneratorFactory {
    /// Opens the generator for `id_type`, restoring persisted state when it
    /// is valid and invoking `high_id_scanner` otherwise.
    fn open(
        &self,
        dir: &Path,
        id_type: IdType,
        high_id_scanner: &dyn Fn() -> u64,
        max_id: u64,
    ) -> Result<Arc<IdGenerator>>;

    /// Establishes a fresh id space at `high_id`; fails when
    /// `throw_if_exists` is set and prior state exists.
    fn create(
        &self,
        dir: &Path,
        id_type: IdType,
        high_id: u64,
        throw_if_exists: bool,
        max_id: u64,
    ) -> Result<Arc<IdGenerator>>;

    /// Returns the previously opened or created generator for `id_type`.
    ///
    /// # Panics
    ///
    /// Panics when no generator for `id_type` has been opened or created.
    fn get(&self, id_type: IdType) -> Arc<IdGenerator>;
}

/// Live factory backed by persisted per-space id files in the store
/// directory.
#[derive(Default)]
pub struct DefaultIdGeneratorFactory {
    generators: DashMap<IdType, Arc<IdGenerator>>,
}

impl DefaultIdGeneratorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists every opened generator's state.
    pub fn checkpoint_all(&self) -> Result<()> {
        for entry in self.generators.iter() {
            entry.value().checkpoint()?;
        }
        Ok(())
    }
}

impl IdGeneratorFactory for DefaultIdGeneratorFactory {
    fn open(
        &self,
        dir: &Path,
        id_type: IdType,
        high_id_scanner: &dyn Fn() -> u64,
        max_id: u64,
    ) -> Result<Arc<IdGenerator>> {
        let path = dir.join(id_type.file_name());
        let generator = Arc::new(IdGenerator::open(path, id_type, high_id_scanner, max_id)?);
        self.generators.insert(id_type, generator.clone());
        Ok(generator)
    }

    fn create(
        &self,
        dir: &Path,
        id_type: IdType,
        high_id: u64,
        throw_if_exists: bool,
        max_id: u64,
    ) -> Result<Arc<IdGenerator>> {
        let path = dir.join(id_type.file_name());
        let generator = Arc::new(IdGenerator::create(
            path,
            id_type,
            high_id,
            throw_if_exists,
            max_id,
        )?);
        self.generators.insert(id_type, generator.clone());
        Ok(generator)
    }

    fn get(&self, id_type: IdType) -> Arc<IdGenerator> {
        match self.generators.get(&id_type) {
            Some(generator) => generator.clone(),
            None => panic!("id generator for {id_type} not opened; store-opening sequence is wrong"),
        }
    }
}

/// Migration-mode factory: ignores persisted id files entirely and builds
/// frozen generators from the high-id scanner alone.
///
/// The first `open` (or `create`) for a type scans and memoizes; every later
/// call for that type returns the memoized instance, ignoring its arguments.
/// First scan wins. Migration never allocates in the old store, so the
/// frozen generators reject mutation outright.
#[derive(Default)]
pub struct ScanOnOpenIdGeneratorFactory {
    generators: DashMap<IdType, Arc<IdGenerator>>,
}

impl ScanOnOpenIdGeneratorFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGeneratorFactory for ScanOnOpenIdGeneratorFactory {
    fn open(
        &self,
        _dir: &Path,
        id_type: IdType,
        high_id_scanner: &dyn Fn() -> u64,
        _max_id: u64,
    ) -> Result<Arc<IdGenerator>> {
        let generator = self
            .generators
            .entry(id_type)
            .or_insert_with(|| {
                let high_id = high_id_scanner();
                debug!("frozen {} id space at scanned high id {}", id_type, high_id);
                Arc::new(IdGenerator::frozen(id_type, high_id))
            })
            .clone();
        Ok(generator)
    }

    fn create(
        &self,
        dir: &Path,
        id_type: IdType,
        high_id: u64,
        _throw_if_exists: bool,
        max_id: u64,
    ) -> Result<Arc<IdGenerator>> {
        self.open(dir, id_type, &|| high_id, max_id)
    }

    fn get(&self, id_type: IdType) -> Arc<IdGenerator> {
        match self.generators.get(&id_type) {
            Some(generator) => generator.clone(),
            None => panic!("id generator for {id_type} not opened; store-opening sequence is wrong"),
        }
    }
}
