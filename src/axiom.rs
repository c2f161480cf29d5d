//! The axiom database: id allocation and persistent axiom bodies.
//!
//! Ids are handed out in insertion order, 0-based, and double as the
//! dense keys of the `.axioms.idx`/`.axioms.dat` store pair. Anonymous
//! insertions receive a generated `__unnamed_<n>__` name.

use std::path::Path;

use tracing::warn;

use crate::arity::ArityRegistry;
use crate::codec::ByteReader;
use crate::error::StoreResult;
use crate::logic::{Axiom, AxiomId, LogicalFunction};
use crate::store::pbs::{IndexedBlobReader, IndexedBlobWriter};

/// Compile-phase handle: assigns ids and appends axiom records.
pub struct AxiomWriter {
    store: IndexedBlobWriter,
    unnamed_counter: u32,
}

impl AxiomWriter {
    pub fn create(idx_path: &Path, dat_path: &Path) -> StoreResult<Self> {
        Ok(Self {
            store: IndexedBlobWriter::create(idx_path, dat_path)?,
            unnamed_counter: 0,
        })
    }

    /// Persist an axiom, assigning the next id. Empty names are replaced
    /// with a generated one; the resolved name is returned alongside the id.
    ///
    /// Every literal arity in `func` is interned into `registry` as a side
    /// effect of encoding.
    pub fn put(
        &mut self,
        name: &str,
        func: &LogicalFunction,
        registry: &mut ArityRegistry,
    ) -> StoreResult<(AxiomId, String)> {
        let name = if name.is_empty() {
            let generated = format!("__unnamed_{}__", self.unnamed_counter);
            self.unnamed_counter += 1;
            generated
        } else {
            name.to_string()
        };

        let axiom = Axiom {
            id: AxiomId(self.store.len() as u32),
            name,
            func: func.clone(),
        };
        let mut buf = Vec::new();
        axiom.write_binary(registry, &mut buf);
        let key = self.store.append(&buf)?;
        debug_assert_eq!(key, axiom.id.0);
        Ok((axiom.id, axiom.name))
    }

    /// Number of axioms written so far (= the next id).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn finish(self) -> StoreResult<()> {
        self.store.finish()
    }
}

impl std::fmt::Debug for AxiomWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxiomWriter")
            .field("axioms", &self.store.len())
            .finish()
    }
}

/// Query-phase handle: random access to persisted axioms.
#[derive(Debug)]
pub struct AxiomReader {
    store: IndexedBlobReader,
}

impl AxiomReader {
    pub fn open(idx_path: &Path, dat_path: &Path) -> StoreResult<Self> {
        Ok(Self {
            store: IndexedBlobReader::open(idx_path, dat_path)?,
        })
    }

    /// Fetch an axiom by id. Unknown ids and undecodable records yield
    /// `None` with a warning, never an error.
    pub fn get(&self, id: AxiomId, registry: &ArityRegistry) -> Option<Axiom> {
        let Some(record) = self.store.get(id.0) else {
            warn!(%id, "axiom id not found");
            return None;
        };
        match Axiom::read_binary(&mut ByteReader::new(record), registry) {
            Ok(axiom) => Some(axiom),
            Err(e) => {
                warn!(%id, error = %e, "axiom record failed to decode");
                None
            }
        }
    }

    /// Number of stored axioms.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
