//! Arities and the arity registry.
//!
//! An [`Arity`] is the textual identifier `predicate/slot_count` (e.g.
//! `buy/3`) that names a predicate together with its argument count. The
//! [`ArityRegistry`] interns every arity seen during compilation to a dense
//! [`ArityId`], and is the coordinate system of the reachable matrix.
//!
//! Id 0 is reserved as invalid, so `Option<ArityId>` costs nothing extra.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::num::NonZeroU32;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::{self, ByteReader};
use crate::error::{StoreError, StoreResult};

/// Textual arity identifier of the form `name/k`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Arity(String);

impl Arity {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Build an arity from a predicate name and slot count.
    pub fn from_parts(predicate: &str, slots: usize) -> Self {
        Self(format!("{predicate}/{slots}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The predicate name (everything before the final `/`).
    pub fn predicate(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[..i],
            None => &self.0,
        }
    }

    /// The declared slot count, if the suffix parses.
    pub fn slot_count(&self) -> Option<usize> {
        self.0.rfind('/').and_then(|i| self.0[i + 1..].parse().ok())
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Arity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Dense, niche-optimized arity identifier.
///
/// Uses `NonZeroU32` so that `Option<ArityId>` is the same size as `ArityId`;
/// the reserved raw value 0 is the `None` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ArityId(NonZeroU32);

impl ArityId {
    /// Create an `ArityId` from a raw `u32`. Returns `None` for the reserved 0.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(ArityId)
    }

    /// The underlying `u32` value (1-based).
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Position in the registry's dense vector.
    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl std::fmt::Display for ArityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "arity:{}", self.0)
    }
}

/// Bidirectional arity ↔ id interner.
///
/// Ids are assigned monotonically starting at 1 in `add` order and are
/// stable for the lifetime of a compiled knowledge base. The in-memory
/// form is authoritative during compilation; queries load it back from
/// the persisted blob.
#[derive(Debug, Default)]
pub struct ArityRegistry {
    arities: Vec<Arity>,
    index: HashMap<Arity, ArityId>,
}

impl ArityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an arity, returning its existing id or assigning the next one.
    pub fn add(&mut self, arity: &Arity) -> ArityId {
        if let Some(&id) = self.index.get(arity) {
            return id;
        }
        let id = ArityId::new(self.arities.len() as u32 + 1).expect("ids start at 1");
        self.arities.push(arity.clone());
        self.index.insert(arity.clone(), id);
        id
    }

    /// Look up the id of a registered arity.
    pub fn id_of(&self, arity: &Arity) -> Option<ArityId> {
        self.index.get(arity).copied()
    }

    /// Look up the arity behind an id.
    pub fn arity_of(&self, id: ArityId) -> Option<&Arity> {
        self.arities.get(id.index())
    }

    /// Number of registered arities.
    pub fn len(&self) -> usize {
        self.arities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arities.is_empty()
    }

    /// Iterate all assigned ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ArityId> + '_ {
        (1..=self.arities.len() as u32).map(|raw| ArityId::new(raw).expect("non-zero"))
    }

    /// Persist as a single blob: `count: u64`, then length-prefixed strings
    /// in id order.
    pub fn write_to(&self, path: &Path) -> StoreResult<()> {
        let file = File::create(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut w = BufWriter::new(file);

        let mut buf = Vec::new();
        codec::put_u64(&mut buf, self.arities.len() as u64);
        for arity in &self.arities {
            codec::put_str(&mut buf, arity.as_str());
        }
        w.write_all(&buf).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        w.into_inner()
            .map_err(|e| StoreError::Io {
                path: path.display().to_string(),
                source: e.into_error(),
            })?
            .sync_all()
            .map_err(|e| StoreError::Io {
                path: path.display().to_string(),
                source: e,
            })
    }

    /// Load a registry persisted by [`write_to`](Self::write_to).
    pub fn read_from(path: &Path) -> StoreResult<Self> {
        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(|e| StoreError::Io {
                path: path.display().to_string(),
                source: e,
            })?;

        let mut r = ByteReader::new(&bytes);
        let malformed = |message: String| StoreError::Malformed {
            path: path.display().to_string(),
            message,
        };

        let count = r.u64().map_err(|e| malformed(e.to_string()))?;
        let mut registry = Self::new();
        for _ in 0..count {
            let s = r.string().map_err(|e| malformed(e.to_string()))?;
            registry.add(&Arity::new(s));
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn arity_id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<ArityId>>(),
            std::mem::size_of::<ArityId>()
        );
        assert!(ArityId::new(0).is_none());
        assert_eq!(ArityId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn arity_parts() {
        let a = Arity::from_parts("buy", 3);
        assert_eq!(a.as_str(), "buy/3");
        assert_eq!(a.predicate(), "buy");
        assert_eq!(a.slot_count(), Some(3));
        assert_eq!(Arity::new("nonsense").slot_count(), None);
    }

    #[test]
    fn add_is_idempotent_and_monotonic() {
        let mut reg = ArityRegistry::new();
        let p = reg.add(&Arity::new("p/1"));
        let q = reg.add(&Arity::new("q/2"));
        assert_eq!(p.get(), 1);
        assert_eq!(q.get(), 2);
        assert_eq!(reg.add(&Arity::new("p/1")), p);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn round_trips_both_directions() {
        let mut reg = ArityRegistry::new();
        for s in ["p/1", "q/2", "r/3"] {
            let a = Arity::new(s);
            let id = reg.add(&a);
            assert_eq!(reg.id_of(&a), Some(id));
            assert_eq!(reg.arity_of(id), Some(&a));
        }
        assert_eq!(reg.arity_of(ArityId::new(99).unwrap()), None);
        assert_eq!(reg.id_of(&Arity::new("missing/1")), None);
    }

    #[test]
    fn persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.arity.dat");

        let mut reg = ArityRegistry::new();
        reg.add(&Arity::new("p/1"));
        reg.add(&Arity::new("q/2"));
        reg.add(&Arity::new("犬/1"));
        reg.write_to(&path).unwrap();

        let loaded = ArityRegistry::read_from(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.id_of(&Arity::new("q/2")).unwrap().get(), 2);
        assert_eq!(
            loaded.arity_of(ArityId::new(3).unwrap()).unwrap().as_str(),
            "犬/1"
        );
    }

    #[test]
    fn empty_registry_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.arity.dat");
        ArityRegistry::new().write_to(&path).unwrap();
        assert!(ArityRegistry::read_from(&path).unwrap().is_empty());
    }
}
