//! Argument sets: groups of argument slots that share a variable pool.
//!
//! An argument-set declaration is a literal (or conjunction of literals)
//! whose non-`.` slots all belong to the same set. Declarations that
//! share a member are union-merged, so transitively connected slots end
//! up in one set. At finalize every member is written to the `.arg_set`
//! index under the key `<arity>:<slot>` with its 1-based set id (0 is
//! reserved as invalid).

use std::collections::BTreeSet;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::arity::Arity;
use crate::codec;
use crate::error::StoreResult;
use crate::logic::LogicalFunction;
use crate::store::kas::{KasReader, KasWriter};

/// Identifier of a merged argument set; 1-based, 0 invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ArgumentSetId(NonZeroU32);

impl ArgumentSetId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(ArgumentSetId)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ArgumentSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "argset:{}", self.0)
    }
}

/// One argument slot of one predicate.
type Member = (Arity, u16);

/// Compile-time accumulator of argument sets.
#[derive(Debug, Default)]
pub struct ArgumentSetTable {
    sets: Vec<BTreeSet<Member>>,
}

impl ArgumentSetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration. Returns `false` (after a warning) when the
    /// declaration contributes no members.
    pub fn add(&mut self, func: &LogicalFunction) -> bool {
        let mut members: BTreeSet<Member> = BTreeSet::new();
        for lit in func.literals() {
            for (slot, term) in lit.terms.iter().enumerate() {
                if term.as_str() != "." {
                    members.insert((lit.arity.clone(), slot as u16));
                }
            }
        }
        if members.is_empty() {
            warn!("argument-set declaration names no slots and is skipped");
            return false;
        }

        // Union-merge with every existing set that shares a member.
        let (mut merged, disjoint): (Vec<_>, Vec<_>) = std::mem::take(&mut self.sets)
            .into_iter()
            .partition(|set| !set.is_disjoint(&members));
        for set in &mut merged {
            members.append(set);
        }
        self.sets = disjoint;
        self.sets.push(members);
        true
    }

    /// Number of (merged) sets so far.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Flush every member → set-id mapping into the given store.
    pub fn flush(&self, kas: &mut KasWriter) -> StoreResult<()> {
        for (i, set) in self.sets.iter().enumerate() {
            let id = i as u32 + 1;
            for (arity, slot) in set {
                let mut value = Vec::with_capacity(4);
                codec::put_u32(&mut value, id);
                kas.put(&member_key(arity, *slot), &value)?;
            }
        }
        Ok(())
    }
}

/// Key under which a member's set id is stored.
pub fn member_key(arity: &Arity, slot: u16) -> String {
    format!("{arity}:{slot}")
}

/// Decode a set id written by [`ArgumentSetTable::flush`].
pub fn lookup(kas: &KasReader, arity: &Arity, slot: u16) -> Option<ArgumentSetId> {
    let value = kas.get(&member_key(arity, slot))?;
    let raw = codec::ByteReader::new(&value).u32().ok()?;
    ArgumentSetId::new(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Literal, Term};
    use tempfile::TempDir;

    fn decl(predicate: &str, markers: &[&str]) -> LogicalFunction {
        LogicalFunction::literal(Literal::new(
            predicate,
            markers.iter().map(|m| Term::new(*m)),
        ))
    }

    #[test]
    fn dispensable_slots_are_not_members() {
        let mut table = ArgumentSetTable::new();
        assert!(table.add(&decl("p", &["x", ".", "y"])));
        assert_eq!(table.len(), 1);
        assert_eq!(table.sets[0].len(), 2);
    }

    #[test]
    fn empty_declaration_is_skipped() {
        let mut table = ArgumentSetTable::new();
        assert!(!table.add(&decl("p", &[".", "."])));
        assert!(table.is_empty());
    }

    #[test]
    fn shared_member_merges_sets() {
        let mut table = ArgumentSetTable::new();
        // {p/2:0, p/2:1} and {q/1:0} are disjoint...
        table.add(&decl("p", &["x", "y"]));
        table.add(&decl("q", &["z"]));
        assert_eq!(table.len(), 2);
        // ...until a declaration bridges p/2:1 and q/1:0.
        table.add(&LogicalFunction::and(vec![
            decl("p", &[".", "y"]),
            decl("q", &["z"]),
        ]));
        assert_eq!(table.len(), 1);
        assert_eq!(table.sets[0].len(), 3);
    }

    #[test]
    fn flush_and_lookup_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.arg_set.cdb");

        let mut table = ArgumentSetTable::new();
        table.add(&decl("p", &["x", "."]));
        table.add(&decl("q", &["z"]));

        let mut w = KasWriter::create(&path).unwrap();
        table.flush(&mut w).unwrap();
        w.finish().unwrap();

        let r = KasReader::open(&path).unwrap();
        let p0 = lookup(&r, &Arity::new("p/2"), 0).unwrap();
        let q0 = lookup(&r, &Arity::new("q/1"), 0).unwrap();
        assert_ne!(p0, q0);
        assert!(lookup(&r, &Arity::new("p/2"), 1).is_none());
        assert!(lookup(&r, &Arity::new("missing/3"), 0).is_none());
    }
}
