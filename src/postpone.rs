//! Unification postponement: per-arity argument-slot policies.
//!
//! A postponement declaration is an axiom whose body is a single literal
//! with marker terms — `*` (indispensable), `+` (partially indispensable),
//! `.` (dispensable) — one per argument slot. During inference,
//! [`UnificationPostponement::do_postpone`] decides whether unifying two
//! literals of that arity should be deferred, consulting the proof graph
//! only through the narrow [`SubstitutionOracle`] capability.
//!
//! The declaration's parameter string carries the minimum number of
//! matching `+` slots and, optionally, relational-property flags:
//! `"<n>"` or `"<n>/<flag>,<flag>,…"`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::arity::Arity;
use crate::logic::{Axiom, Literal, Op, Term};

/// Per-slot unifiability tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotTag {
    /// `*` — the slot must already be unified.
    Indispensable,
    /// `+` — counts toward the partial-match minimum.
    Partial,
    /// `.` — ignored.
    Dispensable,
}

impl SlotTag {
    /// Parse a marker term. `None` for anything but `*`, `+`, `.`.
    pub fn from_term(term: &Term) -> Option<Self> {
        match term.as_str() {
            "*" => Some(SlotTag::Indispensable),
            "+" => Some(SlotTag::Partial),
            "." => Some(SlotTag::Dispensable),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            SlotTag::Indispensable => '*',
            SlotTag::Partial => '+',
            SlotTag::Dispensable => '.',
        }
    }
}

/// Relational-property flags for a predicate, packed as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RelationFlags(u8);

impl RelationFlags {
    pub const IRREFLEXIVE: RelationFlags = RelationFlags(1 << 0);
    pub const SYMMETRIC: RelationFlags = RelationFlags(1 << 1);
    pub const ASYMMETRIC: RelationFlags = RelationFlags(1 << 2);
    pub const TRANSITIVE: RelationFlags = RelationFlags(1 << 3);
    pub const RIGHT_UNIQUE: RelationFlags = RelationFlags(1 << 4);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: RelationFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RelationFlags) {
        self.0 |= other.0;
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "irreflexive" => Self::IRREFLEXIVE,
            "symmetric" => Self::SYMMETRIC,
            "asymmetric" => Self::ASYMMETRIC,
            "transitive" => Self::TRANSITIVE,
            "right-unique" => Self::RIGHT_UNIQUE,
            _ => return None,
        })
    }
}

/// The proof-graph capability consumed by [`UnificationPostponement`].
///
/// `find_sub_node` reports whether two terms are already co-substituted
/// (bound to each other) in the caller's proof graph, returning the index
/// of the substitution node when they are.
pub trait SubstitutionOracle {
    fn find_sub_node(&self, t1: &Term, t2: &Term) -> Option<usize>;
}

/// Compiled postponement policy for one arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnificationPostponement {
    arity: Arity,
    slots: Vec<SlotTag>,
    min_partial: u32,
    flags: RelationFlags,
}

impl UnificationPostponement {
    /// Build a policy, clamping the requested minimum into
    /// `[0, number of Partial slots]`.
    pub fn new(arity: Arity, slots: Vec<SlotTag>, requested_min: i32, flags: RelationFlags) -> Self {
        let partial = slots.iter().filter(|t| **t == SlotTag::Partial).count() as i32;
        let min_partial = requested_min.clamp(0, partial) as u32;
        Self {
            arity,
            slots,
            min_partial,
            flags,
        }
    }

    /// Decode a policy from a postponement axiom.
    ///
    /// Accepts either a bare literal function or an operator node wrapping
    /// exactly one literal. Returns `None` (with a warning) when the shape
    /// or the marker terms are invalid.
    pub fn from_axiom(axiom: &Axiom) -> Option<Self> {
        let lit = postponement_literal(&axiom.func)?;
        let mut slots = Vec::with_capacity(lit.terms.len());
        for term in &lit.terms {
            match SlotTag::from_term(term) {
                Some(tag) => slots.push(tag),
                None => {
                    warn!(
                        arity = %lit.arity,
                        term = %term,
                        "unification postponement has a non-marker term; ignoring declaration"
                    );
                    return None;
                }
            }
        }
        let (requested_min, flags) = parse_param(axiom.func.param());
        Some(Self::new(lit.arity.clone(), slots, requested_min, flags))
    }

    pub fn arity(&self) -> &Arity {
        &self.arity
    }

    pub fn slots(&self) -> &[SlotTag] {
        &self.slots
    }

    pub fn min_partial(&self) -> u32 {
        self.min_partial
    }

    pub fn flags(&self) -> RelationFlags {
        self.flags
    }

    /// Decide whether unification of `l1` and `l2` should be postponed.
    ///
    /// A slot is *unified* when its terms are equal and the oracle confirms
    /// they are already co-substituted. Any non-unified indispensable slot
    /// postpones immediately; otherwise the count of unified partial slots
    /// must reach the declared minimum.
    pub fn do_postpone(
        &self,
        oracle: &dyn SubstitutionOracle,
        l1: &Literal,
        l2: &Literal,
    ) -> bool {
        if l1.terms.len() != self.slots.len() || l2.terms.len() != self.slots.len() {
            warn!(
                arity = %self.arity,
                expected = self.slots.len(),
                got1 = l1.terms.len(),
                got2 = l2.terms.len(),
                "literal slot count does not match postponement declaration"
            );
            return false;
        }

        let mut unified_partial = 0u32;
        for (i, tag) in self.slots.iter().enumerate() {
            if *tag == SlotTag::Dispensable {
                continue;
            }
            let t1 = &l1.terms[i];
            let t2 = &l2.terms[i];
            let unified = t1 == t2 && oracle.find_sub_node(t1, t2).is_some();

            match tag {
                SlotTag::Indispensable if !unified => return true,
                SlotTag::Partial if unified => unified_partial += 1,
                _ => {}
            }
        }

        unified_partial < self.min_partial
    }
}

/// The single literal of a postponement declaration, if the shape is valid.
fn postponement_literal(func: &crate::logic::LogicalFunction) -> Option<&Literal> {
    if let Some(lit) = func.as_literal() {
        return Some(lit);
    }
    if func.branches().len() == 1 && func.branch(0)?.is_op(Op::Literal) {
        return func.branch(0)?.as_literal();
    }
    warn!("unification postponement is not a single literal; ignoring declaration");
    None
}

/// Parse `"<n>"` or `"<n>/<flag>,<flag>,…"`. A leading `:` on the number
/// is tolerated; missing or unparsable numbers default to 1.
fn parse_param(param: &str) -> (i32, RelationFlags) {
    let (num_part, flag_part) = match param.split_once('/') {
        Some((n, f)) => (n, Some(f)),
        None => (param, None),
    };

    let trimmed = num_part.trim().trim_start_matches(':');
    let n = trimmed.parse::<i32>().unwrap_or(1);

    let mut flags = RelationFlags::empty();
    if let Some(list) = flag_part {
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match RelationFlags::from_name(name) {
                Some(flag) => flags.insert(flag),
                None => warn!(flag = name, "unknown relation flag in postponement parameter"),
            }
        }
    }
    (n, flags)
}
