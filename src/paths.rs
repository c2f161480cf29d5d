//! On-disk layout of a compiled knowledge base.
//!
//! Every file of a knowledge base shares a caller-chosen prefix; this
//! module derives the full set so no other code concatenates suffixes.

use std::path::{Path, PathBuf};

/// The file set behind a knowledge-base prefix `P`.
#[derive(Debug, Clone)]
pub struct KbFiles {
    /// `P.axioms.idx` — offset table of the axiom body store.
    pub axioms_idx: PathBuf,
    /// `P.axioms.dat` — axiom body records.
    pub axioms_dat: PathBuf,
    /// `P.name.cdb` — axiom name → id list.
    pub name: PathBuf,
    /// `P.rhs.cdb` — consequent arity → implication id list.
    pub rhs: PathBuf,
    /// `P.lhs.cdb` — antecedent arity → implication id list.
    pub lhs: PathBuf,
    /// `P.inc.pred.cdb` — arity → inconsistency id list.
    pub inc_pred: PathBuf,
    /// `P.group.cdb` — group → ids, and `#<id>` → group names.
    pub group: PathBuf,
    /// `P.unipp.cdb` — arity → postponement axiom id.
    pub unipp: PathBuf,
    /// `P.arg_set.cdb` — `<arity>:<slot>` → argument-set id.
    pub arg_set: PathBuf,
    /// `P.arity.dat` — arity registry blob.
    pub arity: PathBuf,
    /// `P.rm.dat` — reachable matrix.
    pub rm: PathBuf,
    /// `P.conf` — version, max distance, distance provider.
    pub conf: PathBuf,
}

fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

impl KbFiles {
    pub fn new(prefix: impl AsRef<Path>) -> Self {
        let p = prefix.as_ref();
        Self {
            axioms_idx: suffixed(p, ".axioms.idx"),
            axioms_dat: suffixed(p, ".axioms.dat"),
            name: suffixed(p, ".name.cdb"),
            rhs: suffixed(p, ".rhs.cdb"),
            lhs: suffixed(p, ".lhs.cdb"),
            inc_pred: suffixed(p, ".inc.pred.cdb"),
            group: suffixed(p, ".group.cdb"),
            unipp: suffixed(p, ".unipp.cdb"),
            arg_set: suffixed(p, ".arg_set.cdb"),
            arity: suffixed(p, ".arity.dat"),
            rm: suffixed(p, ".rm.dat"),
            conf: suffixed(p, ".conf"),
        }
    }
}
