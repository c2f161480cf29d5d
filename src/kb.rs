//! The knowledge-base facade: lifecycle, insertion, and query surface.
//!
//! A [`KnowledgeBase`] is an owned handle over the whole on-disk file set
//! of one compiled corpus. It moves through three mutually exclusive
//! states:
//!
//! - **NULL** — nothing open.
//! - **COMPILE** — axioms stream in; inverted indices accumulate in
//!   memory; nothing answers queries.
//! - **QUERY** — every store is open read-only; nothing accepts writes.
//!
//! `prepare_compile` and `prepare_query` both require the NULL state;
//! `finalize` leaves any state for NULL, sealing the stores when it ends
//! a compile. Compilation is batch: changing any axiom means recompiling
//! the whole set, because the reachable matrix is only consistent with
//! the axioms sealed at the moment it was written.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::argset::{self, ArgumentSetId, ArgumentSetTable};
use crate::arity::{Arity, ArityId, ArityRegistry};
use crate::axiom::{AxiomReader, AxiomWriter};
use crate::codec::{self, ByteReader};
use crate::distance::DistanceProvider;
use crate::error::{KbError, KbResult, StoreError};
use crate::logic::{Axiom, AxiomId, LogicalFunction, Op};
use crate::matrix::{self, MatrixBuildParams, ReachableMatrix};
use crate::paths::KbFiles;
use crate::postpone::UnificationPostponement;
use crate::store::kas::{KasReader, KasWriter};
use crate::store::pbs::PbsWriter;

/// On-disk format version written into (and expected from) `.conf`.
pub const KB_VERSION: u8 = 1;

/// Lifecycle state of the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KbState {
    Null,
    Compile,
    Query,
}

impl KbState {
    fn name(self) -> &'static str {
        match self {
            KbState::Null => "NULL",
            KbState::Compile => "COMPILE",
            KbState::Query => "QUERY",
        }
    }
}

/// Construction-time options, supplied by the main controller.
#[derive(Debug, Clone)]
pub struct KbOptions {
    /// Reachable-matrix cutoff; `≤ 0` means unlimited.
    pub max_distance: f32,
    /// Edge-weight provider used at compile and restored from config at query.
    pub distance_provider: DistanceProvider,
    /// Worker threads for the matrix build; `0` resolves to the available
    /// parallelism.
    pub threads: usize,
    /// Arities excluded from the reachable matrix.
    pub stop_words: HashSet<Arity>,
    /// Bypass the stop-word set without clearing it.
    pub disable_stop_words: bool,
}

impl Default for KbOptions {
    fn default() -> Self {
        Self {
            max_distance: -1.0,
            distance_provider: DistanceProvider::Basic,
            threads: 0,
            stop_words: HashSet::new(),
            disable_stop_words: false,
        }
    }
}

/// Owned handle over one knowledge base on disk.
pub struct KnowledgeBase {
    prefix: PathBuf,
    files: KbFiles,
    state: KbState,
    provider: DistanceProvider,
    max_distance: f32,
    threads: usize,
    stop_words: HashSet<Arity>,
    disable_stop_words: bool,
    version: u8,

    // COMPILE-state transients.
    registry: ArityRegistry,
    axiom_writer: Option<AxiomWriter>,
    name_to_ids: HashMap<String, BTreeSet<AxiomId>>,
    lhs_to_ids: HashMap<Arity, BTreeSet<AxiomId>>,
    rhs_to_ids: HashMap<Arity, BTreeSet<AxiomId>>,
    inc_to_ids: HashMap<Arity, BTreeSet<AxiomId>>,
    group_to_ids: HashMap<String, BTreeSet<AxiomId>>,
    postponements: HashMap<Arity, AxiomId>,
    arg_sets: ArgumentSetTable,

    // QUERY-state handles.
    axiom_reader: Option<AxiomReader>,
    kas_name: Option<KasReader>,
    kas_lhs: Option<KasReader>,
    kas_rhs: Option<KasReader>,
    kas_inc: Option<KasReader>,
    kas_group: Option<KasReader>,
    kas_unipp: Option<KasReader>,
    kas_arg_set: Option<KasReader>,
    matrix: Option<ReachableMatrix>,
    distance_cache: DashMap<(u32, u32), Option<f32>>,
}

impl KnowledgeBase {
    /// Create a handle over `prefix` with the given options. No files are
    /// touched until `prepare_compile` or `prepare_query`.
    pub fn new(prefix: impl AsRef<Path>, options: KbOptions) -> Self {
        let prefix = prefix.as_ref().to_path_buf();
        Self {
            files: KbFiles::new(&prefix),
            prefix,
            state: KbState::Null,
            provider: options.distance_provider,
            max_distance: options.max_distance,
            threads: options.threads,
            stop_words: options.stop_words,
            disable_stop_words: options.disable_stop_words,
            version: KB_VERSION,
            registry: ArityRegistry::new(),
            axiom_writer: None,
            name_to_ids: HashMap::new(),
            lhs_to_ids: HashMap::new(),
            rhs_to_ids: HashMap::new(),
            inc_to_ids: HashMap::new(),
            group_to_ids: HashMap::new(),
            postponements: HashMap::new(),
            arg_sets: ArgumentSetTable::new(),
            axiom_reader: None,
            kas_name: None,
            kas_lhs: None,
            kas_rhs: None,
            kas_inc: None,
            kas_group: None,
            kas_unipp: None,
            kas_arg_set: None,
            matrix: None,
            distance_cache: DashMap::new(),
        }
    }

    /// Convenience constructor matching the main controller's contract.
    pub fn setup(
        prefix: impl AsRef<Path>,
        max_distance: f32,
        threads: usize,
        disable_stop_words: bool,
    ) -> Self {
        Self::new(
            prefix,
            KbOptions {
                max_distance,
                threads,
                disable_stop_words,
                ..Default::default()
            },
        )
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Enter the COMPILE state. Idempotent in COMPILE; rejected in QUERY
    /// (finalize explicitly first).
    pub fn prepare_compile(&mut self) -> KbResult<()> {
        match self.state {
            KbState::Compile => Ok(()),
            KbState::Query => Err(KbError::InvalidState {
                operation: "prepare_compile",
                expected: "NULL",
                actual: "QUERY",
            }),
            KbState::Null => {
                self.axiom_writer = Some(AxiomWriter::create(
                    &self.files.axioms_idx,
                    &self.files.axioms_dat,
                )?);
                self.registry = ArityRegistry::new();
                self.clear_compile_transients();
                self.state = KbState::Compile;
                info!(prefix = %self.prefix.display(), "knowledge base compiling");
                Ok(())
            }
        }
    }

    /// Enter the QUERY state: load the config (selecting the distance
    /// provider the matrix was built with), then open every store
    /// read-only. Idempotent in QUERY; rejected in COMPILE.
    pub fn prepare_query(&mut self) -> KbResult<()> {
        match self.state {
            KbState::Query => Ok(()),
            KbState::Compile => Err(KbError::InvalidState {
                operation: "prepare_query",
                expected: "NULL",
                actual: "COMPILE",
            }),
            KbState::Null => {
                self.read_config()?;
                self.registry = ArityRegistry::read_from(&self.files.arity)?;
                self.axiom_reader = Some(AxiomReader::open(
                    &self.files.axioms_idx,
                    &self.files.axioms_dat,
                )?);
                self.kas_name = Some(KasReader::open(&self.files.name)?);
                self.kas_lhs = Some(KasReader::open(&self.files.lhs)?);
                self.kas_rhs = Some(KasReader::open(&self.files.rhs)?);
                self.kas_inc = Some(KasReader::open(&self.files.inc_pred)?);
                self.kas_group = Some(KasReader::open(&self.files.group)?);
                self.kas_unipp = Some(KasReader::open(&self.files.unipp)?);
                self.kas_arg_set = Some(KasReader::open(&self.files.arg_set)?);
                self.matrix = Some(ReachableMatrix::open(&self.files.rm)?);
                self.distance_cache.clear();
                self.state = KbState::Query;
                info!(prefix = %self.prefix.display(), axioms = self.num_axioms(), "knowledge base opened");
                Ok(())
            }
        }
    }

    /// Leave the current state for NULL. Ending a compile seals every
    /// store, builds the reachable matrix and writes the config.
    pub fn finalize(&mut self) -> KbResult<()> {
        match self.state {
            KbState::Null => Ok(()),
            KbState::Query => {
                self.close_query();
                self.state = KbState::Null;
                Ok(())
            }
            KbState::Compile => self.finalize_compile(),
        }
    }

    fn finalize_compile(&mut self) -> KbResult<()> {
        self.extend_inconsistency();

        flush_id_index(
            &self.files.name,
            self.name_to_ids.iter().map(|(k, v)| (k.as_str(), v)),
        )?;
        flush_id_index(
            &self.files.lhs,
            self.lhs_to_ids.iter().map(|(k, v)| (k.as_str(), v)),
        )?;
        flush_id_index(
            &self.files.rhs,
            self.rhs_to_ids.iter().map(|(k, v)| (k.as_str(), v)),
        )?;
        flush_id_index(
            &self.files.inc_pred,
            self.inc_to_ids.iter().map(|(k, v)| (k.as_str(), v)),
        )?;
        self.flush_postponement_index()?;
        self.flush_group_index()?;
        self.flush_argument_sets()?;

        // Seal the axiom store, then reopen it read-only: the matrix
        // build reads axiom bodies back while the in-memory indices are
        // still alive.
        let writer = self.axiom_writer.take().expect("writer exists in COMPILE");
        let num_axioms = writer.len();
        writer.finish()?;
        self.registry.write_to(&self.files.arity)?;
        let axioms = AxiomReader::open(&self.files.axioms_idx, &self.files.axioms_dat)?;

        let ignored: HashSet<ArityId> = if self.disable_stop_words {
            HashSet::new()
        } else {
            self.stop_words
                .iter()
                .filter_map(|a| self.registry.id_of(a))
                .collect()
        };
        let params = MatrixBuildParams {
            registry: &self.registry,
            lhs: &self.lhs_to_ids,
            rhs: &self.rhs_to_ids,
            axioms: &axioms,
            provider: &self.provider,
            max_distance: self.max_distance,
            threads: self.threads,
            ignored: &ignored,
        };
        let mut pbs = PbsWriter::create(&self.files.rm)?;
        matrix::build(&params, &mut pbs)?;
        pbs.finish()?;

        self.write_config()?;

        self.clear_compile_transients();
        self.registry = ArityRegistry::new();
        self.state = KbState::Null;
        info!(prefix = %self.prefix.display(), axioms = num_axioms, "knowledge base compiled");
        Ok(())
    }

    /// Extension hook run first at finalize. Reserved for deriving a
    /// deductive closure of the inconsistency index; currently nothing
    /// beyond the directly declared pairs is produced.
    fn extend_inconsistency(&mut self) {}

    fn clear_compile_transients(&mut self) {
        self.name_to_ids.clear();
        self.lhs_to_ids.clear();
        self.rhs_to_ids.clear();
        self.inc_to_ids.clear();
        self.group_to_ids.clear();
        self.postponements.clear();
        self.arg_sets = ArgumentSetTable::new();
    }

    fn close_query(&mut self) {
        self.axiom_reader = None;
        self.kas_name = None;
        self.kas_lhs = None;
        self.kas_rhs = None;
        self.kas_inc = None;
        self.kas_group = None;
        self.kas_unipp = None;
        self.kas_arg_set = None;
        self.matrix = None;
        self.registry = ArityRegistry::new();
        self.distance_cache.clear();
    }

    // -----------------------------------------------------------------------
    // Insertion (COMPILE state)
    // -----------------------------------------------------------------------

    fn require_compile(&self, operation: &'static str) -> KbResult<()> {
        if self.state == KbState::Compile {
            Ok(())
        } else {
            Err(KbError::InvalidState {
                operation,
                expected: "COMPILE",
                actual: self.state.name(),
            })
        }
    }

    /// Insert an implication axiom. Malformed input is warned about and
    /// skipped (`Ok(None)`); only state violations and I/O are errors.
    pub fn insert_implication(
        &mut self,
        func: LogicalFunction,
        name: &str,
    ) -> KbResult<Option<AxiomId>> {
        self.require_compile("insert_implication")?;

        if !func.is_op(Op::Imply)
            || func.branches().len() != 2
            || func.lhs_literals().is_empty()
            || func.rhs_literals().is_empty()
        {
            warn!(name, "implication is invalid and skipped");
            return Ok(None);
        }

        let (id, resolved) = self.put_axiom(name, &func)?;
        self.index_name_and_groups(id, &resolved);
        for lit in func.lhs_literals() {
            self.registry.add(&lit.arity);
            self.lhs_to_ids
                .entry(lit.arity.clone())
                .or_default()
                .insert(id);
        }
        for lit in func.rhs_literals() {
            self.registry.add(&lit.arity);
            self.rhs_to_ids
                .entry(lit.arity.clone())
                .or_default()
                .insert(id);
        }
        Ok(Some(id))
    }

    /// Insert a binary inconsistency axiom. Both children must be literals.
    pub fn insert_inconsistency(
        &mut self,
        func: LogicalFunction,
        name: &str,
    ) -> KbResult<Option<AxiomId>> {
        self.require_compile("insert_inconsistency")?;

        let valid = func.is_op(Op::Inconsistent)
            && func.branches().len() == 2
            && func.branches().iter().all(|b| b.is_op(Op::Literal));
        if !valid {
            warn!(name, "inconsistency is invalid and skipped");
            return Ok(None);
        }

        let (id, resolved) = self.put_axiom(name, &func)?;
        self.index_name_and_groups(id, &resolved);
        for lit in func.literals() {
            self.registry.add(&lit.arity);
            self.inc_to_ids
                .entry(lit.arity.clone())
                .or_default()
                .insert(id);
        }
        Ok(Some(id))
    }

    /// Insert a unification-postponement declaration: a single literal
    /// whose terms are the slot markers `*`, `+`, `.`. The first
    /// declaration per arity wins; duplicates are warned about.
    pub fn insert_unification_postponement(
        &mut self,
        func: LogicalFunction,
        name: &str,
    ) -> KbResult<Option<AxiomId>> {
        self.require_compile("insert_unification_postponement")?;

        let lit = func.as_literal().or_else(|| {
            (func.branches().len() == 1)
                .then(|| func.branch(0).and_then(LogicalFunction::as_literal))
                .flatten()
        });
        let Some(lit) = lit else {
            warn!(name, "unification postponement is not a single literal and is skipped");
            return Ok(None);
        };
        let arity = lit.arity.clone();

        let (id, resolved) = self.put_axiom(name, &func)?;
        self.index_name_and_groups(id, &resolved);
        if self.postponements.contains_key(&arity) {
            warn!(%arity, "unification postponement inserted redundantly; first declaration wins");
        } else {
            self.postponements.insert(arity, id);
        }
        Ok(Some(id))
    }

    /// Record an argument-set declaration. Declarations are merged and
    /// materialized at finalize; they carry no axiom id.
    pub fn insert_argument_set(&mut self, func: LogicalFunction) -> KbResult<()> {
        self.require_compile("insert_argument_set")?;
        self.arg_sets.add(&func);
        Ok(())
    }

    fn put_axiom(&mut self, name: &str, func: &LogicalFunction) -> KbResult<(AxiomId, String)> {
        let writer = self.axiom_writer.as_mut().expect("writer exists in COMPILE");
        Ok(writer.put(name, func, &mut self.registry)?)
    }

    fn index_name_and_groups(&mut self, id: AxiomId, name: &str) {
        let bucket = self.name_to_ids.entry(name.to_string()).or_default();
        if !bucket.is_empty() {
            warn!(name, "axiom name inserted redundantly");
        }
        bucket.insert(id);

        let parts: Vec<&str> = name.split('#').collect();
        if parts.len() > 1 {
            for group in &parts[..parts.len() - 1] {
                self.group_to_ids
                    .entry((*group).to_string())
                    .or_default()
                    .insert(id);
            }
        }
    }

    fn flush_postponement_index(&self) -> KbResult<()> {
        let mut w = KasWriter::create(&self.files.unipp)?;
        for (arity, id) in &self.postponements {
            w.put(arity.as_str(), &AxiomId::encode_list([*id].iter()))?;
        }
        w.finish()?;
        Ok(())
    }

    /// Group index in two directions: group name → id list, and
    /// `#<id>` → the group names the axiom belongs to.
    fn flush_group_index(&self) -> KbResult<()> {
        let mut w = KasWriter::create(&self.files.group)?;
        let mut id_to_groups: HashMap<AxiomId, BTreeSet<&str>> = HashMap::new();
        for (group, ids) in &self.group_to_ids {
            w.put(group, &AxiomId::encode_list(ids.iter()))?;
            for id in ids {
                id_to_groups.entry(*id).or_default().insert(group.as_str());
            }
        }
        for (id, groups) in &id_to_groups {
            let mut value = Vec::new();
            codec::put_u64(&mut value, groups.len() as u64);
            for group in groups {
                codec::put_str(&mut value, group);
            }
            w.put(&format!("#{}", id.get()), &value)?;
        }
        w.finish()?;
        Ok(())
    }

    fn flush_argument_sets(&self) -> KbResult<()> {
        let mut w = KasWriter::create(&self.files.arg_set)?;
        self.arg_sets.flush(&mut w)?;
        w.finish()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    fn write_config(&self) -> KbResult<()> {
        let mut buf = Vec::new();
        codec::put_u8(&mut buf, KB_VERSION);
        codec::put_f32(&mut buf, self.max_distance);
        self.provider.write_config(&mut buf);

        let path = &self.files.conf;
        let io = |e: std::io::Error| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        };
        let mut file = File::create(path).map_err(io)?;
        file.write_all(&buf).map_err(io)?;
        file.sync_all().map_err(io)?;
        Ok(())
    }

    fn read_config(&mut self) -> KbResult<()> {
        let path = &self.files.conf;
        let bytes = std::fs::read(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut r = ByteReader::new(&bytes);
        self.version = r.u8().map_err(KbError::Codec)?;
        self.max_distance = r.f32().map_err(KbError::Codec)?;
        self.provider = DistanceProvider::read_config(&mut r)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries (QUERY state)
    // -----------------------------------------------------------------------

    fn readable(&self, operation: &'static str) -> bool {
        if self.state == KbState::Query {
            true
        } else {
            warn!(
                operation,
                state = self.state.name(),
                "knowledge base is not readable"
            );
            false
        }
    }

    /// Fetch an axiom by id. Unknown ids yield `None` with a warning.
    pub fn get_axiom(&self, id: AxiomId) -> Option<Axiom> {
        if !self.readable("get_axiom") {
            return None;
        }
        self.axiom_reader.as_ref()?.get(id, &self.registry)
    }

    /// Ids of implications whose antecedent contains `arity`.
    pub fn axioms_with_lhs(&self, arity: &Arity) -> Vec<AxiomId> {
        self.id_list("axioms_with_lhs", &self.kas_lhs, arity.as_str())
    }

    /// Ids of implications whose consequent contains `arity`.
    pub fn axioms_with_rhs(&self, arity: &Arity) -> Vec<AxiomId> {
        self.id_list("axioms_with_rhs", &self.kas_rhs, arity.as_str())
    }

    /// Ids of inconsistency axioms mentioning `arity`.
    pub fn inconsistencies_of(&self, arity: &Arity) -> Vec<AxiomId> {
        self.id_list("inconsistencies_of", &self.kas_inc, arity.as_str())
    }

    /// Ids of axioms stored under `name`.
    pub fn axioms_with_name(&self, name: &str) -> Vec<AxiomId> {
        self.id_list("axioms_with_name", &self.kas_name, name)
    }

    fn id_list(&self, operation: &'static str, kas: &Option<KasReader>, key: &str) -> Vec<AxiomId> {
        if !self.readable(operation) {
            return Vec::new();
        }
        let Some(value) = kas.as_ref().and_then(|k| k.get(key)) else {
            return Vec::new();
        };
        match AxiomId::decode_list(&value) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(key, error = %e, "id list failed to decode");
                Vec::new()
            }
        }
    }

    /// All axioms sharing a group with `id` (including `id` itself, when
    /// it belongs to any group).
    pub fn axiom_group_of(&self, id: AxiomId) -> BTreeSet<AxiomId> {
        let mut out = BTreeSet::new();
        if !self.readable("axiom_group_of") {
            return out;
        }
        let Some(value) = self
            .kas_group
            .as_ref()
            .and_then(|k| k.get(&format!("#{}", id.get())))
        else {
            return out;
        };

        let mut r = ByteReader::new(&value);
        let Ok(count) = r.u64() else {
            return out;
        };
        for _ in 0..count {
            let Ok(group) = r.string() else {
                break;
            };
            out.extend(self.id_list("axiom_group_of", &self.kas_group, &group));
        }
        out
    }

    /// The postponement policy declared for `arity`, if any.
    pub fn unification_postponement(&self, arity: &Arity) -> Option<UnificationPostponement> {
        let ids = self.id_list("unification_postponement", &self.kas_unipp, arity.as_str());
        let axiom = self.get_axiom(*ids.first()?)?;
        UnificationPostponement::from_axiom(&axiom)
    }

    /// The argument set containing `arity`'s slot, if any.
    pub fn argument_set_id(&self, arity: &Arity, slot: u16) -> Option<ArgumentSetId> {
        if !self.readable("argument_set_id") {
            return None;
        }
        argset::lookup(self.kas_arg_set.as_ref()?, arity, slot)
    }

    /// Minimum chaining distance between two arities; `None` when either
    /// is unregistered or no chain exists within the cutoff. Results are
    /// cached per normalized pair until [`clear_distance_cache`](Self::clear_distance_cache).
    pub fn distance(&self, a: &Arity, b: &Arity) -> Option<f32> {
        if !self.readable("distance") {
            return None;
        }
        let (Some(ida), Some(idb)) = (self.registry.id_of(a), self.registry.id_of(b)) else {
            warn!(%a, %b, "distance queried for unregistered arity");
            return None;
        };
        self.distance_by_id(ida, idb)
    }

    /// Distance lookup by interned ids.
    pub fn distance_by_id(&self, a: ArityId, b: ArityId) -> Option<f32> {
        let key = if a.get() <= b.get() {
            (a.get(), b.get())
        } else {
            (b.get(), a.get())
        };
        if let Some(cached) = self.distance_cache.get(&key) {
            return *cached;
        }
        let dist = self.matrix.as_ref()?.get(a, b);
        self.distance_cache.insert(key, dist);
        dist
    }

    /// The set of distances present in `arity`'s matrix row.
    pub fn distances_from(&self, arity: &Arity) -> Vec<f32> {
        if !self.readable("distances_from") {
            return Vec::new();
        }
        let Some(id) = self.registry.id_of(arity) else {
            return Vec::new();
        };
        self.matrix
            .as_ref()
            .map(|m| m.row_distances(id))
            .unwrap_or_default()
    }

    /// Edge weight of an axiom under the active distance provider.
    pub fn axiom_distance(&self, axiom: &Axiom) -> Option<f32> {
        self.provider.distance(axiom)
    }

    /// Edge weight of a stored axiom by id.
    pub fn axiom_distance_by_id(&self, id: AxiomId) -> Option<f32> {
        self.axiom_distance(&self.get_axiom(id)?)
    }

    /// Drop every cached distance (e.g. between inference runs).
    pub fn clear_distance_cache(&self) {
        self.distance_cache.clear();
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Select the distance provider for the next compile. Rejected in
    /// QUERY, where the config is authoritative.
    pub fn set_distance_provider(&mut self, key: &str) -> KbResult<()> {
        if self.state == KbState::Query {
            return Err(KbError::InvalidState {
                operation: "set_distance_provider",
                expected: "NULL or COMPILE",
                actual: "QUERY",
            });
        }
        self.provider = DistanceProvider::by_name(key)?;
        Ok(())
    }

    pub fn state(&self) -> KbState {
        self.state
    }

    /// Number of axioms: written so far in COMPILE, stored in QUERY.
    pub fn num_axioms(&self) -> usize {
        match self.state {
            KbState::Compile => self.axiom_writer.as_ref().map(AxiomWriter::len).unwrap_or(0),
            KbState::Query => self.axiom_reader.as_ref().map(AxiomReader::len).unwrap_or(0),
            KbState::Null => 0,
        }
    }

    /// The prefix every store file derives from.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn files(&self) -> &KbFiles {
        &self.files
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn distance_provider(&self) -> &DistanceProvider {
        &self.provider
    }

    /// Version tag loaded from config (or the current one before any load).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Whether the loaded version matches what this build writes. Callers
    /// must refuse to proceed on a mismatch.
    pub fn is_valid_version(&self) -> bool {
        self.version == KB_VERSION
    }

    /// Interned id of an arity (QUERY and COMPILE states).
    pub fn arity_id(&self, arity: &Arity) -> Option<ArityId> {
        self.registry.id_of(arity)
    }

    /// The arity behind an interned id.
    pub fn arity_of(&self, id: ArityId) -> Option<&Arity> {
        self.registry.arity_of(id)
    }
}

impl Drop for KnowledgeBase {
    fn drop(&mut self) {
        if self.state != KbState::Null {
            if let Err(e) = self.finalize() {
                warn!(error = %e, "finalize on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("prefix", &self.prefix)
            .field("state", &self.state)
            .field("provider", &self.provider.name())
            .field("max_distance", &self.max_distance)
            .finish()
    }
}

fn flush_id_index<'a>(
    path: &Path,
    entries: impl Iterator<Item = (&'a str, &'a BTreeSet<AxiomId>)>,
) -> KbResult<()> {
    let mut w = KasWriter::create(path)?;
    for (key, ids) in entries {
        w.put(key, &AxiomId::encode_list(ids.iter()))?;
    }
    w.finish()?;
    Ok(())
}
