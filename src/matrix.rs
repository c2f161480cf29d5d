//! The reachable matrix: precomputed chaining distance between arity pairs.
//!
//! Building the matrix is a shortest-path computation over a graph whose
//! nodes are arity ids and whose edges are the implication axioms,
//! weighted by the active distance provider. For every source arity a
//! bounded best-first expansion produces one row, written to the
//! positional store under the source's id. Only entries with
//! `target ≥ source` are stored; the matrix is symmetric by construction
//! and queries normalize by swapping.
//!
//! Rows are independent, so the builder partitions sources across worker
//! threads; the single store writer is serialized behind a mutex (per-row
//! compute dominates I/O by a wide margin).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::arity::{Arity, ArityId, ArityRegistry};
use crate::axiom::AxiomReader;
use crate::codec::{self, ByteReader};
use crate::distance::DistanceProvider;
use crate::error::{StoreError, StoreResult};
use crate::logic::AxiomId;
use crate::store::pbs::{PbsReader, PbsWriter};

/// Everything the builder needs; all borrowed from the compiling
/// knowledge base, which is single-writer at this point.
pub struct MatrixBuildParams<'a> {
    pub registry: &'a ArityRegistry,
    /// Antecedent arity → implication ids (forward chaining edges).
    pub lhs: &'a HashMap<Arity, BTreeSet<AxiomId>>,
    /// Consequent arity → implication ids (backward chaining edges).
    pub rhs: &'a HashMap<Arity, BTreeSet<AxiomId>>,
    pub axioms: &'a AxiomReader,
    pub provider: &'a DistanceProvider,
    /// `≤ 0` means unlimited.
    pub max_distance: f32,
    /// Worker count; `0` resolves to the available parallelism.
    pub threads: usize,
    /// Stop-word arities: excluded from the graph entirely.
    pub ignored: &'a HashSet<ArityId>,
}

/// Summary of a finished build.
#[derive(Debug, Clone, Copy)]
pub struct BuildStats {
    /// Registered arities (graph nodes).
    pub arities: usize,
    /// Rows written.
    pub rows: usize,
    /// Total row entries written.
    pub entries: usize,
}

/// Compute all rows and append them to `writer`.
pub fn build(params: &MatrixBuildParams<'_>, writer: &mut PbsWriter) -> StoreResult<BuildStats> {
    let n = params.registry.len();
    info!(
        arities = n,
        max_distance = params.max_distance,
        provider = params.provider.name(),
        "building reachable matrix"
    );

    let direct = direct_edges(params);
    let sources: Vec<u32> = params
        .registry
        .ids()
        .filter(|id| !params.ignored.contains(id))
        .map(ArityId::get)
        .collect();

    let threads = match params.threads {
        0 => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        t => t,
    }
    .min(sources.len().max(1));

    let shared_writer = Mutex::new(writer);
    let failure: Mutex<Option<StoreError>> = Mutex::new(None);
    let stop = AtomicBool::new(false);
    let processed = AtomicUsize::new(0);
    let entries = AtomicUsize::new(0);
    let last_report = Mutex::new(Instant::now());
    let total = sources.len();

    std::thread::scope(|scope| {
        for chunk in sources.chunks(total.div_ceil(threads).max(1)) {
            let direct = &direct;
            let shared_writer = &shared_writer;
            let failure = &failure;
            let stop = &stop;
            let processed = &processed;
            let entries = &entries;
            let last_report = &last_report;

            scope.spawn(move || {
                for &source in chunk {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let row = closure_from(direct, source, params.max_distance);
                    let blob = encode_row(source, &row);
                    let written = {
                        let mut w = shared_writer.lock().expect("writer lock poisoned");
                        w.put(source as u64, &blob)
                    };
                    if let Err(e) = written {
                        *failure.lock().expect("failure lock poisoned") = Some(e);
                        stop.store(true, Ordering::Relaxed);
                        return;
                    }
                    entries.fetch_add(row.len(), Ordering::Relaxed);
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;

                    if let Ok(mut last) = last_report.try_lock() {
                        if last.elapsed() >= Duration::from_secs(1) {
                            *last = Instant::now();
                            info!(
                                processed = done,
                                total,
                                percent = done as f64 * 100.0 / total as f64,
                                "reachable matrix progress"
                            );
                        }
                    }
                }
            });
        }
    });

    if let Some(e) = failure.into_inner().expect("failure lock poisoned") {
        return Err(e);
    }

    let stats = BuildStats {
        arities: n,
        rows: processed.into_inner(),
        entries: entries.into_inner(),
    };
    info!(
        rows = stats.rows,
        entries = stats.entries,
        "reachable matrix complete"
    );
    Ok(stats)
}

/// Direct (single-axiom) edges per source arity, indexed by `id - 1`.
///
/// For each arity the forward direction follows axioms with the arity in
/// their antecedent to every consequent arity, the backward direction the
/// reverse; both relax toward the minimum provider weight. Infeasible
/// axioms contribute nothing.
fn direct_edges(p: &MatrixBuildParams<'_>) -> Vec<HashMap<u32, f32>> {
    let mut direct = vec![HashMap::new(); p.registry.len()];

    for id in p.registry.ids() {
        if p.ignored.contains(&id) {
            continue;
        }
        let arity = p.registry.arity_of(id).expect("id from registry iterator");
        let idx = (id.get() - 1) as usize;
        direct[idx].insert(id.get(), 0.0f32);

        for (index, forward) in [(p.lhs, true), (p.rhs, false)] {
            let Some(axiom_ids) = index.get(arity) else {
                continue;
            };
            for &axiom_id in axiom_ids {
                let Some(axiom) = p.axioms.get(axiom_id, p.registry) else {
                    continue;
                };
                let Some(d) = p.provider.distance(&axiom) else {
                    continue;
                };
                let targets = if forward {
                    axiom.func.rhs_literals()
                } else {
                    axiom.func.lhs_literals()
                };
                for lit in targets {
                    let Some(b) = p.registry.id_of(&lit.arity) else {
                        warn!(arity = %lit.arity, "literal arity missing from registry");
                        continue;
                    };
                    if p.ignored.contains(&b) {
                        continue;
                    }
                    let slot = direct[idx].entry(b.get()).or_insert(f32::INFINITY);
                    if d < *slot {
                        *slot = d;
                    }
                }
            }
        }
    }
    direct
}

/// Bounded multi-hop expansion from one source over the direct edges.
///
/// Frontier semantics: a target improves the output whenever its new
/// distance is strictly smaller; it re-enters the frontier only while
/// strictly below the cutoff, so paths at exactly the cutoff are kept
/// but not extended. A non-positive cutoff disables both bounds.
fn closure_from(direct: &[HashMap<u32, f32>], source: u32, max_distance: f32) -> HashMap<u32, f32> {
    let mut out = HashMap::new();
    let mut current = HashMap::new();
    out.insert(source, 0.0f32);
    current.insert(source, 0.0f32);

    while !current.is_empty() {
        let mut next = HashMap::new();
        for (&u, &du) in &current {
            let Some(edges) = direct.get((u - 1) as usize) else {
                continue;
            };
            for (&v, &w) in edges {
                let d = du + w;
                if max_distance > 0.0 && d > max_distance {
                    continue;
                }
                if let Some(&best) = out.get(&v) {
                    if d >= best {
                        continue;
                    }
                }
                out.insert(v, d);
                if max_distance <= 0.0 || d < max_distance {
                    next.insert(v, d);
                }
            }
        }
        current = next;
    }
    out
}

/// Row record: `count: u64`, then `count × (target: u64, distance: f32)`,
/// keeping only targets `≥ source`. Entry order is unspecified.
fn encode_row(source: u32, row: &HashMap<u32, f32>) -> Vec<u8> {
    let count = row.keys().filter(|&&b| b >= source).count();
    let mut buf = Vec::with_capacity(8 + count * 12);
    codec::put_u64(&mut buf, count as u64);
    for (&b, &d) in row {
        if b >= source {
            codec::put_u64(&mut buf, b as u64);
            codec::put_f32(&mut buf, d);
        }
    }
    buf
}

/// Query-phase view of a finished matrix.
#[derive(Debug)]
pub struct ReachableMatrix {
    pbs: PbsReader,
}

impl ReachableMatrix {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self {
            pbs: PbsReader::open(path)?,
        })
    }

    /// Minimum chaining distance between two arities, or `None` when they
    /// are unreachable within the compile-time cutoff.
    pub fn get(&self, a: ArityId, b: ArityId) -> Option<f32> {
        let (lo, hi) = if a.get() <= b.get() { (a, b) } else { (b, a) };
        let blob = self.pbs.get(lo.get() as u64)?;
        let mut r = ByteReader::new(blob);
        let count = r.u64().ok()?;
        for _ in 0..count {
            let key = r.u64().ok()?;
            let dist = r.f32().ok()?;
            if key == hi.get() as u64 {
                return Some(dist);
            }
        }
        None
    }

    /// The set of distances present in a source's row (deduplicated by
    /// bit pattern).
    pub fn row_distances(&self, a: ArityId) -> Vec<f32> {
        let Some(blob) = self.pbs.get(a.get() as u64) else {
            return Vec::new();
        };
        let mut r = ByteReader::new(blob);
        let Ok(count) = r.u64() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for _ in 0..count {
            let (Ok(_), Ok(dist)) = (r.u64(), r.f32()) else {
                break;
            };
            if seen.insert(dist.to_bits()) {
                out.push(dist);
            }
        }
        out
    }

    /// Whether a row was written for this arity.
    pub fn has_row(&self, a: ArityId) -> bool {
        self.pbs.contains(a.get() as u64)
    }

    /// Number of stored rows.
    pub fn rows(&self) -> usize {
        self.pbs.len()
    }
}
