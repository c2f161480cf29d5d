//! # peirce
//!
//! The knowledge-base core of an abductive inference engine for
//! first-order logic. Given a corpus of named axioms — horn-like
//! implications, binary inconsistencies, unification postponements and
//! argument-set declarations — it compiles a set of indexed on-disk
//! stores and precomputes the **reachable matrix**: for every pair of
//! predicate arities, the minimum forward/backward chaining distance
//! under a pluggable per-axiom distance function, bounded by an optional
//! cutoff. The matrix is what makes hypothesis enumeration tractable at
//! inference time.
//!
//! ## Architecture
//!
//! - **Data model** (`logic`, `arity`): literals, logical functions,
//!   axioms; arities interned to dense ids
//! - **Stores** (`store`, `codec`): write-once keyed and positional blob
//!   stores over a fixed little-endian codec
//! - **Knowledge base** (`kb`, `axiom`, `paths`): two-phase
//!   compile/query facade over the whole file set
//! - **Reachable matrix** (`matrix`, `distance`): bounded multi-source
//!   shortest paths over the axiom graph, built in parallel
//! - **Inference policies** (`postpone`, `argset`): per-arity
//!   unification postponement and argument-set tables
//!
//! ## Library usage
//!
//! ```no_run
//! use peirce::kb::{KbOptions, KnowledgeBase};
//! use peirce::logic::{Literal, LogicalFunction, Term};
//! use peirce::arity::Arity;
//!
//! let mut kb = KnowledgeBase::new("/data/kb/compiled", KbOptions::default());
//! kb.prepare_compile().unwrap();
//! let func = LogicalFunction::imply(
//!     LogicalFunction::literal(Literal::new("dog", [Term::new("x")])),
//!     LogicalFunction::literal(Literal::new("animal", [Term::new("x")])),
//! );
//! kb.insert_implication(func, "taxonomy#dog-is-animal").unwrap();
//! kb.finalize().unwrap();
//!
//! kb.prepare_query().unwrap();
//! let d = kb.distance(&Arity::new("dog/1"), &Arity::new("animal/1"));
//! assert_eq!(d, Some(1.0));
//! ```

pub mod argset;
pub mod arity;
pub mod axiom;
pub mod codec;
pub mod distance;
pub mod error;
pub mod kb;
pub mod logic;
pub mod matrix;
pub mod paths;
pub mod postpone;
pub mod store;
