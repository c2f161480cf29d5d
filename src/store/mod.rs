//! On-disk stores backing a compiled knowledge base.
//!
//! Two store families serve different access patterns:
//!
//! - [`kas`] — keyed append store: write-once `string → bytes` with a
//!   trailing key table, used for every inverted index.
//! - [`pbs`] — positional blob store: append-only blobs addressed by a
//!   numeric key through an offset table, used for the reachable matrix
//!   and the axiom bodies.
//!
//! Both follow the same phase discipline: a writer type that is
//! append-only and patches its offset table at `finish()`, and a reader
//! type that memory-maps the finished file. A store is never writable
//! and readable at the same time; the split into distinct types makes
//! that a compile-time fact.

pub mod kas;
pub mod pbs;
