//! Object and commit storage for the braid merge engine.
//!
//! This crate defines the storage vocabulary the merge engine programs
//! against. The engine only ever holds [`ObjectId`]s; snapshots and commits
//! are fetched on demand through the [`ContentStore`] and [`CommitGraph`]
//! traits, so any backend (on-disk object database, remote cache, test
//! double) can sit underneath.
//!
//! # Crate layout
//!
//! - [`store`] — the [`ContentStore`] and [`CommitGraph`] traits.
//! - [`types`] — value types ([`ObjectId`], [`Snapshot`], [`Tree`],
//!   [`TreeEntry`], [`Commit`], etc.).
//! - [`encode`] — canonical encodings and SHA-256 ids.
//! - [`memory`] — [`MemoryStore`], a concurrent in-memory backend.
//! - [`error`] — the [`StoreError`] enum returned by all trait methods.

pub mod encode;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{CommitGraph, ContentStore};
pub use types::{
    Commit, CommitMeta, EntryKind, ObjectId, ObjectIdParseError, ObjectKind, Signature, Snapshot,
    Tree, TreeEntry,
};
