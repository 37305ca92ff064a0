#![doc = "update-kv-core: core logic library for update-kv."]

//! This crate contains the synchronisation algorithm behind `update-kv`:
//! environment substitution, JSON/YAML parsing with validation, waiting for
//! the KV store to elect a leader, and per-key create/overwrite/skip
//! reconciliation.
//!
//! The store itself is reached only through the [`contract::KvStore`] trait;
//! the concrete consul HTTP client lives in the `update-kv` binary crate.
//!
//! # Usage
//! Build a [`config::SyncConfig`], read the document text, and hand both to
//! [`synchronise::synchronise`] together with a store and a progress sink.

pub mod config;
pub mod contract;
pub mod document;
pub mod readiness;
pub mod reconcile;
pub mod substitute;
pub mod synchronise;
