//! Core library components.
//!
//! The encryption pipeline (entity declarations, metadata cache, tracker,
//! orchestrator, cipher backends and keys) plus the reference host it plugs
//! into (documents, storage, session) and the batch sweep built on top.

pub mod cipher;
pub mod config;
pub mod constants;
pub mod document;
pub mod entity;
pub mod keys;
pub mod lifecycle;
pub mod marker;
pub mod metadata;
pub mod orchestrator;
pub mod session;
pub mod storage;
pub mod sweep;
pub mod tracker;
pub mod types;
