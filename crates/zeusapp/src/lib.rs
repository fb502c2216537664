//! # Zeusapp Architecture
//!
//! Zeusapp is a **UI-agnostic project-structure library**. The `zeus` binary
//! (CLI + dashboard server) is one client of it; nothing in this crate knows
//! about stdout, exit codes or HTTP.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Single entry point for every client                      │
//! │  - Routes mutations through the approval engine             │
//! │  - Returns structured Result types                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Engines (approval, snapshot, integrity, graph, doctor)     │
//! │  - Pure business logic over the store                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (store/, fsio, guard, paths)                       │
//! │  - Handler registry keyed by entity kind                    │
//! │  - Atomic writes, advisory locks, guarded paths             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state lives under `.zeus/` as YAML files; the on-disk tree is the
//! sole source of truth and every in-memory structure is derivable from it.
//!
//! ## Concurrency model
//!
//! Single writer, many readers. Two lock tiers: a per-file advisory sidecar
//! lock for every write, and a coarse project write lock for multi-file
//! operations (snapshot create/restore, approval execution, doctor repair).
//! Reads take no locks. Every public operation accepts a cancellation token
//! via [`ctx::OpCtx`]; committed changes fan out on [`events::EventBus`].
//!
//! ## Module Overview
//!
//! - [`api`]: The facade every client calls
//! - [`model`]: Entity kinds, ids, records
//! - [`store`]: Kind handler registry and CRUD
//! - [`approval`]: Staged mutations (auto / notify / approve)
//! - [`integrity`]: Reference validation and cycle detection
//! - [`snapshot`]: Point-in-time capture and atomic restore
//! - [`graph`]: Typed graph, layered layout, orthogonal routing
//! - [`doctor`]: Health audits and scripted repair
//! - [`events`]: Process-local change fan-out
//! - [`guard`] / [`fsio`] / [`paths`]: The filesystem floor
//! - [`logs`]: Append-only change log
//! - [`init`] / [`config`] / [`state`]: Project bootstrap and settings

pub mod api;
pub mod approval;
pub mod config;
pub mod ctx;
pub mod doctor;
pub mod error;
pub mod events;
pub mod fsio;
pub mod graph;
pub mod guard;
pub mod ids;
pub mod init;
pub mod integrity;
pub mod logs;
pub mod model;
pub mod paths;
pub mod snapshot;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
