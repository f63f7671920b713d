//! core
//!
//! Core domain types, schemas, and operations for DataGest.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ProjectId, DatasetId
//! - [`model`] - Project, dataset, and commit records
//! - [`identity`] - Acting user and machine
//! - [`config`] - Configuration schema and loading
//! - [`registry`] - Shared project registry
//! - [`ops`] - Dataset locking
//! - [`dataset`] - Per-dataset metadata and content markers
//! - [`files`] - File-tree helpers for imports and listings
//! - [`paths`] - Centralized path routing for mirrors and locks
//!
//! # Design Principles
//!
//! - Identifiers are validated once, at the boundary
//! - Reading shared state degrades gracefully; writing it is strict
//! - Nothing in `core` talks to a substrate binary

pub mod config;
pub mod dataset;
pub mod files;
pub mod identity;
pub mod model;
pub mod ops;
pub mod paths;
pub mod registry;
pub mod types;
