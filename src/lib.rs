//! datagest - collaborative versioning of large image datasets
//!
//! datagest keeps a per-project local mirror of a Git repository whose
//! large files are tracked by DVC, and moves datasets between that mirror
//! and shared network storage: fetch, publish, import under a dataset lock,
//! restore a past revision, and browse history with image deltas.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Named workflows with progress, cancellation and retry
//! - [`workspace`] - Mirror lifecycle: clone, trust, bootstrap, recovery
//! - [`core`] - Domain types, config, registry, dataset files, locks
//! - [`git`] - Metadata substrate (the `git` binary, `git2` for history reads)
//! - [`content`] - Content substrate (the `dvc` binary)
//! - [`process`] - Subprocess execution with streaming and timeouts
//! - [`server`] - Bootstrap of the shared store (admin side)
//! - [`ui`] - User-facing output and progress
//!
//! # Correctness Invariants
//!
//! 1. At most one import per dataset holds the shared lock at a time
//! 2. A mirror that fails integrity checks is moved aside, never deleted
//! 3. A non-fast-forward push is rebased and retried once, never forced
//! 4. Cancellation stops a workflow before its next substrate call

pub mod cli;
pub mod content;
pub mod core;
pub mod engine;
pub mod git;
pub mod process;
pub mod server;
pub mod ui;
pub mod workspace;
