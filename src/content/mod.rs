//! content
//!
//! The content substrate: large binary files tracked by content-addressed
//! pointers and synced to their own remote.
//!
//! # Modules
//!
//! - `traits`: [`ContentClient`] capability and [`ContentError`]
//! - [`dvc`]: implementation driving the `dvc` binary
//! - [`mock`]: in-memory double for deterministic tests
//!
//! # Example
//!
//! ```no_run
//! use datagest::content::{ContentClient, Dvc};
//!
//! let dvc = Dvc::new("/srv/datagest/workspaces/proj-a");
//! dvc.pull(&mut |label, percent| {
//!     eprintln!("{label}: {percent}%");
//!     true
//! })?;
//! # Ok::<(), datagest::content::ContentError>(())
//! ```

pub mod dvc;
pub mod mock;
mod traits;

pub use dvc::Dvc;
pub use mock::MockContent;
pub use traits::*;
