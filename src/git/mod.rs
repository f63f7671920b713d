//! git
//!
//! The metadata substrate: the versioned, mergeable store of dataset
//! descriptors, content markers and commit history.
//!
//! # Architecture
//!
//! Everything above this module talks to Git through [`MetadataClient`].
//! Two implementations exist:
//!
//! - [`Git`] drives the `git` binary, with `git2` for read-only history
//!   lookups where the library can open the repository
//! - [`MockGit`] is an in-memory double for deterministic tests
//!
//! # Invariants
//!
//! - A refused push is always [`GitError::PushRejected`], never a bare
//!   command failure
//! - "Nothing to commit" is [`CommitOutcome::NoChanges`], not an error
//! - No other module imports `git2`
//!
//! # Example
//!
//! ```no_run
//! use datagest::git::{Git, MetadataClient};
//!
//! let git = Git::new("/srv/datagest/workspaces/proj-a");
//! let status = git.status()?;
//! if status.detached {
//!     git.checkout("main")?;
//! }
//! # Ok::<(), datagest::git::GitError>(())
//! ```

pub mod cli;
pub mod interface;
pub mod mock;

pub use cli::{normalize_remote_url, safe_directory_value, Git};
pub use interface::{CommitOutcome, GitError, GitStatus, MetadataClient, RejectReason};
pub use mock::MockGit;
