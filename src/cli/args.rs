//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--project <id>`: Project to operate on
//! - `--config <path>`: Use this config file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// datagest - collaborative versioning of large image datasets
#[derive(Parser, Debug)]
#[command(name = "datagest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project to operate on (required when the registry lists several)
    #[arg(long, short = 'p', global = true)]
    pub project: Option<String>,

    /// Use this config file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output: results and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the project's local mirror and its remotes
    #[command(
        long_about = "Show the project's local mirror and its remotes.\n\n\
            Clones the mirror on first use, then reports its state (ready, dirty, \
            detached, corrupt), the current branch, and which of the configured \
            remotes is active."
    )]
    Status,

    /// List datasets in the mirror
    Datasets,

    /// Pull the latest commits and data into the mirror
    #[command(after_help = "\
EXAMPLES:
    # Bring the mirror up to date
    datagest fetch

    # Fetch even though the mirror has uncommitted changes
    datagest fetch --allow-dirty")]
    Fetch {
        /// Fetch even when the mirror has local changes
        #[arg(long)]
        allow_dirty: bool,
    },

    /// Commit local changes and push them to both remotes
    #[command(after_help = "\
EXAMPLES:
    # Publish everything that changed
    datagest publish -m \"Fix labels\"

    # Track and publish one dataset's content
    datagest publish -m \"Add night shots\" --dataset street")]
    Publish {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Track this dataset's data directory and stage only that dataset
        #[arg(long, value_name = "ID")]
        dataset: Option<String>,

        /// Paths to stage (default: everything)
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<String>,
    },

    /// Fetch, then publish local changes
    Sync {
        /// Fetch even when the mirror has local changes
        #[arg(long)]
        allow_dirty: bool,

        /// Stop after fetching
        #[arg(long)]
        fetch_only: bool,

        /// Track this dataset's data directory and stage only that dataset
        #[arg(long, value_name = "ID")]
        dataset: Option<String>,

        /// Commit message for the publish step
        #[arg(short, long, default_value = "Sync local changes")]
        message: String,

        /// Paths to stage (default: everything)
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<String>,
    },

    /// Import a folder of images into a dataset and publish it
    #[command(
        long_about = "Import a folder of images into a dataset and publish it.\n\n\
            Takes the dataset lock, synchronizes the mirror, copies the images into \
            datasets/<id>/data, records dataset.yaml, tracks the data with DVC, \
            commits, and pushes both remotes. The lock is released however the \
            import ends.",
        after_help = "\
EXAMPLES:
    # Add images to a registered dataset
    datagest import --dataset street ~/captures/2024-05-06

    # Replace the dataset's contents entirely
    datagest import --dataset street ~/captures/clean --replace"
    )]
    Import {
        /// Dataset to import into
        #[arg(long, value_name = "ID")]
        dataset: String,

        /// Folder of images (.jpg .jpeg .png .bmp .tif .tiff)
        folder: PathBuf,

        /// Display name (defaults to the registry's, then the id)
        #[arg(long)]
        name: Option<String>,

        /// Description (defaults to the registry's)
        #[arg(long)]
        description: Option<String>,

        /// Source label (defaults to the registry's)
        #[arg(long)]
        source: Option<String>,

        /// Note recorded in dataset.yaml
        #[arg(long)]
        note: Option<String>,

        /// Remove the dataset's existing files first
        #[arg(long)]
        replace: bool,
    },

    /// Show revisions that touched a dataset
    History {
        /// Dataset to inspect
        #[arg(long, value_name = "ID")]
        dataset: String,

        /// Maximum number of revisions
        #[arg(long, short = 'n', default_value_t = 100)]
        max_count: usize,
    },

    /// Check out a historical revision (detached)
    Restore {
        /// Commit id or any revision git understands
        revision: String,
    },

    /// Return the mirror to the latest main
    Latest,

    /// Inspect or release dataset locks
    Lock {
        #[command(subcommand)]
        action: LockAction,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Create or complete the shared store for a project (admin)
    #[command(
        long_about = "Create or complete the shared store for a project.\n\n\
            Creates the bare Git repository (HEAD on main), the DVC remote folder \
            and the locks folder under the base path, and registers the project \
            and its datasets in registry/registry.json. Running it again only adds \
            what is missing.",
        after_help = "\
EXAMPLES:
    # Provision a project with two datasets on a share
    datagest setup --base-path /mnt/share --project-id vision \\
        --project-name Vision --datasets street,night_shots"
    )]
    Setup {
        /// Root of the shared storage
        #[arg(long, value_name = "PATH")]
        base_path: PathBuf,

        /// Project id (one path component)
        #[arg(long, value_name = "ID")]
        project_id: String,

        /// Display name of the project
        #[arg(long)]
        project_name: String,

        /// Comma-separated dataset ids
        #[arg(long, value_name = "IDS", value_delimiter = ',', required = true)]
        datasets: Vec<String>,

        /// Git executable used to create the repository
        #[arg(long, value_name = "PATH", default_value = "git")]
        git_executable: String,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Lock subcommands.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show who holds a dataset's lock
    Status {
        #[arg(long, value_name = "ID")]
        dataset: String,
    },

    /// Release a dataset's lock
    Unlock {
        #[arg(long, value_name = "ID")]
        dataset: String,

        /// Delete the lock regardless of holder
        #[arg(long)]
        force: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    List,

    /// Print the path of the loaded (or default) config file
    Path,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Shells supported by `completion`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["datagest", "status", "--project", "vision", "-q"]).unwrap();
        assert_eq!(cli.project.as_deref(), Some("vision"));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn publish_collects_paths() {
        let cli = Cli::try_parse_from([
            "datagest", "publish", "-m", "msg", "--path", "a", "--path", "b",
        ])
        .unwrap();
        match cli.command {
            Command::Publish { message, dataset, paths } => {
                assert_eq!(message, "msg");
                assert!(dataset.is_none());
                assert_eq!(paths, vec!["a", "b"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn import_requires_dataset() {
        assert!(Cli::try_parse_from(["datagest", "import", "/tmp/x"]).is_err());
        let cli = Cli::try_parse_from(["datagest", "import", "--dataset", "cats", "/tmp/x", "--replace"])
            .unwrap();
        match cli.command {
            Command::Import { dataset, folder, replace, .. } => {
                assert_eq!(dataset, "cats");
                assert_eq!(folder, PathBuf::from("/tmp/x"));
                assert!(replace);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn history_defaults() {
        let cli = Cli::try_parse_from(["datagest", "history", "--dataset", "cats"]).unwrap();
        match cli.command {
            Command::History { max_count, .. } => assert_eq!(max_count, 100),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn setup_splits_datasets() {
        let cli = Cli::try_parse_from([
            "datagest",
            "setup",
            "--base-path",
            "/mnt/share",
            "--project-id",
            "vision",
            "--project-name",
            "Vision",
            "--datasets",
            "street,night_shots",
        ])
        .unwrap();
        match cli.command {
            Command::Setup {
                datasets,
                git_executable,
                ..
            } => {
                assert_eq!(datasets, vec!["street", "night_shots"]);
                assert_eq!(git_executable, "git");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from([
            "datagest",
            "setup",
            "--base-path",
            "/mnt/share",
            "--project-id",
            "vision",
            "--project-name",
            "Vision",
        ])
        .is_err());
    }

    #[test]
    fn lock_unlock_force() {
        let cli = Cli::try_parse_from(["datagest", "lock", "unlock", "--dataset", "cats", "--force"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Lock {
                action: LockAction::Unlock { force: true, .. }
            }
        ));
    }
}
