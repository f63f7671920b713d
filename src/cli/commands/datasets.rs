//! cli::commands::datasets
//!
//! List datasets in the mirror with size, state and lock holder.

use super::Session;
use crate::core::model::DatasetInfo;
use crate::engine::Context;
use crate::ui::output;
use anyhow::Result;

/// Run the datasets command.
pub fn datasets(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx)?;
    let datasets = session.orchestrator.list_datasets(&session.project)?;
    if datasets.is_empty() {
        output::print("No datasets in this project yet.", session.verbosity);
    }
    for info in &datasets {
        output::result(format_dataset(info));
    }
    Ok(())
}

pub fn format_dataset(info: &DatasetInfo) -> String {
    let mut line = format!(
        "{:<20} {:<24} {:>7} files {:>10}  {}",
        info.config.dataset_id,
        info.config.name,
        info.file_count,
        output::format_size(info.total_size_bytes),
        info.local_state
    );
    if let Some(updated) = &info.last_updated {
        line.push_str(&format!("  updated {}", output::format_timestamp(updated)));
        if let Some(author) = &info.last_author {
            line.push_str(&format!(" by {author}"));
        }
    }
    if info.is_locked {
        let holder = info.locked_by.as_deref().unwrap_or("unknown");
        line.push_str(&format!("  [locked by {holder}]"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{DatasetConfig, LocalState};
    use crate::core::types::DatasetId;

    fn info() -> DatasetInfo {
        DatasetInfo {
            config: DatasetConfig::from_id(DatasetId::new("street").unwrap()),
            file_count: 12,
            total_size_bytes: 2048,
            last_updated: None,
            last_author: None,
            is_locked: false,
            locked_by: None,
            local_state: LocalState::Clean,
        }
    }

    #[test]
    fn plain_line() {
        let line = format_dataset(&info());
        assert!(line.starts_with("street"));
        assert!(line.contains("12 files"));
        assert!(line.contains("2.0 KiB"));
        assert!(line.ends_with("clean"));
    }

    #[test]
    fn locked_line_names_holder() {
        let mut info = info();
        info.is_locked = true;
        info.locked_by = Some("bo@ws-02".into());
        assert!(format_dataset(&info).ends_with("[locked by bo@ws-02]"));
    }
}
