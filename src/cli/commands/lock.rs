//! cli::commands::lock
//!
//! Inspect and release dataset locks.
//!
//! `unlock` without `--force` only removes a lock held by this user and
//! machine (or any lock in admin mode).

use chrono::Utc;

use super::{parse_dataset, Session};
use crate::core::ops::{format_age, LockInfo};
use crate::engine::Context;
use crate::ui::output;
use anyhow::{bail, Result};

/// Show who holds a dataset's lock.
pub fn lock_status(ctx: &Context, dataset: &str) -> Result<()> {
    let id = parse_dataset(dataset)?;
    let session = Session::open(ctx)?;
    let manager = session.lock_manager()?;

    match manager.check(&session.project.project_id, &id) {
        None => output::result(format!("{id}: not locked")),
        Some(lock) => output::result(format!(
            "{id}: {}",
            describe(&lock, manager.is_stale(&lock))
        )),
    }
    Ok(())
}

/// Release a dataset's lock.
pub fn unlock(ctx: &Context, dataset: &str, force: bool) -> Result<()> {
    let id = parse_dataset(dataset)?;
    let session = Session::open(ctx)?;
    let manager = session.lock_manager()?;
    let project = &session.project.project_id;

    if force {
        manager.force_unlock(project, &id)?;
        output::print(format!("Removed lock on {id}."), session.verbosity);
        return Ok(());
    }

    if !manager.release(project, &id)? {
        let holder = manager
            .check(project, &id)
            .map(|l| l.holder())
            .unwrap_or_else(|| "another user".to_string());
        bail!("Lock on {id} is held by {holder}. Use --force to remove it.");
    }
    output::print(format!("Released lock on {id}."), session.verbosity);
    Ok(())
}

/// `locked by user@machine since ... (Nh old[, stale])`.
pub fn describe(lock: &LockInfo, stale: bool) -> String {
    let since = lock
        .acquired_at()
        .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| lock.timestamp.clone());
    let mut text = format!("locked by {} since {since}", lock.holder());
    if let Some(age) = lock.age_at(Utc::now()) {
        text.push_str(&format!(" ({}", format_age(age)));
        if stale {
            text.push_str(", stale");
        }
        text.push(')');
    } else if stale {
        text.push_str(" (stale)");
    }
    text
}
