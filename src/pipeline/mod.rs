//! Pipeline stages shared by the conversion and split engines.
//!
//! Each submodule implements exactly one concern. Keeping stages separate
//! makes each independently testable and lets us swap implementations
//! (e.g. add a conversion strategy) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ adapter ──▶ tool            discover ──▶ heading
//! (walk tree)  (chains)    (subprocesses)  (walk tree)  (boundaries)
//!      conversion engine                       split engine
//! ```
//!
//! 1. [`discover`] — walk a source tree into [`discover::SourceFile`]s;
//!    runs under `spawn_blocking` because walkdir is synchronous
//! 2. [`adapter`]  — map extensions to adapter kinds and drive each kind's
//!    ordered fallback chain
//! 3. [`tool`]     — probe and invoke the external converters; the only
//!    stage that spawns subprocesses
//! 4. [`heading`]  — locate boundary headings and derive chapter names for
//!    the splitter
//!
//! Two filesystem helpers live here because both engines need them with
//! identical semantics: [`up_to_date`] (the skip test) and [`write_atomic`]
//! (temp + rename publish).

pub mod adapter;
pub mod discover;
pub mod heading;
pub mod tool;

use std::path::Path;

use crate::error::UnitError;

/// Whether `dst` is at least as new as `src`.
///
/// "At least as new" (`>=`, not `>`): coarse filesystem timestamps can give
/// an output written moments after its input the same mtime, and such an
/// output is current, not stale. Missing paths and unreadable metadata
/// count as out of date so the unit gets (re)processed.
pub fn up_to_date(src: &Path, dst: &Path) -> bool {
    let src_mtime = match std::fs::metadata(src).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let dst_mtime = match std::fs::metadata(dst).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    dst_mtime >= src_mtime
}

/// Write `contents` to `path` atomically: temp file in the same directory,
/// then rename. Readers never observe a partial file, and a killed run
/// leaves only a `.tmp` behind.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), UnitError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| UnitError::io(parent, &e))?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| UnitError::io(&tmp_path, &e))?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(UnitError::io(path, &e));
    }
    Ok(())
}
