/// Moves unlabeled files into per-class directories by predicted label.
/// A source file that has vanished is reported and skipped; every other I/O
/// failure stops the run.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSummary {
    pub moved: usize,
    pub missing: Vec<PathBuf>,
}

/// Move `in_dir/<fname>` to `out_dir/<label>/<fname>` for every row.
///
/// `progress` is called once per row, moved or not.
pub fn sort_files<S: AsRef<str>>(
    fnames: &[String],
    labels: &[S],
    in_dir: &Path,
    out_dir: &Path,
    progress: &dyn Fn(),
) -> Result<SortSummary> {
    if fnames.len() != labels.len() {
        return Err(PipelineError::ShapeMismatch {
            what: "file names vs. predictions",
            left: fnames.len(),
            right: labels.len(),
        });
    }

    let mut summary = SortSummary::default();
    for (fname, label) in fnames.iter().zip(labels) {
        let src = in_dir.join(fname);
        let dst = out_dir.join(label.as_ref()).join(fname);
        match move_file(&src, &dst) {
            Ok(()) => summary.moved += 1,
            Err(e) if e.kind() == ErrorKind::NotFound && !src.exists() => {
                warn!("no such file {}", src.display());
                summary.missing.push(src);
            }
            Err(e) => return Err(PipelineError::io(&dst, e)),
        }
        progress();
    }
    Ok(summary)
}

fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !src.exists() {
        return Err(ErrorKind::NotFound.into());
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if needs_copy(&e) => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
        Err(e) => Err(e),
    }
}

/// Only a move across filesystems falls back to copy + delete.
fn needs_copy(e: &io::Error) -> bool {
    e.kind() == ErrorKind::CrossesDevices
}
