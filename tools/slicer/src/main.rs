//! Grid slicer: cuts every image under `indir/<subdir>/` into a grid of
//! tiles named `<base>_<col>_<row>_<tag>.jpg`, the tag coming from the
//! sub-directory name.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use mangrove_core::labels::{DirNameTagger, LabelTagger, MappedTagger};
use mangrove_core::tiling::{list_images, list_label_dirs, slice_all};
use mangrove_core::GridShape;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "slicer", about = "Slice labeled scene directories into grid tiles")]
struct Args {
    /// Input directory; each sub-directory is one label tag.
    #[arg(long)]
    indir: PathBuf,

    /// Output directory for tiles (created if absent).
    #[arg(long)]
    outdir: PathBuf,

    /// Grid columns.
    #[arg(long, default_value_t = 2)]
    cols: u32,

    /// Grid rows.
    #[arg(long, default_value_t = 2)]
    rows: u32,

    /// JSON object mapping sub-directory names to tags.
    #[arg(long)]
    tag_map: Option<PathBuf>,

    /// Mark clicked sections as nm. Accepted but has no effect.
    #[arg(long)]
    nm: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

/// Tag-map tagger when `--tag-map` is given, directory names otherwise.
fn build_tagger(tag_map: Option<&Path>) -> Result<Box<dyn LabelTagger + Sync>> {
    match tag_map {
        Some(path) => {
            let tagger = MappedTagger::from_json_file(path)
                .with_context(|| format!("loading tag map {}", path.display()))?;
            Ok(Box::new(tagger))
        }
        None => Ok(Box::new(DirNameTagger)),
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    if args.nm {
        warn!("--nm has no effect on slicing");
    }

    let shape = GridShape::new(args.cols, args.rows)?;
    let tagger = build_tagger(args.tag_map.as_deref())?;

    let mut total = 0u64;
    let dirs = list_label_dirs(&args.indir)
        .with_context(|| format!("reading {}", args.indir.display()))?;
    for (_, dir) in dirs {
        total += list_images(&dir)?.len() as u64;
    }
    info!(
        "Slicing {total} images from {} into {}x{} tiles",
        args.indir.display(),
        shape.cols,
        shape.rows
    );

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    let summary = slice_all(&args.indir, &args.outdir, shape, tagger.as_ref(), &|path| {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        pb.set_message(name.unwrap_or_default());
        pb.inc(1);
    })
    .with_context(|| format!("slicing {}", args.indir.display()))?;
    pb.finish_and_clear();

    info!(
        "Wrote {} tiles from {} images to {}",
        summary.tiles,
        summary.images,
        args.outdir.display()
    );
    Ok(())
}
