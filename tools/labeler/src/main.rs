//! Interactive quadrant labeler.
//!
//! Each image is written with guide lines to a preview file for an external
//! viewer; events are read one per line from stdin (or `--script`):
//!   click X Y   record a pointer-up at pixel (X, Y)
//!   confirm     (or a blank line) commit clicked cells as mangrove
//!   quit | q    stop the whole session
//! Clicked cells land in `outdir/m/`, every other cell in `outdir/nm/`.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use image::RgbImage;
use log::{info, warn};
use mangrove_core::session::{label_directory, DirSink, EventSource, Key, LineEvents, SessionEvent};
use mangrove_core::{GridShape, PipelineError};

#[derive(Parser, Debug)]
#[command(name = "labeler", about = "Label grid cells of scene images as mangrove / non-mangrove")]
struct Args {
    /// Input directory of `<subdir>/<image>` scenes.
    #[arg(long)]
    indir: PathBuf,

    /// Output directory; `m/` and `nm/` are created inside it.
    #[arg(long)]
    outdir: PathBuf,

    /// Grid columns.
    #[arg(long, default_value_t = 2)]
    cols: u32,

    /// Grid rows.
    #[arg(long, default_value_t = 2)]
    rows: u32,

    /// Where the guided preview image is written (default: OUTDIR/.preview.png).
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Read events from this file instead of stdin.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

/// Writes each guided image to a preview file and reads text events.
struct ConsoleSource {
    preview: PathBuf,
    input_name: PathBuf,
    events: LineEvents<Box<dyn BufRead>>,
}

impl EventSource for ConsoleSource {
    fn show(&mut self, name: &str, image: &RgbImage) -> mangrove_core::Result<()> {
        mangrove_core::tiling::save_image(image, &self.preview)?;
        eprintln!(
            "{name}: {}x{} shown in {} (click X Y | confirm | quit)",
            image.width(),
            image.height(),
            self.preview.display()
        );
        Ok(())
    }

    fn next_event(&mut self) -> mangrove_core::Result<Option<SessionEvent>> {
        let event = self.events.next_event().map_err(|source| PipelineError::Io {
            path: self.input_name.clone(),
            source,
        })?;
        if let Some(SessionEvent::Key(Key::Other(c))) = event {
            warn!("unrecognised input '{c}', showing the same image again");
        }
        Ok(event)
    }
}

fn open_input(script: Option<&Path>) -> Result<(PathBuf, Box<dyn BufRead>)> {
    match script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening script {}", path.display()))?;
            Ok((path.to_path_buf(), Box::new(BufReader::new(file))))
        }
        None => Ok((PathBuf::from("<stdin>"), Box::new(BufReader::new(io::stdin())))),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    let shape = GridShape::new(args.cols, args.rows)?;
    let mut sink = DirSink::new(&args.outdir)
        .with_context(|| format!("preparing {}", args.outdir.display()))?;
    let (input_name, reader) = open_input(args.script.as_deref())?;
    let mut source = ConsoleSource {
        preview: args.preview.clone().unwrap_or_else(|| args.outdir.join(".preview.png")),
        input_name,
        events: LineEvents::new(reader),
    };

    let summary = label_directory(&args.indir, shape, &mut source, &mut sink)
        .with_context(|| format!("labeling {}", args.indir.display()))?;

    info!(
        "Labeled {} images: {} mangrove tiles, {} non-mangrove tiles{}",
        summary.images,
        summary.mangrove,
        summary.non_mangrove,
        if summary.quit { " (stopped early)" } else { "" }
    );
    Ok(())
}
