//! Interactive labeling session.
//!
//! One image at a time: the image is shown with guide lines, pointer-up
//! clicks are accumulated, and a key event decides what happens next.
//! Confirm writes every clicked cell to the mangrove bucket and every other
//! cell to the non-mangrove bucket, so each cell is written exactly once.
//! Quit ends the whole walk. Any other key re-shows the same image.
//!
//! Windowing is not done here: events arrive through an [`EventSource`] and
//! tiles leave through a [`TileSink`].

use std::collections::BTreeSet;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{debug, info};

use crate::error::{PipelineError, Result};
use crate::grid::{CellCoord, GridLayout, GridShape};
use crate::labels::Bucket;
use crate::tiling::{
    crop_cell, draw_guides, file_base, list_images, list_label_dirs, load_image, save_image,
    tile_name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Confirm,
    Quit,
    Other(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Pointer-up at raw pixel position.
    Click { x: i64, y: i64 },
    Key(Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    ClicksRecorded,
    Committed,
}

/// Final bucket of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellAssignment {
    pub cell: CellCoord,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Commit(Vec<CellAssignment>),
    Quit,
    Ignored,
}

/// Per-image click accumulator. Owned by the labeling loop and reset at the
/// top of every image.
#[derive(Debug, Clone)]
pub struct LabelingSession {
    clicks: Vec<(i64, i64)>,
    state: SessionState,
}

impl Default for LabelingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelingSession {
    pub fn new() -> Self {
        Self {
            clicks: Vec::new(),
            state: SessionState::AwaitingInput,
        }
    }

    pub fn reset(&mut self) {
        self.clicks.clear();
        self.state = SessionState::AwaitingInput;
    }

    pub fn record_click(&mut self, x: i64, y: i64) {
        self.clicks.push((x, y));
        self.state = SessionState::ClicksRecorded;
    }

    pub fn clicks(&self) -> &[(i64, i64)] {
        &self.clicks
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Assign every cell of `layout` to a bucket from the recorded clicks.
    ///
    /// Clicks outside the image or on an already resolved cell are dropped.
    pub fn resolve(&self, layout: &GridLayout) -> Vec<CellAssignment> {
        let mut unresolved: BTreeSet<CellCoord> = layout.cells().collect();
        let mut out = Vec::with_capacity(unresolved.len());

        for &(x, y) in &self.clicks {
            let Some(cell) = layout.map_click(x, y) else {
                debug!("click ({x}, {y}) outside image");
                continue;
            };
            if unresolved.remove(&cell) {
                out.push(CellAssignment { cell, bucket: Bucket::Mangrove });
            }
        }
        out.extend(unresolved.into_iter().map(|cell| CellAssignment {
            cell,
            bucket: Bucket::NonMangrove,
        }));
        out
    }

    pub fn handle_key(&mut self, key: Key, layout: &GridLayout) -> KeyOutcome {
        match key {
            Key::Confirm => {
                let assignments = self.resolve(layout);
                self.state = SessionState::Committed;
                KeyOutcome::Commit(assignments)
            }
            Key::Quit => KeyOutcome::Quit,
            Key::Other(_) => KeyOutcome::Ignored,
        }
    }
}

/// Where the labeler gets its display surface and input from.
pub trait EventSource {
    /// Present `image` (already carrying guide lines) to the user.
    fn show(&mut self, name: &str, image: &RgbImage) -> Result<()>;

    /// Block until the next event. `None` means input is exhausted and the
    /// session ends as if quit was pressed.
    fn next_event(&mut self) -> Result<Option<SessionEvent>>;
}

/// Receives labeled tiles.
pub trait TileSink {
    fn write(&mut self, bucket: Bucket, name: &str, tile: &RgbImage) -> Result<()>;
}

/// Writes tiles to `outdir/m/` and `outdir/nm/`. Existing files are
/// overwritten, so re-running an interrupted image starts it from scratch.
#[derive(Debug, Clone)]
pub struct DirSink {
    outdir: PathBuf,
}

impl DirSink {
    pub fn new(outdir: &Path) -> Result<Self> {
        for bucket in [Bucket::Mangrove, Bucket::NonMangrove] {
            let dir = outdir.join(bucket.dir_name());
            fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
        }
        Ok(Self { outdir: outdir.to_path_buf() })
    }
}

impl TileSink for DirSink {
    fn write(&mut self, bucket: Bucket, name: &str, tile: &RgbImage) -> Result<()> {
        save_image(tile, &self.outdir.join(bucket.dir_name()).join(name))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelSummary {
    pub images: usize,
    pub mangrove: usize,
    pub non_mangrove: usize,
    pub quit: bool,
}

/// Label every image under `indir/<subdir>/`.
pub fn label_directory(
    indir: &Path,
    shape: GridShape,
    source: &mut dyn EventSource,
    sink: &mut dyn TileSink,
) -> Result<LabelSummary> {
    let mut summary = LabelSummary::default();
    let mut session = LabelingSession::new();

    for (_, dir) in list_label_dirs(indir)? {
        for path in list_images(&dir)? {
            session.reset();
            let image = load_image(&path)?;
            let layout = GridLayout::new(image.width(), image.height(), shape)?;
            let base = file_base(&path);

            let mut guided = image.clone();
            draw_guides(&mut guided, &layout);
            source.show(&base, &guided)?;

            let assignments = loop {
                match source.next_event()? {
                    None => {
                        summary.quit = true;
                        return Ok(summary);
                    }
                    Some(SessionEvent::Click { x, y }) => session.record_click(x, y),
                    Some(SessionEvent::Key(key)) => match session.handle_key(key, &layout) {
                        KeyOutcome::Commit(assignments) => break assignments,
                        KeyOutcome::Quit => {
                            info!("quit requested at {}", path.display());
                            summary.quit = true;
                            return Ok(summary);
                        }
                        KeyOutcome::Ignored => source.show(&base, &guided)?,
                    },
                }
            };

            for CellAssignment { cell, bucket } in assignments {
                let tile = crop_cell(&image, &layout, cell);
                sink.write(bucket, &tile_name(&base, cell, None), &tile)?;
                match bucket {
                    Bucket::Mangrove => summary.mangrove += 1,
                    Bucket::NonMangrove => summary.non_mangrove += 1,
                }
            }
            summary.images += 1;
            debug!("labeled {} ({} clicks)", path.display(), session.clicks().len());
        }
    }
    Ok(summary)
}

/// Parse one line of the text event grammar:
/// `click X Y`, `confirm` (or a blank line), `quit` / `q`.
/// Anything else is an unrecognised key.
pub fn parse_event(line: &str) -> SessionEvent {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    match parts.next() {
        None | Some("confirm") => SessionEvent::Key(Key::Confirm),
        Some("quit") | Some("q") => SessionEvent::Key(Key::Quit),
        Some("click") => {
            let x = parts.next().and_then(|v| v.parse().ok());
            let y = parts.next().and_then(|v| v.parse().ok());
            match (x, y, parts.next()) {
                (Some(x), Some(y), None) => SessionEvent::Click { x, y },
                _ => SessionEvent::Key(Key::Other('c')),
            }
        }
        Some(other) => SessionEvent::Key(Key::Other(other.chars().next().unwrap_or('?'))),
    }
}

/// Reads events line by line from any buffered reader (stdin, a script file).
pub struct LineEvents<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> LineEvents<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: String::new() }
    }

    pub fn next_event(&mut self) -> std::io::Result<Option<SessionEvent>> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        Ok(Some(parse_event(&self.line)))
    }
}
