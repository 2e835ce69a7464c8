//! Image slicing into grid cells and the on-disk tiling workflow.
//!
//! Input layout is `indir/<subdir>/<file>`; the sub-directory name is turned
//! into a tag by a [`LabelTagger`] and embedded in every output name:
//! `outdir/<base>_<col>_<row>_<tag>.jpg`. Top-level files in `indir` are
//! skipped.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use log::debug;

use crate::error::{PipelineError, Result};
use crate::grid::{CellCoord, GridLayout, GridShape};
use crate::labels::LabelTagger;

/// Guide line colour (blue).
const GUIDE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// Guide line thickness in pixels.
const GUIDE_THICKNESS: u32 = 2;

/// Counts produced by [`slice_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceSummary {
    pub images: usize,
    pub tiles: usize,
}

/// Cut `image` into every cell of `shape`.
pub fn slice(image: &RgbImage, shape: GridShape) -> Result<Vec<(CellCoord, RgbImage)>> {
    let layout = GridLayout::new(image.width(), image.height(), shape)?;
    Ok(layout.cells().map(|cell| (cell, crop_cell(image, &layout, cell))).collect())
}

/// Copy the pixels of one cell out of `image`.
pub fn crop_cell(image: &RgbImage, layout: &GridLayout, cell: CellCoord) -> RgbImage {
    let rect = layout.cell_rect(cell);
    image::imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Decode an image from disk as 8-bit RGB.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).map_err(|source| PipelineError::UnreadableImage {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// Encode `image` to `path`; the format follows the extension.
pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|source| PipelineError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// File name without its extension.
pub fn file_base(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<base>_<col>_<row>_<tag>.jpg`, or `<base>_<col>_<row>.jpg` without a tag.
pub fn tile_name(base: &str, cell: CellCoord, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("{}_{}_{}_{}.jpg", base, cell.col, cell.row, tag),
        None => format!("{}_{}_{}.jpg", base, cell.col, cell.row),
    }
}

/// Draw guide lines on the interior grid boundaries.
pub fn draw_guides(image: &mut RgbImage, layout: &GridLayout) {
    let (w, h) = layout.dimensions();
    let (xs, ys) = layout.boundaries();
    let half = (GUIDE_THICKNESS / 2) as i32;
    for x in xs {
        let rect = Rect::at(x as i32 - half, 0).of_size(GUIDE_THICKNESS, h);
        draw_filled_rect_mut(image, rect, GUIDE_COLOR);
    }
    for y in ys {
        let rect = Rect::at(0, y as i32 - half).of_size(w, GUIDE_THICKNESS);
        draw_filled_rect_mut(image, rect, GUIDE_COLOR);
    }
}

/// Sub-directories of `indir` as `(name, path)`, sorted by name.
pub fn list_label_dirs(indir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(indir).map_err(|e| PipelineError::io(indir, e))? {
        let entry = entry.map_err(|e| PipelineError::io(indir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            debug!("skipping non-directory {}", path.display());
            continue;
        }
        dirs.push((entry.file_name().to_string_lossy().into_owned(), path));
    }
    dirs.sort();
    Ok(dirs)
}

/// Regular files directly inside `dir`, sorted.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))? {
        let path = entry.map_err(|e| PipelineError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Slice one image file and write each cell to `outdir`. Returns the number
/// of tiles written.
pub fn slice_file(path: &Path, tag: &str, outdir: &Path, shape: GridShape) -> Result<usize> {
    let image = load_image(path)?;
    let base = file_base(path);
    let tiles = slice(&image, shape)?;
    for (cell, tile) in &tiles {
        save_image(tile, &outdir.join(tile_name(&base, *cell, Some(tag))))?;
    }
    Ok(tiles.len())
}

/// Slice every image under `indir/<subdir>/` into `outdir`.
///
/// `progress` is called once per image after its tiles are written.
pub fn slice_all(
    indir: &Path,
    outdir: &Path,
    shape: GridShape,
    tagger: &(dyn LabelTagger + Sync),
    progress: &(dyn Fn(&Path) + Sync),
) -> Result<SliceSummary> {
    fs::create_dir_all(outdir).map_err(|e| PipelineError::io(outdir, e))?;

    let mut jobs = Vec::new();
    for (name, dir) in list_label_dirs(indir)? {
        let tag = tagger.tag(&name);
        for file in list_images(&dir)? {
            jobs.push((file, tag.clone()));
        }
    }

    let run = |(file, tag): &(PathBuf, String)| -> Result<usize> {
        let n = slice_file(file, tag, outdir, shape)?;
        progress(file);
        Ok(n)
    };

    #[cfg(feature = "threading")]
    let counts: Vec<usize> = {
        use rayon::prelude::*;
        jobs.par_iter().map(run).collect::<Result<_>>()?
    };
    #[cfg(not(feature = "threading"))]
    let counts: Vec<usize> = jobs.iter().map(run).collect::<Result<_>>()?;

    Ok(SliceSummary {
        images: counts.len(),
        tiles: counts.iter().sum(),
    })
}
