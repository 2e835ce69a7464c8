//! End-to-end: slice a scene tree, label it through a scripted session, then
//! score a classifier against the labels the session produced.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use mangrove_core::artifact::{write_json, FEATURES_FILE, LABELS_FILE};
use mangrove_core::dataset::Dataset;
use mangrove_core::model::{Classifier, NearestCentroid};
use mangrove_core::session::{DirSink, Key, LabelSummary};
use mangrove_core::{
    evaluate, label_directory, slice_all, DirNameTagger, EventSource, Evaluation, GridShape,
    SessionEvent,
};

struct Script(VecDeque<SessionEvent>);

impl EventSource for Script {
    fn show(&mut self, _name: &str, _image: &RgbImage) -> mangrove_core::Result<()> {
        Ok(())
    }

    fn next_event(&mut self) -> mangrove_core::Result<Option<SessionEvent>> {
        Ok(self.0.pop_front())
    }
}

/// Dark green in the top-left quadrant, sandy elsewhere.
fn scene(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        if x < w / 2 && y < h / 2 {
            Rgb([20, 90, 30])
        } else {
            Rgb([200, 190, 150])
        }
    })
}

/// Mean colour of a tile, standing in for backbone features.
fn mean_rgb(path: &Path) -> Vec<f32> {
    let img = image::open(path).unwrap().to_rgb8();
    let n = (img.width() * img.height()) as f32;
    let mut acc = [0f32; 3];
    for p in img.pixels() {
        for k in 0..3 {
            acc[k] += p.0[k] as f32;
        }
    }
    acc.iter().map(|v| v / n).collect()
}

#[test]
fn slice_label_and_score() {
    let root = tempfile::tempdir().unwrap();
    let raw = root.path().join("raw");
    fs::create_dir_all(raw.join("site7")).unwrap();
    fs::write(raw.join("README"), "top-level files are ignored").unwrap();
    for k in 0..3 {
        scene(64, 48).save(raw.join("site7").join(format!("scene{k}.png"))).unwrap();
    }

    let tiles = root.path().join("tiles");
    let sliced = slice_all(&raw, &tiles, GridShape::QUAD, &DirNameTagger, &|_| {}).unwrap();
    assert_eq!(sliced.tiles, 12);
    assert!(tiles.join("scene2_0_0_site7.jpg").is_file());

    // Click the green quadrant on every scene, twice on the second one.
    let mut events = VecDeque::new();
    for k in 0..3 {
        events.push_back(SessionEvent::Click { x: 10, y: 10 });
        if k == 1 {
            events.push_back(SessionEvent::Click { x: 30, y: 20 });
        }
        events.push_back(SessionEvent::Key(Key::Confirm));
    }
    let labeled = root.path().join("labeled");
    let mut sink = DirSink::new(&labeled).unwrap();
    let summary = label_directory(&raw, GridShape::QUAD, &mut Script(events), &mut sink).unwrap();
    assert_eq!(summary, LabelSummary { images: 3, mangrove: 3, non_mangrove: 9, quit: false });

    // Build a feature set from the labeled buckets.
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for (bucket, code) in [("m", 0u8), ("nm", 1u8)] {
        let mut names: Vec<_> = fs::read_dir(labeled.join(bucket))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        names.sort();
        for path in names {
            features.push(mean_rgb(&path));
            labels.push(code);
        }
    }
    let set_dir = root.path().join("features");
    write_json(&set_dir.join(FEATURES_FILE), &features).unwrap();
    write_json(&set_dir.join(LABELS_FILE), &labels).unwrap();

    let data = Dataset::load_dir(&set_dir).unwrap();
    let mut model = NearestCentroid::new();
    model.fit(&data.features, &data.binarized_labels()).unwrap();
    let predicted = model.predict(&data.features, 0.5).unwrap();

    let Evaluation::Binary { report, .. } = evaluate(&data.labels, &predicted).unwrap() else {
        panic!("ground truth has no water");
    };
    assert_eq!(report.accuracy, Some(1.0));
}
