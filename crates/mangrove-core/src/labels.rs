/// Label codes, binarization, directory-name tagging and output buckets.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Ground-truth class. Water is kept apart only for diagnostic scoring; for
/// the binary decision it is a kind of non-mangrove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Mangrove = 0,
    NonMangrove = 1,
    Water = 2,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Mangrove, Label::NonMangrove, Label::Water];

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Label::Mangrove),
            1 => Ok(Label::NonMangrove),
            2 => Ok(Label::Water),
            other => Err(PipelineError::UnknownLabelCode(other)),
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Collapse water into non-mangrove.
    pub fn binarize(self) -> Label {
        match self {
            Label::Water => Label::NonMangrove,
            other => other,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Label::Mangrove => "m",
            Label::NonMangrove => "nm",
            Label::Water => "water",
        }
    }
}

/// `min(code, 1)` for every code: water (2) and non-mangrove (1) become 1.
pub fn binarize_codes(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&c| c.min(1)).collect()
}

/// Output bucket of the interactive labeler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Mangrove,
    NonMangrove,
}

impl Bucket {
    pub fn dir_name(self) -> &'static str {
        match self {
            Bucket::Mangrove => "m",
            Bucket::NonMangrove => "nm",
        }
    }
}

/// Maps a source sub-directory name to the tag embedded in tile names.
pub trait LabelTagger {
    fn tag(&self, subdir: &str) -> String;
}

/// Uses the directory name itself as the tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirNameTagger;

impl LabelTagger for DirNameTagger {
    fn tag(&self, subdir: &str) -> String {
        subdir.to_owned()
    }
}

/// Explicit directory → tag table; unmapped directories keep their own name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappedTagger {
    map: HashMap<String, String>,
}

impl MappedTagger {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// Load a JSON object `{ "<subdir>": "<tag>" }`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| PipelineError::json(path, e))
    }
}

impl LabelTagger for MappedTagger {
    fn tag(&self, subdir: &str) -> String {
        self.map.get(subdir).cloned().unwrap_or_else(|| subdir.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binarize_collapses_water() {
        assert_eq!(binarize_codes(&[0, 1, 2]), vec![0, 1, 1]);
        assert_eq!(Label::Water.binarize(), Label::NonMangrove);
        assert_eq!(Label::Mangrove.binarize(), Label::Mangrove);
    }

    #[test]
    fn unknown_code_is_an_error() {
        assert!(matches!(Label::from_code(3), Err(PipelineError::UnknownLabelCode(3))));
        for label in Label::ALL {
            assert_eq!(Label::from_code(label.code()).unwrap(), label);
        }
    }

    #[test]
    fn mapped_tagger_falls_back_to_dir_name() {
        let tagger = MappedTagger::new(HashMap::from([("site7".to_owned(), "m".to_owned())]));
        assert_eq!(tagger.tag("site7"), "m");
        assert_eq!(tagger.tag("site8"), "site8");
        assert_eq!(DirNameTagger.tag("water"), "water");
    }

    #[test]
    fn mapped_tagger_reads_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");
        fs::write(&path, r#"{ "lp_site1": "m", "psc_water": "water" }"#).unwrap();
        let tagger = MappedTagger::from_json_file(&path).unwrap();
        assert_eq!(tagger.tag("psc_water"), "water");
    }
}
