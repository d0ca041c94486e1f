//! Detection dataset discovery
//!
//! A dataset root holds two subdirectories: `Dataset/` with sample images and
//! `GroundTruth/` with one mask per image. Images and masks pair up by file
//! stem (`cup01.png` pairs with `cup01.bmp`); unpaired files are ignored.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::error::DeviceError;

pub const IMAGE_DIR: &str = "Dataset";
pub const MASK_DIR: &str = "GroundTruth";

/// Sample image and its ground-truth mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub image: PathBuf,
    pub mask: PathBuf,
}

/// Result of scanning a dataset root
#[derive(Debug, Clone)]
pub struct DatasetScan {
    pub root: PathBuf,
    pub pairs: Vec<ImagePair>,
}

impl DatasetScan {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Scan a dataset root and pair images with masks
pub fn scan(root: &Path) -> Result<DatasetScan, DeviceError> {
    debug!(root = %root.display(), "scan: called");
    if !root.is_dir() {
        return Err(DeviceError::dataset(root, "not a directory"));
    }

    let image_dir = root.join(IMAGE_DIR);
    let mask_dir = root.join(MASK_DIR);
    if !image_dir.is_dir() || !mask_dir.is_dir() {
        return Err(DeviceError::dataset(
            root,
            format!("expected {}/ and {}/ subdirectories", IMAGE_DIR, MASK_DIR),
        ));
    }

    let masks: HashMap<OsString, PathBuf> = files_in(root, &mask_dir)?
        .into_iter()
        .filter_map(|path| path.file_stem().map(|stem| (stem.to_os_string(), path.clone())))
        .collect();
    debug!(mask_count = masks.len(), "scan: collected masks");

    let pairs: Vec<ImagePair> = files_in(root, &image_dir)?
        .into_iter()
        .filter_map(|image| {
            let mask = masks.get(image.file_stem()?)?.clone();
            Some(ImagePair { image, mask })
        })
        .collect();

    if pairs.is_empty() {
        return Err(DeviceError::dataset(root, "no image/mask pairs found"));
    }

    info!(root = %root.display(), pairs = pairs.len(), "Scanned dataset");
    Ok(DatasetScan {
        root: root.to_path_buf(),
        pairs,
    })
}

fn files_in(root: &Path, dir: &Path) -> Result<Vec<PathBuf>, DeviceError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| DeviceError::dataset(root, e.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
