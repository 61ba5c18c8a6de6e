use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::inference::ModelBinding;
use crate::preprocessing::{PixelLayout, Preprocessor, ResizeFilter};

pub const DEFAULT_MODEL_PATH: &str = "models/cifar10.onnx";

/// Settings read from a JSON file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    pub model_path: PathBuf,
    pub binding: ModelBinding,
    pub layout: PixelLayout,
    pub filter: ResizeFilter,
    pub apply_exif_orientation: bool,
    /// Threads the ONNX runtime may use inside a single inference call.
    pub intra_threads: usize,
}

impl Default for Config
{
    fn default() -> Self
    {
        Config {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            binding: ModelBinding::default(),
            layout: PixelLayout::default(),
            filter: ResizeFilter::default(),
            apply_exif_orientation: true,
            intra_threads: 1,
        }
    }
}

impl Config
{
    pub fn load(path: &Path) -> Result<Self>
    {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self>
    {
        Ok(serde_json::from_str(json)?)
    }

    pub fn preprocessor(&self) -> Preprocessor
    {
        Preprocessor::new(self.layout, self.filter)
    }
}
