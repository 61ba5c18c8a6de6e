use std::path::Path;
use std::time::Instant;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::inference::InferenceBackend;
use crate::preprocessing::{self, Preprocessor, RawImage};
use crate::ranking::{self, RankedResult, ScoreVector};

/// One classification request at a time: preprocess, infer, rank.
/// The backend is created once by the caller and only borrowed here.
pub struct Pipeline<'a, B: InferenceBackend + ?Sized>
{
    backend: &'a B,
    preprocessor: Preprocessor,
    apply_orientation: bool,
}

impl<'a, B: InferenceBackend + ?Sized> Pipeline<'a, B>
{
    pub fn new(backend: &'a B, preprocessor: Preprocessor) -> Self
    {
        Pipeline { backend, preprocessor, apply_orientation: true }
    }

    /// Whether images loaded through `classify_file()` are turned upright using their EXIF tag.
    pub fn with_exif_orientation(mut self, apply_orientation: bool) -> Self
    {
        self.apply_orientation = apply_orientation;
        self
    }

    pub fn classify(&self, image: &RawImage) -> Result<RankedResult>
    {
        let scores = self.scores(image)?;
        let result = ranking::rank(&scores)?;
        info!("Classified {}x{} image as {} ({:.3}), then {} ({:.3})",
            image.width(), image.height(),
            result.top.label, result.top.score,
            result.second.label, result.second.score);
        Ok(result)
    }

    /// Same as `classify()`, for callers that may not have an image yet.
    pub fn classify_selection(&self, image: Option<&RawImage>) -> Result<RankedResult>
    {
        match image
        {
            Some(image) => self.classify(image),
            None => Err(Error::NoImageSelected),
        }
    }

    pub fn classify_file(&self, path: &Path) -> Result<RankedResult>
    {
        let image = self.load(path)?;
        self.classify(&image)
    }

    /// Decodes an image file the way `classify_file()` would.
    pub fn load(&self, path: &Path) -> Result<RawImage>
    {
        debug!("Loading {:?}", path);
        preprocessing::load_image(path, self.apply_orientation)
    }

    /// Raw model scores for an image, without ranking.
    pub fn scores(&self, image: &RawImage) -> Result<ScoreVector>
    {
        let now = Instant::now();
        let features = self.preprocessor.to_feature_vector(image)?;
        debug!("Preprocessing took {:?}", now.elapsed());

        let now = Instant::now();
        let scores = self.backend.infer(&features)?;
        debug!("Inference took {:?}", now.elapsed());

        Ok(scores)
    }
}
