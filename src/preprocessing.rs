/// Converts decoded photos into the fixed-size input the CIFAR-10 model expects.
/// The model was trained on 32x32 RGB images with every channel scaled to [0, 1],
/// so anything fed to it has to go through `Preprocessor::to_feature_vector()` first.

use std::borrow::Cow;
use std::path::Path;

use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use log::debug;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::orientation;

pub const IMAGE_INPUT_SIZE: u32 = 32;
pub const CHANNELS: usize = 3;
pub const PIXEL_COUNT: usize = (IMAGE_INPUT_SIZE * IMAGE_INPUT_SIZE) as usize;
pub const FEATURE_VECTOR_LENGTH: usize = PIXEL_COUNT * CHANNELS;

/// An 8-bit RGB bitmap of any size, as handed over by the caller for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage(RgbImage);

impl RawImage
{
	pub fn from_rgb(image: RgbImage) -> Self
	{
		RawImage(image)
	}

	/// Any alpha channel is dropped.
	pub fn from_dynamic(image: DynamicImage) -> Self
	{
		RawImage(image.into_rgb8())
	}

	/// Builds an image from interleaved RGB bytes, row-major.
	pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self>
	{
		let expected = width as usize * height as usize * CHANNELS;
		if data.len() != expected
		{
			return Err(Error::InvalidImage(format!(
				"a {}x{} RGB image needs {} bytes but got {}", width, height, expected, data.len())));
		}

		RgbImage::from_raw(width, height, data)
			.map(RawImage)
			.ok_or_else(|| Error::InvalidImage(format!("could not build a {}x{} image", width, height)))
	}

	/// Builds an image from packed 0xAARRGGBB pixels, the layout mobile bitmap APIs hand out.
	pub fn from_argb_pixels(width: u32, height: u32, pixels: &[u32]) -> Result<Self>
	{
		let expected = width as usize * height as usize;
		if pixels.len() != expected
		{
			return Err(Error::InvalidImage(format!(
				"a {}x{} image needs {} pixels but got {}", width, height, expected, pixels.len())));
		}

		let data = pixels.iter()
			.flat_map(|pixel| [
				((pixel >> 16) & 0xff) as u8,
				((pixel >> 8) & 0xff) as u8,
				(pixel & 0xff) as u8,
			])
			.collect();

		Self::from_raw(width, height, data)
	}

	pub fn width(&self) -> u32
	{
		self.0.width()
	}

	pub fn height(&self) -> u32
	{
		self.0.height()
	}

	pub fn as_rgb(&self) -> &RgbImage
	{
		&self.0
	}
}

/// Exactly FEATURE_VECTOR_LENGTH values in [0, 1]. Only the preprocessor creates these.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector
{
	pub fn as_slice(&self) -> &[f32]
	{
		&self.0
	}

	pub fn len(&self) -> usize
	{
		self.0.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.0.is_empty()
	}

	/// The array the model is fed, usually shape [1, FEATURE_VECTOR_LENGTH].
	/// Any shape holding exactly FEATURE_VECTOR_LENGTH values works.
	pub fn to_input_array(&self, shape: &[usize]) -> Result<ArrayD<f32>>
	{
		Ok(ArrayD::from_shape_vec(IxDyn(shape), self.0.clone())?)
	}
}

/// Where each pixel's red, green and blue values land in the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout
{
	/// Pixel `i` fills slots `3i`, `3i + 1` and `3i + 2`.
	#[default]
	Interleaved,
	/// Pixel `i` fills slots `i`, `i + 1` and `i + 2`, so each pixel overwrites
	/// two channels of its predecessor. Slots 0..1024 end up holding the red
	/// channel of each pixel, slots 1024 and 1025 the green and blue of the last
	/// pixel, and the rest stay zero. Only useful for models that were exported
	/// against this encoding.
	LegacyOverlapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter
{
	Nearest,
	/// Bilinear.
	#[default]
	Triangle,
	CatmullRom,
	Gaussian,
	Lanczos3,
}

impl From<ResizeFilter> for FilterType
{
	fn from(filter: ResizeFilter) -> Self
	{
		match filter
		{
			ResizeFilter::Nearest => FilterType::Nearest,
			ResizeFilter::Triangle => FilterType::Triangle,
			ResizeFilter::CatmullRom => FilterType::CatmullRom,
			ResizeFilter::Gaussian => FilterType::Gaussian,
			ResizeFilter::Lanczos3 => FilterType::Lanczos3,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preprocessor
{
	pub layout: PixelLayout,
	pub filter: ResizeFilter,
}

impl Preprocessor
{
	pub fn new(layout: PixelLayout, filter: ResizeFilter) -> Self
	{
		Preprocessor { layout, filter }
	}

	/// Squashes the image to 32x32 (aspect ratio is not preserved) and scales
	/// every channel to [0, 1], scanning pixels row by row.
	pub fn to_feature_vector(&self, image: &RawImage) -> Result<FeatureVector>
	{
		let (width, height) = (image.width(), image.height());
		if width == 0 || height == 0
		{
			return Err(Error::InvalidImage(format!("image is {}x{}", width, height)));
		}

		let resized = self.resize(image);

		// Row-major, RGB interleaved.
		let pixels = resized.as_raw();
		if pixels.len() < FEATURE_VECTOR_LENGTH
		{
			return Err(Error::InvalidImage(format!(
				"expected {} pixels after resizing but got {}", PIXEL_COUNT, pixels.len() / CHANNELS)));
		}

		let mut features = vec![0.0f32; FEATURE_VECTOR_LENGTH];
		for (i, pixel) in pixels.chunks_exact(CHANNELS).take(PIXEL_COUNT).enumerate()
		{
			let offset = match self.layout
			{
				PixelLayout::Interleaved => CHANNELS * i,
				PixelLayout::LegacyOverlapping => i,
			};
			for (channel, value) in pixel.iter().enumerate()
			{
				features[offset + channel] = (*value as f32) / 255.;
			}
		}

		debug!("Preprocessed {}x{} image into {} features", width, height, features.len());

		Ok(FeatureVector(features))
	}

	fn resize<'a>(&self, image: &'a RawImage) -> Cow<'a, RgbImage>
	{
		if image.width() == IMAGE_INPUT_SIZE && image.height() == IMAGE_INPUT_SIZE
		{
			return Cow::Borrowed(image.as_rgb());
		}

		Cow::Owned(imageops::resize(
			image.as_rgb(),
			IMAGE_INPUT_SIZE,
			IMAGE_INPUT_SIZE,
			self.filter.into()))
	}
}

pub fn load_image(path: &Path, apply_orientation: bool) -> Result<RawImage>
{
	let bytes = std::fs::read(path)
		.map_err(|e| Error::InvalidImage(format!("Error loading image: {:?} {:?}", path, e)))?;
	load_image_from_memory(&bytes, apply_orientation)
}

/// Decodes an encoded image (any format the `image` crate knows).
/// With `apply_orientation`, photos carrying an EXIF orientation tag are turned upright.
pub fn load_image_from_memory(bytes: &[u8], apply_orientation: bool) -> Result<RawImage>
{
	let img = image::load_from_memory(bytes)
		.map_err(|e| Error::InvalidImage(format!("Error decoding image: {}", e)))?;

	let mut rgb = img.into_rgb8();
	if apply_orientation
	{
		let orientation = orientation::read_orientation(bytes);
		orientation::fix_orientation(&mut rgb, orientation);
	}

	if rgb.width() == 0 || rgb.height() == 0
	{
		return Err(Error::InvalidImage(format!("decoded image is {}x{}", rgb.width(), rgb.height())));
	}

	Ok(RawImage(rgb))
}
