//! Decode, reshape and re-encode cover images for upload.

use dropskeet_common::{GeometryPolicy, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use percent_encoding::percent_decode_str;
use url::Url;

use super::error::EmbedError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeOptions {
    pub geometry: GeometryPolicy,
    pub format: OutputFormat,
    /// Encoded size ceiling in bytes
    pub max_bytes: Option<usize>,
    /// Per-step scale applied while over the ceiling, in (0, 1)
    pub shrink_factor: f32,
    /// Shrinking stops once the shorter side reaches this many pixels
    pub min_dimension: u32,
    pub jpeg_quality: u8,
}

impl TranscodeOptions {
    pub const DEFAULT_SHRINK_FACTOR: f32 = 0.9;
    pub const DEFAULT_MIN_DIMENSION: u32 = 100;
    pub const DEFAULT_JPEG_QUALITY: u8 = 85;

    fn shrink_factor(&self) -> f32 {
        if self.shrink_factor > 0.0 && self.shrink_factor < 1.0 {
            self.shrink_factor
        } else {
            Self::DEFAULT_SHRINK_FACTOR
        }
    }
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            geometry: GeometryPolicy::default(),
            format: OutputFormat::default(),
            max_bytes: None,
            shrink_factor: Self::DEFAULT_SHRINK_FACTOR,
            min_dimension: Self::DEFAULT_MIN_DIMENSION,
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, EmbedError> {
    image::load_from_memory(bytes).map_err(|source| EmbedError::Decode { source })
}

/// RGB conversion, geometry policy, encoding and the size-ceiling loop.
pub fn transcode(image: DynamicImage, options: &TranscodeOptions) -> Result<Transcoded, EmbedError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let shaped = apply_geometry(rgb, options.geometry);
    shrink_to_ceiling(shaped, options)
}

pub fn apply_geometry(image: DynamicImage, policy: GeometryPolicy) -> DynamicImage {
    let image = match policy {
        GeometryPolicy::Crop { aspect_ratio, .. } => center_crop(image, aspect_ratio),
        GeometryPolicy::Fit { .. } => image,
    };
    let (max_width, max_height) = policy.max_box();
    fit_within(image, max_width, max_height)
}

/// Largest centered region with the given width/height ratio.
pub fn center_crop(image: DynamicImage, aspect_ratio: f32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || aspect_ratio <= 0.0 || !aspect_ratio.is_finite() {
        return image;
    }

    let current = width as f32 / height as f32;
    if current > aspect_ratio {
        let new_width = ((height as f32 * aspect_ratio).round() as u32).clamp(1, width);
        if new_width == width {
            return image;
        }
        image.crop_imm((width - new_width) / 2, 0, new_width, height)
    } else {
        let new_height = ((width as f32 / aspect_ratio).round() as u32).clamp(1, height);
        if new_height == height {
            return image;
        }
        image.crop_imm(0, (height - new_height) / 2, width, new_height)
    }
}

/// Shrink into the box keeping the aspect ratio. Never upscales.
pub fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return image;
    }
    image.resize(max_width.max(1), max_height.max(1), FilterType::Lanczos3)
}

pub fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, EmbedError> {
    let mut buf = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, jpeg_quality))
        }
        OutputFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buf)),
    };
    result.map_err(|source| EmbedError::Encode { source })?;
    Ok(buf)
}

fn shrink_to_ceiling(
    mut image: DynamicImage,
    options: &TranscodeOptions,
) -> Result<Transcoded, EmbedError> {
    let mut bytes = encode(&image, options.format, options.jpeg_quality)?;

    if let Some(max_bytes) = options.max_bytes {
        let factor = options.shrink_factor();
        let floor = options.min_dimension.max(1);

        while bytes.len() > max_bytes {
            let (width, height) = image.dimensions();
            if width.min(height) <= floor {
                tracing::warn!(
                    len = bytes.len(),
                    max_bytes,
                    width,
                    height,
                    "image still over size ceiling at minimum dimension"
                );
                break;
            }

            let new_width = ((width as f32 * factor) as u32).clamp(1, width - 1);
            let new_height = ((height as f32 * factor) as u32).clamp(1, height - 1);
            image = image.resize_exact(new_width, new_height, FilterType::Triangle);
            bytes = encode(&image, options.format, options.jpeg_quality)?;

            tracing::debug!(
                width = new_width,
                height = new_height,
                len = bytes.len(),
                "shrunk image toward size ceiling"
            );
        }
    }

    let (width, height) = image.dimensions();
    Ok(Transcoded {
        bytes,
        width,
        height,
    })
}

/// File name for the uploaded image: the last path segment of `url` with the
/// output extension, or `image.<ext>`.
pub fn file_name_for(url: &str, format: OutputFormat) -> String {
    let segment = Url::parse(url.trim())
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|segment| percent_decode_str(&segment).decode_utf8_lossy().into_owned())
        .filter(|segment| !segment.trim().is_empty());

    let stem = match segment.as_deref() {
        Some(segment) => match segment.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => segment.to_string(),
        },
        None => "image".to_string(),
    };

    format!("{stem}.{}", format.extension())
}
