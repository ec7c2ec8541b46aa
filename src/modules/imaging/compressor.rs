use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ExtendedColorType, GenericImageView};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImagingError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode JPEG: {0}")]
    Encode(String),

    #[error("Image is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Thumbnail,
    Preview,
    Full,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Thumbnail, Variant::Preview, Variant::Full];

    /// Bound on the long edge, in pixels
    pub fn max_edge(self) -> u32 {
        match self {
            Variant::Thumbnail => 200,
            Variant::Preview => 800,
            Variant::Full => 2048,
        }
    }

    pub fn quality(self) -> u8 {
        match self {
            Variant::Thumbnail => 60,
            Variant::Preview => 80,
            Variant::Full => 90,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Thumbnail => "thumbnail",
            Variant::Preview => "preview",
            Variant::Full => "full",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodedVariant {
    pub variant: Variant,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct CompressedImages {
    pub thumbnail: EncodedVariant,
    pub preview: EncodedVariant,
    pub full: EncodedVariant,
    /// `original_bytes / total_variant_bytes`
    pub compression_ratio: f64,
}

impl CompressedImages {
    pub fn total_size(&self) -> usize {
        self.thumbnail.bytes.len() + self.preview.bytes.len() + self.full.bytes.len()
    }

    pub fn variants(&self) -> [&EncodedVariant; 3] {
        [&self.thumbnail, &self.preview, &self.full]
    }
}

/// Produces the thumbnail/preview/full JPEG set
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCompressor;

impl ImageCompressor {
    /// Decode an uploaded PNG/JPEG/... and compress it
    pub fn compress_bytes(&self, data: &[u8]) -> Result<CompressedImages, ImagingError> {
        if data.is_empty() {
            return Err(ImagingError::Empty);
        }
        let image =
            image::load_from_memory(data).map_err(|e| ImagingError::Decode(e.to_string()))?;
        self.compress_image(&image, data.len())
    }

    pub fn compress_image(
        &self,
        image: &DynamicImage,
        original_size: usize,
    ) -> Result<CompressedImages, ImagingError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ImagingError::Empty);
        }

        let thumbnail = encode_variant(image, Variant::Thumbnail)?;
        let preview = encode_variant(image, Variant::Preview)?;
        let full = encode_variant(image, Variant::Full)?;

        let total = thumbnail.bytes.len() + preview.bytes.len() + full.bytes.len();
        let compression_ratio = if total == 0 {
            0.0
        } else {
            original_size as f64 / total as f64
        };

        Ok(CompressedImages {
            thumbnail,
            preview,
            full,
            compression_ratio,
        })
    }
}

fn encode_variant(image: &DynamicImage, variant: Variant) -> Result<EncodedVariant, ImagingError> {
    let max_edge = variant.max_edge();
    let (width, height) = image.dimensions();

    let resized;
    let source = if width.max(height) > max_edge {
        resized = image.resize(max_edge, max_edge, FilterType::Triangle);
        &resized
    } else {
        image
    };

    let (width, height) = source.dimensions();
    let bytes = encode_jpeg(source, variant.quality())?;

    Ok(EncodedVariant {
        variant,
        bytes,
        width,
        height,
    })
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImagingError> {
    let (width, height) = image.dimensions();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);

    // JPEG has no alpha; grayscale stays single channel
    let result = match image.color() {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
            let luma = image.to_luma8();
            encoder.encode(luma.as_raw(), width, height, ExtendedColorType::L8)
        }
        _ => {
            let rgb = image.to_rgb8();
            encoder.encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        }
    };

    result.map_err(|e| ImagingError::Encode(e.to_string()))?;
    Ok(buffer)
}
