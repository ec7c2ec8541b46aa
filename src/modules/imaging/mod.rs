//! JPEG variants for X-ray display

mod compressor;

pub use compressor::{CompressedImages, EncodedVariant, ImageCompressor, ImagingError, Variant};
