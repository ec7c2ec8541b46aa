//! Storage and image processing for a single X-ray upload
//!
//! DICOM uploads: validate, keep the original privately, decode (retrying
//! transient failures), derive JPEG variants. Plain images only go through
//! compression and never reach the DICOM decoder.

use axum::body::Bytes;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::xrays::models::ProcessingStatus;
use crate::modules::dicom::{is_dicom_upload, DecodedDicom, DicomDecoder, DicomError, DicomMetadata};
use crate::modules::imaging::{CompressedImages, ImageCompressor, ImagingError, Variant};
use crate::modules::storage::{FileVisibility, ObjectStorage};
use crate::shared::constants::{DICOM_MIME_TYPE, PLACEHOLDER_URL_SCHEME, XRAY_STORAGE_PURPOSE};
use crate::shared::retry::{retry_if, RetryOptions};

/// Raw file as received
#[derive(Debug, Clone)]
pub struct XrayUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Outcome of storage and processing, ready to be persisted
#[derive(Debug, Clone)]
pub struct ProcessedXray {
    pub is_dicom: bool,
    pub dicom_storage_key: Option<String>,
    pub dicom_metadata: Option<DicomMetadata>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub full_url: Option<String>,
    pub compressed_size: Option<i64>,
    pub compression_ratio: Option<f64>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub status: ProcessingStatus,
    pub warnings: Vec<String>,
}

impl ProcessedXray {
    fn new(is_dicom: bool) -> Self {
        Self {
            is_dicom,
            dicom_storage_key: None,
            dicom_metadata: None,
            thumbnail_url: None,
            preview_url: None,
            full_url: None,
            compressed_size: None,
            compression_ratio: None,
            image_width: None,
            image_height: None,
            status: ProcessingStatus::Complete,
            warnings: Vec::new(),
        }
    }

    fn apply_variants(&mut self, images: &CompressedImages, urls: VariantUrls) {
        self.thumbnail_url = Some(urls.thumbnail);
        self.preview_url = Some(urls.preview);
        self.full_url = Some(urls.full);
        self.compressed_size = Some(images.total_size() as i64);
        self.compression_ratio = Some(images.compression_ratio);
        self.image_width = Some(images.full.width);
        self.image_height = Some(images.full.height);
    }

    /// Keep the DICOM, give up on derived images for now
    fn degrade_to_dicom_only(&mut self, warning: String) {
        tracing::warn!("{}", warning);
        self.status = ProcessingStatus::DicomOnly;
        self.warnings.push(warning);
    }
}

struct VariantUrls {
    thumbnail: String,
    preview: String,
    full: String,
}

pub struct XrayPipeline {
    storage: Arc<dyn ObjectStorage>,
    decoder: Arc<dyn DicomDecoder>,
    compressor: ImageCompressor,
    retry: RetryOptions,
}

impl XrayPipeline {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        decoder: Arc<dyn DicomDecoder>,
        retry: RetryOptions,
    ) -> Self {
        Self {
            storage,
            decoder,
            compressor: ImageCompressor,
            retry,
        }
    }

    /// `placeholder://xray/{id}/{variant}`
    pub fn placeholder_url(xray_id: Uuid, variant: Variant) -> String {
        format!("{}xray/{}/{}", PLACEHOLDER_URL_SCHEME, xray_id, variant.as_str())
    }

    /// Signed download link for a private DICOM original; `None` when signing fails
    pub async fn dicom_download_url(&self, key: &str) -> Option<String> {
        match self.storage.presigned_url(key).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Could not sign DICOM download for {}: {}", key, e);
                None
            }
        }
    }

    fn object_path(user_id: &str, lead_id: Uuid, xray_id: Uuid, suffix: &str) -> String {
        format!(
            "{}/{}/{}/{}{}",
            XRAY_STORAGE_PURPOSE, user_id, lead_id, xray_id, suffix
        )
    }

    pub async fn process(
        &self,
        user_id: &str,
        lead_id: Uuid,
        xray_id: Uuid,
        upload: &XrayUpload,
    ) -> Result<ProcessedXray, AppError> {
        if is_dicom_upload(&upload.file_name, &upload.content_type) {
            self.process_dicom(user_id, lead_id, xray_id, upload).await
        } else {
            self.process_image(user_id, lead_id, xray_id, upload).await
        }
    }

    async fn process_dicom(
        &self,
        user_id: &str,
        lead_id: Uuid,
        xray_id: Uuid,
        upload: &XrayUpload,
    ) -> Result<ProcessedXray, AppError> {
        let decoder = Arc::clone(&self.decoder);
        let data = upload.data.clone();
        let metadata = task::spawn_blocking(move || decoder.validate(&data))
            .await
            .map_err(|e| AppError::Internal(format!("DICOM validation task failed: {}", e)))?
            .map_err(|e| {
                tracing::debug!("Rejected DICOM upload '{}': {}", upload.file_name, e);
                AppError::BadRequest(format!("Invalid DICOM file: {}", e))
            })?;

        let key = self.storage.generate_key(
            FileVisibility::Private,
            &Self::object_path(user_id, lead_id, xray_id, ".dcm"),
        );
        self.storage
            .upload(&key, upload.data.to_vec(), DICOM_MIME_TYPE)
            .await?;

        let mut processed = ProcessedXray::new(true);
        processed.dicom_storage_key = Some(key.clone());
        processed.dicom_metadata = Some(metadata);

        let decoded = match self.decode_with_retry(upload.data.clone()).await {
            Ok(decoded) => decoded,
            Err(e) if e.is_recoverable() => {
                processed.degrade_to_dicom_only(format!(
                    "Preview images not generated for {}: {}",
                    xray_id, e
                ));
                return Ok(processed);
            }
            Err(e) => {
                self.remove_stored(std::slice::from_ref(&key)).await;
                return Err(AppError::BadRequest(format!(
                    "Could not decode DICOM pixel data: {}",
                    e
                )));
            }
        };

        let DecodedDicom { metadata, image } = decoded;
        processed.dicom_metadata = Some(metadata);

        let compressor = self.compressor;
        let original_size = upload.data.len();
        let images =
            match compress_blocking(move || compressor.compress_image(&image, original_size)).await
            {
                Ok(images) => images,
                Err(e) => {
                    processed.degrade_to_dicom_only(format!(
                        "Image compression failed for {}: {}",
                        xray_id, e
                    ));
                    return Ok(processed);
                }
            };

        match self.store_variants(user_id, lead_id, xray_id, &images).await {
            Ok(urls) => processed.apply_variants(&images, urls),
            Err(e) => processed.degrade_to_dicom_only(format!(
                "Derived images not stored for {}: {}",
                xray_id, e
            )),
        }

        Ok(processed)
    }

    async fn process_image(
        &self,
        user_id: &str,
        lead_id: Uuid,
        xray_id: Uuid,
        upload: &XrayUpload,
    ) -> Result<ProcessedXray, AppError> {
        let mut processed = ProcessedXray::new(false);

        let compressor = self.compressor;
        let data = upload.data.clone();
        match compress_blocking(move || compressor.compress_bytes(&data)).await {
            Ok(images) => {
                let urls = self
                    .store_variants(user_id, lead_id, xray_id, &images)
                    .await?;
                processed.apply_variants(&images, urls);
            }
            Err(e) => {
                tracing::warn!(
                    "Compression failed for '{}', storing original: {}",
                    upload.file_name,
                    e
                );

                let suffix = format!("_original.{}", safe_extension(&upload.file_name));
                let key = self.storage.generate_key(
                    FileVisibility::Public,
                    &Self::object_path(user_id, lead_id, xray_id, &suffix),
                );
                self.storage
                    .upload(&key, upload.data.to_vec(), &upload.content_type)
                    .await?;

                processed.full_url = Some(self.storage.file_url(&key));
                processed.thumbnail_url = Some(Self::placeholder_url(xray_id, Variant::Thumbnail));
                processed.preview_url = Some(Self::placeholder_url(xray_id, Variant::Preview));
                processed.status = ProcessingStatus::OriginalOnly;
                processed
                    .warnings
                    .push(format!("Image compression failed: {}", e));
            }
        }

        Ok(processed)
    }

    async fn decode_with_retry(&self, data: Bytes) -> Result<DecodedDicom, DicomError> {
        retry_if(&self.retry, DicomError::is_transient, |attempt| {
            let decoder = Arc::clone(&self.decoder);
            let data = data.clone();
            async move {
                if attempt > 0 {
                    tracing::debug!("DICOM decode attempt {}", attempt + 1);
                }
                match task::spawn_blocking(move || decoder.decode(&data)).await {
                    Ok(result) => result,
                    Err(e) => Err(DicomError::Worker(e.to_string())),
                }
            }
        })
        .await
    }

    /// Best effort; failures are only logged
    async fn remove_stored(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!("Failed to remove stored object '{}': {}", key, e);
            }
        }
    }

    async fn store_variants(
        &self,
        user_id: &str,
        lead_id: Uuid,
        xray_id: Uuid,
        images: &CompressedImages,
    ) -> Result<VariantUrls, AppError> {
        let mut urls = Vec::with_capacity(3);
        let mut stored = Vec::with_capacity(3);

        for encoded in images.variants() {
            let suffix = format!("_{}.jpg", encoded.variant.as_str());
            let key = self.storage.generate_key(
                FileVisibility::Public,
                &Self::object_path(user_id, lead_id, xray_id, &suffix),
            );
            if let Err(e) = self
                .storage
                .upload(&key, encoded.bytes.clone(), "image/jpeg")
                .await
            {
                // A partial set of variants is never referenced by a record
                self.remove_stored(&stored).await;
                return Err(e);
            }
            urls.push(self.storage.file_url(&key));
            stored.push(key);
        }

        let mut urls = urls.into_iter();
        match (urls.next(), urls.next(), urls.next()) {
            (Some(thumbnail), Some(preview), Some(full)) => Ok(VariantUrls {
                thumbnail,
                preview,
                full,
            }),
            _ => Err(AppError::Internal("Missing variant URL".to_string())),
        }
    }
}

async fn compress_blocking<F>(job: F) -> Result<CompressedImages, ImagingError>
where
    F: FnOnce() -> Result<CompressedImages, ImagingError> + Send + 'static,
{
    match task::spawn_blocking(job).await {
        Ok(result) => result,
        Err(e) => Err(ImagingError::Encode(format!("compression worker failed: {}", e))),
    }
}

/// Lowercase alphanumeric extension, `bin` otherwise
fn safe_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::dicom::test_support::{
        header_only, nested_sequences, part10, sample_dicom, EXPLICIT_LE,
    };
    use crate::modules::dicom::NativeDicomDecoder;
    use crate::modules::storage::memory::InMemoryStorage;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Real decoder that counts calls
    #[derive(Default)]
    struct CountingDecoder {
        validations: AtomicUsize,
        decodes: AtomicUsize,
    }

    impl DicomDecoder for CountingDecoder {
        fn validate(&self, data: &[u8]) -> Result<DicomMetadata, DicomError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            NativeDicomDecoder.validate(data)
        }

        fn decode(&self, data: &[u8]) -> Result<DecodedDicom, DicomError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            NativeDicomDecoder.decode(data)
        }
    }

    /// Fails with the queued errors first, then decodes for real
    struct ScriptedDecoder {
        failures: Mutex<Vec<DicomError>>,
        decodes: AtomicUsize,
    }

    impl ScriptedDecoder {
        fn new(failures: Vec<DicomError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                decodes: AtomicUsize::new(0),
            }
        }
    }

    impl DicomDecoder for ScriptedDecoder {
        fn validate(&self, data: &[u8]) -> Result<DicomMetadata, DicomError> {
            NativeDicomDecoder.validate(data)
        }

        fn decode(&self, data: &[u8]) -> Result<DecodedDicom, DicomError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                NativeDicomDecoder.decode(data)
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn fast_retry() -> RetryOptions {
        RetryOptions::new(3, Duration::from_millis(1), true)
    }

    fn png_upload(name: &str) -> XrayUpload {
        let image = RgbImage::from_fn(300, 150, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        XrayUpload {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from(out.into_inner()),
        }
    }

    fn dicom_upload(data: Vec<u8>) -> XrayUpload {
        XrayUpload {
            file_name: "scan.dcm".to_string(),
            content_type: "application/octet-stream".to_string(),
            data: Bytes::from(data),
        }
    }

    fn ids() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_plain_image_never_touches_decoder() {
        let storage = Arc::new(InMemoryStorage::default());
        let decoder = Arc::new(CountingDecoder::default());
        let pipeline = XrayPipeline::new(storage.clone(), decoder.clone(), fast_retry());
        let (lead, xray) = ids();

        let processed = pipeline
            .process("user-1", lead, xray, &png_upload("pano.png"))
            .await
            .unwrap();

        assert_eq!(decoder.validations.load(Ordering::SeqCst), 0);
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 0);
        assert!(!processed.is_dicom);
        assert_eq!(processed.status, ProcessingStatus::Complete);
        assert_eq!(
            (processed.image_width, processed.image_height),
            (Some(300), Some(150))
        );

        let objects = storage.objects();
        assert_eq!(objects.len(), 3);
        assert!(objects.iter().all(|o| o.key.starts_with("public/xrays/user-1/")
            && o.content_type == "image/jpeg"));
        assert!(processed
            .thumbnail_url
            .unwrap()
            .ends_with(&format!("{}_thumbnail.jpg", xray)));
    }

    #[tokio::test]
    async fn test_uncompressible_image_keeps_original_with_placeholders() {
        let storage = Arc::new(InMemoryStorage::default());
        let decoder = Arc::new(CountingDecoder::default());
        let pipeline = XrayPipeline::new(storage.clone(), decoder.clone(), fast_retry());
        let (lead, xray) = ids();

        let upload = XrayUpload {
            file_name: "scan.HEIC".to_string(),
            content_type: "image/heic".to_string(),
            data: Bytes::from_static(b"not decodable by the image crate"),
        };
        let processed = pipeline.process("user-1", lead, xray, &upload).await.unwrap();

        assert_eq!(decoder.validations.load(Ordering::SeqCst), 0);
        assert_eq!(processed.status, ProcessingStatus::OriginalOnly);
        assert_eq!(
            processed.thumbnail_url.as_deref(),
            Some(format!("placeholder://xray/{}/thumbnail", xray).as_str())
        );
        assert_eq!(
            processed.preview_url.as_deref(),
            Some(format!("placeholder://xray/{}/preview", xray).as_str())
        );
        let objects = storage.objects();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].key.ends_with("_original.heic"));
        assert_eq!(objects[0].content_type, "image/heic");
        assert_eq!(processed.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_dicom_stores_original_and_variants() {
        let storage = Arc::new(InMemoryStorage::default());
        let decoder = Arc::new(CountingDecoder::default());
        let pipeline = XrayPipeline::new(storage.clone(), decoder.clone(), fast_retry());
        let (lead, xray) = ids();

        let processed = pipeline
            .process("user-1", lead, xray, &dicom_upload(sample_dicom()))
            .await
            .unwrap();

        assert!(processed.is_dicom);
        assert_eq!(processed.status, ProcessingStatus::Complete);
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
        assert_eq!(
            processed.dicom_storage_key,
            Some(format!("private/xrays/user-1/{}/{}.dcm", lead, xray))
        );
        assert_eq!(
            processed
                .dicom_metadata
                .as_ref()
                .and_then(|m| m.modality.as_deref()),
            Some("DX")
        );

        let objects = storage.objects();
        assert_eq!(objects.len(), 4);
        assert_eq!(objects[0].content_type, "application/dicom");
        assert!(objects[1..].iter().all(|o| o.key.starts_with("public/")));
    }

    #[tokio::test]
    async fn test_invalid_dicom_is_rejected_before_storage() {
        let storage = Arc::new(InMemoryStorage::default());
        let pipeline = XrayPipeline::new(
            storage.clone(),
            Arc::new(CountingDecoder::default()),
            fast_retry(),
        );
        let (lead, xray) = ids();

        let result = pipeline
            .process("user-1", lead, xray, &dicom_upload(b"garbage".to_vec()))
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(storage.objects().is_empty());
    }

    #[tokio::test]
    async fn test_deeply_nested_dicom_is_rejected_before_storage() {
        let storage = Arc::new(InMemoryStorage::default());
        let decoder = Arc::new(CountingDecoder::default());
        let pipeline = XrayPipeline::new(storage.clone(), decoder.clone(), fast_retry());
        let (lead, xray) = ids();

        let result = pipeline
            .process("user-1", lead, xray, &dicom_upload(nested_sequences(100_000)))
            .await;

        match result {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("nested"), "{}", msg),
            other => panic!("expected BadRequest, got {:?}", other.map(|p| p.status)),
        }
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 0);
        assert!(storage.objects().is_empty());
    }

    #[tokio::test]
    async fn test_missing_pixel_data_keeps_dicom_only() {
        let storage = Arc::new(InMemoryStorage::default());
        let pipeline = XrayPipeline::new(
            storage.clone(),
            Arc::new(CountingDecoder::default()),
            fast_retry(),
        );
        let (lead, xray) = ids();

        let upload = dicom_upload(part10(header_only(), EXPLICIT_LE));
        let processed = pipeline.process("user-1", lead, xray, &upload).await.unwrap();

        assert_eq!(processed.status, ProcessingStatus::DicomOnly);
        assert_eq!(storage.objects().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_decode_failures_are_retried() {
        let storage = Arc::new(InMemoryStorage::default());
        let decoder = Arc::new(ScriptedDecoder::new(vec![
            DicomError::Worker("busy".into()),
            DicomError::Worker("busy".into()),
        ]));
        let pipeline = XrayPipeline::new(storage.clone(), decoder.clone(), fast_retry());
        let (lead, xray) = ids();

        let processed = pipeline
            .process("user-1", lead, xray, &dicom_upload(sample_dicom()))
            .await
            .unwrap();

        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 3);
        assert_eq!(processed.status, ProcessingStatus::Complete);
    }

    #[tokio::test]
    async fn test_corrupt_pixels_remove_stored_original() {
        let storage = Arc::new(InMemoryStorage::default());
        let decoder = Arc::new(ScriptedDecoder::new(vec![DicomError::CorruptPixelData(
            "short frame".into(),
        )]));
        let pipeline = XrayPipeline::new(storage.clone(), decoder.clone(), fast_retry());
        let (lead, xray) = ids();

        let result = pipeline
            .process("user-1", lead, xray, &dicom_upload(sample_dicom()))
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        // Not transient: a single attempt
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
        assert!(storage.objects().is_empty());
        assert_eq!(
            storage.deleted(),
            vec![format!("private/xrays/user-1/{}/{}.dcm", lead, xray)]
        );
    }

    #[tokio::test]
    async fn test_unsupported_encoding_keeps_dicom_only() {
        let storage = Arc::new(InMemoryStorage::default());
        let pipeline = XrayPipeline::new(
            storage.clone(),
            Arc::new(CountingDecoder::default()),
            fast_retry(),
        );
        let (lead, xray) = ids();

        // Valid DICOM in a transfer syntax we do not render
        let upload = dicom_upload(part10(header_only(), "1.2.840.10008.1.2.4.90"));

        let processed = pipeline.process("user-1", lead, xray, &upload).await.unwrap();

        assert_eq!(processed.status, ProcessingStatus::DicomOnly);
        assert!(processed.thumbnail_url.is_none());
        assert_eq!(processed.warnings.len(), 1);
        assert_eq!(storage.objects().len(), 1);
    }

    #[tokio::test]
    async fn test_variant_upload_failure_keeps_dicom() {
        let storage = Arc::new(InMemoryStorage::failing_under("public/"));
        let pipeline = XrayPipeline::new(
            storage.clone(),
            Arc::new(CountingDecoder::default()),
            fast_retry(),
        );
        let (lead, xray) = ids();

        let processed = pipeline
            .process("user-1", lead, xray, &dicom_upload(sample_dicom()))
            .await
            .unwrap();

        assert_eq!(processed.status, ProcessingStatus::DicomOnly);
        assert!(processed.dicom_storage_key.is_some());
        assert!(processed.full_url.is_none());
        assert_eq!(storage.objects().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_variants_are_removed_when_one_upload_fails() {
        let storage = Arc::new(InMemoryStorage::failing_on("_preview.jpg"));
        let pipeline = XrayPipeline::new(
            storage.clone(),
            Arc::new(CountingDecoder::default()),
            fast_retry(),
        );
        let (lead, xray) = ids();

        let processed = pipeline
            .process("user-1", lead, xray, &dicom_upload(sample_dicom()))
            .await
            .unwrap();

        assert_eq!(processed.status, ProcessingStatus::DicomOnly);
        assert!(processed.thumbnail_url.is_none());

        let thumbnail = format!("public/xrays/user-1/{}/{}_thumbnail.jpg", lead, xray);
        assert_eq!(storage.deleted(), vec![thumbnail]);
        let objects = storage.objects();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].key.ends_with(".dcm"));
    }

    #[tokio::test]
    async fn test_dicom_download_url_is_signed() {
        let pipeline = XrayPipeline::new(
            Arc::new(InMemoryStorage::default()),
            Arc::new(CountingDecoder::default()),
            fast_retry(),
        );

        let url = pipeline
            .dicom_download_url("private/xrays/user-1/a.dcm")
            .await
            .unwrap();
        assert!(url.contains("private/xrays/user-1/a.dcm?signature="));
    }

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension("a.PNG"), "png");
        assert_eq!(safe_extension("noext"), "bin");
        assert_eq!(safe_extension("weird.ex/t"), "bin");
    }
}
