use axum::body::Bytes;
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::config::XrayConfig;
use crate::core::error::{AppError, Result};
use crate::features::xrays::dtos::{CreateXrayRequest, DentalXrayDto, XrayUploadDto};
use crate::features::xrays::models::{CreateDentalXray, DentalXray};
use crate::features::xrays::services::{ProcessedXray, XrayPipeline, XrayUpload};
use crate::modules::dicom::DicomMetadata;
use crate::modules::vna::{DicomRouter, RoutingContext, VnaError};
use crate::modules::workflow::{WorkflowEvent, WorkflowNotifier};

const UPLOADED_EVENT: &str = "xray.uploaded";

/// X-ray records plus the side effects of an upload
pub struct XrayService {
    pool: PgPool,
    pipeline: XrayPipeline,
    router: Arc<dyn DicomRouter>,
    notifier: Arc<WorkflowNotifier>,
    max_upload_size: usize,
}

impl XrayService {
    pub fn new(
        pool: PgPool,
        pipeline: XrayPipeline,
        router: Arc<dyn DicomRouter>,
        notifier: Arc<WorkflowNotifier>,
        config: &XrayConfig,
    ) -> Self {
        Self {
            pool,
            pipeline,
            router,
            notifier,
            max_upload_size: config.max_upload_size,
        }
    }

    pub fn max_upload_size(&self) -> usize {
        self.max_upload_size
    }

    /// 404 unless the lead belongs to the caller
    pub async fn ensure_lead(&self, user_id: &str, lead_id: Uuid) -> Result<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM leads WHERE id = $1 AND user_id = $2)",
        )
        .bind(lead_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if !exists {
            return Err(AppError::NotFound(format!("Lead {} not found", lead_id)));
        }
        Ok(())
    }

    pub async fn list_for_lead(&self, user_id: &str, lead_id: Uuid) -> Result<Vec<DentalXrayDto>> {
        self.ensure_lead(user_id, lead_id).await?;

        let xrays = sqlx::query_as::<_, DentalXray>(
            r#"
            SELECT * FROM dental_xrays
            WHERE user_id = $1 AND lead_id = $2
            ORDER BY date_taken DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        let mut dtos = Vec::with_capacity(xrays.len());
        for xray in xrays {
            let dicom_url = match &xray.dicom_storage_key {
                Some(key) => self.pipeline.dicom_download_url(key).await,
                None => None,
            };
            let mut dto = DentalXrayDto::from(xray);
            dto.dicom_url = dicom_url;
            dtos.push(dto);
        }

        Ok(dtos)
    }

    pub async fn upload(
        &self,
        user_id: &str,
        request: CreateXrayRequest,
        upload: XrayUpload,
    ) -> Result<XrayUploadDto> {
        self.ensure_lead(user_id, request.lead_id).await?;

        let xray_id = Uuid::now_v7();
        let processed = self
            .pipeline
            .process(user_id, request.lead_id, xray_id, &upload)
            .await?;

        if let Some(metadata) = &processed.dicom_metadata {
            self.spawn_vna_routing(user_id, &request, metadata.clone(), upload.data.clone());
        }

        let record = build_record(xray_id, user_id, &request, &upload, &processed)?;
        let record_saved = match self.insert(&record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "X-ray {} stored but record insert failed: {}",
                    xray_id,
                    e
                );
                false
            }
        };

        self.notifier.spawn_notify(WorkflowEvent::new(
            UPLOADED_EVENT,
            user_id,
            serde_json::json!({
                "xrayId": xray_id,
                "leadId": request.lead_id,
                "clinicId": request.clinic_id,
                "xrayType": request.xray_type,
                "isDicom": processed.is_dicom,
                "processingStatus": processed.status,
                "recordSaved": record_saved,
            }),
        ));

        Ok(XrayUploadDto {
            id: xray_id,
            is_dicom: processed.is_dicom,
            thumbnail_url: processed.thumbnail_url,
            preview_url: processed.preview_url,
            full_url: processed.full_url,
            compression_ratio: processed.compression_ratio,
            processing_status: processed.status,
            warnings: processed.warnings,
            record_saved,
        })
    }

    async fn insert(&self, record: &CreateDentalXray) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dental_xrays (
                id, user_id, lead_id, clinic_id, xray_type, date_taken, teeth_included,
                notes, original_filename, content_type, is_dicom, dicom_storage_key,
                thumbnail_url, preview_url, full_url, original_size, compressed_size,
                compression_ratio, image_width, image_height, dicom_metadata,
                processing_status, processing_warnings
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
            )
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(record.lead_id)
        .bind(record.clinic_id)
        .bind(record.xray_type)
        .bind(record.date_taken)
        .bind(&record.teeth_included)
        .bind(&record.notes)
        .bind(&record.original_filename)
        .bind(&record.content_type)
        .bind(record.is_dicom)
        .bind(&record.dicom_storage_key)
        .bind(&record.thumbnail_url)
        .bind(&record.preview_url)
        .bind(&record.full_url)
        .bind(record.original_size)
        .bind(record.compressed_size)
        .bind(record.compression_ratio)
        .bind(record.image_width)
        .bind(record.image_height)
        .bind(record.dicom_metadata.clone().map(Json))
        .bind(record.processing_status)
        .bind(&record.processing_warnings)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Send the DICOM original to the tenant's archive in the background
    fn spawn_vna_routing(
        &self,
        user_id: &str,
        request: &CreateXrayRequest,
        metadata: DicomMetadata,
        data: Bytes,
    ) {
        let pool = self.pool.clone();
        let router = Arc::clone(&self.router);
        let user_id = user_id.to_string();
        let clinic_id = request.clinic_id;
        let mut context = RoutingContext {
            location: None,
            image_type: Some(request.xray_type.as_str().to_string()),
            patient_id: metadata.patient_id.clone(),
            lead_id: Some(request.lead_id.to_string()),
        };

        tokio::spawn(async move {
            if let Some(clinic_id) = clinic_id {
                match clinic_location(&pool, &user_id, clinic_id).await {
                    Ok(location) => context.location = location,
                    Err(e) => tracing::warn!("Clinic lookup for VNA routing failed: {}", e),
                }
            }

            match router.route_dicom(&user_id, &data, &metadata, &context).await {
                Ok(result) => tracing::info!(
                    "DICOM routed to VNA {} at {}",
                    result.vna_id,
                    result.storage_path
                ),
                Err(VnaError::NoVnaConfigured) => {
                    tracing::warn!("No VNA configured for {}, DICOM kept in storage only", user_id)
                }
                Err(e) => tracing::error!("VNA routing failed: {}", e),
            }
        });
    }
}

async fn clinic_location(pool: &PgPool, user_id: &str, clinic_id: Uuid) -> Result<Option<String>> {
    let location = sqlx::query_scalar::<_, Option<String>>(
        "SELECT location FROM clinics WHERE id = $1 AND user_id = $2",
    )
    .bind(clinic_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(location.flatten())
}

fn build_record(
    id: Uuid,
    user_id: &str,
    request: &CreateXrayRequest,
    upload: &XrayUpload,
    processed: &ProcessedXray,
) -> Result<CreateDentalXray> {
    let dicom_metadata = processed
        .dicom_metadata
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(format!("Failed to serialize DICOM metadata: {}", e)))?;

    Ok(CreateDentalXray {
        id,
        user_id: user_id.to_string(),
        lead_id: request.lead_id,
        clinic_id: request.clinic_id,
        xray_type: request.xray_type,
        date_taken: request.date_taken,
        teeth_included: request.teeth_included.clone(),
        notes: request.notes.clone(),
        original_filename: upload.file_name.clone(),
        content_type: upload.content_type.clone(),
        is_dicom: processed.is_dicom,
        dicom_storage_key: processed.dicom_storage_key.clone(),
        thumbnail_url: processed.thumbnail_url.clone(),
        preview_url: processed.preview_url.clone(),
        full_url: processed.full_url.clone(),
        original_size: upload.data.len() as i64,
        compressed_size: processed.compressed_size,
        compression_ratio: processed.compression_ratio,
        image_width: processed.image_width.map(|w| w as i32),
        image_height: processed.image_height.map(|h| h as i32),
        dicom_metadata,
        processing_status: processed.status,
        processing_warnings: processed.warnings.clone(),
    })
}
