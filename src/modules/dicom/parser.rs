use std::borrow::Cow;
use std::io::Cursor;

use dicom_core::Tag;
use dicom_dictionary_std::{tags, uids};
use dicom_encoding::transfer_syntax::{TransferSyntax, TransferSyntaxIndex};
use dicom_object::{from_reader, DefaultDicomObject, FileMetaTable, FileMetaTableBuilder, InMemDicomObject};
use dicom_parser::dataset::{DataSetReader, DataToken};
use dicom_pixeldata::{BitDepthOption, ConvertOptions, PixelDecoder, VoiLutOption};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::{DicomDecoder, DicomError};
use crate::shared::constants::{DICOM_EXTENSIONS, DICOM_MIME_TYPE};

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// Deepest sequence nesting accepted in an upload
pub const MAX_SEQUENCE_DEPTH: usize = 64;

/// Tags indexed on the X-ray record. Patient names are deliberately not read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DicomMetadata {
    pub transfer_syntax_uid: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub study_instance_uid: Option<String>,
    pub modality: Option<String>,
    pub study_date: Option<String>,
    pub patient_id: Option<String>,
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub samples_per_pixel: Option<u16>,
    pub bits_allocated: Option<u16>,
    pub pixel_representation: Option<u16>,
    pub planar_configuration: Option<u16>,
    pub photometric_interpretation: Option<String>,
}

/// Rendered DICOM frame
#[derive(Debug, Clone)]
pub struct DecodedDicom {
    pub metadata: DicomMetadata,
    pub image: DynamicImage,
}

/// True when the upload should take the DICOM path: `.dcm`/`.dicom`
/// extension or an `application/dicom` content type.
pub fn is_dicom_upload(file_name: &str, content_type: &str) -> bool {
    let by_extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            DICOM_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false);

    let mime = content_type.split(';').next().unwrap_or("").trim();
    by_extension || mime.eq_ignore_ascii_case(DICOM_MIME_TYPE)
}

/// Decoder backed by the dicom-rs object model and pixel pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDicomDecoder;

impl DicomDecoder for NativeDicomDecoder {
    fn validate(&self, data: &[u8]) -> Result<DicomMetadata, DicomError> {
        load(data).map(|object| metadata_of(&object))
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedDicom, DicomError> {
        let object = load(data)?;
        let metadata = metadata_of(&object);

        let uid = object.meta().transfer_syntax();
        let renderable = TransferSyntaxRegistry
            .get(uid)
            .is_some_and(|ts| !ts.is_unsupported() && ts.can_decode_all());
        if !renderable {
            return Err(DicomError::UnsupportedTransferSyntax(uid.to_string()));
        }

        if !has_element(&object, tags::PIXEL_DATA) {
            return Err(DicomError::MissingPixelData);
        }

        let pixels = object
            .decode_pixel_data()
            .map_err(|e| DicomError::CorruptPixelData(e.to_string()))?;

        let options = ConvertOptions::new()
            .with_voi_lut(VoiLutOption::Normalize)
            .with_bit_depth(BitDepthOption::Force8Bit);
        let image = pixels
            .to_dynamic_image_with_options(0, &options)
            .map_err(|e| DicomError::UnsupportedPixelFormat(e.to_string()))?;

        Ok(DecodedDicom { metadata, image })
    }
}

/// Part 10 file (`DICM` after the preamble), else a bare implicit VR little
/// endian dataset that starts in group 0008.
fn load(data: &[u8]) -> Result<DefaultDicomObject, DicomError> {
    if data.len() >= PREAMBLE_LEN + MAGIC.len() && &data[PREAMBLE_LEN..PREAMBLE_LEN + 4] == MAGIC {
        load_part10(&data[PREAMBLE_LEN..])
    } else if data.starts_with(&[0x08, 0x00]) {
        load_bare_dataset(data)
    } else {
        Err(DicomError::InvalidFormat(
            "missing DICM marker and no group 0008 dataset".to_string(),
        ))
    }
}

fn load_part10(file: &[u8]) -> Result<DefaultDicomObject, DicomError> {
    let mut cursor = Cursor::new(file);
    let meta = FileMetaTable::from_reader(&mut cursor)
        .map_err(|e| DicomError::InvalidFormat(format!("file meta group: {}", e)))?;

    let uid = meta.transfer_syntax();
    let ts = TransferSyntaxRegistry
        .get(uid)
        .ok_or_else(|| DicomError::InvalidFormat(format!("unknown transfer syntax {}", uid)))?;

    let dataset_start = cursor.position() as usize;
    check_sequence_depth(&file[dataset_start..], ts)?;

    from_reader(Cursor::new(file)).map_err(|e| DicomError::InvalidFormat(e.to_string()))
}

fn load_bare_dataset(data: &[u8]) -> Result<DefaultDicomObject, DicomError> {
    let ts = TransferSyntaxRegistry
        .get(uids::IMPLICIT_VR_LITTLE_ENDIAN)
        .ok_or_else(|| DicomError::InvalidFormat("implicit VR little endian unavailable".to_string()))?;

    check_sequence_depth(data, ts)?;

    let dataset = InMemDicomObject::read_dataset_with_ts(Cursor::new(data), ts)
        .map_err(|e| DicomError::InvalidFormat(e.to_string()))?;

    let sop_class = string_at(&dataset, tags::SOP_CLASS_UID)
        .unwrap_or_else(|| uids::SECONDARY_CAPTURE_IMAGE_STORAGE.to_string());
    let sop_instance =
        string_at(&dataset, tags::SOP_INSTANCE_UID).unwrap_or_else(|| "2.25.0".to_string());

    dataset
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::IMPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(sop_class)
                .media_storage_sop_instance_uid(sop_instance),
        )
        .map_err(|e| DicomError::InvalidFormat(e.to_string()))
}

/// Walks the token stream without building the object. The object model
/// recurses per nesting level, so depth is bounded here first.
fn check_sequence_depth(dataset: &[u8], ts: &TransferSyntax) -> Result<(), DicomError> {
    let reader = DataSetReader::new_with_ts(Cursor::new(dataset), ts)
        .map_err(|e| DicomError::InvalidFormat(e.to_string()))?;

    let mut depth = 0usize;
    for token in reader {
        match token.map_err(|e| DicomError::InvalidFormat(e.to_string()))? {
            DataToken::SequenceStart { .. } | DataToken::PixelSequenceStart => {
                depth += 1;
                if depth > MAX_SEQUENCE_DEPTH {
                    return Err(DicomError::InvalidFormat(format!(
                        "sequences nested deeper than {} levels",
                        MAX_SEQUENCE_DEPTH
                    )));
                }
            }
            DataToken::SequenceEnd => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    Ok(())
}

fn has_element(object: &InMemDicomObject, tag: Tag) -> bool {
    matches!(object.element_opt(tag), Ok(Some(_)))
}

fn string_at(object: &InMemDicomObject, tag: Tag) -> Option<String> {
    object
        .element_opt(tag)
        .ok()
        .flatten()
        .and_then(|element| element.to_str().ok())
        .map(|value: Cow<'_, str>| {
            value
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        })
        .filter(|value| !value.is_empty())
}

fn u16_at(object: &InMemDicomObject, tag: Tag) -> Option<u16> {
    object
        .element_opt(tag)
        .ok()
        .flatten()
        .and_then(|element| element.to_int::<u16>().ok())
}

fn metadata_of(object: &DefaultDicomObject) -> DicomMetadata {
    let uid = object.meta().transfer_syntax();

    DicomMetadata {
        transfer_syntax_uid: (!uid.is_empty()).then(|| uid.to_string()),
        sop_instance_uid: string_at(object, tags::SOP_INSTANCE_UID),
        study_instance_uid: string_at(object, tags::STUDY_INSTANCE_UID),
        modality: string_at(object, tags::MODALITY),
        study_date: string_at(object, tags::STUDY_DATE),
        patient_id: string_at(object, tags::PATIENT_ID),
        rows: u16_at(object, tags::ROWS),
        columns: u16_at(object, tags::COLUMNS),
        samples_per_pixel: u16_at(object, tags::SAMPLES_PER_PIXEL),
        bits_allocated: u16_at(object, tags::BITS_ALLOCATED),
        pixel_representation: u16_at(object, tags::PIXEL_REPRESENTATION),
        planar_configuration: u16_at(object, tags::PLANAR_CONFIGURATION),
        photometric_interpretation: string_at(object, tags::PHOTOMETRIC_INTERPRETATION),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builders for synthetic DICOM files

    use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
    use dicom_dictionary_std::{tags, uids};
    use dicom_object::mem::InMemElement;
    use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

    pub const EXPLICIT_LE: &str = "1.2.840.10008.1.2.1";
    pub const SOP_INSTANCE: &str = "2.25.112233";

    fn text(tag: Tag, vr: VR, value: &str) -> InMemElement {
        DataElement::new(tag, vr, PrimitiveValue::from(value))
    }

    fn short(tag: Tag, value: u16) -> InMemElement {
        DataElement::new(tag, VR::US, PrimitiveValue::from(value))
    }

    /// Header attributes shared by every sample, no pixel module
    pub fn header_only() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            text(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
            text(tags::SOP_INSTANCE_UID, VR::UI, SOP_INSTANCE),
            text(tags::STUDY_DATE, VR::DA, "20240115"),
            text(tags::MODALITY, VR::CS, "DX"),
            text(tags::PATIENT_ID, VR::LO, "PAT-001"),
        ])
    }

    /// Single-frame monochrome image, 8 or 16 bits
    pub fn mono_object(rows: u16, columns: u16, bits: u16, photometric: &str, pixels: &[u16]) -> InMemDicomObject {
        let mut object = header_only();
        object.put(short(tags::SAMPLES_PER_PIXEL, 1));
        object.put(text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, photometric));
        object.put(short(tags::ROWS, rows));
        object.put(short(tags::COLUMNS, columns));
        object.put(short(tags::BITS_ALLOCATED, bits));
        object.put(short(tags::BITS_STORED, bits));
        object.put(short(tags::HIGH_BIT, bits - 1));
        object.put(short(tags::PIXEL_REPRESENTATION, 0));

        let pixel_data = if bits == 8 {
            DataElement::new(
                tags::PIXEL_DATA,
                VR::OB,
                PrimitiveValue::from(pixels.iter().map(|p| *p as u8).collect::<Vec<u8>>()),
            )
        } else {
            DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(pixels.to_vec().into()))
        };
        object.put(pixel_data);
        object
    }

    /// Preamble, `DICM`, file meta group and dataset
    pub fn part10(object: InMemDicomObject, transfer_syntax: &str) -> Vec<u8> {
        let file = object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(transfer_syntax)
                    .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(SOP_INSTANCE),
            )
            .unwrap();
        let mut out = Vec::new();
        file.write_all(&mut out).unwrap();
        out
    }

    /// Valid file meta group followed by `levels` undefined-length sequences,
    /// each opening an undefined-length item that holds the next one
    pub fn nested_sequences(levels: usize) -> Vec<u8> {
        let meta = FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_LE)
            .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(SOP_INSTANCE)
            .build()
            .unwrap();

        let mut out = vec![0u8; 128];
        meta.write(&mut out).unwrap();
        for _ in 0..levels {
            // (0008,1115) SQ, undefined length
            out.extend_from_slice(&[0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
            // (FFFE,E000) item, undefined length
            out.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF]);
        }
        out
    }

    pub fn sample_dicom() -> Vec<u8> {
        let pixels: Vec<u16> = (0..64u16).map(|i| i * 4).collect();
        part10(mono_object(8, 8, 8, "MONOCHROME2", &pixels), EXPLICIT_LE)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use dicom_object::FileMetaTableBuilder;
    use image::GenericImageView;

    #[test]
    fn test_is_dicom_upload() {
        assert!(is_dicom_upload("scan.dcm", "application/octet-stream"));
        assert!(is_dicom_upload("SCAN.DICOM", ""));
        assert!(is_dicom_upload("scan.bin", "application/dicom"));
        assert!(is_dicom_upload("scan", "Application/DICOM; charset=binary"));
        assert!(!is_dicom_upload("scan.png", "image/png"));
        assert!(!is_dicom_upload("dcm", "image/jpeg"));
        assert!(!is_dicom_upload("scan.dcm.jpg", "image/jpeg"));
    }

    #[test]
    fn test_decode_8bit_monochrome() {
        let file = part10(mono_object(2, 2, 8, "MONOCHROME2", &[0, 64, 128, 255]), EXPLICIT_LE);

        let decoded = NativeDicomDecoder.decode(&file).unwrap();
        assert_eq!(decoded.image.dimensions(), (2, 2));

        let luma = decoded.image.to_luma8().into_raw();
        assert!(luma.windows(2).all(|w| w[0] <= w[1]));
        assert!(luma[0] < luma[3]);

        assert_eq!(decoded.metadata.modality.as_deref(), Some("DX"));
        assert_eq!(decoded.metadata.study_date.as_deref(), Some("20240115"));
        assert_eq!(decoded.metadata.patient_id.as_deref(), Some("PAT-001"));
        assert_eq!(decoded.metadata.sop_instance_uid.as_deref(), Some(SOP_INSTANCE));
        assert_eq!(decoded.metadata.rows, Some(2));
        assert_eq!(
            decoded.metadata.transfer_syntax_uid.as_deref(),
            Some(EXPLICIT_LE)
        );
    }

    #[test]
    fn test_decode_16bit_to_8bit_range() {
        let file = part10(
            mono_object(2, 2, 16, "MONOCHROME2", &[100, 200, 300, 400]),
            EXPLICIT_LE,
        );

        let decoded = NativeDicomDecoder.decode(&file).unwrap();
        let luma = decoded.image.to_luma8().into_raw();
        assert_eq!(luma.len(), 4);
        assert!(luma.windows(2).all(|w| w[0] <= w[1]));
        assert!(luma[0] < luma[3]);
        assert_eq!(decoded.metadata.bits_allocated, Some(16));
    }

    #[test]
    fn test_implicit_vr_without_preamble() {
        let file = part10(mono_object(1, 2, 8, "MONOCHROME2", &[10, 20]), uids::IMPLICIT_VR_LITTLE_ENDIAN);
        // Drop preamble and file meta group: dataset only
        let meta_end = {
            let mut cursor = Cursor::new(&file[PREAMBLE_LEN..]);
            FileMetaTable::from_reader(&mut cursor).unwrap();
            PREAMBLE_LEN + cursor.position() as usize
        };
        let bare = &file[meta_end..];
        assert_eq!(&bare[..2], &[0x08, 0x00]);

        let decoded = NativeDicomDecoder.decode(bare).unwrap();
        assert_eq!(decoded.metadata.modality.as_deref(), Some("DX"));
        assert_eq!(decoded.image.dimensions(), (2, 1));
    }

    #[test]
    fn test_deep_sequence_nesting_is_rejected() {
        let file = nested_sequences(10_000);

        let err = NativeDicomDecoder.validate(&file).unwrap_err();
        assert!(matches!(err, DicomError::InvalidFormat(_)));
        assert!(!err.is_recoverable());

        let err = NativeDicomDecoder.decode(&file).unwrap_err();
        assert!(matches!(err, DicomError::InvalidFormat(_)));
    }

    #[test]
    fn test_shallow_nesting_is_walked() {
        let file = nested_sequences(3);
        let data = &file[PREAMBLE_LEN..];
        let mut cursor = Cursor::new(data);
        FileMetaTable::from_reader(&mut cursor).unwrap();
        let dataset = &data[cursor.position() as usize..];

        let ts = TransferSyntaxRegistry.get(EXPLICIT_LE).unwrap();
        // Unterminated, so the walk ends in an error, but not a depth error
        match check_sequence_depth(dataset, ts) {
            Ok(()) => {}
            Err(DicomError::InvalidFormat(msg)) => assert!(!msg.contains("nested deeper")),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_undecodable_encoding_is_recoverable() {
        // JPEG 2000 without a codec in the build
        let file = part10(header_only(), "1.2.840.10008.1.2.4.90");

        let metadata = NativeDicomDecoder.validate(&file).unwrap();
        assert_eq!(metadata.modality.as_deref(), Some("DX"));

        let err = NativeDicomDecoder.decode(&file).unwrap_err();
        assert_eq!(
            err,
            DicomError::UnsupportedTransferSyntax("1.2.840.10008.1.2.4.90".to_string())
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_garbage_is_invalid_format() {
        let err = NativeDicomDecoder
            .validate(b"\x89PNG\r\n\x1a\nnot a dicom file")
            .unwrap_err();
        assert!(matches!(err, DicomError::InvalidFormat(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_unknown_transfer_syntax_is_invalid() {
        let meta = FileMetaTableBuilder::new()
            .transfer_syntax("1.2.3.4.5.6.7")
            .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(SOP_INSTANCE)
            .build()
            .unwrap();
        let mut file = vec![0u8; PREAMBLE_LEN];
        meta.write(&mut file).unwrap();

        let err = NativeDicomDecoder.validate(&file).unwrap_err();
        assert!(matches!(err, DicomError::InvalidFormat(_)));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let mut file = sample_dicom();
        file.truncate(file.len() - 10);
        let err = NativeDicomDecoder.decode(&file).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_missing_pixel_data() {
        let file = part10(header_only(), EXPLICIT_LE);
        let err = NativeDicomDecoder.decode(&file).unwrap_err();
        assert_eq!(err, DicomError::MissingPixelData);
        assert!(err.is_recoverable());
    }
}
