//! Size-adaptive upload preparation.
//!
//! Turns a user-selected file into the single payload sent to `/analyze`:
//! the file as-is, a zip archive of it, or a refusal before any request
//! is made.

use std::io::{Cursor, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::SizeLimits;
use crate::error::ClientError;
use crate::logging::{log_upload_decision, v_str, ProfileScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileExtension {
    Csv,
    Tsv,
    Xlsx,
    Xls,
    Zip,
    Other,
}

impl FileExtension {
    /// Derived from the trailing suffix of the file name, case-insensitive.
    pub fn from_name(name: &str) -> Self {
        let suffix = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => return FileExtension::Other,
        };
        match suffix.as_str() {
            "csv" => FileExtension::Csv,
            "tsv" => FileExtension::Tsv,
            "xlsx" => FileExtension::Xlsx,
            "xls" => FileExtension::Xls,
            "zip" => FileExtension::Zip,
            _ => FileExtension::Other,
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            FileExtension::Csv | FileExtension::Tsv => FileKind::CsvLike,
            FileExtension::Xlsx | FileExtension::Xls => FileKind::ExcelLike,
            FileExtension::Zip | FileExtension::Other => FileKind::Unclassified,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileExtension::Csv => "text/csv",
            FileExtension::Tsv => "text/tab-separated-values",
            FileExtension::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            FileExtension::Xls => "application/vnd.ms-excel",
            FileExtension::Zip => "application/zip",
            FileExtension::Other => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    CsvLike,
    ExcelLike,
    Unclassified,
}

/// One user file selection.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    name: String,
    bytes: Vec<u8>,
    extension: FileExtension,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let extension = FileExtension::from_name(&name);
        Self { name, bytes, extension }
    }

    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::input(format!("Not a file: {}", path.display())))?;
        let bytes = std::fs::read(path)
            .map_err(|e| ClientError::input(format!("Cannot read {}: {}", path.display(), e)))?;
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn extension(&self) -> FileExtension {
        self.extension
    }

    pub fn kind(&self) -> FileKind {
        self.extension.kind()
    }

    /// Hex SHA-256 of the file contents.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// What the size policy decided to do with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    SendRaw,
    Compress,
}

impl UploadPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadPlan::SendRaw => "send_raw",
            UploadPlan::Compress => "compress",
        }
    }
}

/// The artifact that actually goes into the multipart `file` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

/// Apply the size policy without touching the bytes.
pub fn plan_upload(
    file: Option<&UploadRequest>,
    limits: &SizeLimits,
) -> Result<UploadPlan, ClientError> {
    let file = file.ok_or_else(|| ClientError::input("No file provided"))?;
    let size = file.declared_size();
    let over_raw = size > limits.raw_max_bytes;

    match file.kind() {
        // Excel is already compressed; zipping it again would not help.
        FileKind::ExcelLike if over_raw => Err(ClientError::PayloadTooLarge {
            size,
            limit: limits.raw_max_bytes,
        }),
        FileKind::CsvLike if over_raw && limits.zip_allowed => Ok(UploadPlan::Compress),
        _ => Ok(UploadPlan::SendRaw),
    }
}

/// Plan, compress if needed, and enforce the zip ceiling.
pub fn prepare_upload(
    file: Option<&UploadRequest>,
    limits: &SizeLimits,
) -> Result<UploadPayload, ClientError> {
    let file = file.ok_or_else(|| ClientError::input("No file provided"))?;
    let plan = match plan_upload(Some(file), limits) {
        Ok(plan) => plan,
        Err(err) => {
            log_upload_decision(file.name(), &file.digest(), file.declared_size(), "reject");
            return Err(err);
        }
    };
    log_upload_decision(file.name(), &file.digest(), file.declared_size(), plan.as_str());

    match plan {
        UploadPlan::SendRaw => Ok(UploadPayload {
            file_name: file.name().to_string(),
            content_type: file.extension().content_type().to_string(),
            bytes: file.bytes().to_vec(),
            compressed: false,
        }),
        UploadPlan::Compress => {
            let archive = zip_single(file.name(), file.bytes())
                .map_err(|e| ClientError::input(format!("Failed to compress {}: {}", file.name(), e)))?;
            ensure_within_zip_limit(archive.len() as u64, limits)?;
            Ok(UploadPayload {
                file_name: zip_name(file.name()),
                content_type: FileExtension::Zip.content_type().to_string(),
                bytes: archive,
                compressed: true,
            })
        }
    }
}

pub fn ensure_within_zip_limit(compressed_size: u64, limits: &SizeLimits) -> Result<(), ClientError> {
    if compressed_size > limits.zip_max_bytes {
        return Err(ClientError::PayloadTooLarge {
            size: compressed_size,
            limit: limits.zip_max_bytes,
        });
    }
    Ok(())
}

/// `sales.csv` -> `sales.zip`
pub fn zip_name(file_name: &str) -> String {
    let base = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    format!("{}.zip", base)
}

/// Wrap one file into an in-memory zip archive using Deflate.
pub fn zip_single(entry_name: &str, bytes: &[u8]) -> zip::result::ZipResult<Vec<u8>> {
    let _scope = ProfileScope::with_context(
        "zip_single",
        &[("file_name", v_str(entry_name)), ("input_bytes", serde_json::json!(bytes.len()))],
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(bytes.len() as u64 >= u32::MAX as u64);
    writer.start_file(entry_name, options)?;
    writer.write_all(bytes)?;
    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn limits(raw: u64, zip: u64, zip_allowed: bool) -> SizeLimits {
        SizeLimits {
            raw_max_bytes: raw,
            zip_max_bytes: zip,
            zip_allowed,
        }
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(FileExtension::from_name("Data.CSV"), FileExtension::Csv);
        assert_eq!(FileExtension::from_name("a.b.TsV"), FileExtension::Tsv);
        assert_eq!(FileExtension::from_name("book.XLSX"), FileExtension::Xlsx);
        assert_eq!(FileExtension::from_name("old.xls"), FileExtension::Xls);
        assert_eq!(FileExtension::from_name("bundle.zip"), FileExtension::Zip);
        assert_eq!(FileExtension::from_name("notes.txt"), FileExtension::Other);
        assert_eq!(FileExtension::from_name("csv"), FileExtension::Other);
        assert_eq!(FileExtension::from_name(".csv"), FileExtension::Other);
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = plan_upload(None, &SizeLimits::default()).unwrap_err();
        assert_eq!(err, ClientError::input("No file provided"));
    }

    #[test]
    fn test_small_csv_sent_raw() {
        let req = UploadRequest::new("a.csv", b"x,y\n1,2\n".to_vec());
        let payload = prepare_upload(Some(&req), &limits(8, 100, true)).unwrap();
        assert!(!payload.compressed);
        assert_eq!(payload.file_name, "a.csv");
        assert_eq!(payload.bytes, req.bytes());
    }

    #[test]
    fn test_csv_at_limit_sent_raw() {
        let req = UploadRequest::new("a.csv", vec![b'a'; 10]);
        assert_eq!(plan_upload(Some(&req), &limits(10, 100, true)).unwrap(), UploadPlan::SendRaw);
    }

    #[test]
    fn test_large_csv_zip_disabled_sent_raw() {
        let req = UploadRequest::new("a.csv", vec![b'a'; 100]);
        assert_eq!(plan_upload(Some(&req), &limits(10, 1000, false)).unwrap(), UploadPlan::SendRaw);
    }

    #[test]
    fn test_large_excel_rejected_regardless_of_zip() {
        for zip_allowed in [true, false] {
            let req = UploadRequest::new("book.xlsx", vec![0u8; 100]);
            let err = plan_upload(Some(&req), &limits(10, 1000, zip_allowed)).unwrap_err();
            assert_eq!(err, ClientError::PayloadTooLarge { size: 100, limit: 10 });
        }
    }

    #[test]
    fn test_unclassified_always_raw() {
        let req = UploadRequest::new("dump.json", vec![b'{'; 100]);
        assert_eq!(plan_upload(Some(&req), &limits(10, 20, true)).unwrap(), UploadPlan::SendRaw);
    }

    #[test]
    fn test_large_csv_compressed_and_renamed() {
        let body = "id,city,amount\n".to_string() + &"1,Berlin,10.5\n".repeat(2_000);
        let req = UploadRequest::new("sales.Q1.csv", body.clone().into_bytes());
        let payload = prepare_upload(Some(&req), &limits(1024, 1024 * 1024, true)).unwrap();
        assert!(payload.compressed);
        assert_eq!(payload.file_name, "sales.Q1.zip");
        assert_eq!(payload.content_type, "application/zip");
        assert!(payload.bytes.len() < body.len());

        let mut archive = zip::ZipArchive::new(Cursor::new(payload.bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "sales.Q1.csv");
        let mut restored = String::new();
        entry.read_to_string(&mut restored).unwrap();
        assert_eq!(restored, body);
    }

    #[test]
    fn test_original_bytes_untouched_by_compression() {
        let req = UploadRequest::new("a.csv", "k,v\n".repeat(500).into_bytes());
        let before = req.bytes().to_vec();
        let _ = prepare_upload(Some(&req), &limits(16, 1 << 20, true)).unwrap();
        assert_eq!(req.bytes(), &before[..]);
    }

    #[test]
    fn test_zip_limit_boundary() {
        let l = limits(1, 20, true);
        assert!(ensure_within_zip_limit(20, &l).is_ok());
        assert_eq!(
            ensure_within_zip_limit(21, &l).unwrap_err(),
            ClientError::PayloadTooLarge { size: 21, limit: 20 }
        );
    }

    #[test]
    fn test_zip_name() {
        assert_eq!(zip_name("sales.csv"), "sales.zip");
        assert_eq!(zip_name("noext"), "noext.zip");
        assert_eq!(zip_name(".hidden"), ".hidden.zip");
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let a = UploadRequest::new("a.csv", b"abc".to_vec());
        assert_eq!(
            a.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
