use amrview_core::{DecodeReport, MapDocument, RawMapDocument};
use serde_json::Value;
use std::io::{Cursor, Read, Write};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const PAYLOAD_PATH: &str = "payload/scene.json";

const MAP_KEYS: [&str; 3] = ["nodeKeys", "lineKeys", "nodeArr"];
const SECURITY_KEY: &str = "AvoidSceneSet";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid map container: {0}")]
    ContainerFormat(String),
    #[error("unrecognized payload: {0}")]
    Schema(String),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read container: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ZipError> for DecodeError {
    fn from(e: ZipError) -> Self {
        match e {
            ZipError::Io(io) => Self::Io(io),
            ZipError::FileNotFound => Self::ContainerFormat(format!("missing {PAYLOAD_PATH}")),
            other => Self::ContainerFormat(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportedDocument {
    Map {
        document: MapDocument,
        report: DecodeReport,
    },
    Security(Value),
}

pub fn decode(bytes: &[u8]) -> Result<ImportedDocument, DecodeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive.by_name(PAYLOAD_PATH)?;
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    decode_payload(serde_json::from_str(&text)?)
}

pub fn decode_payload(payload: Value) -> Result<ImportedDocument, DecodeError> {
    let Some(obj) = payload.as_object() else {
        return Err(DecodeError::Schema("payload is not a JSON object".to_string()));
    };

    if MAP_KEYS.iter().all(|k| obj.contains_key(*k)) {
        let raw: RawMapDocument = serde_json::from_value(payload)?;
        let (document, report) = MapDocument::from_raw(raw);
        for mismatch in &report.header_mismatches {
            tracing::warn!(%mismatch, "unexpected key header; entries read positionally");
        }
        for (index, issue) in &report.dropped_nodes {
            tracing::warn!(index, %issue, "dropped node entry");
        }
        for (index, issue) in &report.dropped_lines {
            tracing::warn!(index, %issue, "dropped line entry");
        }
        tracing::info!(
            nodes = document.nodes.len(),
            lines = document.lines.len(),
            dropped = report.dropped_total(),
            "decoded map document"
        );
        return Ok(ImportedDocument::Map { document, report });
    }

    if obj.contains_key(SECURITY_KEY) {
        tracing::info!("decoded security document");
        return Ok(ImportedDocument::Security(payload));
    }

    let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    keys.sort_unstable();
    Err(DecodeError::Schema(format!(
        "expected map keys {MAP_KEYS:?} or `{SECURITY_KEY}`, found {keys:?}"
    )))
}

pub fn encode_payload(payload: &Value) -> Result<Vec<u8>, DecodeError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(PAYLOAD_PATH, options)?;
    zip.write_all(&serde_json::to_vec(payload)?)?;
    Ok(zip.finish()?.into_inner())
}

pub fn encode_map(document: &MapDocument) -> Result<Vec<u8>, DecodeError> {
    encode_payload(&serde_json::to_value(document.to_raw())?)
}
