// Document Extraction Service
// Reads contract files and yields ordered paragraph segments

use regex::Regex;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{segments_from_texts, Segment, SegmentationMode};
use crate::services::text_processor::{normalize_punctuation, split_paragraphs};

static DOCX_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*[^/])?>(.*?)</w:p>").unwrap());
static DOCX_RUN_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br(?:\s[^>]*)?/>").unwrap());
static XML_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|amp|lt|gt|quot|apos);").unwrap());

#[derive(Error, Debug)]
pub enum DocumentReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("malformed docx container: {0}")]
    MalformedDocx(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("document is not valid UTF-8 text")]
    InvalidEncoding,
    #[error("document {0} contains no text")]
    Empty(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Docx,
    Pdf,
}

impl DocumentFormat {
    pub fn from_file_name(name: &str) -> Result<Self, DocumentReadError> {
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "md" | "text" | "" => Ok(Self::PlainText),
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            other => Err(DocumentReadError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Extract raw paragraphs from an in-memory document.
/// Blank paragraphs are never returned.
pub fn extract_paragraphs(
    file_name: &str,
    bytes: &[u8],
    mode: SegmentationMode,
) -> Result<Vec<String>, DocumentReadError> {
    let format = DocumentFormat::from_file_name(file_name)?;
    debug!("[DOCUMENT] extracting {} as {:?}", file_name, format);

    let paragraphs = match format {
        DocumentFormat::PlainText => {
            let text = std::str::from_utf8(bytes).map_err(|_| DocumentReadError::InvalidEncoding)?;
            let text = text.trim_start_matches('\u{feff}');
            split_paragraphs(&normalize_punctuation(text), mode)
        }
        DocumentFormat::Pdf => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| DocumentReadError::Pdf(e.to_string()))?;
            split_paragraphs(&normalize_punctuation(&text), mode)
        }
        DocumentFormat::Docx => docx_paragraphs(bytes)?
            .iter()
            .map(|p| normalize_punctuation(p))
            .filter(|p| !p.is_empty())
            .collect(),
    };

    Ok(paragraphs)
}

/// Read a contract file into an ordered segment sequence.
pub fn read_segments(path: &Path, mode: SegmentationMode) -> Result<Vec<Segment>, DocumentReadError> {
    let bytes = std::fs::read(path).map_err(|source| DocumentReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input.txt".to_string());

    let segments = segments_from_texts(extract_paragraphs(&file_name, &bytes, mode)?);
    if segments.is_empty() {
        return Err(DocumentReadError::Empty(path.display().to_string()));
    }

    info!(
        "[DOCUMENT] {} -> {} segments ({} bytes)",
        path.display(),
        segments.len(),
        bytes.len()
    );
    Ok(segments)
}

fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, DocumentReadError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DocumentReadError::MalformedDocx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| DocumentReadError::MalformedDocx(format!("word/document.xml: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| DocumentReadError::MalformedDocx(e.to_string()))?;

    Ok(paragraphs_from_document_xml(&xml))
}

fn paragraphs_from_document_xml(xml: &str) -> Vec<String> {
    DOCX_PARAGRAPH_RE
        .captures_iter(xml)
        .filter_map(|para| {
            let body = para.get(1)?.as_str();
            let mut text = String::new();
            for run in DOCX_RUN_TEXT_RE.captures_iter(body) {
                match run.get(1) {
                    Some(t) => text.push_str(&unescape_xml(t.as_str())),
                    None => text.push(' '),
                }
            }
            let text = text.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .collect()
}

fn unescape_xml(s: &str) -> String {
    XML_ENTITY_RE
        .replace_all(s, |caps: &regex::Captures| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                        .map(|c| c.to_string())
                        .unwrap_or_default()
                }
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(DocumentFormat::from_file_name("v1.TXT").unwrap(), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_file_name("acte.docx").unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_file_name("acte.pdf").unwrap(), DocumentFormat::Pdf);
        assert!(matches!(
            DocumentFormat::from_file_name("acte.odt"),
            Err(DocumentReadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_plain_text_extraction() {
        let bytes = "\u{feff}ARTICLE 3 - PRIX\r\nLe prix est fixé.\r\n\r\n".as_bytes();
        let paras = extract_paragraphs("v1.txt", bytes, SegmentationMode::Lines).unwrap();
        assert_eq!(paras, vec!["ARTICLE 3 - PRIX", "Le prix est fixé."]);
    }

    #[test]
    fn test_plain_text_rejects_invalid_utf8() {
        let err = extract_paragraphs("v1.txt", &[0xff, 0xfe, 0x00], SegmentationMode::Lines);
        assert!(matches!(err, Err(DocumentReadError::InvalidEncoding)));
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<w:document><w:body>
            <w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t>ARTICLE 3</w:t></w:r></w:p>
            <w:p w:rsidR="00A1"><w:r><w:t xml:space="preserve">Le prix est </w:t></w:r><w:r><w:t>250.000 &amp; TVA</w:t></w:r></w:p>
            <w:p><w:r><w:t></w:t></w:r></w:p>
            <w:p/>
        </w:body></w:document>"#;
        let bytes = build_docx(xml);
        let paras = extract_paragraphs("acte.docx", &bytes, SegmentationMode::Lines).unwrap();
        assert_eq!(paras, vec!["ARTICLE 3", "Le prix est 250.000 & TVA"]);
    }

    #[test]
    fn test_malformed_docx() {
        let err = extract_paragraphs("acte.docx", b"not a zip", SegmentationMode::Lines);
        assert!(matches!(err, Err(DocumentReadError::MalformedDocx(_))));
    }

    #[test]
    fn test_unescape_numeric_entities() {
        assert_eq!(unescape_xml("&#233;t&#xE9; &lt;b&gt;"), "été <b>");
    }

    #[test]
    fn test_read_segments_empty_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \n\n").unwrap();
        assert!(matches!(
            read_segments(&path, SegmentationMode::Lines),
            Err(DocumentReadError::Empty(_))
        ));
    }

    #[test]
    fn test_read_segments_missing_file_is_io_error() {
        let err = read_segments(Path::new("/nonexistent/contract.txt"), SegmentationMode::Lines);
        assert!(matches!(err, Err(DocumentReadError::Io { .. })));
    }
}
