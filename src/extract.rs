// SPDX-License-Identifier: MIT

//! Content extraction from source documents
//!
//! Turns a file on disk into either text or a rendered image the analyzer
//! chain can work with. Extraction is best-effort: any failure degrades to
//! `None` with a warning so the heuristics still get a shot at the filename.

use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Broad media category, decided from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Docx,
    Text,
    Other,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff" => Self::Image,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" | "md" | "csv" => Self::Text,
            _ => Self::Other,
        }
    }
}

/// A file queued for renaming, with its media category resolved.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl SourceDocument {
    pub fn new(path: PathBuf) -> Self {
        let kind = MediaKind::from_path(&path);
        Self { path, kind }
    }

    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string()
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_string())
    }
}

/// What extraction produced for a document.
#[derive(Debug, Clone)]
pub enum ExtractedContent {
    /// Readable text, for the remote text model and the heuristics.
    Text { text: String, page_count: usize },
    /// Image bytes, for the vision model and the OCR tier. For scanned PDFs
    /// this is the embedded first-page scan.
    RenderedImage { bytes: Vec<u8>, page_count: usize },
}

/// Best-effort extractor over all supported media kinds.
pub struct TextExtractor {
    /// Pages of a PDF considered for text extraction.
    max_pdf_pages: u32,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self { max_pdf_pages: 3 }
    }
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract content, or `None` when the document yields nothing usable.
    pub fn extract(&self, document: &SourceDocument) -> Option<ExtractedContent> {
        let result = match document.kind {
            MediaKind::Text => self.extract_plain_text(&document.path),
            MediaKind::Pdf => self.extract_pdf(&document.path),
            MediaKind::Docx => self.extract_docx(&document.path),
            MediaKind::Image => self.load_image(&document.path),
            MediaKind::Other => None,
        };

        if result.is_none() {
            warn!("no content extracted from {}", document.path.display());
        }
        result
    }

    fn extract_plain_text(&self, path: &Path) -> Option<ExtractedContent> {
        let bytes = std::fs::read(path).ok()?;
        let text = decode_text(&bytes)?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some(ExtractedContent::Text { text, page_count: 1 })
    }

    fn extract_pdf(&self, path: &Path) -> Option<ExtractedContent> {
        let bytes = std::fs::read(path).ok()?;

        let doc = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("failed to parse PDF {}: {}", path.display(), e);
                return None;
            }
        };
        let page_count = doc.get_pages().len();

        let pages: Vec<u32> = (1..=self.max_pdf_pages.min(page_count as u32)).collect();
        if let Ok(text) = doc.extract_text(&pages) {
            let text = text.trim().to_string();
            if text.chars().filter(|c| !c.is_whitespace()).count() > 10 {
                return Some(ExtractedContent::Text { text, page_count });
            }
        }

        // Some PDFs defeat lopdf's text extraction but not pdf-extract's.
        if let Ok(text) = pdf_extract::extract_text_from_mem(&bytes) {
            let text = text.trim().to_string();
            if text.chars().filter(|c| !c.is_whitespace()).count() > 10 {
                return Some(ExtractedContent::Text { text, page_count });
            }
        }

        // No usable text layer: likely a scan. Pull the first embedded
        // JPEG so the vision/OCR tiers can read the page.
        debug!("{} has no text layer, checking for scan image", path.display());
        first_page_image(&doc).map(|bytes| ExtractedContent::RenderedImage { bytes, page_count })
    }

    fn extract_docx(&self, path: &Path) -> Option<ExtractedContent> {
        let file = std::fs::File::open(path).ok()?;
        let mut archive = zip::ZipArchive::new(file).ok()?;
        let mut entry = archive.by_name("word/document.xml").ok()?;
        let mut xml = String::new();
        entry.read_to_string(&mut xml).ok()?;

        let text = scrape_docx_text(&xml);
        if text.is_empty() {
            return None;
        }
        Some(ExtractedContent::Text { text, page_count: 1 })
    }

    fn load_image(&self, path: &Path) -> Option<ExtractedContent> {
        let bytes = std::fs::read(path).ok()?;
        Some(ExtractedContent::RenderedImage {
            bytes,
            page_count: 1,
        })
    }
}

/// Decode bytes as text, trying UTF-8 first and common Chinese encodings
/// after. A candidate wins only when it decodes without replacement.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    let encodings = [
        encoding_rs::UTF_8,
        encoding_rs::GBK,
        encoding_rs::GB18030,
        encoding_rs::WINDOWS_1252,
    ];

    for encoding in encodings {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Some(decoded.into_owned());
        }
    }
    None
}

/// Collect the character content of `<w:t>` runs, paragraph breaks as
/// newlines. Enough structure for field inference without a full XML parser.
fn scrape_docx_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<w:t") {
        rest = &rest[start..];
        let Some(open_end) = rest.find('>') else { break };
        // Self-closing run carries no text.
        if rest[..open_end].ends_with('/') {
            rest = &rest[open_end + 1..];
            continue;
        }
        rest = &rest[open_end + 1..];
        let Some(close) = rest.find("</w:t>") else { break };
        out.push_str(&unescape_xml(&rest[..close]));
        rest = &rest[close + 6..];

        if let Some(para) = rest.find("</w:p>") {
            if rest.find("<w:t").map_or(true, |next| para < next) {
                out.push('\n');
            }
        }
    }

    out.trim().to_string()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Find the first image XObject on page 1 that is a DCTDecode (JPEG) stream
/// and return its raw content. Scanned PDFs store the page scan this way.
fn first_page_image(doc: &lopdf::Document) -> Option<Vec<u8>> {
    use lopdf::Object;

    let (_, first_page_id) = doc.get_pages().into_iter().next()?;
    let (resources, _) = doc.get_page_resources(first_page_id);
    let resources = resources?;

    let xobjects = resources.get(b"XObject").ok()?;
    let xobjects = match xobjects {
        Object::Dictionary(dict) => dict.clone(),
        Object::Reference(id) => doc.get_dictionary(*id).ok()?.clone(),
        _ => return None,
    };

    for (_, object) in xobjects.iter() {
        let stream = match object {
            Object::Reference(id) => match doc.get_object(*id).ok()? {
                Object::Stream(stream) => stream,
                _ => continue,
            },
            Object::Stream(stream) => stream,
            _ => continue,
        };

        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|name| name == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let is_jpeg = match stream.dict.get(b"Filter") {
            Ok(Object::Name(name)) => name == b"DCTDecode",
            Ok(Object::Array(filters)) => filters
                .iter()
                .any(|f| f.as_name().map(|n| n == b"DCTDecode").unwrap_or(false)),
            _ => false,
        };
        if is_jpeg {
            return Some(stream.content.clone());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn media_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("scan.JPG")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("a/b/合同.pdf")), MediaKind::Pdf);
        assert_eq!(MediaKind::from_path(Path::new("report.docx")), MediaKind::Docx);
        assert_eq!(MediaKind::from_path(Path::new("notes.md")), MediaKind::Text);
        assert_eq!(MediaKind::from_path(Path::new("archive.tar")), MediaKind::Other);
        assert_eq!(MediaKind::from_path(Path::new("noext")), MediaKind::Other);
    }

    #[test]
    fn decodes_utf8_and_gbk() {
        assert_eq!(decode_text("基金合同".as_bytes()).unwrap(), "基金合同");

        // "基金" in GBK
        let gbk = [0xBB, 0xF9, 0xBD, 0xF0];
        assert_eq!(decode_text(&gbk).unwrap(), "基金");
    }

    #[test]
    fn plain_text_extraction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notice.txt");
        std::fs::write(&path, "展弘基金 临时开放日公告 2025年8月22日").unwrap();

        let doc = SourceDocument::new(path);
        match TextExtractor::new().extract(&doc) {
            Some(ExtractedContent::Text { text, .. }) => {
                assert!(text.contains("临时开放日公告"));
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn empty_file_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let doc = SourceDocument::new(path);
        assert!(TextExtractor::new().extract(&doc).is_none());
    }

    #[test]
    fn docx_text_scraping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contract.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer
            .write_all(
                "<w:document><w:body><w:p><w:r><w:t>私募基金合同</w:t></w:r></w:p>\
                 <w:p><w:r><w:t xml:space=\"preserve\">签署日期 2025-08-22</w:t></w:r></w:p>\
                 </w:body></w:document>"
                    .as_bytes(),
            )
            .unwrap();
        writer.finish().unwrap();

        let doc = SourceDocument::new(path);
        match TextExtractor::new().extract(&doc) {
            Some(ExtractedContent::Text { text, .. }) => {
                assert!(text.contains("私募基金合同"));
                assert!(text.contains("2025-08-22"));
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn images_pass_through_as_rendered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let doc = SourceDocument::new(path);
        match TextExtractor::new().extract(&doc) {
            Some(ExtractedContent::RenderedImage { bytes, page_count }) => {
                assert_eq!(bytes[..2], [0xFF, 0xD8]);
                assert_eq!(page_count, 1);
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn xml_entities_are_unescaped() {
        assert_eq!(unescape_xml("A&amp;B &lt;基金&gt;"), "A&B <基金>");
    }
}
