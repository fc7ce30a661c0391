//! Text extraction for the file formats the document loader accepts.
//!
//! Plain-text formats are decoded as UTF-8 (lossily). PDF goes through
//! `pdf-extract`; Word and PowerPoint files are OOXML ZIP archives whose
//! `<w:t>` / `<a:t>` runs are concatenated.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Formats the loader knows how to turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Markdown,
    Html,
    Pdf,
    Docx,
    Pptx,
}

impl TextFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" | "rst" | "csv" | "log" => Some(TextFormat::Plain),
            "md" | "markdown" => Some(TextFormat::Markdown),
            "html" | "htm" => Some(TextFormat::Html),
            "pdf" => Some(TextFormat::Pdf),
            "docx" => Some(TextFormat::Docx),
            "pptx" => Some(TextFormat::Pptx),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TextFormat::Plain => "text/plain",
            TextFormat::Markdown => "text/markdown",
            TextFormat::Html => "text/html",
            TextFormat::Pdf => "application/pdf",
            TextFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            TextFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Extract plain text from file bytes of the given format.
pub fn extract_text(bytes: &[u8], format: TextFormat) -> Result<String, ExtractError> {
    match format {
        TextFormat::Plain | TextFormat::Markdown | TextFormat::Html => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        TextFormat::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        TextFormat::Docx => {
            let mut archive = open_archive(bytes)?;
            let xml = read_entry(&mut archive, "word/document.xml")?;
            collect_text_runs(&xml, "")
        }
        TextFormat::Pptx => extract_pptx(bytes),
    }
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_entry(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slides: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    // slide10 sorts after slide9
    slides.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut pages = Vec::with_capacity(slides.len());
    for name in slides {
        let xml = read_entry(&mut archive, &name)?;
        let text = collect_text_runs(&xml, " ")?;
        if !text.is_empty() {
            pages.push(text);
        }
    }
    Ok(pages.join("\n\n"))
}

/// Concatenate the text of every `<*:t>` element, joined by `separator`.
fn collect_text_runs(xml: &[u8], separator: &str) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut runs: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text = false,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                runs.push(text.into_owned());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(runs.join(separator))
}
