//! Low-level text extractors: in-process decoders (pdf-extract, OOXML, HTML DOM) and
//! external tools (poppler, tesseract, pandoc) driven through `tokio::process`.
//!
//! Extractors know nothing about scoring. They return raw text or an `ExtractError`
//! that the cascade records against the strategy that called them.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use bytes::Bytes;
use regex::Regex;
use scraper::{Html, Node};
use thiserror::Error;
use tokio::process::Command;

use crate::llm_client::truncate;

/// word/document.xml larger than this is refused rather than buffered.
const MAX_XML_ENTRY_BYTES: u64 = 32 * 1024 * 1024;
const OCR_DPI: &str = "300";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("external tool '{0}' is not installed")]
    ToolMissing(String),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("PDF decode failed: {0}")]
    Pdf(String),

    #[error("OOXML decode failed: {0}")]
    Ooxml(String),

    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("no images were produced for OCR")]
    NoPages,

    #[error("structuring failed: {0}")]
    Structurer(String),

    #[error("no base text to restructure: {0}")]
    BaseUnavailable(String),

    #[error("strategy does not apply to {0} documents")]
    NotApplicable(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text plus whatever page count the extractor could observe.
#[derive(Debug, Clone, Default)]
pub struct RawText {
    pub text: String,
    pub page_count: Option<u32>,
    /// Confidence reported by the strategy itself (AI structuring), if any.
    pub self_confidence: Option<u8>,
}

impl RawText {
    pub fn new(text: String) -> Self {
        Self {
            text,
            ..Default::default()
        }
    }

    pub fn with_pages(text: String, pages: Option<u32>) -> Self {
        Self {
            text,
            page_count: pages,
            self_confidence: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// External tools
// ────────────────────────────────────────────────────────────────────────────

/// Runs a tool to completion and returns its stdout. The child is killed if the
/// surrounding future is dropped (outer deadline).
async fn run_tool(program: &str, args: &[&str], cwd: &Path) -> Result<Vec<u8>, ExtractError> {
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractError::ToolMissing(program.to_string()),
            _ => ExtractError::Io(e),
        })?;

    if !output.status.success() {
        return Err(ExtractError::ToolFailed {
            tool: program.to_string(),
            status: output.status.to_string(),
            stderr: truncate(String::from_utf8_lossy(&output.stderr).trim(), 200),
        });
    }

    Ok(output.stdout)
}

/// `pdftotext -layout` or `-raw` to stdout. Poppler ends every page with a form feed.
pub async fn pdftotext(input: &Path, mode: &str, workspace: &Path) -> Result<RawText, ExtractError> {
    let input = path_str(input)?;
    let stdout = run_tool("pdftotext", &[mode, "-enc", "UTF-8", input, "-"], workspace).await?;
    let text = String::from_utf8_lossy(&stdout).into_owned();
    let pages = text.matches('\u{c}').count() as u32;
    Ok(RawText::with_pages(
        text.replace('\u{c}', "\n"),
        (pages > 0).then_some(pages),
    ))
}

/// Rasterises every page with `pdftoppm`, then OCRs each image in page order.
pub async fn ocr_pdf(input: &Path, workspace: &Path) -> Result<RawText, ExtractError> {
    let pages_dir = workspace.join("ocr-pages");
    tokio::fs::create_dir_all(&pages_dir).await?;
    let prefix = pages_dir.join("page");

    run_tool(
        "pdftoppm",
        &["-r", OCR_DPI, "-png", path_str(input)?, path_str(&prefix)?],
        workspace,
    )
    .await?;

    let mut images: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(&pages_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            images.push(path);
        }
    }
    if images.is_empty() {
        return Err(ExtractError::NoPages);
    }
    // pdftoppm zero-pads page numbers, so lexical order is page order
    images.sort();

    let mut text = String::new();
    for image in &images {
        let page = ocr_image(image, workspace).await?;
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(page.text.trim_end());
    }

    Ok(RawText::with_pages(text, Some(images.len() as u32)))
}

pub async fn ocr_image(input: &Path, workspace: &Path) -> Result<RawText, ExtractError> {
    let stdout = run_tool("tesseract", &[path_str(input)?, "stdout"], workspace).await?;
    Ok(RawText::with_pages(
        String::from_utf8_lossy(&stdout).into_owned(),
        Some(1),
    ))
}

/// `pandoc -t plain`; `from` is pandoc's reader name (`docx`, `html`).
pub async fn pandoc(input: &Path, from: &str, workspace: &Path) -> Result<RawText, ExtractError> {
    let stdout = run_tool(
        "pandoc",
        &["-f", from, "-t", "plain", "--wrap=none", path_str(input)?],
        workspace,
    )
    .await?;
    Ok(RawText::new(String::from_utf8_lossy(&stdout).into_owned()))
}

fn path_str(path: &Path) -> Result<&str, ExtractError> {
    path.to_str().ok_or_else(|| {
        ExtractError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "workspace path is not valid UTF-8",
        ))
    })
}

// ────────────────────────────────────────────────────────────────────────────
// In-process decoders
// ────────────────────────────────────────────────────────────────────────────

/// pdf-extract is CPU-bound and can panic on hostile input; both are contained in a
/// blocking task.
pub async fn pdf_text(bytes: Bytes) -> Result<RawText, ExtractError> {
    let pages = pdf_page_count(&bytes);
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractError::Pdf(format!("decoder panicked: {e}")))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(RawText::with_pages(text, pages))
}

/// Counts `/Type /Page` objects (not `/Pages`) in the raw PDF.
pub fn pdf_page_count(bytes: &[u8]) -> Option<u32> {
    static RE: OnceLock<regex::bytes::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::bytes::Regex::new(r"/Type\s*/Page[^s]").expect("static regex")
    });
    let count = re.find_iter(bytes).count() as u32;
    (count > 0).then_some(count)
}

pub async fn docx_text(bytes: Bytes) -> Result<RawText, ExtractError> {
    let text = tokio::task::spawn_blocking(move || read_docx(&bytes))
        .await
        .map_err(|e| ExtractError::Ooxml(format!("decoder panicked: {e}")))??;
    Ok(RawText::new(text))
}

fn read_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Ooxml(format!("word/document.xml: {e}")))?;

    let mut xml = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut xml)?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    paragraphs_from_document_xml(&xml)
}

/// Concatenates `w:t` runs, breaking lines at paragraph ends and `w:br`, tabs at `w:tab`.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => out.push('\n'),
                b"tab" => out.push('\t'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Visible text of an HTML document, one block per line, script/style dropped.
pub fn html_text(bytes: &[u8]) -> RawText {
    let source = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&source);
    let mut out = String::new();

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "head"))
        });
        if hidden {
            continue;
        }
        let chunk = text.trim();
        if !chunk.is_empty() {
            out.push_str(chunk);
            out.push('\n');
        }
    }

    RawText::new(out)
}

/// Regex tag stripping for markup too broken for a DOM walk.
pub fn strip_tags(bytes: &[u8]) -> RawText {
    static BLOCKS: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let blocks = BLOCKS.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b.*?</(script|style)\s*>").expect("static regex")
    });
    let tags = TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));

    let source = String::from_utf8_lossy(bytes);
    let without_blocks = blocks.replace_all(&source, " ");
    let text = tags.replace_all(&without_blocks, "\n");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    RawText::new(text)
}

pub fn utf8_strict(bytes: &[u8]) -> Result<RawText, ExtractError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Ok(RawText::new(std::str::from_utf8(bytes)?.to_string()))
}

pub fn utf8_lossy(bytes: &[u8]) -> RawText {
    RawText::new(String::from_utf8_lossy(bytes).into_owned())
}

/// Last resort for binaries: runs of printable ASCII that contain real words.
/// Runs carrying PDF object syntax are file structure, not document text.
pub fn printable_runs(bytes: &[u8]) -> RawText {
    static RUNS: OnceLock<regex::bytes::Regex> = OnceLock::new();
    static SYNTAX: OnceLock<Regex> = OnceLock::new();
    let re = RUNS.get_or_init(|| {
        regex::bytes::Regex::new(r"[\x20-\x7E]{4,}").expect("static regex")
    });
    let syntax = SYNTAX.get_or_init(|| {
        Regex::new(r"<<|>>|(?:^|\s)/[A-Za-z]+|\b\d+ \d+ (?:obj|R)\b")
            .expect("static regex")
    });

    let lines: Vec<String> = re
        .find_iter(bytes)
        .map(|m| String::from_utf8_lossy(m.as_bytes()).trim().to_string())
        .filter(|run| {
            let letters = run.chars().filter(|c| c.is_ascii_alphabetic()).count();
            letters >= 3
                && letters * 2 >= run.len()
                && run.contains(' ')
                && !syntax.is_match(run)
        })
        .collect();

    RawText::new(lines.join("\n"))
}
