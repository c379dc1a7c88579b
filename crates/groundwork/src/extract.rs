//! Format normalizer: decodes uploaded byte streams into plain text.
//!
//! Office formats (DOCX, PPTX, XLSX) are ZIP containers of XML parts; a
//! shared streaming tag-stripper maps the structural tags to whitespace
//! (paragraph → newline, tab → tab, line break → newline) and decodes the
//! standard XML entities, instead of building a document object model.
//!
//! PDF decoding is a best-effort scan over the raw bytes for string
//! literals inside `BT…ET` text blocks. It is inherently lossy for
//! image-based or encrypted files and sits behind the same
//! `extract_text` seam so it can be replaced by a real content-stream
//! interpreter without touching the rest of the pipeline.

use std::io::Read;

use groundwork_core::error::IngestError;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MIME_TEXT: &[&str] = &["text/plain", "text/markdown", "text/csv"];

/// Separator between slide text blocks.
const SLIDE_SEPARATOR: &str = "\n---\n";
/// Separator between resolved cell values within one spreadsheet row.
const CELL_SEPARATOR: &str = " | ";

/// Maximum decompressed bytes read from a single ZIP member (zip-bomb guard).
const MAX_XML_MEMBER_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum worksheets processed per workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum resolved cells per worksheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;

/// Extract plain text from an uploaded byte buffer.
///
/// Fails with [`IngestError::UnsupportedFormat`] for content types outside
/// the supported set (before touching the bytes) and
/// [`IngestError::Malformed`] when an archive or XML part cannot be
/// decoded.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, IngestError> {
    if MIME_TEXT.contains(&content_type) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    match content_type {
        MIME_PDF => Ok(extract_pdf(bytes)),
        MIME_DOCX => extract_docx(bytes),
        MIME_PPTX => extract_pptx(bytes),
        MIME_XLSX => extract_xlsx(bytes),
        other => Err(IngestError::UnsupportedFormat(other.to_string())),
    }
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive<'a>(bytes: &'a [u8], format: &str) -> Result<Archive<'a>, IngestError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| IngestError::malformed(format, e))
}

fn read_member(archive: &mut Archive<'_>, name: &str, format: &str) -> Result<Vec<u8>, IngestError> {
    let member = archive
        .by_name(name)
        .map_err(|e| IngestError::malformed(format, format!("{name}: {e}")))?;
    let mut out = Vec::new();
    member
        .take(MAX_XML_MEMBER_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| IngestError::malformed(format, format!("{name}: {e}")))?;
    if out.len() as u64 >= MAX_XML_MEMBER_BYTES {
        return Err(IngestError::malformed(
            format,
            format!("{name} exceeds the {MAX_XML_MEMBER_BYTES} byte member limit"),
        ));
    }
    Ok(out)
}

/// ZIP members matching `prefix<N>.xml`, sorted by N ascending.
fn numbered_members(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Streaming tag-stripper shared by the word-processing and presentation
/// parsers: text lives in `t` elements; `p` end marks a paragraph, `br`/`cr`
/// a line break, `tab` a tab stop. Entity references are decoded by the
/// reader's unescape.
fn strip_paragraph_xml(xml: &[u8], format: &str) -> Result<String, IngestError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                out.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(IngestError::malformed(format, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = open_archive(bytes, "docx")?;
    let xml = read_member(&mut archive, "word/document.xml", "docx")?;
    strip_paragraph_xml(&xml, "docx")
}

fn extract_pptx(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = open_archive(bytes, "pptx")?;
    let slide_names = numbered_members(&archive, "ppt/slides/slide");
    let mut blocks = Vec::new();
    for name in slide_names {
        let xml = read_member(&mut archive, &name, "pptx")?;
        let text = strip_paragraph_xml(&xml, "pptx")?;
        let text = text.trim();
        if !text.is_empty() {
            blocks.push(text.to_string());
        }
    }
    Ok(blocks.join(SLIDE_SEPARATOR))
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = open_archive(bytes, "xlsx")?;
    let shared = read_shared_strings(&mut archive)?;
    let sheet_names = numbered_members(&archive, "xl/worksheets/sheet");
    let mut sheets = Vec::new();
    for name in sheet_names.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_member(&mut archive, &name, "xlsx")?;
        let text = extract_sheet(&xml, &shared)?;
        if !text.is_empty() {
            sheets.push(text);
        }
    }
    Ok(sheets.join("\n\n"))
}

/// Load the shared-string table. A workbook with no string cells has no
/// `sharedStrings.xml` member; that is not an error.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, IngestError> {
    use quick_xml::events::Event;

    let xml = match archive.by_name("xl/sharedStrings.xml") {
        Ok(member) => {
            let mut out = Vec::new();
            member
                .take(MAX_XML_MEMBER_BYTES)
                .read_to_end(&mut out)
                .map_err(|e| IngestError::malformed("xlsx", e))?;
            out
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(Vec::new()),
        Err(e) => return Err(IngestError::malformed("xlsx", e)),
    };

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"t" if in_item => in_text = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(IngestError::malformed("xlsx", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Resolve one worksheet's shared-string cells through the table. Only
/// resolved string values are emitted; numeric and formula cells are not
/// text and are skipped.
fn extract_sheet(xml: &[u8], shared: &[String]) -> Result<String, IngestError> {
    use quick_xml::events::Event;

    let mut rows: Vec<String> = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut cell_is_shared = false;
    let mut in_value = false;
    let mut resolved = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row_cells.clear(),
                b"c" => {
                    cell_is_shared = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                if cell_is_shared && resolved < XLSX_MAX_CELLS_PER_SHEET {
                    let value = t.unescape().unwrap_or_default();
                    if let Ok(index) = value.trim().parse::<usize>() {
                        if let Some(s) = shared.get(index) {
                            row_cells.push(s.clone());
                            resolved += 1;
                        }
                    }
                }
                in_value = false;
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"c" => cell_is_shared = false,
                b"row" => {
                    if !row_cells.is_empty() {
                        rows.push(row_cells.join(CELL_SEPARATOR));
                        row_cells.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(IngestError::malformed("xlsx", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows.join("\n"))
}

/// Best-effort PDF text recovery: collect string literals inside `BT…ET`
/// text blocks, unescaping PDF string escapes. Never fails; an implausibly
/// small yield is logged and left to the caller to judge.
fn extract_pdf(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0usize;
    let mut in_text_block = false;
    while i < bytes.len() {
        match bytes[i] {
            b'B' if is_operator(bytes, i, b"BT") => {
                in_text_block = true;
                i += 2;
            }
            b'E' if is_operator(bytes, i, b"ET") => {
                if in_text_block && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
                in_text_block = false;
                i += 2;
            }
            b'(' if in_text_block => {
                let (literal, next) = parse_string_literal(bytes, i);
                if !literal.is_empty() {
                    out.push_str(&literal);
                    out.push(' ');
                }
                i = next;
            }
            _ => i += 1,
        }
    }

    let text = out.trim().to_string();
    if !bytes.is_empty() && text.len() < bytes.len() / 200 {
        tracing::warn!(
            input_bytes = bytes.len(),
            extracted_chars = text.len(),
            "pdf extraction yield is implausibly small (image-based or compressed streams?)"
        );
    }
    text
}

/// True when `op` occurs at `i` delimited on both sides, so `BT` inside a
/// longer name or literal does not toggle the text-block state.
fn is_operator(bytes: &[u8], i: usize, op: &[u8]) -> bool {
    if !bytes[i..].starts_with(op) {
        return false;
    }
    let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
    let after = i + op.len();
    let after_ok = after >= bytes.len() || !bytes[after].is_ascii_alphanumeric();
    before_ok && after_ok
}

/// Parse one parenthesis-delimited literal starting at the opening paren.
/// Handles nested parens, the standard escapes, octal escapes, and escaped
/// line continuations. Returns the text and the index past the literal.
fn parse_string_literal(bytes: &[u8], open: usize) -> (String, usize) {
    let mut raw: Vec<u8> = Vec::new();
    let mut depth = 1usize;
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && i + 1 < bytes.len() {
            let escaped = bytes[i + 1];
            i += 2;
            match escaped {
                b'n' => raw.push(b'\n'),
                b'r' => raw.push(b'\r'),
                b't' => raw.push(b'\t'),
                b'b' => raw.push(0x08),
                b'f' => raw.push(0x0c),
                b'(' => raw.push(b'('),
                b')' => raw.push(b')'),
                b'\\' => raw.push(b'\\'),
                b'\n' => {} // escaped newline continues the literal
                b'0'..=b'7' => {
                    let mut value = (escaped - b'0') as u32;
                    let mut digits = 1;
                    while digits < 3 && i < bytes.len() && bytes[i].is_ascii_digit() && bytes[i] < b'8'
                    {
                        value = value * 8 + (bytes[i] - b'0') as u32;
                        i += 1;
                        digits += 1;
                    }
                    raw.push(value.min(255) as u8);
                }
                other => raw.push(other),
            }
        } else if b == b'(' {
            depth += 1;
            raw.push(b);
            i += 1;
        } else if b == b')' {
            depth -= 1;
            i += 1;
            if depth == 0 {
                break;
            }
            raw.push(b);
        } else {
            raw.push(b);
            i += 1;
        }
    }
    (String::from_utf8_lossy(&raw).into_owned(), i)
}
