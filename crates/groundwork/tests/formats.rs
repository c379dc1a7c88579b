//! Format normalizer scenarios over in-memory OOXML fixtures.

use std::io::Write;

use zip::write::SimpleFileOptions;

use groundwork::extract::{extract_text, MIME_DOCX, MIME_PPTX, MIME_XLSX};
use groundwork_core::error::IngestError;

fn build_archive(members: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, content) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn docx_paragraphs_tabs_and_entities() {
    let document_xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello &amp; welcome</w:t></w:r></w:p>
    <w:p>
      <w:r><w:t>Col A</w:t></w:r>
      <w:r><w:tab/></w:r>
      <w:r><w:t>Col B</w:t></w:r>
    </w:p>
    <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>line two</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
    let bytes = build_archive(&[("word/document.xml", document_xml)]);
    let text = extract_text(&bytes, MIME_DOCX).unwrap();

    assert_eq!(
        text,
        "Hello & welcome\nCol A\tCol B\nLine one\nline two\n"
    );
}

#[test]
fn docx_without_document_part_is_malformed() {
    let bytes = build_archive(&[("word/styles.xml", "<styles/>")]);
    let err = extract_text(&bytes, MIME_DOCX).unwrap_err();
    assert!(matches!(err, IngestError::Malformed { .. }));
}

#[test]
fn pptx_slides_join_with_separator_in_slide_order() {
    let slide = |body: &str| {
        format!(
            r#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:txBody><a:p><a:r><a:t>{body}</a:t></a:r></a:p></p:txBody></p:sld>"#
        )
    };
    // archive order deliberately scrambled; slide numbers decide output order
    let s1 = slide("First slide");
    let s2 = slide("Second slide");
    let bytes = build_archive(&[
        ("ppt/slides/slide2.xml", s2.as_str()),
        ("ppt/slides/slide1.xml", s1.as_str()),
    ]);
    let text = extract_text(&bytes, MIME_PPTX).unwrap();
    assert_eq!(text, "First slide\n---\nSecond slide");
}

#[test]
fn pptx_slide_order_is_numeric_not_lexicographic() {
    let slide = |body: &str| {
        format!(
            r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:p><a:r><a:t>{body}</a:t></a:r></a:p></p:sld>"#
        )
    };
    let s2 = slide("Two");
    let s10 = slide("Ten");
    let bytes = build_archive(&[
        ("ppt/slides/slide10.xml", s10.as_str()),
        ("ppt/slides/slide2.xml", s2.as_str()),
    ]);
    let text = extract_text(&bytes, MIME_PPTX).unwrap();
    assert_eq!(text, "Two\n---\nTen");
}

#[test]
fn xlsx_resolves_one_shared_string() {
    let shared = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Hello</t></si></sst>"#;
    let sheet = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData></worksheet>"#;
    let bytes = build_archive(&[
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/sheet1.xml", sheet),
    ]);
    let text = extract_text(&bytes, MIME_XLSX).unwrap();
    assert_eq!(text, "Hello");
}

#[test]
fn xlsx_rows_use_cell_separators_and_skip_numbers() {
    let shared = r#"<sst><si><t>Name</t></si><si><t>Alice</t></si><si><t>Bob</t></si></sst>"#;
    // numeric cells (no t="s") must not be emitted
    let sheet = r#"<worksheet><sheetData>
        <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>42</v></c></row>
        <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2" t="s"><v>2</v></c></row>
    </sheetData></worksheet>"#;
    let bytes = build_archive(&[
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/sheet1.xml", sheet),
    ]);
    let text = extract_text(&bytes, MIME_XLSX).unwrap();
    assert_eq!(text, "Name\nAlice | Bob");
}

#[test]
fn xlsx_sheets_are_separated() {
    let shared = r#"<sst><si><t>One</t></si><si><t>Two</t></si></sst>"#;
    let sheet1 =
        r#"<worksheet><sheetData><row><c t="s"><v>0</v></c></row></sheetData></worksheet>"#;
    let sheet2 =
        r#"<worksheet><sheetData><row><c t="s"><v>1</v></c></row></sheetData></worksheet>"#;
    let bytes = build_archive(&[
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/sheet1.xml", sheet1),
        ("xl/worksheets/sheet2.xml", sheet2),
    ]);
    let text = extract_text(&bytes, MIME_XLSX).unwrap();
    assert_eq!(text, "One\n\nTwo");
}

#[test]
fn xlsx_without_shared_strings_yields_empty_text() {
    let sheet = r#"<worksheet><sheetData><row><c><v>3.14</v></c></row></sheetData></worksheet>"#;
    let bytes = build_archive(&[("xl/worksheets/sheet1.xml", sheet)]);
    let text = extract_text(&bytes, MIME_XLSX).unwrap();
    assert_eq!(text, "");
}

#[test]
fn xlsx_out_of_range_index_is_skipped() {
    let shared = r#"<sst><si><t>Only</t></si></sst>"#;
    let sheet = r#"<worksheet><sheetData><row><c t="s"><v>7</v></c><c t="s"><v>0</v></c></row></sheetData></worksheet>"#;
    let bytes = build_archive(&[
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/sheet1.xml", sheet),
    ]);
    let text = extract_text(&bytes, MIME_XLSX).unwrap();
    assert_eq!(text, "Only");
}
