//! Minimal DOCX reader: pulls the body text out of `word/document.xml`.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;

use super::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</w:p>|<w:br\b[^>]*/>|<w:cr\s*/>").expect("valid regex"))
}

fn tab_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<w:tab\s*/>").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

pub(super) fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::CorruptFile(format!("DOCX is not a valid archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::CorruptFile(format!("DOCX has no {DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::CorruptFile(format!("DOCX body unreadable: {e}")))?;

    Ok(document_xml_to_text(&xml))
}

/// Flattens WordprocessingML into text: paragraphs and breaks become newlines,
/// tabs become tabs, every other tag is dropped.
fn document_xml_to_text(xml: &str) -> String {
    let text = line_break_re().replace_all(xml, "\n");
    let text = tab_re().replace_all(&text, "\t");
    let text = tag_re().replace_all(&text, "");
    unescape_xml(&text).trim().to_string()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_paragraphs_become_lines() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
            <w:p><w:r><w:t>Python</w:t></w:r><w:r><w:tab/><w:t>AWS</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_docx_text(&build_docx(xml)).unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["Jane Doe", "Python\tAWS"]);
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = "<w:p><w:r><w:t>R&amp;D &lt;C++&gt;</w:t></w:r></w:p>";
        assert_eq!(document_xml_to_text(xml), "R&D <C++>");
    }

    #[test]
    fn test_line_breaks() {
        let xml = r#"<w:p><w:r><w:t>one</w:t><w:br/><w:t>two</w:t><w:br w:type="page"/><w:t>three</w:t></w:r></w:p>"#;
        assert_eq!(document_xml_to_text(xml), "one\ntwo\nthree");
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let err = extract_docx_text(b"PK but not really").unwrap_err();
        assert!(matches!(err, ExtractionError::CorruptFile(_)));
    }

    #[test]
    fn test_zip_without_document_part_is_corrupt() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_docx_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractionError::CorruptFile(ref msg) if msg.contains(DOCUMENT_PART)));
    }
}
