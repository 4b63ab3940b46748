use super::Extractor;
use crate::error::{AdvisorError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Maximum sheets serialized from one workbook
const MAX_SHEETS: usize = 50;
/// Maximum decompressed bytes read from a single archive entry
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Spreadsheet serialization: every sheet becomes a `=== Sheet: <name> ===`
/// block followed by tab-joined rows. Resolves shared strings, inline
/// strings and literal (numeric/formula) cell values.
pub struct SpreadsheetExtractor;

impl Extractor for SpreadsheetExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        extension == "xlsx"
    }

    fn extract(&self, payload: &[u8], _extension: &str) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(payload)).map_err(|e| {
            AdvisorError::CorruptInput(format!("unreadable spreadsheet archive: {}", e))
        })?;

        let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
            let xml = read_entry_bounded(&mut archive, "xl/sharedStrings.xml", MAX_ENTRY_BYTES)?;
            parse_shared_strings(&xml)?
        } else {
            Vec::new()
        };

        let labels = sheet_labels(&mut archive);
        let files = worksheet_files(&archive);

        let mut out = String::new();
        for (idx, file) in files.into_iter().take(MAX_SHEETS).enumerate() {
            let label = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("Sheet{}", idx + 1));
            let xml = read_entry_bounded(&mut archive, &file, MAX_ENTRY_BYTES)?;
            let rows = parse_sheet_rows(&xml, &shared_strings)?;

            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("=== Sheet: {} ===\n", label));
            out.push_str(&rows);
        }

        Ok(out)
    }
}

fn read_entry_bounded(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| AdvisorError::CorruptInput(format!("{} missing from archive: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| AdvisorError::CorruptInput(format!("failed to read {}: {}", name, e)))?;
    if out.len() as u64 >= max_bytes {
        return Err(AdvisorError::CorruptInput(format!(
            "archive entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Worksheet entries in workbook order (sheet1.xml, sheet2.xml, ...)
fn worksheet_files(archive: &ZipArchive<Cursor<&[u8]>>) -> Vec<String> {
    let mut files: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    files.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    files
}

/// Human sheet names from xl/workbook.xml; best effort, the positional
/// SheetN label covers anything this misses.
fn sheet_labels(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Vec<String> {
    if !archive.file_names().any(|n| n == "xl/workbook.xml") {
        return Vec::new();
    }
    let xml = match read_entry_bounded(archive, "xl/workbook.xml", MAX_ENTRY_BYTES) {
        Ok(xml) => xml,
        Err(_) => return Vec::new(),
    };

    let mut names = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"name" {
                        names.push(String::from_utf8_lossy(attr.value.as_ref()).into_owned());
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    names
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    // One entry per <si>; rich-text entries concatenate their <t> runs
    let mut current: Option<String> = None;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" if current.is_some() => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                // Self-closing <si/> still occupies an index
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Ok(Event::Text(te)) if in_t => {
                if let Some(ref mut entry) = current {
                    entry.push_str(&te.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    if let Some(entry) = current.take() {
                        strings.push(entry);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AdvisorError::CorruptInput(format!(
                    "sharedStrings.xml: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Shared,
    Inline,
    Literal,
}

#[derive(Clone, Copy, PartialEq)]
enum Capture {
    None,
    Value,
    InlineText,
}

fn parse_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<String> {
    let mut rows: Vec<String> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut kind = CellKind::Literal;
    let mut capture = Capture::None;

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => current_row.clear(),
                b"c" => {
                    kind = CellKind::Literal;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            kind = match attr.value.as_ref() {
                                b"s" => CellKind::Shared,
                                b"inlineStr" => CellKind::Inline,
                                _ => CellKind::Literal,
                            };
                        }
                    }
                }
                b"v" => capture = Capture::Value,
                b"t" if kind == CellKind::Inline => capture = Capture::InlineText,
                _ => {}
            },
            Ok(Event::Text(te)) => {
                let value = te.unescape().unwrap_or_default();
                match capture {
                    Capture::Value => {
                        let trimmed = value.trim();
                        match kind {
                            CellKind::Shared => {
                                if let Ok(i) = trimmed.parse::<usize>() {
                                    if let Some(text) = shared_strings.get(i) {
                                        current_row.push(text.clone());
                                    }
                                }
                            }
                            _ => {
                                if !trimmed.is_empty() {
                                    current_row.push(trimmed.to_string());
                                }
                            }
                        }
                        capture = Capture::None;
                    }
                    Capture::InlineText => {
                        current_row.push(value.into_owned());
                        capture = Capture::None;
                    }
                    Capture::None => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"row" => {
                    if !current_row.is_empty() {
                        rows.push(current_row.join("\t"));
                        current_row.clear();
                    }
                }
                b"v" | b"t" => capture = Capture::None,
                b"c" => kind = CellKind::Literal,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AdvisorError::CorruptInput(format!("worksheet xml: {}", e)))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rows.join("\n"))
}
