//! Hyperlink targets of Office Open XML workbooks.
//!
//! Cell readers expose values only, so the links are read straight from the
//! package: `xl/workbook.xml` names the sheets, the workbook relationships
//! map them to part paths, each sheet's `<hyperlinks>` element points cells
//! at relationship ids, and the sheet relationships hold the targets.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::PrepResult;

/// Zero-based (row, column) of a cell
pub type CellPos = (u32, u32);

/// Hyperlink targets per sheet name, keyed by cell position
pub type WorkbookLinks = HashMap<String, HashMap<CellPos, String>>;

/// Read every external hyperlink of an `.xlsx`/`.xlsm` package
pub fn read_workbook_links(path: &Path) -> PrepResult<WorkbookLinks> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let workbook = read_part(&mut archive, "xl/workbook.xml")?.unwrap_or_default();
    let workbook_rels =
        read_part(&mut archive, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();

    let sheets = parse_sheet_ids(&workbook)?;
    let sheet_targets = parse_relationships(&workbook_rels)?;

    let mut links = WorkbookLinks::new();
    for (sheet_name, rel_id) in sheets {
        let Some(target) = sheet_targets.get(&rel_id) else {
            continue;
        };
        let part = resolve_part("xl", target);
        let Some(sheet_xml) = read_part(&mut archive, &part)? else {
            continue;
        };
        let refs = parse_sheet_hyperlinks(&sheet_xml)?;
        if refs.is_empty() {
            continue;
        }

        let rels_part = relationships_part(&part);
        let rels = match read_part(&mut archive, &rels_part)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let mut sheet_links = HashMap::new();
        for (cell, rel_id) in refs {
            if let (Some(pos), Some(url)) = (parse_cell_ref(&cell), rels.get(&rel_id)) {
                sheet_links.insert(pos, url.clone());
            }
        }
        debug!("Sheet {}: {} hyperlinks", sheet_name, sheet_links.len());
        links.insert(sheet_name, sheet_links);
    }

    Ok(links)
}

fn read_part(archive: &mut zip::ZipArchive<File>, name: &str) -> PrepResult<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// `worksheets/sheet1.xml` relative to `xl`, or an absolute `/xl/...` target
fn resolve_part(base: &str, target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}/{}", base, target),
    }
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn relationships_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

fn attribute(element: &BytesStart<'_>, local_name: &[u8]) -> PrepResult<Option<String>> {
    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// `(sheet name, relationship id)` in workbook order
fn parse_sheet_ids(xml: &str) -> PrepResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (attribute(&e, b"name")?, attribute(&e, b"id")?) {
                    sheets.push((name, id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

/// Relationship id to target
fn parse_relationships(xml: &str) -> PrepResult<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id")?, attribute(&e, b"Target")?) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

/// `(cell reference, relationship id)` of each external hyperlink in a sheet
fn parse_sheet_hyperlinks(xml: &str) -> PrepResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut refs = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"hyperlink" => {
                if let (Some(cell), Some(id)) = (attribute(&e, b"ref")?, attribute(&e, b"id")?) {
                    refs.push((cell, id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(refs)
}

/// `B12` -> `(11, 1)`; for a range like `B2:B4` the first cell is used
pub fn parse_cell_ref(reference: &str) -> Option<CellPos> {
    let first = reference.split(':').next()?.replace('$', "");
    let split = first.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = first.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}
