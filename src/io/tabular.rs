use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{PrepError, PrepResult};
use crate::io::hyperlinks::{read_workbook_links, WorkbookLinks};
use crate::models::RawRow;

/// Options for reading a spreadsheet export
#[derive(Debug, Clone)]
pub struct TabularOptions {
    /// Sheets that are never read
    pub skip_sheets: Vec<String>,
    /// Column whose cell hyperlinks are captured
    pub link_column: String,
    /// Key the sheet name is stored under
    pub sheet_key: String,
    /// Key the captured hyperlink is stored under
    pub link_key: String,
}

impl Default for TabularOptions {
    fn default() -> Self {
        Self {
            skip_sheets: vec!["Template".to_string()],
            link_column: "Proposal".to_string(),
            sheet_key: "Challenge".to_string(),
            link_key: "Proposal URL".to_string(),
        }
    }
}

/// Spreadsheet flavours this crate can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    /// Office Open XML package, hyperlinks readable
    Xlsx,
    /// Other workbook formats (`.xls`, `.xlsb`, `.ods`)
    Workbook,
}

impl TabularFormat {
    pub fn detect(path: &Path) -> PrepResult<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(TabularFormat::Csv),
            "xlsx" | "xlsm" => Ok(TabularFormat::Xlsx),
            "xls" | "xlsb" | "ods" => Ok(TabularFormat::Workbook),
            _ => Err(PrepError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Read a CSV file or every sheet of a workbook into raw rows
pub fn read_tabular(path: &Path, options: &TabularOptions) -> PrepResult<Vec<RawRow>> {
    if !path.exists() {
        return Err(PrepError::FileNotFound(path.to_path_buf()));
    }
    match TabularFormat::detect(path)? {
        TabularFormat::Csv => {
            let content = std::fs::read_to_string(path)?;
            parse_csv(&content)
        }
        TabularFormat::Xlsx => {
            let links = match read_workbook_links(path) {
                Ok(links) => links,
                Err(e) => {
                    warn!("Could not read hyperlinks from {:?}: {}", path, e);
                    WorkbookLinks::new()
                }
            };
            read_workbook(path, options, Some(&links))
        }
        TabularFormat::Workbook => read_workbook(path, options, None),
    }
}

/// Parse CSV text (optional UTF-8 byte-order mark) with a header row
pub fn parse_csv(content: &str) -> PrepResult<Vec<RawRow>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = RawRow::new();
        let mut empty_row = true;

        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = match record.get(i) {
                Some(cell) if !cell.trim().is_empty() => {
                    empty_row = false;
                    Value::String(cell.to_string())
                }
                _ => Value::Null,
            };
            row.insert(header.clone(), value);
        }

        if !empty_row {
            rows.push(row);
        }
    }

    Ok(rows)
}

fn read_workbook(
    path: &Path,
    options: &TabularOptions,
    links: Option<&WorkbookLinks>,
) -> PrepResult<Vec<RawRow>> {
    let mut workbook = open_workbook_auto(path)?;
    let mut all_rows = Vec::new();

    for sheet_name in workbook.sheet_names() {
        if options.skip_sheets.contains(&sheet_name) {
            info!("Skipping sheet: {}", sheet_name);
            continue;
        }

        let range = workbook.worksheet_range(&sheet_name)?;
        let sheet_links = links.map(|l| l.get(&sheet_name).cloned().unwrap_or_default());
        let rows = sheet_to_rows(&range, &sheet_name, options, sheet_links.as_ref());
        info!("Sheet {}: {} rows", sheet_name, rows.len());
        all_rows.extend(rows);
    }

    Ok(all_rows)
}

/// Convert one sheet; the first row of the used range is the header
fn sheet_to_rows(
    range: &Range<Data>,
    sheet_name: &str,
    options: &TabularOptions,
    links: Option<&std::collections::HashMap<(u32, u32), String>>,
) -> Vec<RawRow> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let mut rows = range.rows();
    let Some(header_cells) = rows.next() else {
        return Vec::new();
    };

    let headers: Vec<String> = header_cells
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        })
        .collect();
    let link_col = headers.iter().position(|h| *h == options.link_column);

    let mut data_rows = Vec::new();
    for (offset, cells) in rows.enumerate() {
        let mut row = RawRow::new();
        let mut empty_row = true;

        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = cells.get(i).map(cell_value).unwrap_or(Value::Null);
            if !is_blank(&value) {
                empty_row = false;
            }
            row.insert(header.clone(), value);
        }

        if empty_row {
            continue;
        }

        row.insert(options.sheet_key.clone(), Value::String(sheet_name.to_string()));

        if let Some(col) = link_col {
            let abs_row = start_row + 1 + offset as u32;
            let abs_col = start_col + col as u32;
            let url = links
                .and_then(|l| l.get(&(abs_row, abs_col)))
                .cloned()
                .unwrap_or_default();
            row.insert(options.link_key.clone(), Value::String(url));
        }

        data_rows.push(row);
    }

    data_rows
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Cell to JSON; integral floats become integers
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                Value::from(*f as i64)
            } else {
                Value::from(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::from(dt.as_f64()),
        other => Value::String(other.to_string()),
    }
}
