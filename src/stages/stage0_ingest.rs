use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::PipelineConfig;
use crate::io::{read_tabular, write_json, TabularOptions};
use crate::models::RawRow;

/// Result of the ingest stage
#[derive(Debug)]
pub struct IngestResult {
    pub rows: Vec<RawRow>,
}

/// Reader options derived from the pipeline configuration
pub fn tabular_options(config: &PipelineConfig) -> TabularOptions {
    TabularOptions {
        skip_sheets: config.skip_sheets.clone(),
        link_column: config.columns.title.clone(),
        sheet_key: config.columns.challenge.clone(),
        link_key: config.columns.url.clone(),
    }
}

/// Execute the ingest stage: spreadsheet or CSV export to raw rows JSON
pub fn execute_ingest(config: &PipelineConfig, input: &Path, output: &Path) -> Result<IngestResult> {
    info!("Loading spreadsheet from {:?}", input);
    let rows = read_tabular(input, &tabular_options(config))
        .with_context(|| format!("Failed to read spreadsheet {:?}", input))?;
    info!("Read {} rows", rows.len());

    write_json(output, &rows)?;
    info!("Raw rows written to {:?}", output);

    Ok(IngestResult { rows })
}
