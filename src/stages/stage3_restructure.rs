use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::error::PrepError;
use crate::io::{backup_once, load_dataset, save_dataset};
use crate::llm::{
    build_structure_prompt, build_wall_text, CompletionRequest, TextGenerator,
    STRUCTURE_SYSTEM_PROMPT,
};
use crate::models::{ProposalRecord, StageKind};
use crate::stages::batch::{run_batch, BatchOptions, BatchReport, RecordTask};

/// Backup label written before the first structured pass
pub const STRUCTURE_BACKUP_LABEL: &str = "before_structured";

/// Turns the scraped wall text into the fixed-layout Markdown document
pub struct StructureTask<'a, G: TextGenerator> {
    generator: &'a G,
    temperature: f64,
}

impl<'a, G: TextGenerator> StructureTask<'a, G> {
    pub fn new(generator: &'a G, temperature: f64) -> Self {
        Self {
            generator,
            temperature,
        }
    }
}

#[async_trait]
impl<'a, G: TextGenerator> RecordTask for StructureTask<'a, G> {
    type Input = String;
    type Output = String;

    fn stage(&self) -> StageKind {
        StageKind::Structure
    }

    fn input(&self, record: &ProposalRecord) -> Option<String> {
        Some(build_wall_text(record)).filter(|text| !text.is_empty())
    }

    async fn run(&self, wall_text: String) -> Result<String> {
        let request = CompletionRequest::user(build_structure_prompt(&wall_text), self.temperature)
            .with_system(STRUCTURE_SYSTEM_PROMPT);
        let document = self.generator.complete(&request).await?;
        if document.trim().is_empty() {
            return Err(PrepError::BadResponse("empty structured document".to_string()).into());
        }
        Ok(document)
    }

    fn apply(&self, record: &mut ProposalRecord, document: String) {
        record.about_structured_en = Some(document);
    }
}

/// Execute the restructure stage on the English dataset in place
pub async fn execute_restructure<G: TextGenerator>(
    generator: &G,
    temperature: f64,
    dataset: &Path,
    options: &BatchOptions,
) -> Result<BatchReport> {
    info!("Loading dataset from {:?}", dataset);
    let mut records = load_dataset(dataset)?;

    if let Some(backup) = backup_once(dataset, STRUCTURE_BACKUP_LABEL)? {
        info!("Backup created: {:?}", backup);
    }

    let mut options = options.clone();
    options.checkpoint_path = Some(dataset.to_path_buf());

    let task = StructureTask::new(generator, temperature);
    let report = run_batch(&task, &mut records, &options).await?;

    save_dataset(dataset, &records)?;
    info!("Dataset written to {:?}", dataset);
    Ok(report)
}
