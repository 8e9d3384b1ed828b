use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::error::PrepError;
use crate::io::{load_dataset, load_reuse_cache, save_dataset};
use crate::llm::{
    build_multilang_prompt, build_translation_prompt, parse_multilang_response,
    CompletionRequest, MultilangDocs, TextGenerator,
};
use crate::models::{ProposalRecord, StageKind};
use crate::stages::batch::{run_batch, BatchOptions, BatchReport, RecordTask};

/// Translates `title_en` / `summary_en` into Japanese
pub struct TranslateTask<'a, G: TextGenerator> {
    generator: &'a G,
    temperature: f64,
}

impl<'a, G: TextGenerator> TranslateTask<'a, G> {
    pub fn new(generator: &'a G, temperature: f64) -> Self {
        Self {
            generator,
            temperature,
        }
    }

    async fn translate(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let request = CompletionRequest::user(build_translation_prompt(text), self.temperature);
        let translated = self.generator.complete(&request).await?;
        if translated.trim().is_empty() {
            return Err(PrepError::BadResponse("empty translation".to_string()).into());
        }
        Ok(translated)
    }
}

#[async_trait]
impl<'a, G: TextGenerator> RecordTask for TranslateTask<'a, G> {
    /// (title, summary)
    type Input = (String, String);
    type Output = (String, String);

    fn stage(&self) -> StageKind {
        StageKind::Translate
    }

    fn input(&self, record: &ProposalRecord) -> Option<(String, String)> {
        if record.title_en.trim().is_empty() && record.summary_en.trim().is_empty() {
            return None;
        }
        Some((record.title_en.clone(), record.summary_en.clone()))
    }

    async fn run(&self, input: (String, String)) -> Result<(String, String)> {
        let (title, summary) = input;
        let title_ja = self.translate(&title).await?;
        let summary_ja = self.translate(&summary).await?;
        Ok((title_ja, summary_ja))
    }

    fn apply(&self, record: &mut ProposalRecord, (title_ja, summary_ja): (String, String)) {
        record.title_ja = Some(title_ja);
        record.summary_ja = Some(summary_ja);
    }
}

/// Produces Japanese, Easy Japanese and Easy Spanish structured documents
pub struct MultilangTask<'a, G: TextGenerator> {
    generator: &'a G,
    temperature: f64,
}

impl<'a, G: TextGenerator> MultilangTask<'a, G> {
    pub fn new(generator: &'a G, temperature: f64) -> Self {
        Self {
            generator,
            temperature,
        }
    }
}

#[async_trait]
impl<'a, G: TextGenerator> RecordTask for MultilangTask<'a, G> {
    type Input = String;
    type Output = MultilangDocs;

    fn stage(&self) -> StageKind {
        StageKind::Multilang
    }

    fn input(&self, record: &ProposalRecord) -> Option<String> {
        record
            .about_structured_en
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    async fn run(&self, about_en: String) -> Result<MultilangDocs> {
        let request = CompletionRequest::user(build_multilang_prompt(&about_en), self.temperature);
        let reply = self.generator.complete(&request).await?;
        Ok(parse_multilang_response(&reply)?)
    }

    fn apply(&self, record: &mut ProposalRecord, docs: MultilangDocs) {
        record.about_structured_ja = Some(docs.ja);
        record.about_structured_ja_elp = Some(docs.ja_elp);
        record.about_structured_es_elp = Some(docs.es_elp);
    }
}

/// Load `source`, then pull the stage's earlier results out of `output`
fn load_with_prior_output(
    source: &Path,
    output: &Path,
    stage: StageKind,
) -> Result<Vec<ProposalRecord>> {
    info!("Loading dataset from {:?}", source);
    let mut records = load_dataset(source)?;

    let cache = load_reuse_cache(output);
    let mut reused = 0;
    for record in records.iter_mut() {
        if let Some(previous) = cache.get(&record.proposal_id) {
            record.adopt_stage(stage, previous);
            reused += 1;
        }
    }
    if reused > 0 {
        info!("Reusing {} results from {:?}", reused, output);
    }
    Ok(records)
}

async fn execute_into<T: RecordTask>(
    task: &T,
    source: &Path,
    output: &Path,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let mut records = load_with_prior_output(source, output, task.stage())?;

    let mut options = options.clone();
    options.checkpoint_path = Some(output.to_path_buf());

    let report = run_batch(task, &mut records, &options).await?;

    save_dataset(output, &records)?;
    info!("Dataset written to {:?}", output);
    Ok(report)
}

/// Execute the title/summary translation: English dataset to Japanese dataset
pub async fn execute_translate<G: TextGenerator>(
    generator: &G,
    temperature: f64,
    source: &Path,
    output: &Path,
    options: &BatchOptions,
) -> Result<BatchReport> {
    execute_into(&TranslateTask::new(generator, temperature), source, output, options).await
}

/// Execute the multilingual pass: English dataset to multilingual dataset
pub async fn execute_multilang<G: TextGenerator>(
    generator: &G,
    temperature: f64,
    source: &Path,
    output: &Path,
    options: &BatchOptions,
) -> Result<BatchReport> {
    execute_into(&MultilangTask::new(generator, temperature), source, output, options).await
}
