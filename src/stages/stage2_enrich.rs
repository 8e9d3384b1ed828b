use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::io::{load_dataset, save_dataset};
use crate::models::{ProposalRecord, StageKind, StageStatus};
use crate::stages::batch::{run_batch, BatchOptions, BatchReport, RecordTask};
use crate::web::{extract_page, PageFetcher, ScrapedPage};

/// Fetches each proposal page and stores its labelled sections
pub struct ScrapeTask<'a, F: PageFetcher> {
    fetcher: &'a F,
}

impl<'a, F: PageFetcher> ScrapeTask<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl<'a, F: PageFetcher> RecordTask for ScrapeTask<'a, F> {
    type Input = String;
    type Output = ScrapedPage;

    fn stage(&self) -> StageKind {
        StageKind::Scrape
    }

    fn input(&self, record: &ProposalRecord) -> Option<String> {
        record
            .proposal_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }

    async fn run(&self, url: String) -> Result<ScrapedPage> {
        let html = self.fetcher.fetch(&url).await?;
        let page = extract_page(&html).context("Failed to extract page content")?;
        Ok(page)
    }

    fn apply(&self, record: &mut ProposalRecord, page: ScrapedPage) {
        record.problem_en = Some(page.problem);
        record.solution_en = Some(page.solution);
        record.about_en = Some(page.about);
        record.team_en = Some(page.team);
        record.full_text_en = Some(page.full_text);
    }
}

/// Execute the enrich stage on the English dataset in place.
///
/// A record selected by `options.only_id` is always fetched again, from
/// `url_override` when given.
pub async fn execute_enrich<F: PageFetcher>(
    fetcher: &F,
    dataset: &Path,
    options: &BatchOptions,
    url_override: Option<&str>,
) -> Result<BatchReport> {
    info!("Loading dataset from {:?}", dataset);
    let mut records = load_dataset(dataset)?;

    if let Some(id) = options.only_id.as_deref() {
        let record = records
            .iter_mut()
            .find(|r| r.proposal_id == id)
            .with_context(|| format!("proposal_id not found: {}", id))?;
        if let Some(url) = url_override {
            record.proposal_url = Some(url.to_string());
        }
        record.scrape_error = None;
        record
            .stage_status
            .insert(StageKind::Scrape, StageStatus::Pending);
    }

    let mut options = options.clone();
    options.checkpoint_path = Some(dataset.to_path_buf());

    let task = ScrapeTask::new(fetcher);
    let report = run_batch(&task, &mut records, &options).await?;

    save_dataset(dataset, &records)?;
    info!("Dataset written to {:?}", dataset);
    Ok(report)
}
