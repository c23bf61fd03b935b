//! Fetch the benchmark's course PDFs and QA splits from the Hugging Face Hub.

use super::dataset::{self, QaItem};
use anyhow::{Context, Result, bail};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Dataset repo holding the course PDFs.
pub const PDF_REPO_ID: &str = "HEHUA2005/rag-benchmark-pdf-data";
/// Dataset repo holding one QA split per course.
pub const QA_REPO_ID: &str = "HEHUA2005/rag-benchmark-qa-dataset";

const ROWS_API: &str = "https://datasets-server.huggingface.co/rows";
const PAGE_SIZE: usize = 100;

/// Outcome of a download command.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: Vec<String>,
    /// Already present locally and not empty.
    pub existing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.existing.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Print summary to stdout.
    pub fn print(&self, title: &str, dir: &Path) {
        println!("\n========== {} ==========", title);
        for name in &self.downloaded {
            println!("  downloaded: {}", name);
        }
        for name in &self.existing {
            println!("  up to date: {}", name);
        }
        for (name, reason) in &self.failed {
            println!("  FAILED: {} ({})", name, reason);
        }
        println!("----------------------------------------");
        println!(
            "Ready: {}/{}",
            self.downloaded.len() + self.existing.len(),
            self.total()
        );
        println!("Output directory: {}", dir.display());
        println!("========================================\n");
    }
}

fn non_empty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Download every PDF of the course repo into `output_dir`, keeping the
/// repo's relative paths. Files already present and non-empty are kept.
pub async fn download_pdfs(output_dir: &Path) -> Result<DownloadReport> {
    let output_dir = output_dir.to_path_buf();
    tokio::task::spawn_blocking(move || download_pdfs_blocking(&output_dir))
        .await
        .context("PDF download task panicked")?
}

fn download_pdfs_blocking(output_dir: &Path) -> Result<DownloadReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory {:?}", output_dir))?;

    let api = Api::new().context("Failed to initialise Hugging Face Hub client")?;
    let repo = api.repo(Repo::new(PDF_REPO_ID.to_string(), RepoType::Dataset));
    let info = repo
        .info()
        .with_context(|| format!("Failed to list files of {}", PDF_REPO_ID))?;

    let pdf_files: Vec<String> = info
        .siblings
        .into_iter()
        .map(|s| s.rfilename)
        .filter(|name| name.to_lowercase().ends_with(".pdf"))
        .collect();
    if pdf_files.is_empty() {
        bail!("No PDF files found in {}", PDF_REPO_ID);
    }
    info!(repo = PDF_REPO_ID, files = pdf_files.len(), "found PDF files");

    let mut report = DownloadReport::default();
    for name in pdf_files {
        let local = output_dir.join(&name);
        if non_empty_file(&local) {
            report.existing.push(name);
            continue;
        }

        let fetched = repo
            .get(&name)
            .map_err(anyhow::Error::from)
            .and_then(|cached| copy_into(&cached, &local));
        match fetched {
            Ok(()) => {
                info!(file = %name, "downloaded");
                report.downloaded.push(name);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "download failed");
                report.failed.push((name, format!("{:#}", e)));
            }
        }
    }

    Ok(report)
}

fn copy_into(cached: &Path, local: &Path) -> Result<()> {
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(cached, local).with_context(|| format!("Failed to copy to {:?}", local))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    rows: Vec<RowEntry>,
    num_rows_total: usize,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: Map<String, Value>,
}

/// Download QA splits as `{qa_data_dir}/{split}.csv`. Splits whose file
/// already has questions are kept.
pub async fn download_qa_splits(qa_data_dir: &Path, splits: &[String]) -> Result<DownloadReport> {
    fs::create_dir_all(qa_data_dir)
        .with_context(|| format!("Failed to create directory {:?}", qa_data_dir))?;

    let client = reqwest::Client::new();
    let mut report = DownloadReport::default();

    for split in splits {
        let path = dataset::dataset_path(qa_data_dir, split);
        if matches!(dataset::count_rows(&path), Ok(n) if n > 0) {
            report.existing.push(split.clone());
            continue;
        }

        match fetch_split(&client, split, &path).await {
            Ok(count) => {
                info!(split = %split, questions = count, "downloaded split");
                report.downloaded.push(split.clone());
            }
            Err(e) => {
                warn!(split = %split, error = %e, "split download failed");
                report.failed.push((split.clone(), format!("{:#}", e)));
            }
        }
    }

    Ok(report)
}

async fn fetch_split(client: &reqwest::Client, split: &str, path: &Path) -> Result<usize> {
    let mut items = Vec::new();
    let mut offset = 0;

    let length = PAGE_SIZE.to_string();

    loop {
        let start = offset.to_string();
        let response = client
            .get(ROWS_API)
            .query(&[
                ("dataset", QA_REPO_ID),
                ("config", "default"),
                ("split", split),
                ("offset", start.as_str()),
                ("length", length.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("rows API returned {}: {}", status, body);
        }

        let page: RowsPage = response.json().await?;
        let fetched = page.rows.len();
        items.extend(page.rows.into_iter().map(|entry| qa_item_from_row(&entry.row)));
        offset += fetched;

        if fetched == 0 || offset >= page.num_rows_total {
            break;
        }
    }

    if items.is_empty() {
        bail!("split {} has no rows", split);
    }
    dataset::write_questions(path, &items)?;
    Ok(items.len())
}

/// Map a dataset row to a question; absent columns become empty.
fn qa_item_from_row(row: &Map<String, Value>) -> QaItem {
    let field = |name: &str| row.get(name).map(value_to_string).unwrap_or_default();
    QaItem {
        query: field("query"),
        standard_answer: field("standard_answer"),
        course: field("course"),
        material: field("material"),
        page_range: field("page_range"),
        question_type: field("question_type"),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
