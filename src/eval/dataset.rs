//! QA dataset files for the benchmark.
//!
//! Each course split is a CSV file `{qa_data_dir}/{split}.csv` with the
//! columns `query, standard_answer, course, material, page_range,
//! question_type`. The answer step writes the same columns plus
//! `agent_answer`.

use crate::config::SplitSelection;
use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The course splits published with the benchmark.
pub const ALL_SPLITS: [&str; 5] = [
    "Mao_Zedong_Thought",
    "Principles_of_Marxism",
    "Outline_of_Modern_and_Contemporary_Chinese_History",
    "Ideological_Morality_and_Legal_System",
    "An_Introduction_to_Xi_Jinping_Thought_on_Socialism_with_Chinese_Characteristics_for_a_New_Era",
];

/// A benchmark question with its reference answer and source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaItem {
    pub query: String,
    #[serde(default)]
    pub standard_answer: String,
    #[serde(default)]
    pub course: String,
    /// File the reference answer comes from.
    #[serde(default)]
    pub material: String,
    /// Pages of `material` holding the reference answer.
    #[serde(default)]
    pub page_range: String,
    #[serde(default)]
    pub question_type: String,
}

/// A question with the assistant's answer attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnsweredItem {
    pub query: String,
    #[serde(default)]
    pub standard_answer: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub page_range: String,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub agent_answer: String,
}

impl AnsweredItem {
    pub fn new(item: QaItem, agent_answer: String) -> Self {
        Self {
            query: item.query,
            standard_answer: item.standard_answer,
            course: item.course,
            material: item.material,
            page_range: item.page_range,
            question_type: item.question_type,
            agent_answer,
        }
    }
}

/// Expand the configured selection into split names.
pub fn resolve_splits(selection: &SplitSelection) -> Result<Vec<String>> {
    let names: Vec<String> = match selection {
        SplitSelection::One(name) if name == "all" => {
            return Ok(ALL_SPLITS.iter().map(|s| s.to_string()).collect());
        }
        SplitSelection::One(name) => vec![name.clone()],
        SplitSelection::Many(names) => names.clone(),
    };

    for name in &names {
        if !ALL_SPLITS.contains(&name.as_str()) {
            bail!(
                "Invalid split name: {}. Available splits: {}",
                name,
                ALL_SPLITS.join(", ")
            );
        }
    }

    Ok(names)
}

/// Path of a split's question file.
pub fn dataset_path(qa_data_dir: &Path, split: &str) -> PathBuf {
    qa_data_dir.join(format!("{}.csv", split))
}

/// A split whose question file is present and parseable.
#[derive(Debug, Clone)]
pub struct AvailableSplit {
    pub name: String,
    pub path: PathBuf,
    pub questions: usize,
}

/// Which requested splits can be run.
#[derive(Debug, Default)]
pub struct DatasetCheck {
    pub available: Vec<AvailableSplit>,
    /// Split name and why it cannot be used.
    pub missing: Vec<(String, String)>,
}

/// Check that each split has a non-empty, readable question file.
pub fn check_datasets(qa_data_dir: &Path, splits: &[String]) -> DatasetCheck {
    let mut check = DatasetCheck::default();

    for split in splits {
        let path = dataset_path(qa_data_dir, split);
        if !path.exists() {
            check.missing.push((split.clone(), "not found".to_string()));
            continue;
        }

        match count_rows(&path) {
            Ok(0) => check.missing.push((split.clone(), "empty file".to_string())),
            Ok(questions) => check.available.push(AvailableSplit {
                name: split.clone(),
                path,
                questions,
            }),
            Err(e) => check
                .missing
                .push((split.clone(), format!("invalid file: {:#}", e))),
        }
    }

    check
}

/// Number of question rows in a split file.
pub fn count_rows(path: &Path) -> Result<usize> {
    Ok(read_csv::<QaItem>(path)?.len())
}

/// Load questions, skipping rows with a blank query, up to `limit`.
pub fn load_questions(path: &Path, limit: Option<usize>) -> Result<Vec<QaItem>> {
    let items = read_csv::<QaItem>(path)?
        .into_iter()
        .filter(|item| !item.query.trim().is_empty())
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    Ok(items)
}

/// Write questions in the split file layout.
pub fn write_questions(path: &Path, items: &[QaItem]) -> Result<()> {
    write_csv(path, items)
}

/// Load the answer step's output.
pub fn load_answered(path: &Path) -> Result<Vec<AnsweredItem>> {
    read_csv(path)
}

/// Save the answer step's output.
pub fn write_answered(path: &Path, items: &[AnsweredItem]) -> Result<()> {
    write_csv(path, items)
}

pub(crate) fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("Invalid row {} in {:?}", i + 1, path)))
        .collect()
}

pub(crate) fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
