//! Benchmark pipeline: answer each split's questions, judge the answers,
//! save the scores and chart them.

use super::charts;
use super::dataset::{self, AnsweredItem, QaItem};
use super::judge::{Evaluation, LlmJudge};
use crate::agent::RagAgent;
use crate::config::{BenchmarkSettings, OutputFormat};
use crate::embedding::Embedder;
use crate::llm::ChatModel;
use anyhow::{Context, Result, bail};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Answer questions with the agent, `workers` at a time, keeping input order.
///
/// Answers are cut to `max_chars` characters. A failed question is kept
/// with an `[error] ...` answer so the judge scores it low.
pub async fn answer_questions<E: Embedder, C: ChatModel>(
    agent: &RagAgent<E, C>,
    items: Vec<QaItem>,
    workers: usize,
    max_chars: usize,
) -> Vec<AnsweredItem> {
    let total = items.len();

    stream::iter(items.into_iter().enumerate())
        .map(|(idx, item)| async move {
            let answer = match agent.answer_question(&item.query, None).await {
                Ok(answer) => truncate_chars(&answer.text, max_chars),
                Err(e) => {
                    warn!(question = idx + 1, error = %e, "answer generation failed");
                    format!("[error] {}", e)
                }
            };
            info!("answered {}/{}", idx + 1, total);
            AnsweredItem::new(item, answer)
        })
        .buffered(workers.max(1))
        .collect()
        .await
}

/// Judge answers, `workers` at a time, keeping input order.
pub async fn judge_answers<C: ChatModel>(
    judge: &LlmJudge<C>,
    items: &[AnsweredItem],
    workers: usize,
) -> Vec<Evaluation> {
    let total = items.len();

    stream::iter(items.iter().enumerate())
        .map(|(idx, item)| async move {
            let evaluation = judge.evaluate(item).await;
            info!(
                final_score = evaluation.final_score,
                "judged {}/{}",
                idx + 1,
                total
            );
            evaluation
        })
        .buffered(workers.max(1))
        .collect()
        .await
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Aggregate scores for one split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitStatistics {
    pub total: usize,
    pub avg_source_accuracy: f64,
    pub avg_content_accuracy: f64,
    pub avg_completeness: f64,
    pub avg_relevance: f64,
    pub avg_final_score: f64,
    pub pass_count: usize,
    /// Percentage of answers at or above the pass threshold.
    pub pass_rate: f64,
}

impl SplitStatistics {
    /// `None` when there is nothing to average.
    pub fn from_evaluations(evaluations: &[Evaluation]) -> Option<Self> {
        if evaluations.is_empty() {
            return None;
        }

        let total = evaluations.len();
        let mean = |score: fn(&Evaluation) -> f64| {
            evaluations.iter().map(score).sum::<f64>() / total as f64
        };
        let pass_count = evaluations.iter().filter(|e| e.passed()).count();

        Some(Self {
            total,
            avg_source_accuracy: mean(|e| e.source_accuracy_score),
            avg_content_accuracy: mean(|e| e.content_accuracy_score),
            avg_completeness: mean(|e| e.completeness_score),
            avg_relevance: mean(|e| e.relevance_score),
            avg_final_score: mean(|e| e.final_score),
            pass_count,
            pass_rate: pass_count as f64 / total as f64 * 100.0,
        })
    }

    /// Print summary to stdout.
    pub fn print(&self, split: &str) {
        println!("\n========== {} ==========", split);
        println!("Questions evaluated: {}", self.total);
        println!("----------------------------------------");
        println!("Avg source accuracy:  {:.2}/10", self.avg_source_accuracy);
        println!("Avg content accuracy: {:.2}/10", self.avg_content_accuracy);
        println!("Avg completeness:     {:.2}/10", self.avg_completeness);
        println!("Avg relevance:        {:.2}/10", self.avg_relevance);
        println!("----------------------------------------");
        println!("Avg final score: {:.2}/10", self.avg_final_score);
        println!(
            "Passed (>= 6.0): {}/{} ({:.1}%)",
            self.pass_count, self.total, self.pass_rate
        );
        println!("========================================\n");
    }
}

/// Result row without the reasoning columns.
#[derive(Serialize)]
struct ScoreRow<'a> {
    query: &'a str,
    standard_answer: &'a str,
    standard_page_range: &'a str,
    agent_answer: &'a str,
    source_accuracy_score: f64,
    content_accuracy_score: f64,
    completeness_score: f64,
    relevance_score: f64,
    final_score: f64,
    course: &'a str,
    material: &'a str,
    question_type: &'a str,
}

impl<'a> From<&'a Evaluation> for ScoreRow<'a> {
    fn from(e: &'a Evaluation) -> Self {
        Self {
            query: &e.query,
            standard_answer: &e.standard_answer,
            standard_page_range: &e.standard_page_range,
            agent_answer: &e.agent_answer,
            source_accuracy_score: e.source_accuracy_score,
            content_accuracy_score: e.content_accuracy_score,
            completeness_score: e.completeness_score,
            relevance_score: e.relevance_score,
            final_score: e.final_score,
            course: &e.course,
            material: &e.material,
            question_type: &e.question_type,
        }
    }
}

/// Write evaluations as CSV or JSON. CSV omits the reasoning columns
/// unless `detailed_reasoning` is set; JSON always has every field.
pub fn save_evaluations(
    path: &Path,
    evaluations: &[Evaluation],
    format: OutputFormat,
    detailed_reasoning: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(evaluations)?;
            fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        }
        OutputFormat::Csv if detailed_reasoning => dataset::write_csv(path, evaluations)?,
        OutputFormat::Csv => {
            let rows: Vec<ScoreRow> = evaluations.iter().map(ScoreRow::from).collect();
            dataset::write_csv(path, &rows)?;
        }
    }
    Ok(())
}

/// Read a result file written by [`save_evaluations`].
pub fn load_evaluations(path: &Path) -> Result<Vec<Evaluation>> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        Ok(serde_json::from_str(&content)?)
    } else {
        dataset::read_csv(path)
    }
}

/// What one split produced.
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub statistics: Option<SplitStatistics>,
    pub output_file: Option<PathBuf>,
    pub charts: Vec<PathBuf>,
}

/// A split's report, or why it failed.
#[derive(Debug)]
pub struct SplitOutcome {
    pub split: String,
    pub result: std::result::Result<SplitReport, String>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub timestamp: String,
    pub run_dir: PathBuf,
    pub outcomes: Vec<SplitOutcome>,
    /// Splits that were requested but had no usable question file.
    pub missing: Vec<(String, String)>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Print summary to stdout.
    pub fn print(&self) {
        println!("\n========== Benchmark Summary ==========");
        println!("Run: {}", self.timestamp);
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(SplitReport {
                    statistics: Some(stats),
                    ..
                }) => println!(
                    "  {}: Avg={:.2}, Pass={:.1}%",
                    outcome.split, stats.avg_final_score, stats.pass_rate
                ),
                Ok(_) => println!("  {}: no questions", outcome.split),
                Err(e) => println!("  {}: FAILED ({})", outcome.split, e),
            }
        }
        for (split, reason) in &self.missing {
            println!("  {}: skipped ({})", split, reason);
        }
        println!("----------------------------------------");
        println!(
            "Total: {}/{} splits completed",
            self.completed(),
            self.outcomes.len() + self.missing.len()
        );
        println!("Results: {}", self.run_dir.display());
        println!("========================================\n");
    }
}

/// Runs the answer and judge steps over every configured split.
pub struct BenchmarkRunner<'a, E, C, J> {
    agent: &'a RagAgent<E, C>,
    judge: &'a LlmJudge<J>,
    settings: &'a BenchmarkSettings,
}

impl<'a, E: Embedder, C: ChatModel, J: ChatModel> BenchmarkRunner<'a, E, C, J> {
    pub fn new(
        agent: &'a RagAgent<E, C>,
        judge: &'a LlmJudge<J>,
        settings: &'a BenchmarkSettings,
    ) -> Self {
        Self {
            agent,
            judge,
            settings,
        }
    }

    /// Run every available split under one timestamped directory.
    ///
    /// A failing split is recorded and the run moves on.
    pub async fn run(&self) -> Result<RunSummary> {
        let splits = dataset::resolve_splits(&self.settings.splits)?;
        let check = dataset::check_datasets(&self.settings.qa_data_dir, &splits);

        for (split, reason) in &check.missing {
            warn!(split = %split, reason = %reason, "skipping split");
        }
        if check.available.is_empty() {
            bail!(
                "No QA data found in {:?}. Run `course-rag download` first.",
                self.settings.qa_data_dir
            );
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let run_dir = self.settings.output_dir.join(&timestamp);
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create output directory {:?}", run_dir))?;

        let mut outcomes = Vec::new();
        for available in &check.available {
            println!(
                "Running split {} ({} questions)...",
                available.name, available.questions
            );

            let result = self
                .run_split(&available.name, &available.path, &run_dir)
                .await
                .map_err(|e| {
                    error!(split = %available.name, error = %e, "split failed");
                    format!("{:#}", e)
                });
            outcomes.push(SplitOutcome {
                split: available.name.clone(),
                result,
            });
        }

        Ok(RunSummary {
            timestamp,
            run_dir,
            outcomes,
            missing: check.missing,
        })
    }

    async fn run_split(&self, split: &str, questions: &Path, run_dir: &Path) -> Result<SplitReport> {
        let start = Instant::now();
        let items = dataset::load_questions(questions, self.settings.question_limit())?;

        let answered = answer_questions(
            self.agent,
            items,
            self.settings.workers,
            self.settings.answer_max_chars,
        )
        .await;
        let evaluations = judge_answers(self.judge, &answered, self.settings.workers).await;

        let Some(stats) = SplitStatistics::from_evaluations(&evaluations) else {
            return Ok(SplitReport {
                statistics: None,
                output_file: None,
                charts: Vec::new(),
            });
        };

        let format = self.settings.output_format;
        let output_file = run_dir.join(format!("{}.{}", split, format.extension()));
        save_evaluations(
            &output_file,
            &evaluations,
            format,
            self.settings.detailed_reasoning,
        )?;
        stats.print(split);

        let charts = if self.settings.enable_visualization {
            let chart_dir = run_dir.join("visualizations").join(split);
            charts::render_all(&evaluations, &chart_dir, Some(split))?
        } else {
            Vec::new()
        };

        info!(
            split = %split,
            questions = stats.total,
            secs = start.elapsed().as_secs_f64(),
            "split finished"
        );

        Ok(SplitReport {
            statistics: Some(stats),
            output_file: Some(output_file),
            charts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RagConfig, SplitSelection};
    use crate::document::SourceKind;
    use crate::error::RagError;
    use crate::splitter::Chunk;
    use crate::store::VectorStore;
    use crate::test_support::{KeywordEmbedder, ScriptedChat};
    use tempfile::TempDir;

    const GOOD: &str = r#"{"source_accuracy_score": 8, "content_accuracy_score": 7,
        "completeness_score": 6, "relevance_score": 9, "final_score": 7.7,
        "overall_reasoning": "fine"}"#;

    fn evaluation(final_score: f64) -> Evaluation {
        Evaluation {
            query: "q".to_string(),
            source_accuracy_score: final_score,
            content_accuracy_score: 5.0,
            completeness_score: 5.0,
            relevance_score: 5.0,
            final_score,
            overall_reasoning: "why".to_string(),
            ..Evaluation::default()
        }
    }

    fn question(query: &str) -> QaItem {
        QaItem {
            query: query.to_string(),
            standard_answer: "ref".to_string(),
            material: "mao.pdf".to_string(),
            page_range: "3".to_string(),
            ..QaItem::default()
        }
    }

    async fn agent(chat: ScriptedChat) -> RagAgent<KeywordEmbedder, ScriptedChat> {
        let mut store = VectorStore::in_memory("test", "/tmp/unused.bin", KeywordEmbedder);
        store
            .add_chunks(&[Chunk {
                text: "The mass line comes from the masses".to_string(),
                source: "mao.pdf".to_string(),
                page: 3,
                kind: SourceKind::Pdf,
                chunk_index: 0,
                start_pos: 0,
                end_pos: 35,
            }])
            .await
            .unwrap();
        RagAgent::new(store, chat, RagConfig::default())
    }

    #[test]
    fn test_statistics() {
        assert!(SplitStatistics::from_evaluations(&[]).is_none());

        let stats =
            SplitStatistics::from_evaluations(&[evaluation(8.0), evaluation(6.0), evaluation(1.0)])
                .unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pass_count, 2);
        assert!((stats.avg_final_score - 5.0).abs() < 1e-9);
        assert!((stats.pass_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_answers_keep_order_and_truncate() {
        let agent = agent(ScriptedChat::new(|messages| {
            let last = &messages[messages.len() - 1].content;
            if last.contains("Question: broken") {
                Err(RagError::LlmApi("boom".to_string()))
            } else {
                Ok("x".repeat(50))
            }
        }))
        .await;

        let answered = answer_questions(
            &agent,
            vec![question("first"), question("broken"), question("third")],
            3,
            10,
        )
        .await;

        let queries: Vec<_> = answered.iter().map(|a| a.query.as_str()).collect();
        assert_eq!(queries, vec!["first", "broken", "third"]);
        assert_eq!(answered[0].agent_answer, "x".repeat(10));
        assert!(answered[1].agent_answer.starts_with("[error]"));
    }

    #[test]
    fn test_save_without_reasoning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        save_evaluations(&path, &[evaluation(7.0)], OutputFormat::Csv, false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("query,standard_answer,standard_page_range,agent_answer"));
        assert!(!content.contains("overall_reasoning"));

        let loaded = load_evaluations(&path).unwrap();
        assert_eq!(loaded[0].final_score, 7.0);
        assert!(loaded[0].overall_reasoning.is_empty());
    }

    #[test]
    fn test_save_json_and_detailed_csv() {
        let dir = TempDir::new().unwrap();
        let evaluations = vec![evaluation(7.0), evaluation(2.5)];

        let json = dir.path().join("out.json");
        save_evaluations(&json, &evaluations, OutputFormat::Json, false).unwrap();
        assert_eq!(load_evaluations(&json).unwrap(), evaluations);

        let csv = dir.path().join("out.csv");
        save_evaluations(&csv, &evaluations, OutputFormat::Csv, true).unwrap();
        assert_eq!(load_evaluations(&csv).unwrap(), evaluations);
    }

    #[tokio::test]
    async fn test_runner_isolates_missing_splits() {
        let dir = TempDir::new().unwrap();
        let settings = BenchmarkSettings {
            splits: SplitSelection::Many(vec![
                "Mao_Zedong_Thought".to_string(),
                "Principles_of_Marxism".to_string(),
            ]),
            max_questions_per_split: Some(1),
            workers: 2,
            enable_visualization: false,
            qa_data_dir: dir.path().join("qa"),
            output_dir: dir.path().join("results"),
            ..BenchmarkSettings::default()
        };
        dataset::write_questions(
            &dataset::dataset_path(&settings.qa_data_dir, "Mao_Zedong_Thought"),
            &[question("What is the mass line?"), question("second")],
        )
        .unwrap();

        let agent = agent(ScriptedChat::fixed("According to mao.pdf, page 3")).await;
        let judge = LlmJudge::new(ScriptedChat::fixed(GOOD));
        let summary = BenchmarkRunner::new(&agent, &judge, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.completed(), 1);
        assert_eq!(summary.missing.len(), 1);

        let report = summary.outcomes[0].result.as_ref().unwrap();
        let stats = report.statistics.as_ref().unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pass_count, 1);

        let output = report.output_file.as_ref().unwrap();
        assert!(output.ends_with("Mao_Zedong_Thought.csv"));
        assert!(output.starts_with(&summary.run_dir));
        assert_eq!(load_evaluations(output).unwrap()[0].final_score, 7.7);
    }

    #[tokio::test]
    async fn test_runner_without_data_fails() {
        let dir = TempDir::new().unwrap();
        let settings = BenchmarkSettings {
            qa_data_dir: dir.path().join("empty"),
            output_dir: dir.path().join("results"),
            ..BenchmarkSettings::default()
        };
        let agent = agent(ScriptedChat::fixed("a")).await;
        let judge = LlmJudge::new(ScriptedChat::fixed(GOOD));

        assert!(
            BenchmarkRunner::new(&agent, &judge, &settings)
                .run()
                .await
                .is_err()
        );
    }
}
