//! LLM-as-judge scoring of assistant answers.
//!
//! Four dimensions are scored from 0 to 10 and combined with the weights
//! in [`WEIGHTS`]. The judge reports its own `final_score`; it is clamped
//! but not recomputed.

use crate::error::{RagError, Result};
use crate::eval::dataset::AnsweredItem;
use crate::llm::{ChatModel, Prompts};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Dimension names and their weights in the final score.
pub const WEIGHTS: [(&str, f64); 4] = [
    ("Source Accuracy", 0.60),
    ("Content Accuracy", 0.20),
    ("Completeness", 0.15),
    ("Relevance", 0.05),
];

/// Score at or above which an answer passes.
pub const PASS_THRESHOLD: f64 = 6.0;

/// Scores and reasoning returned by the judge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JudgeScores {
    pub source_accuracy_score: f64,
    pub content_accuracy_score: f64,
    pub completeness_score: f64,
    pub relevance_score: f64,
    pub final_score: f64,
    #[serde(default)]
    pub source_accuracy_reasoning: String,
    #[serde(default)]
    pub content_accuracy_reasoning: String,
    #[serde(default)]
    pub completeness_reasoning: String,
    #[serde(default)]
    pub relevance_reasoning: String,
    #[serde(default)]
    pub overall_reasoning: String,
}

impl JudgeScores {
    /// All-zero scores with the failure recorded as reasoning.
    pub fn failed(reason: String) -> Self {
        Self {
            source_accuracy_reasoning: reason,
            ..Self::default()
        }
    }

    fn clamped(mut self) -> Self {
        for score in [
            &mut self.source_accuracy_score,
            &mut self.content_accuracy_score,
            &mut self.completeness_score,
            &mut self.relevance_score,
            &mut self.final_score,
        ] {
            let value = *score;
            *score = if value.is_finite() {
                value.clamp(0.0, 10.0)
            } else {
                0.0
            };
        }
        self
    }
}

/// One judged answer, in result-file column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub query: String,
    #[serde(default)]
    pub standard_answer: String,
    #[serde(default)]
    pub standard_page_range: String,
    #[serde(default)]
    pub agent_answer: String,
    pub source_accuracy_score: f64,
    pub content_accuracy_score: f64,
    pub completeness_score: f64,
    pub relevance_score: f64,
    pub final_score: f64,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub source_accuracy_reasoning: String,
    #[serde(default)]
    pub content_accuracy_reasoning: String,
    #[serde(default)]
    pub completeness_reasoning: String,
    #[serde(default)]
    pub relevance_reasoning: String,
    #[serde(default)]
    pub overall_reasoning: String,
}

impl Evaluation {
    pub fn new(item: &AnsweredItem, scores: JudgeScores) -> Self {
        Self {
            query: item.query.clone(),
            standard_answer: item.standard_answer.clone(),
            standard_page_range: item.page_range.clone(),
            agent_answer: item.agent_answer.clone(),
            source_accuracy_score: scores.source_accuracy_score,
            content_accuracy_score: scores.content_accuracy_score,
            completeness_score: scores.completeness_score,
            relevance_score: scores.relevance_score,
            final_score: scores.final_score,
            course: item.course.clone(),
            material: item.material.clone(),
            question_type: item.question_type.clone(),
            source_accuracy_reasoning: scores.source_accuracy_reasoning,
            content_accuracy_reasoning: scores.content_accuracy_reasoning,
            completeness_reasoning: scores.completeness_reasoning,
            relevance_reasoning: scores.relevance_reasoning,
            overall_reasoning: scores.overall_reasoning,
        }
    }

    /// The four dimension scores in [`WEIGHTS`] order.
    pub fn dimension_scores(&self) -> [f64; 4] {
        [
            self.source_accuracy_score,
            self.content_accuracy_score,
            self.completeness_score,
            self.relevance_score,
        ]
    }

    pub fn passed(&self) -> bool {
        self.final_score >= PASS_THRESHOLD
    }
}

/// Scores answers against the reference answer and source.
pub struct LlmJudge<C> {
    client: C,
}

impl<C: ChatModel> LlmJudge<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Judge one answer. Never fails: transport and parse errors give a
    /// zero-scored evaluation that says what went wrong.
    pub async fn evaluate(&self, item: &AnsweredItem) -> Evaluation {
        let prompt = Prompts::build_judge_evaluation(
            &item.query,
            &item.standard_answer,
            &item.material,
            &item.page_range,
            &item.agent_answer,
        );

        let scores = match self
            .client
            .complete(Some(Prompts::judge_system()), &prompt)
            .await
        {
            Ok(response) => match parse_judge_response(&response) {
                Ok(scores) => scores,
                Err(e) => {
                    warn!(query = %item.query, error = %e, "could not parse judge response");
                    JudgeScores::failed(format!("parse failed: {}", e))
                }
            },
            Err(e) => {
                warn!(query = %item.query, error = %e, "judge request failed");
                JudgeScores::failed(format!("evaluation failed: {}", e))
            }
        };

        debug!(final_score = scores.final_score, "judged answer");
        Evaluation::new(item, scores)
    }
}

/// Parse the judge's JSON reply. Scores outside 0 to 10 are clamped.
pub fn parse_judge_response(response: &str) -> Result<JudgeScores> {
    let json_str = extract_json(response);
    let scores: JudgeScores = serde_json::from_str(json_str).map_err(|e| {
        RagError::LlmParse(format!(
            "Failed to parse judge response: {}. Response: {}",
            e, response
        ))
    })?;
    Ok(scores.clamped())
}

/// The JSON object inside a reply that may be fenced or wrapped in prose.
pub fn extract_json(response: &str) -> &str {
    let response = response.trim();

    if let Some(rest) = response.strip_prefix("```json") {
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim();
        }
    }

    if response.starts_with("```") {
        if let (Some(start), Some(end)) = (response.find('\n'), response.rfind("```")) {
            if end > start {
                return response[start + 1..end].trim();
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            return &response[start..=end];
        }
    }

    response
}
