//! LLM prompts for answering questions and judging answers.
//!
//! Templates use `{name}` placeholders filled by the builder functions.
//! Filling is a single pass: text inserted for one placeholder is never
//! searched for another.

/// Collection of prompts used by the agent and the judge.
pub struct Prompts;

impl Prompts {
    /// System prompt for the course assistant.
    pub fn rag_system() -> &'static str {
        r#"You are a teaching assistant for university courses. You answer students' questions using the course material provided in the context.

Rules:
- Base your answer on the context. If the context does not contain the answer, say so and answer from general knowledge, marking it as such.
- Always cite where the information comes from, using the file name and the page or slide number given in the context header, for example "According to lecture3.pdf, page 15, ...".
- Be accurate and concise. Answer in the same language as the question."#
    }

    /// User message template with retrieved context and the question.
    pub fn rag_user() -> &'static str {
        r#"Course material:
{context}

Question: {question}

Answer the question and cite the source file and page for each key point."#
    }

    /// Context placeholder used when retrieval found nothing.
    pub fn no_context() -> &'static str {
        "(No matching course material was found.)"
    }

    /// Fill the RAG user template.
    pub fn build_rag_user(context: &str, question: &str) -> String {
        fill_template(
            Self::rag_user(),
            &[("context", context), ("question", question)],
        )
    }

    /// System prompt for the judge.
    pub fn judge_system() -> &'static str {
        "You are a professional evaluator of RAG systems. You assess answer quality objectively and impartially."
    }

    /// Judge prompt with the four weighted dimensions.
    pub fn judge_evaluation() -> &'static str {
        r#"Your task is to score the answer of a RAG system on several dimensions.

## Scoring criteria

Score each of the following four dimensions from 0 to 10:

1. **Source accuracy** - weight 60%
   - This reflects the retrieval ability of the RAG system and is the most important dimension.
   - Check whether the answer mentions page numbers, chapters, or other source information.
   - Reference source: {standard_material}, pages: {standard_page_range}
   - Guidance:
     * Explicitly cites the correct page or chapter (e.g. "according to page 15"): 8-10
     * Cites pages that are not fully correct: 5-7
     * Mentions a source without a specific page: 3-5
     * Mentions no source at all: 0-2

2. **Content accuracy** - weight 20%
   - Is the core information correct?
   - Are there factual errors?
   - Does it agree with the main points of the reference answer?

3. **Completeness** - weight 15%
   - Does the answer cover the key information of the reference answer?
   - Is anything important missing?
   - Is the level of detail sufficient?

4. **Relevance** - weight 5%
   - Does the answer stay on topic?
   - Does it contain irrelevant information?

## Input

**Question:** {query}

**Reference answer:**
{standard_answer}
**Reference source:** {standard_material}, pages: {standard_page_range}

**RAG answer:**
{rag_answer}

## Output format

Return the scores as JSON:

```json
{
  "source_accuracy_score": 8.5,
  "content_accuracy_score": 7.0,
  "completeness_score": 7.5,
  "relevance_score": 9.0,
  "final_score": 7.9,
  "source_accuracy_reasoning": "...",
  "content_accuracy_reasoning": "...",
  "completeness_reasoning": "...",
  "relevance_reasoning": "...",
  "overall_reasoning": "..."
}
```

**Formula**: final_score = source_accuracy * 0.6 + content_accuracy * 0.2 + completeness * 0.15 + relevance * 0.05

Even a correct answer must get a low source accuracy score if it gives no source information.

Output only the JSON, nothing else."#
    }

    /// Fill the judge template for one question.
    pub fn build_judge_evaluation(
        query: &str,
        standard_answer: &str,
        standard_material: &str,
        standard_page_range: &str,
        rag_answer: &str,
    ) -> String {
        fill_template(
            Self::judge_evaluation(),
            &[
                ("query", query),
                ("standard_answer", standard_answer),
                ("standard_material", standard_material),
                ("standard_page_range", standard_page_range),
                ("rag_answer", rag_answer),
            ],
        )
    }
}

/// Replace each `{name}` in `template` with its value. Unknown braces are
/// kept as they are.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let placeholder = values.iter().find(|&&(name, _)| {
            tail.starts_with(name) && tail[name.len()..].starts_with('}')
        });

        match placeholder {
            Some(&(name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}
