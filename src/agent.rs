//! Retrieval-augmented answering over the course collection.

use crate::config::RagConfig;
use crate::document::SourceKind;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, Message, Prompts, Role};
use crate::store::{SearchHit, VectorStore};
use std::fmt;
use tracing::{debug, info};

/// A retrieved chunk cited in an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub source: String,
    pub page: usize,
    pub kind: SourceKind,
    pub score: f32,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} {} (score {:.3})",
            self.source,
            self.kind.location_label(),
            self.page,
            self.score
        )
    }
}

/// The model's answer and the chunks it was given.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// Answers questions from retrieved course material.
pub struct RagAgent<E, C> {
    store: VectorStore<E>,
    chat: C,
    config: RagConfig,
}

impl<E: Embedder, C: ChatModel> RagAgent<E, C> {
    pub fn new(store: VectorStore<E>, chat: C, config: RagConfig) -> Self {
        Self {
            store,
            chat,
            config,
        }
    }

    pub fn store(&self) -> &VectorStore<E> {
        &self.store
    }

    pub fn chat_model(&self) -> &C {
        &self.chat
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The `top_k` chunks most similar to the query.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.store.search(query, self.config.top_k).await
    }

    /// Answer a question, optionally continuing a conversation.
    ///
    /// Only the last `max_history_turns` user/assistant exchanges of
    /// `chat_history` are sent. Without matching material the model is
    /// still asked, and told nothing was found.
    pub async fn answer_question(
        &self,
        query: &str,
        chat_history: Option<&[Message]>,
    ) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidInput("question is empty".to_string()));
        }

        let hits = self.retrieve(query).await?;
        debug!(hits = hits.len(), "retrieved context");

        let context = if hits.is_empty() {
            Prompts::no_context().to_string()
        } else {
            format_context(&hits)
        };

        let mut messages = vec![Message::system(Prompts::rag_system())];
        if let Some(history) = chat_history {
            messages.extend(recent_history(history, self.config.max_history_turns));
        }
        messages.push(Message::user(Prompts::build_rag_user(&context, query)));

        let response = self.chat.chat(messages).await?;

        info!(
            model = self.chat.model_name(),
            sources = hits.len(),
            "answered question"
        );

        Ok(Answer {
            text: response.content.trim().to_string(),
            sources: hits
                .into_iter()
                .map(|hit| SourceRef {
                    source: hit.record.metadata.file_name().to_string(),
                    page: hit.record.metadata.page,
                    kind: hit.record.metadata.kind,
                    score: hit.score,
                })
                .collect(),
        })
    }

    /// Answer within a conversation and record the exchange.
    pub async fn chat_turn(&self, conversation: &mut Conversation, query: &str) -> Result<Answer> {
        let answer = self
            .answer_question(query, Some(conversation.history()))
            .await?;
        conversation.push_exchange(query.trim(), &answer.text);
        Ok(answer)
    }
}

/// Numbered context blocks with a source header each.
pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] Source: {}\n{}",
                i + 1,
                hit.record.metadata.location(),
                hit.record.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The last `max_turns` exchanges, without system messages.
fn recent_history(history: &[Message], max_turns: usize) -> Vec<Message> {
    let dialogue: Vec<&Message> = history.iter().filter(|m| m.role != Role::System).collect();
    let keep = max_turns * 2;
    dialogue[dialogue.len().saturating_sub(keep)..]
        .iter()
        .map(|m| (*m).clone())
        .collect()
}

/// Conversation history for the interactive chat.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    max_turns: usize,
}

impl Conversation {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Number of stored exchanges.
    pub fn turns(&self) -> usize {
        self.messages.len() / 2
    }

    /// Record a question and its answer, dropping the oldest exchanges
    /// beyond the limit.
    pub fn push_exchange(&mut self, question: &str, answer: &str) {
        self.messages.push(Message::user(question));
        self.messages.push(Message::assistant(answer));

        let keep = self.max_turns * 2;
        if self.messages.len() > keep {
            let excess = self.messages.len() - keep;
            self.messages.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceKind;
    use crate::splitter::Chunk;
    use crate::test_support::{KeywordEmbedder, ScriptedChat};

    async fn agent_with(
        chunks: &[(&str, usize, &str)],
        chat: ScriptedChat,
        top_k: usize,
    ) -> RagAgent<KeywordEmbedder, ScriptedChat> {
        let mut store = VectorStore::in_memory("test", "/tmp/unused.bin", KeywordEmbedder);
        let chunks: Vec<Chunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, (source, page, text))| Chunk {
                text: text.to_string(),
                source: source.to_string(),
                page: *page,
                kind: SourceKind::Pdf,
                chunk_index: i,
                start_pos: 0,
                end_pos: text.len(),
            })
            .collect();
        store.add_chunks(&chunks).await.unwrap();

        let config = RagConfig {
            top_k,
            max_history_turns: 2,
        };
        RagAgent::new(store, chat, config)
    }

    #[tokio::test]
    async fn test_answer_includes_cited_context() {
        let agent = agent_with(
            &[
                ("mao.pdf", 15, "The mass line comes from the masses and goes to the masses"),
                ("mao.pdf", 30, "Seeking truth from facts"),
            ],
            ScriptedChat::fixed("  According to mao.pdf, page 15, ...  "),
            1,
        )
        .await;

        let answer = agent
            .answer_question("What is the mass line?", None)
            .await
            .unwrap();

        assert_eq!(answer.text, "According to mao.pdf, page 15, ...");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].page, 15);

        let requests = agent.chat_model().requests();
        let messages = &requests[0];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("[1] Source: mao.pdf, page 15"));
        assert!(messages[1].content.contains("Question: What is the mass line?"));
    }

    #[tokio::test]
    async fn test_empty_store_still_asks_model() {
        let agent = agent_with(&[], ScriptedChat::fixed("No material."), 3).await;
        let answer = agent.answer_question("anything?", None).await.unwrap();

        assert!(answer.sources.is_empty());
        let requests = agent.chat_model().requests();
        assert!(requests[0][1].content.contains(Prompts::no_context()));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let agent = agent_with(&[], ScriptedChat::fixed("x"), 1).await;
        assert!(matches!(
            agent.answer_question("   ", None).await,
            Err(RagError::InvalidInput(_))
        ));
        assert!(agent.chat_model().requests().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_trimmed() {
        let agent = agent_with(&[("a.pdf", 1, "text")], ScriptedChat::fixed("ok"), 1).await;
        let history = vec![
            Message::system("ignored"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::assistant("a2"),
            Message::user("q3"),
            Message::assistant("a3"),
        ];

        agent
            .answer_question("q4", Some(&history))
            .await
            .unwrap();

        let sent = &agent.chat_model().requests()[0];
        let contents: Vec<&str> = sent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(sent.len(), 6);
        assert_eq!(&contents[1..5], &["q2", "a2", "q3", "a3"]);
    }

    #[tokio::test]
    async fn test_chat_turn_records_exchange() {
        let agent = agent_with(&[("a.pdf", 1, "text")], ScriptedChat::fixed("reply"), 1).await;
        let mut conversation = Conversation::new(2);

        for q in ["first", "second", "third"] {
            agent.chat_turn(&mut conversation, q).await.unwrap();
        }

        assert_eq!(conversation.turns(), 2);
        assert_eq!(conversation.history()[0].content, "second");
        // The third request carried the two earlier exchanges
        assert_eq!(agent.chat_model().requests()[2].len(), 6);
    }

    #[test]
    fn test_source_ref_display() {
        let source = SourceRef {
            source: "deck.pptx".to_string(),
            page: 4,
            kind: SourceKind::Pptx,
            score: 0.5,
        };
        assert_eq!(source.to_string(), "deck.pptx, slide 4 (score 0.500)");
    }
}
