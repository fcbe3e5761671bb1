// Summarizer module
use std::sync::Arc;
use tracing::info;

use super::{LlmProvider, LlmRequest};
use crate::error::SummarizationError;

/// What kind of text is being summarized; selects prompt and token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryTask {
    Article,
    Comments,
    DigestBlock,
}

impl SummaryTask {
    fn instructions(self) -> &'static str {
        match self {
            SummaryTask::Article => {
                "You summarize news articles for a mobile reader. Write a concise, neutral \
                 summary of the article in 3 to 5 sentences, in the article's own language. \
                 Capture the key facts from the whole text, not just the opening. \
                 Ignore navigation, ads, cookie notices and any leftover markup."
            }
            SummaryTask::Comments => {
                "You summarize online discussion threads. Describe the main viewpoints, points \
                 of agreement and disagreement, and any notable facts or links raised by \
                 commenters, in 3 to 5 sentences. Do not attribute opinions to named users."
            }
            SummaryTask::DigestBlock => {
                "You summarize one topic from a daily news digest. Write one or two plain \
                 sentences stating what happened. No preamble, no bullet points."
            }
        }
    }

    fn max_tokens(self) -> usize {
        match self {
            SummaryTask::Article | SummaryTask::Comments => 400,
            SummaryTask::DigestBlock => 150,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SummaryTask::Article => "article",
            SummaryTask::Comments => "comments",
            SummaryTask::DigestBlock => "digest block",
        }
    }
}

/// Prefix of `content` holding at most `max_chars` characters.
///
/// A plain cut on a char boundary: content at or under the ceiling is
/// returned unchanged.
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Sends truncated content with a task prompt to the completion provider.
#[derive(Clone)]
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    max_input_chars: usize,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, max_input_chars: usize) -> Self {
        Self {
            provider,
            max_input_chars,
        }
    }

    pub async fn summarize(&self, task: SummaryTask, content: &str) -> Result<String, SummarizationError> {
        let trimmed = truncate_chars(content, self.max_input_chars);
        if trimmed.len() < content.len() {
            info!(
                "summarizer: {} content truncated from {} to {} bytes",
                task.label(),
                content.len(),
                trimmed.len()
            );
        }

        let request = LlmRequest {
            system: Some(task.instructions().to_string()),
            prompt: trimmed.to_string(),
            max_tokens: Some(task.max_tokens()),
            ..LlmRequest::default()
        };

        let response = self.provider.generate(request).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(SummarizationError::Empty);
        }

        info!(
            "summarizer: {} summary ready, {} tokens ({})",
            task.label(),
            response.usage.total_tokens,
            response.model
        );
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, UsageMetadata};
    use std::sync::Mutex;

    /// Echoes a canned reply and records what it was asked.
    struct CannedProvider {
        reply: String,
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, SummarizationError> {
            self.seen.lock().unwrap().push(request);
            Ok(LlmResponse {
                content: self.reply.clone(),
                usage: UsageMetadata::default(),
                model: "canned".into(),
            })
        }
    }

    fn canned(reply: &str) -> Arc<CannedProvider> {
        Arc::new(CannedProvider {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn truncation_below_at_and_over_ceiling() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_chars("exactly11!!", 10), "exactly11!");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn truncation_is_idempotent() {
        let once = truncate_chars("a fairly long sentence", 7);
        assert_eq!(truncate_chars(once, 7), once);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let text = "éléphant";
        assert_eq!(truncate_chars(text, 3), "élé");
        assert_eq!(truncate_chars(text, 8), text);
    }

    #[tokio::test]
    async fn content_is_cut_before_submission() {
        let provider = canned("  A summary.  ");
        let summarizer = Summarizer::new(provider.clone(), 5);

        let summary = summarizer
            .summarize(SummaryTask::Article, "0123456789")
            .await
            .expect("summary");

        assert_eq!(summary, "A summary.");
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].prompt, "01234");
        assert_eq!(seen[0].max_tokens, Some(400));
        assert!(seen[0].system.as_deref().unwrap_or_default().contains("news articles"));
    }

    #[tokio::test]
    async fn blank_completion_is_an_error() {
        let summarizer = Summarizer::new(canned(" \n "), 100);
        let err = summarizer
            .summarize(SummaryTask::Comments, "some thread")
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizationError::Empty));
    }
}
