//! The language-model collaborator: topic-shift detection, summarization,
//! and message grouping.

use async_trait::async_trait;
use conv_error::{Error, Result};
use tracing::trace;

#[async_trait]
pub trait LanguageOracle: Send + Sync {
    /// Stateless semantic predicate over two adjacent messages. The
    /// dispatcher does not re-query on the same inputs within one action.
    async fn topic_shift(&self, previous_text: &str, current_text: &str) -> Result<bool>;

    /// Summarizes `texts` into a single non-empty string. May fail with
    /// `Error::OracleError`; no retry policy is imposed.
    async fn summarize(&self, texts: &[String]) -> Result<String>;

    /// Partitions the indices of `messages` into groups, parsed from the
    /// oracle's structured reply. Auxiliary: the dispatcher never calls
    /// this itself.
    async fn group(&self, messages: &[String]) -> Result<Vec<Vec<usize>>>;
}

/// Deterministic test double. `topic_shift` fires on the case-insensitive
/// substring `"new"` in the current text; `summarize` never calls out
/// anywhere, it just reports how many texts it was given.
#[derive(Debug, Default)]
pub struct DummyOracle;

#[async_trait]
impl LanguageOracle for DummyOracle {
    async fn topic_shift(&self, _previous_text: &str, current_text: &str) -> Result<bool> {
        let shifted = current_text.to_lowercase().contains("new");
        trace!(shifted, "dummy oracle topic_shift");
        Ok(shifted)
    }

    async fn summarize(&self, texts: &[String]) -> Result<String> {
        Ok(format!("Summary({} messages)", texts.len()))
    }

    /// Expects a JSON array of arrays of indices, e.g. `[[0,1],[2]]`.
    /// Fails with `Error::ParseError` on malformed JSON, mirroring the
    /// `json.loads` + `ValueError` failure path this is modeled on.
    async fn group(&self, messages: &[String]) -> Result<Vec<Vec<usize>>> {
        let reply = format!("[[{}]]", (0..messages.len()).map(|i| i.to_string()).collect::<Vec<_>>().join(","));
        serde_json::from_str(&reply).map_err(|e| Error::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topic_shift_fires_on_new_case_insensitively() {
        let oracle = DummyOracle;
        assert!(oracle.topic_shift("old text", "a NEW topic").await.unwrap());
        assert!(!oracle.topic_shift("old text", "same as before").await.unwrap());
    }

    #[tokio::test]
    async fn summarize_reports_the_input_count() {
        let oracle = DummyOracle;
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(oracle.summarize(&texts).await.unwrap(), "Summary(3 messages)");
    }

    #[tokio::test]
    async fn group_reports_parse_errors() {
        struct MalformedOracle;
        #[async_trait]
        impl LanguageOracle for MalformedOracle {
            async fn topic_shift(&self, _: &str, _: &str) -> Result<bool> {
                Ok(false)
            }
            async fn summarize(&self, _: &[String]) -> Result<String> {
                Ok(String::new())
            }
            async fn group(&self, _messages: &[String]) -> Result<Vec<Vec<usize>>> {
                serde_json::from_str("not json").map_err(|e| Error::ParseError(e.to_string()))
            }
        }

        let err = MalformedOracle.group(&[]).await.unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
