use std::sync::Arc;

use crate::completion::CompletionBackend;
use crate::error::ScoreError;
use crate::models::Score;

pub const SYSTEM_PROMPT: &str = "You are an AI scoring responses for a business game. You should only return a single number (0, 1, 2, or 3) based on the scoring criteria.";

pub const SCORING_PROMPT: &str = r#"Please score the following response on a scale of 0 to 3 based on these criteria:

0 points: If the answer is fairly general and short, does not go into details and does not point to specific ideas or actions.

1 point: If the answer is very specific, with details and is at least 2 sentences long but not actionable (e.g., it's not clear what could be done next). The response describes a situation or problem without concrete steps to address it.

2 points: If the answer is very specific, with details and is at least 2 sentences long and actionable (i.e., it provides clear, numbered or specific steps that should be done next).

3 points: If the answer is very specific, actionable, AND explicitly contains the word "hypothesis" followed by a testable assumption and method to validate it.

Important Notes:
- The response must be at least 30 words long to be eligible for a score of 1 or more points
- For 3 points, the word "hypothesis" MUST be present
- For 2 points, there must be clear, actionable steps, not just description
- For 1 point, the answer must be detailed but may lack concrete actions

Please analyze carefully and only respond with a single number (0, 1, 2, or 3).

Response to evaluate: "#;

/// Answers shorter than this cannot earn any points under the rubric.
pub const MIN_WORDS_FOR_CREDIT: usize = 30;

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Read the leading integer from a model reply, the way a lenient integer
/// parse would: skip leading whitespace, accept an optional sign, stop at
/// the first non-digit.
pub fn parse_score(reply: &str) -> Result<Score, ScoreError> {
    let trimmed = reply.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits: &str = &rest[..rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len())];
    if digits.is_empty() {
        return Err(ScoreError::Unparseable {
            reply: reply.to_string(),
        });
    }

    // All digits, so the only parse failure is overflow.
    let magnitude: i64 = digits.parse().unwrap_or(i64::MAX);
    let value = if negative { -magnitude } else { magnitude };

    Score::new(value).ok_or(ScoreError::OutOfRange { value })
}

/// Scores one free-text answer against the fixed rubric.
#[derive(Clone)]
pub struct RubricScorer {
    backend: Arc<dyn CompletionBackend>,
}

impl RubricScorer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub async fn try_score(&self, answer: &str) -> Result<Score, ScoreError> {
        if word_count(answer) < MIN_WORDS_FOR_CREDIT {
            return Ok(Score::ZERO);
        }

        let prompt = format!("{SCORING_PROMPT}{answer}");
        let reply = self.backend.complete(SYSTEM_PROMPT, &prompt).await?;
        parse_score(&reply)
    }

    /// Like [`try_score`](Self::try_score), but any failure degrades to 0.
    pub async fn score(&self, answer: &str) -> Score {
        match self.try_score(answer).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(
                    provider = self.backend.provider_name(),
                    error = %e,
                    "Scoring failed, recording 0"
                );
                Score::ZERO
            }
        }
    }
}
