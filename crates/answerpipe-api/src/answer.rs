//! Answer generator: the refinement loop.
//!
//! Consumes ranked results one at a time, in order. Each iteration extracts
//! page content, asks the model for an answer plus a "requires more
//! information" verdict, and either returns or carries the answer forward as
//! context for the next iteration.

use crate::refine;
use answerpipe_core::{
    AnswerAttempt, Error, FunctionCallRequest, FunctionModel, FunctionSpec, PageExtractor,
    RankedResults, Result, SearchResult,
};
use answerpipe_local::extract::truncate_to_chars;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Page content beyond this many characters is clipped before prompting.
pub const MAX_SEARCH_PAGE_CONTENT_CHARS: usize = 5000;

/// Word bound given to the model as an instruction; not enforced
/// programmatically.
pub const MAX_ANSWER_WORDS: usize = 200;

/// Returned when no ranked result ever produced an answer.
pub const FALLBACK_ANSWER: &str =
    "Unable to produce a sufficient answer from the available search results.";

const ANSWER_SYSTEM: &str =
    "Use the provided information to generate an answer to the specified query.";

#[derive(Debug, Clone)]
pub struct SummarizeConfig {
    pub max_page_content_chars: usize,
    pub max_answer_words: usize,
    /// Timeout applied to each model call.
    pub call_timeout_ms: Option<u64>,
    /// Overall deadline for one summarize run. Expiry between iterations
    /// behaves like running out of results: best answer so far, or the
    /// fallback.
    pub deadline_ms: Option<u64>,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            max_page_content_chars: MAX_SEARCH_PAGE_CONTENT_CHARS,
            max_answer_words: MAX_ANSWER_WORDS,
            call_timeout_ms: Some(30_000),
            deadline_ms: Some(120_000),
        }
    }
}

fn answer_query_spec(max_answer_words: usize) -> FunctionSpec {
    FunctionSpec {
        name: "answer_query".to_string(),
        description:
            "Use this to provide an answer to the query and state whether more information is required"
                .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": format!("The answer to the query. The answer should be no more than {max_answer_words} words.")
                },
                "requires_more_information": {
                    "type": "boolean",
                    "description": "Whether a sufficient answer to the query requires more information."
                }
            },
            "required": ["answer", "requires_more_information"]
        }),
    }
}

fn answer_prompt(query: &str, result: &SearchResult, content: &str, answers: &[String]) -> String {
    format!(
        "You are a helpful assistant providing an answer to the following query: \"{query}\"\n\n\
If the query is not a question, you may provide a summary of the topic specified by the query.\n\n\
Call the answer_query function with an \"answer\" parameter providing an answer to the query. \
Use the additional information provided below to help you generate the answer.\n\n\
Document Title: {}\n\n\
Document Content:\n{content}\n\n\
Previous Answers: {}",
        result.title_str(),
        answers.join("\n")
    )
}

async fn attempt_answer(
    model: &dyn FunctionModel,
    query: &str,
    result: &SearchResult,
    content: &str,
    answers: &[String],
    cfg: &SummarizeConfig,
) -> Result<AnswerAttempt> {
    let req = FunctionCallRequest {
        system: ANSWER_SYSTEM.to_string(),
        prompt: answer_prompt(query, result, content, answers),
        function: answer_query_spec(cfg.max_answer_words),
        timeout_ms: cfg.call_timeout_ms,
    };
    let raw = match model.call_function(&req).await {
        Ok(raw) => raw,
        Err(Error::Llm(msg)) => return Err(Error::Answer(msg)),
        Err(e) => return Err(e),
    };
    serde_json::from_value(raw)
        .map_err(|e| Error::Answer(format!("unusable answer_query arguments: {e}")))
}

/// Run the refinement loop over an already-ranked result set.
///
/// Extraction failures skip to the next result; every other failure
/// propagates. Terminates when an attempt is sufficient, results are
/// exhausted, or the deadline passes.
pub async fn generate_search_answer(
    model: &dyn FunctionModel,
    extractor: &dyn PageExtractor,
    ranked: &RankedResults,
    cfg: &SummarizeConfig,
) -> Result<String> {
    let started = Instant::now();
    let deadline = cfg.deadline_ms.map(Duration::from_millis);
    let mut answers: Vec<String> = Vec::new();

    for result in &ranked.results {
        if let Some(d) = deadline {
            if started.elapsed() >= d {
                warn!(url = %result.link, "summarize deadline reached; stopping early");
                break;
            }
        }

        let content = match extractor.extract(&result.link).await {
            Ok(content) => content,
            Err(e) => {
                // The one locally-recovered failure class: skip this result.
                warn!(url = %result.link, error = %e, "content extraction failed; skipping result");
                continue;
            }
        };
        let (mut content, clipped) = truncate_to_chars(&content, cfg.max_page_content_chars);
        if clipped {
            content.push_str("...");
        }

        let attempt =
            attempt_answer(model, &ranked.refined_query, result, &content, &answers, cfg).await?;
        debug!(
            url = %result.link,
            requires_more_information = attempt.requires_more_information,
            "answer attempt"
        );
        if !attempt.requires_more_information {
            return Ok(attempt.answer);
        }
        answers.push(attempt.answer);
    }

    // Results exhausted (or deadline): the most recent answer is the best we
    // have; the fixed fallback if none was ever produced.
    Ok(answers
        .pop()
        .unwrap_or_else(|| FALLBACK_ANSWER.to_string()))
}

/// Full summary pipeline: refine + rank, then the answer loop.
pub async fn summarize_search_results(
    model: &dyn FunctionModel,
    extractor: &dyn PageExtractor,
    query: &str,
    results: &[SearchResult],
    cfg: &SummarizeConfig,
) -> Result<String> {
    let ranked = refine::prepare_search_params(model, query, results, cfg.call_timeout_ms).await?;
    debug!(
        refined_query = %ranked.refined_query,
        ranked = ranked.results.len(),
        "prepared search params"
    );
    generate_search_answer(model, extractor, &ranked, cfg).await
}
