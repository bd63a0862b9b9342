//! Query refiner: one model call that rephrases the query as a question and
//! ranks the candidate results by anticipated utility.

use answerpipe_core::{
    Error, FunctionCallRequest, FunctionModel, FunctionSpec, RankedResults, Result, SearchResult,
};
use serde::Deserialize;
use tracing::warn;

/// Only this many leading results are offered to the model; bounds prompt
/// size and call cost.
pub const MAX_SEARCH_RESULTS_TO_RANK: usize = 5;

const REFINE_SYSTEM: &str =
    "Return a sorted list of the IDs of search results most likely to contain the answer to the provided query.";

#[derive(Debug, Deserialize)]
struct PrepareSearchParamsArgs {
    rephrased_query: String,
    #[serde(default)]
    search_result_rankings: Vec<i64>,
}

fn prepare_search_params_spec() -> FunctionSpec {
    FunctionSpec {
        name: "prepare_search_params".to_string(),
        description:
            "Use this to rank search results in order of their anticipated utility in answering the provided query"
                .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "rephrased_query": {
                    "type": "string",
                    "description": "The query rephrased as a question."
                },
                "search_result_rankings": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "description": "A list of search result IDs in the order of their anticipated utility in answering the query. If none are likely to help, return an empty list."
                }
            },
            "required": ["rephrased_query", "search_result_rankings"]
        }),
    }
}

fn refine_prompt(query: &str, candidates: &[SearchResult]) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "ID #{index}: {} - {}",
                result.title_str(),
                result.snippet_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "For the query \"{query}\", call the prepare_search_params function with a \
\"rephrased_query\" parameter rephrasing the query as a question. For example, if the query \
were to be \"Andrew Huberman\" rephrase it as \"Who is Andrew Huberman?\". Also include a \
\"search_result_rankings\" parameter with a list of search result IDs in the order of their \
anticipated utility in answering the query. If none are likely to help, return an empty list.\n\
Here are the available search results:\n{listing}"
    )
}

/// Map ranked IDs back onto the original candidate slice.
///
/// Out-of-range IDs are logged and skipped; a repeated ID keeps its first
/// occurrence only, so no result is ever consumed twice downstream.
pub fn map_rankings(candidates: &[SearchResult], rankings: &[i64]) -> Vec<SearchResult> {
    let mut taken = vec![false; candidates.len()];
    let mut out = Vec::new();
    for &id in rankings {
        let Some(index) = usize::try_from(id).ok().filter(|i| *i < candidates.len()) else {
            warn!(id, "no search result for index returned by the model");
            continue;
        };
        if std::mem::replace(&mut taken[index], true) {
            warn!(id, "duplicate index returned by the model");
            continue;
        }
        out.push(candidates[index].clone());
    }
    out
}

/// Rephrase `query` as a question and rank `results` by anticipated utility.
///
/// Only the first [`MAX_SEARCH_RESULTS_TO_RANK`] results are considered. An
/// empty ranking is a valid outcome; a model response without a usable call
/// is a hard failure with no fallback to unranked order.
pub async fn prepare_search_params(
    model: &dyn FunctionModel,
    query: &str,
    results: &[SearchResult],
    timeout_ms: Option<u64>,
) -> Result<RankedResults> {
    let candidates = &results[..results.len().min(MAX_SEARCH_RESULTS_TO_RANK)];

    let req = FunctionCallRequest {
        system: REFINE_SYSTEM.to_string(),
        prompt: refine_prompt(query, candidates),
        function: prepare_search_params_spec(),
        timeout_ms,
    };
    let raw = match model.call_function(&req).await {
        Ok(raw) => raw,
        Err(Error::Llm(msg)) => return Err(Error::Refine(msg)),
        Err(e) => return Err(e),
    };
    let args: PrepareSearchParamsArgs = serde_json::from_value(raw)
        .map_err(|e| Error::Refine(format!("unusable prepare_search_params arguments: {e}")))?;

    Ok(RankedResults {
        refined_query: args.rephrased_query,
        results: map_rankings(candidates, &args.search_result_rankings),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result(link: &str) -> SearchResult {
        serde_json::from_value(serde_json::json!({"link": link})).unwrap()
    }

    fn candidates(n: usize) -> Vec<SearchResult> {
        (0..n).map(|i| result(&format!("https://example.com/{i}"))).collect()
    }

    #[test]
    fn out_of_range_ids_are_skipped() {
        let cands = candidates(3);
        let ranked = map_rankings(&cands, &[7, 1, -2, 99]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].link, "https://example.com/1");
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let cands = candidates(3);
        let ranked = map_rankings(&cands, &[1, 1, 0]);
        let links: Vec<_> = ranked.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["https://example.com/1", "https://example.com/0"]);
    }

    #[test]
    fn empty_rankings_are_valid() {
        assert!(map_rankings(&candidates(3), &[]).is_empty());
    }

    #[test]
    fn prompt_enumerates_candidates_by_id() {
        let mut cands = candidates(2);
        cands[0].title = Some("First".to_string());
        cands[0].snippet = Some("first snippet".to_string());
        let prompt = refine_prompt("Andrew Huberman", &cands);
        assert!(prompt.contains("ID #0: First - first snippet"));
        assert!(prompt.contains("ID #1:"));
        assert!(prompt.contains("\"Andrew Huberman\""));
    }

    proptest! {
        #[test]
        fn mapped_results_come_only_from_candidates(
            n in 0usize..6,
            rankings in proptest::collection::vec(-3i64..12, 0..12),
        ) {
            let cands = candidates(n);
            let ranked = map_rankings(&cands, &rankings);
            // Only in-range candidates survive, and none more than once.
            let mut seen = std::collections::BTreeSet::new();
            for r in &ranked {
                prop_assert!(cands.iter().any(|c| c.link == r.link));
                prop_assert!(seen.insert(r.link.clone()));
            }
            prop_assert!(ranked.len() <= n);
        }
    }
}
