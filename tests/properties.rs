//! Property tests for accumulation and pruning invariants.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use std::collections::HashSet;

use common::{ANALYST, ScriptedIndex, ScriptedProvider, analysis_json, chunk, retrieval_loop, test_config};
use proptest::prelude::*;
use rag_research::research::ResearchSession;
use rag_research::{
    ChunkId, EvidenceChunk, KnowledgeContextState, SearchParameters, SegmentTokenCounter, StopReason,
    TokenCounter,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn chunks(ids: &[u8]) -> Vec<EvidenceChunk> {
    ids.iter().map(|id| chunk(&format!("c{id}"), 0.8)).collect()
}

/// First-seen order of ids over the rounds the loop actually searched.
fn expected_ids(initial: &[u8], rounds: &[Vec<u8>], max_iterations: usize) -> (Vec<String>, usize) {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut absorb = |ids: &[u8]| {
        let mut added = 0;
        for id in ids {
            if seen.insert(*id) {
                order.push(format!("c{id}"));
                added += 1;
            }
        }
        added
    };

    absorb(initial);
    let mut iterations = 1;
    for round in rounds {
        if iterations >= max_iterations {
            break;
        }
        iterations += 1;
        if absorb(round) == 0 {
            break;
        }
    }
    (order, iterations)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn accumulated_chunks_are_unique_and_ordered(
        initial in prop::collection::vec(0u8..24, 0..8),
        rounds in prop::collection::vec(prop::collection::vec(0u8..24, 0..6), 0..5),
        max_iterations in 1usize..=5,
    ) {
        let provider = ScriptedProvider::new();
        let index = ScriptedIndex::new();

        index.on("q", chunks(&initial));
        for (i, round) in rounds.iter().enumerate() {
            let follow_up = format!("f{i}");
            provider.push(ANALYST, &analysis_json(0.1, &[follow_up.as_str()]));
            index.on(&follow_up, chunks(round));
        }
        // After the scripted rounds the analyst stops asking.
        provider.push(ANALYST, &analysis_json(0.1, &[]));

        let params = SearchParameters { max_iterations, ..SearchParameters::default() };
        let result = runtime()
            .block_on(retrieval_loop(&test_config(), &provider, &index).research("q", None, Some(params)))
            .unwrap();

        let ids: Vec<String> = result.chunks.iter().map(|c| c.chunk_id.as_str().to_string()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());

        let (expected, iterations) = expected_ids(&initial, &rounds, max_iterations);
        prop_assert_eq!(ids, expected);
        prop_assert!(result.iterations <= max_iterations);
        prop_assert_eq!(result.iterations, iterations);
        let search_failed = matches!(result.stop_reason, StopReason::SearchFailed { .. });
        prop_assert!(!search_failed);
    }

    #[test]
    fn seen_set_only_grows(
        batches in prop::collection::vec(prop::collection::vec(0u8..16, 0..6), 1..8),
    ) {
        let mut session = ResearchSession::new("q", SearchParameters::default());
        let mut previous: HashSet<ChunkId> = HashSet::new();
        for batch in batches {
            let added = session.absorb(chunks(&batch));
            let seen = session.seen_chunk_ids().clone();
            prop_assert!(previous.is_subset(&seen));
            prop_assert_eq!(seen.len(), previous.len() + added);
            prop_assert_eq!(session.accumulated_chunks().len(), seen.len());
            previous = seen;
        }
    }

    #[test]
    fn prune_respects_budget(
        sizes in prop::collection::vec(1usize..40, 0..12),
        budget in 0usize..120,
    ) {
        let counter = SegmentTokenCounter;
        let retained: Vec<EvidenceChunk> = sizes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let text = vec!["word"; *n].join(" ");
                #[allow(clippy::cast_precision_loss)]
                let score = 1.0 - (i as f32) * 0.01;
                EvidenceChunk::new(format!("c{i}"), text, score)
            })
            .collect();

        let mut state = KnowledgeContextState::new("s", budget);
        state.replace(retained.clone());
        state.prune(&counter);

        prop_assert!(state.total_tokens(&counter) <= budget);

        // Survivors are a prefix of the ranking, in retention order.
        let kept: Vec<&str> = state.retained_chunks().iter().map(|c| c.chunk_id.as_str()).collect();
        let mut used = 0;
        let mut prefix = Vec::new();
        for c in &retained {
            let cost = counter.chunk_cost(c);
            if used + cost > budget {
                break;
            }
            used += cost;
            prefix.push(c.chunk_id.as_str());
        }
        prop_assert_eq!(kept, prefix);
    }
}
