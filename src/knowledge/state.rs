//! Retained evidence for one conversation session.
//!
//! [`KnowledgeContextState`] is plain data with synchronous transitions;
//! the provider-backed decisions that drive it live in
//! [`KnowledgeContext`](super::KnowledgeContext).

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::agent::integrator::IntegrationDecision;
use crate::core::{ChunkId, EvidenceChunk};
use crate::tokens::TokenCounter;

/// Retained chunks, their smoothed relevance scores, and the budget.
///
/// Invariants after every transition: chunk ids in `retained` are unique
/// and every key of `relevance_scores` is a retained id. After
/// [`prune`](Self::prune) the total token cost is within `token_budget`.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeContextState {
    session_id: String,
    retained: Vec<EvidenceChunk>,
    relevance_scores: HashMap<ChunkId, f32>,
    token_budget: usize,
    updates: usize,
}

impl KnowledgeContextState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(session_id: impl Into<String>, token_budget: usize) -> Self {
        Self {
            session_id: session_id.into(),
            retained: Vec::new(),
            relevance_scores: HashMap::new(),
            token_budget,
            updates: 0,
        }
    }

    /// Conversation session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Retained chunks in retention order.
    #[must_use]
    pub fn retained_chunks(&self) -> &[EvidenceChunk] {
        &self.retained
    }

    /// Smoothed relevance judgments by chunk id.
    #[must_use]
    pub const fn relevance_scores(&self) -> &HashMap<ChunkId, f32> {
        &self.relevance_scores
    }

    /// Token ceiling for retained chunks.
    #[must_use]
    pub const fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Number of retained chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// True when nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// True once any merge has been applied.
    #[must_use]
    pub const fn has_updates(&self) -> bool {
        self.updates > 0
    }

    /// Replaces retained chunks wholesale.
    pub fn replace(&mut self, new_chunks: Vec<EvidenceChunk>) {
        self.retained = dedupe(new_chunks);
        self.updates += 1;
        self.trim_scores();
    }

    /// Applies an integration decision literally.
    ///
    /// `existing` indices refer to the retained listing, `new` indices to
    /// `new_chunks`. Out-of-range indices are ignored. Kept chunks come
    /// first, then added ones; ids present in both collapse to the kept
    /// entry.
    pub fn integrate(&mut self, new_chunks: &[EvidenceChunk], decision: &IntegrationDecision) {
        let mut merged = Vec::with_capacity(decision.keep_existing.len() + decision.add_new.len());
        let mut keep: Vec<usize> = decision.keep_existing.clone();
        keep.sort_unstable();
        keep.dedup();
        merged.extend(keep.iter().filter_map(|&i| self.retained.get(i)).cloned());

        let mut add: Vec<usize> = decision.add_new.clone();
        add.sort_unstable();
        add.dedup();
        merged.extend(add.iter().filter_map(|&i| new_chunks.get(i)).cloned());

        self.retained = dedupe(merged);
        self.updates += 1;
        self.trim_scores();
    }

    /// Keeps every existing chunk and appends every new one.
    pub fn union(&mut self, new_chunks: Vec<EvidenceChunk>) {
        let mut merged = std::mem::take(&mut self.retained);
        merged.extend(new_chunks);
        self.retained = dedupe(merged);
        self.updates += 1;
        self.trim_scores();
    }

    /// Folds fresh relevance judgments into the smoothed scores.
    ///
    /// A chunk with a previous score gets the mean of old and new; an
    /// unscored chunk takes the new score. Ids not retained are ignored.
    pub fn apply_scores(&mut self, scores: &[(ChunkId, f32)]) {
        let retained: HashSet<&ChunkId> = self.retained.iter().map(|c| &c.chunk_id).collect();
        for (id, score) in scores {
            if !retained.contains(id) {
                continue;
            }
            self.relevance_scores
                .entry(id.clone())
                .and_modify(|prev| *prev = (*prev + score) / 2.0)
                .or_insert(*score);
        }
    }

    /// Score used for ranking: the smoothed judgment when present,
    /// otherwise the retrieval similarity.
    #[must_use]
    pub fn effective_score(&self, chunk: &EvidenceChunk) -> f32 {
        self.relevance_scores
            .get(&chunk.chunk_id)
            .copied()
            .unwrap_or(chunk.score)
    }

    /// Retained positions ordered by descending effective score; ties keep
    /// retention order.
    fn ranked_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = (0..self.retained.len()).collect();
        positions.sort_by(|&a, &b| {
            self.effective_score(&self.retained[b])
                .total_cmp(&self.effective_score(&self.retained[a]))
        });
        positions
    }

    /// The `max_chunks` highest-ranked chunks, best first.
    #[must_use]
    pub fn top(&self, max_chunks: usize) -> Vec<EvidenceChunk> {
        self.ranked_positions()
            .into_iter()
            .take(max_chunks)
            .map(|i| self.retained[i].clone())
            .collect()
    }

    /// Total token cost of retained chunks.
    #[must_use]
    pub fn total_tokens(&self, counter: &dyn TokenCounter) -> usize {
        self.retained.iter().map(|c| counter.chunk_cost(c)).sum()
    }

    /// Enforces the token budget; returns the number of chunks removed.
    ///
    /// Walks chunks in rank order, keeping each while the running cost
    /// fits, and stops at the first chunk that does not. The kept set is
    /// therefore the highest-ranked prefix; survivors keep retention order.
    pub fn prune(&mut self, counter: &dyn TokenCounter) -> usize {
        let costs: Vec<usize> = self.retained.iter().map(|c| counter.chunk_cost(c)).collect();
        if costs.iter().sum::<usize>() <= self.token_budget {
            self.trim_scores();
            return 0;
        }

        let mut keep = vec![false; self.retained.len()];
        let mut used = 0usize;
        for pos in self.ranked_positions() {
            let cost = costs[pos];
            if used + cost > self.token_budget {
                break;
            }
            used += cost;
            keep[pos] = true;
        }

        let before = self.retained.len();
        let mut flags = keep.into_iter();
        self.retained.retain(|_| flags.next().unwrap_or(false));
        self.trim_scores();
        before - self.retained.len()
    }

    fn trim_scores(&mut self) {
        let retained: HashSet<&ChunkId> = self.retained.iter().map(|c| &c.chunk_id).collect();
        self.relevance_scores.retain(|id, _| retained.contains(id));
    }
}

/// Drops later occurrences of an id, preserving order.
fn dedupe(chunks: Vec<EvidenceChunk>) -> Vec<EvidenceChunk> {
    let mut seen = HashSet::with_capacity(chunks.len());
    chunks
        .into_iter()
        .filter(|c| seen.insert(c.chunk_id.clone()))
        .collect()
}
