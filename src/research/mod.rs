//! Iterative research: the retrieval loop and its session record.

pub mod retrieval_loop;
pub mod session;

pub use retrieval_loop::{MAX_QUERY_LEN, RetrievalLoop};
pub use session::{NoteKind, ResearchNote, ResearchResult, ResearchSession, StopReason};
