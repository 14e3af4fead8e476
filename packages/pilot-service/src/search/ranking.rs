mod dedup;
mod score;
mod text;

pub use dedup::{deduplicate, similarity};
pub use score::{ScoreFactors, ScoredCandidate, rank, score};
pub use text::{cmp_f32_desc, token_overlap_ratio, token_set};
