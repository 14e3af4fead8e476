pub mod candidate;
pub mod profile;
pub mod tables;
pub mod term;

mod error;

pub use candidate::{Candidate, SearchFilters, SourceLocation};
pub use error::{Error, Result};
pub use profile::LearnerProfile;
pub use tables::TermTables;
pub use term::{Lang, Term, normalize, tokenize};
