//! Search criteria: the IMAP SEARCH builder and the user query parser.

pub mod criteria;
pub mod query;

pub use self::criteria::{SearchCriteria, SearchCriteriaBuilder, SearchKey, DEFAULT_CHARSET};
pub use self::query::parse_query;
