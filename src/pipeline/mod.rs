//! Artist resolution and resumable enrichment, independent of any concrete
//! remote service or storage format.

pub mod cache;
pub mod crawl;
pub mod expand;
pub mod matcher;
pub mod resume;
