//! Regex-site harvesting from parsed syntax trees.
//!
//! The harvester walks a syntax tree produced by
//! [`SourceParser`](crate::parse::SourceParser) and emits one
//! [`StaticUsageRecord`](crate::model::StaticUsageRecord) per construction or
//! implicit-use site, in traversal order and without deduplication.

pub mod sites;

pub use sites::harvest_sites;
