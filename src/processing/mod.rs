//! Element similarity, scoring and corpus handling

pub mod alignment;
pub mod comparator;
pub mod corpus;
pub mod element;
pub mod embeddings;
pub mod match_quality;
pub mod penalty;
pub mod similarity;
pub mod weights;
