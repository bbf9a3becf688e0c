//! Matching engine services

pub mod candidate_fetcher;
pub mod candidate_scorer;
pub mod disambiguator;
pub mod image_normalizer;
pub mod merge_engine;
pub mod normalizer;
pub mod operator;
pub mod performer_resolver;
pub mod query_builder;

pub use candidate_fetcher::CandidateFetcher;
pub use image_normalizer::ImageNormalizer;
pub use merge_engine::MergeEngine;
pub use operator::{NonInteractiveOperator, Operator, TerminalOperator};
pub use performer_resolver::PerformerResolver;
pub use query_builder::QueryBuilder;
