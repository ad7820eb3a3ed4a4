//! Test module for nexus-rpc
//!
//! Property-based tests using proptest for the dispatch engine.



#[cfg(test)]
pub mod middleware_tests;
