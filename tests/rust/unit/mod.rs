//! Unit tests - exercise single components through the public API
//!
//! These tests need no database and run entirely in memory.

mod config_loading_tests;
mod filter_robustness_tests;
mod model_document_tests;
