//! Integration tests - components working together over a shared model
//!
//! SQL-backed tests run against in-memory SQLite databases, so no external
//! service is needed.

mod fixtures;

mod collection_query_tests;
mod crud_tests;
mod expand_select_tests;
mod sql_connection_mock_tests;
mod sql_parity_tests;
