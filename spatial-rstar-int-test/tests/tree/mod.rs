//! Integration tests for the dynamic tree: insertion, removal and
//! persistence against an in-memory reference index.

mod insert_remove_test;
mod persistence_test;
