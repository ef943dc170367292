//! Integration tests for the bulk loaders.

mod bulk_load_test;
