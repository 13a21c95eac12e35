//! End-to-end tests for relgraph-lib: descriptors in, published files out.

mod common;

mod build_tests;
mod publish_tests;
