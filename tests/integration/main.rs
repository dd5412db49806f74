//! Integration tests for volspike

mod config_test;
mod pipeline_test;
mod support;
