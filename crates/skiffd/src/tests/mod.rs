//! Test suites for the node lifecycle coordinator.

pub(crate) mod support;
