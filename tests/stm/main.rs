//! STM Integration Tests
//!
//! End-to-end tests for the transactional ordered list: singleton
//! operations, transactional atomicity and isolation, range iteration,
//! version clock behavior, model-based checks, and stress.


mod iterators;
mod model;
mod singleton_ops;
mod version_counter;
