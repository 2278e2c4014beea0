//! Session tests module.
//!
//! - Scenario tests: scripted turns driven through the controller
//! - Property tests: proptest-based checks of assembly and bookkeeping invariants
