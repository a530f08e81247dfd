//! Test Module
//!
//! Integration-level test suite for the GyaanForge backend.
//!
//! ## Test Categories
//! - `support`: shared fixtures (temporary store, scripted LLM)
//! - `brain_tests`: stuck scoring, stack parsing and concept extraction properties
//! - `storage_tests`: key/value round trips and retention caps
//! - `session_tests`: session persistence and timebox
//! - `explain_tests`: explain pipeline with a scripted model
//! - `server_tests`: HTTP routes and the client end-to-end scenario

mod support;

pub mod brain_tests;
