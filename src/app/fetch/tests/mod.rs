//! Orchestrator scenarios
//!
//! These tests drive the full fetch engine against a scripted in-memory
//! upstream and a real filesystem cache in a temporary directory.

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod support;
