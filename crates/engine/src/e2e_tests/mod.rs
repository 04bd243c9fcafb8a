//! End-to-end scenario tests.
//!
//! Drive the full pipeline with a scripted LLM port and deterministic
//! clock/id ports; no network, no real model.

mod scenarios;
mod support;
