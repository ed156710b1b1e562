//! Orchestrator runtime for the conclave multi-agent core.
//!
//! This crate is the thin composition layer: it wires the directive
//! interpreter's output into actor-registry and oracle-gateway calls. Each
//! run is an independent conversation with its own alternating transcript;
//! actors spawn and message each other through directives parsed out of the
//! Oracle's completion text.

pub mod runtime;

pub use runtime::Orchestrator;
