//! Core enrichment logic for TransFit.
//!
//! This crate ties together research tagging, exercise topic inference,
//! evidence context assembly, and tip generation into one end-to-end run
//! (see [`pipeline::run_enrichment`]).

pub mod catalog;
pub mod context;
pub mod inference;
pub mod pipeline;
pub mod tagger;
pub mod vocabulary;
