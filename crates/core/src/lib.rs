//! # RagChat Core
//!
//! Domain types, traits, and error definitions for the RagChat
//! retrieval-augmented chat assistant. This crate has **zero framework
//! dependencies**: it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the chat pipeline is a trait here:
//! - [`Provider`]: a hosted LLM that turns role-tagged turns into text
//! - [`Retriever`]: a vector store that returns scored document chunks
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stubs and the pipeline never depends on a concrete backend.

pub mod error;
pub mod message;
pub mod provider;
pub mod retriever;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RetrievalError};
pub use message::{Role, SummarySpan, Turn, TurnKind};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use retriever::{Retriever, SearchHit};
