//! Oracle provider implementations for RoleMatch.
//!
//! All providers implement the `rolematch_core::Provider` trait.
//! `router::build_from_config` picks the endpoint from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
