//! Discogs backend.
//!
//! Discogs has no release-group notion, so resolution pages the artist's
//! release list, follows masters to their main release, and classifies
//! each release from its format descriptions.

mod adapter;
mod client;
mod dto;

pub use client::DiscogsLibrary;
