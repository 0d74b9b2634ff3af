//! MusicBrainz backend.
//!
//! Resolution walks artist search -> release-group browse -> release
//! lookup, keeping only official studio material. Every remote call is
//! cached; release detail lookups are additionally pre-warmed in bulk
//! so a full sync run touches the database once instead of once per
//! release.

mod adapter;
mod client;
mod dto;

pub use client::MusicBrainzLibrary;
