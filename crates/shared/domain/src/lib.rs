//! # Domain Models
//!
//! Pure types shared by every ApexHire crate: identifiers, the tier ladder, candidate
//! performance records, configuration and the slice registry.
//! Keep it lean: no I/O and no placement rules, just data and small helpers.
//! Dependencies are limited to `serde`, `bitflags` and `chrono`.

pub mod config;
pub mod constants;
pub mod features;
pub mod ids;
pub mod ladder;
pub mod performance;
pub mod registry;
