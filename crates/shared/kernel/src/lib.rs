//! Kernel utilities shared across slices.
//! Keep this crate lightweight; it re-exports ergonomic helpers for IDs, clocks, config
//! loading and resource checks, plus the HTTP state and error envelope behind `server`.
//!
//! ## ID generation
//! Use `safe_nanoid!` for URL-safe, unambiguous IDs:
//! ```rust
//! # use apex_kernel::safe_nanoid;
//! let id = safe_nanoid!();
//! assert_eq!(id.len(), 12);
//! ```
//!
//! Typed entity ids come from [`new_id`]:
//! ```rust
//! use apex_kernel::domain::ids::CandidateId;
//!
//! let id: CandidateId = apex_kernel::new_id();
//! assert!(id.as_str().starts_with("candidate:"));
//! ```
pub mod clock;
pub mod config;
pub mod error;
pub mod prelude;
pub mod security;
#[cfg(feature = "server")]
pub mod server;

use apex_domain::ids::EntityId;

// Alphabet excludes visually ambiguous characters (I, O, l, 0, 1).
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub use apex_domain as domain;
pub use nanoid::nanoid;

/// Generates an unambiguous `NanoID` (no visually confusing characters).
#[macro_export]
macro_rules! safe_nanoid {
    () => {
        $crate::nanoid!(12, $crate::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SAFE_ALPHABET)
    };
}

/// Fresh `<entity>:<nanoid>` identifier.
#[must_use]
pub fn new_id<T: EntityId>() -> T {
    T::from(format!("{}:{}", T::ENTITY, safe_nanoid!()))
}

/// Stable `<entity>:<key>` identifier derived from a slug, e.g. `tier:dsa-2`.
#[must_use]
pub fn slug_id<T: EntityId>(key: &str) -> T {
    let slug: String = key
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
        .collect();
    T::from(format!("{}:{}", T::ENTITY, slug.trim_matches('-')))
}
