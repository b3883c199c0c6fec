#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Attribute macros shared by the ApexHire crates: the runtime bootstrap for binaries,
//! the error-enum wiring used by every slice, DTO and handler helpers for the REST
//! layer, and the feature-slice handle.
//!
//! Examples are `ignore`d here because a proc-macro crate cannot use its own macros;
//! the consuming crates exercise them in their tests.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, ItemStruct, parse_macro_input};

/// Turns `async fn main` into a synchronous `main` running on a runtime built from
/// an `apex_runtime::RuntimeProfile`.
///
/// # Arguments
///
/// * `server` - Multi-threaded profile sized for the HTTP service.
/// * `compact` - Small worker pool for CLI tools and tests.
/// * `env` (or no argument) - Reads `APEX_WORKER_THREADS`, falling back to available parallelism.
///
/// # Examples
///
/// ```rust,ignore
/// #[apex_runtime::main(server)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Declares a REST data transfer object.
///
/// Adds `Debug`, `Serialize` and `Deserialize` when missing, derives `utoipa::ToSchema`
/// behind the consumer's `server` feature, and applies `rename_all = "camelCase"` plus
/// `deny_unknown_fields` unless told otherwise.
///
/// # Example
///
/// ```rust,ignore
/// use apex_derive::api_model;
///
/// #[api_model(deny_unknown_fields = false)]
/// pub struct ScoreSubmission {
///     pub candidate_id: String,
///     pub score: f64,
/// }
/// ```
#[proc_macro_attribute]
pub fn api_model(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::api::expand_api_model(attr.into(), input).into()
}

/// Marks an Axum handler.
///
/// The arguments are forwarded to `utoipa::path` (only under the consumer's `server`
/// feature) and the handler body runs inside a `debug` level `tracing` span.
///
/// # Example
///
/// ```rust,ignore
/// #[api_handler(
///     get,
///     path = "/health",
///     responses((status = OK, body = HealthResponse)),
///     tag = "System"
/// )]
/// pub async fn health_handler() -> Json<HealthResponse> { /* ... */ }
/// ```
#[proc_macro_attribute]
pub fn api_handler(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::api::expand_api_handler(args.into(), input).into()
}

/// Wires a domain error enum.
///
/// # Generated Items
///
/// * `Debug` and `thiserror::Error` derives when missing.
/// * `code(&self) -> &'static str` returning the `snake_case` variant name.
/// * `<Name>Ext` trait adding `.context(...)` to `Result<T, Name>` and to
///   `Result<T, Source>` for every variant with a `source` field.
/// * `From<Source>` for those variants.
/// * `From<&'static str>` and `From<String>` when an `Internal` variant exists.
///
/// Variants must use named fields; a variant with a `source` must also carry
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[apex_derive::apex_error]
/// pub enum LadderError {
///     #[error("Domain not found{}: {message}", format_context(.context))]
///     DomainNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[error("Database error{}: {source}", format_context(.context))]
///     Database { source: DatabaseError, context: Option<Cow<'static, str>> },
/// }
///
/// assert_eq!(err.code(), "domain_not_found");
/// ```
#[proc_macro_attribute]
pub fn apex_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Declares a feature slice handle.
///
/// The annotated struct becomes `<Name>Inner`; `<Name>` wraps it in an `Arc`, derefs to
/// it, and implements `FeatureSlice` so the kernel state can hold it type-erased.
///
/// # Example
/// ```rust,ignore
/// #[apex_derive::apex_slice]
/// pub struct Placement {
///     pub service: PlacementService,
/// }
///
/// let slice = Placement::new(PlacementInner { service });
/// ```
#[proc_macro_attribute]
pub fn apex_slice(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as ItemStruct);
    macros::slice::expand_slice(input).into()
}
