//! `#[derive(EventKind)]` — sugar over `shardbus_core::EventKind`.
//!
//! Hand-writing `EventKind` is one `impl` block of pure boilerplate for the
//! common case (no ancestry, no cancellation): `as_any`/`as_any_mut` just
//! return `self`. This derive covers that case, plus two attributes for the
//! parts that do carry information:
//!
//! - `#[event(supertype = "Base")]` (repeatable) declares a declared ancestor,
//!   nearest first, mirroring `EventKind::supertypes`.
//! - `#[event(cancellable)]` wires `as_cancellable`/`as_cancellable_mut` to a
//!   field of type [`shardbus_core::Cancellation`]. The field is found by
//!   name (`cancel`) or by tagging it `#[event(cancel)]` explicitly.
//!
//! ```rust,ignore
//! #[derive(EventKind)]
//! #[event(supertype = "Base")]
//! struct Derived { payload: String }
//!
//! #[derive(EventKind)]
//! #[event(cancellable)]
//! struct Ping {
//!     cancel: Cancellation,
//! }
//! ```

mod event_kind;

use proc_macro::TokenStream;

/// Derive [`shardbus_core::EventKind`] for a struct, with optional
/// `#[event(supertype = "...")]` and `#[event(cancellable)]` attributes.
#[proc_macro_derive(EventKind, attributes(event))]
pub fn derive_event_kind(input: TokenStream) -> TokenStream {
    event_kind::derive_impl(input)
}
