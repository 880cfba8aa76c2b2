//! Router (registration) and engine (serving).
//!
//! The split follows the two phases of a service's life:
//!
//! - [`router`] - `Router`, route registration, groups and freezing
//! - [`engine`] - `Engine`, the per-request dispatch path
//! - [`route`] - `Route`, the full route description
//! - [`hooks`] - `DispatchHooks`, start/finish callbacks
//!
//! A dispatch runs these steps, always inside a `dispatch` tracing span:
//!
//! 1. Acquire a context from the pool and load the request into it.
//! 2. Resolve the API version, if versioning is configured. A version found
//!    in the path is stripped before matching.
//! 3. Match against the version's route table, then the unversioned table.
//! 4. Run the route's chain, or the fallback chain with a preset 404/405.
//!    OPTIONS requests for known paths get an automatic 204 with `Allow`.
//! 5. Add deprecation headers, drop the body of HEAD responses and release
//!    the context.

mod engine;
mod hooks;
mod route;
mod router;

pub use engine::Engine;
pub use hooks::DispatchHooks;
pub use route::Route;
pub use router::Router;

#[cfg(test)]
mod tests;
