//! Pipeline stages for report rendering.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable without a host or an engine.
//!
//! ## Data Flow
//!
//! ```text
//! host HTML ──▶ prepare ──▶ inject ──▶ render ──▶ merge
//!               (split)     (CSS)      (engine)   (lopdf)
//!                  ▲
//!    attachment ───┘ stored PDFs skip the engine
//! ```
//!
//! 1. [`attachment`] — stored record PDFs (images converted) reused as-is
//! 2. [`prepare`] — cut the host HTML into one document per article
//! 3. [`inject`]  — paper format stylesheet inserted after `<head>`
//! 4. [`render`]  — engine calls in `spawn_blocking`, with the asset fetcher
//! 5. [`merge`]   — concatenate streams that cannot be attributed to records

pub mod attachment;
pub mod inject;
pub(crate) mod markup;
pub mod merge;
pub mod prepare;
pub mod render;
