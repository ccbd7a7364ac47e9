//! The placeholder engine: everything that runs synchronously on the UI
//! thread in response to discrete input events.
//!
//! ## Data Flow
//!
//! ```text
//! viewer render ──▶ viewport ──▶ store ◀── drag
//!                      │           ▲
//!                      ▼           │
//!                  normalize    capture
//! ```
//!
//! 1. [`viewport`]  — turn the rendered page size into a scale factor
//! 2. [`store`]     — the ordered placeholder collection and its snapshots
//! 3. [`drag`]      — pointer-drag sessions, one at a time
//! 4. [`capture`]   — typed / drawn / uploaded signature artifacts
//! 5. [`normalize`] — screen space ⇄ document space, applied once at
//!    finalization (and inversely when re-entering edit mode)

pub mod capture;
pub mod drag;
pub mod normalize;
pub mod store;
pub mod viewport;
