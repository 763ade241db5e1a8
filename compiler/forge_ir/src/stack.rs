//! Stack growth for recursive lowering and execution.
//!
//! Expression trees are built programmatically and can nest arbitrarily deep
//! (long `Block` chains, generated arithmetic). Lowering recurses once per
//! node, so it runs inside [`ensure_sufficient_stack`]. Interpreters that
//! recurse per call reuse it.
//!
//! - **Native targets**: `stacker` grows the stack when less than the red zone
//!   remains.
//! - **WASM targets**: plain call.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const GROW_BY: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, GROW_BY, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
