//! Utilities for working with panic payloads.
//!
//! Handler and hook panics are caught at the edges of the connection engine
//! and logged with these helpers.

use std::{any::Any, fmt};

/// Borrowed panic payload that formats as the panic message.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to a placeholder otherwise.
///
/// ```
/// use linkframe::panic::format_panic;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(format_panic(&payload).to_string(), "boom");
/// let payload: Box<dyn std::any::Any + Send> = Box::new(5_u32);
/// assert_eq!(format_panic(&payload).to_string(), "<non-string panic payload>");
/// ```
#[derive(Clone, Copy)]
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("<non-string panic payload>")
        }
    }
}

impl fmt::Debug for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{self}") }
}

/// Create a [`PanicMessage`] for the given payload.
#[expect(
    clippy::borrowed_box,
    reason = "a bare `&dyn Any` would also accept the box itself and lose the payload"
)]
pub fn format_panic(panic: &Box<dyn Any + Send>) -> PanicMessage<'_> { PanicMessage(&**panic) }
