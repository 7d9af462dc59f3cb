//! Core traits implemented by managed components.

mod dispose;

pub use dispose::{AsyncDispose, Dispose};
