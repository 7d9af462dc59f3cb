//! Per-thread creation stack used for cycle detection.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

// Names of components currently being created on this thread, outermost first.
thread_local! {
    static CREATION_TLS: RefCell<CreationTls> = RefCell::new(CreationTls::default());
}

#[derive(Default)]
struct CreationTls {
    stack: Vec<String>,
}

/// Guard for one entry on the thread-local creation stack.
pub(crate) struct CreationGuard {
    name: String,
}

impl CreationGuard {
    /// Pushes `name`; fails when it is already being created on this thread.
    pub(crate) fn enter(name: &str, max_depth: usize) -> DiResult<Self> {
        CREATION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            // Circular detection before pushing the new name
            if tls.stack.iter().any(|n| n == name) {
                let mut path = tls.stack.clone();
                path.push(name.to_string());
                return Err(DiError::Circular(path));
            }

            if tls.stack.len() >= max_depth {
                return Err(DiError::DepthExceeded(tls.stack.len()));
            }

            tls.stack.push(name.to_string());
            Ok(())
        })?;

        Ok(Self {
            name: name.to_string(),
        })
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        CREATION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(pos) = tls.stack.iter().rposition(|n| *n == self.name) {
                tls.stack.remove(pos);
            }
        });
    }
}

/// Whether `name` is being created by the current thread.
pub(crate) fn in_creation_here(name: &str) -> bool {
    CREATION_TLS.with(|tls| tls.borrow().stack.iter().any(|n| n == name))
}

/// Current creation path with `name` appended.
pub(crate) fn path_to(name: &str) -> Vec<String> {
    CREATION_TLS.with(|tls| {
        let mut path = tls.borrow().stack.clone();
        path.push(name.to_string());
        path
    })
}
