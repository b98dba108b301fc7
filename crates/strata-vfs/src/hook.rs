//! Close-error hook.
//!
//! A handle dropped without `close()` is closed from its `Drop` impl, where
//! there is no caller left to receive an error. Such errors are passed to a
//! hook instead: the one configured on the owning filesystem if any,
//! otherwise the process-wide hook. With neither set they are discarded.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::VfsError;

/// Callback receiving errors from implicit closes.
pub type CloseErrorHook = Arc<dyn Fn(&VfsError) + Send + Sync>;

static CLOSE_ERROR_HOOK: RwLock<Option<CloseErrorHook>> = parking_lot::const_rwlock(None);

/// Install the process-wide hook, returning the previous one.
///
/// Meant to be called once during start-up.
pub fn set_close_error_hook(hook: Option<CloseErrorHook>) -> Option<CloseErrorHook> {
    std::mem::replace(&mut *CLOSE_ERROR_HOOK.write(), hook)
}

/// The current process-wide hook.
pub fn close_error_hook() -> Option<CloseErrorHook> {
    CLOSE_ERROR_HOOK.read().clone()
}

pub(crate) fn report_close_error(local: Option<&CloseErrorHook>, err: &VfsError) {
    if let Some(hook) = local {
        hook(err);
        return;
    }
    // Clone out so the hook never runs under the global lock.
    if let Some(hook) = close_error_hook() {
        hook(err);
    }
}
