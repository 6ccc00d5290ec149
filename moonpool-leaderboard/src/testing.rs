//! Shared helpers for unit tests.

use std::future::Future;

/// Run `test` on a current-thread runtime inside a `LocalSet`, so actor
/// hosts can `spawn_local`.
pub(crate) fn run_local_test<F: Future<Output = ()>>(test: F) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build local runtime");
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, test);
}
