use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// State touched by several tasks. Lock, copy out, unlock: never hold across `.await`.
pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Receiving end of the process-wide stop flag.
pub type Shutdown = watch::Receiver<bool>;

pub fn shutdown_channel() -> (watch::Sender<bool>, Shutdown) {
    watch::channel(false)
}

/// Resolves once a stop was requested or the sender went away.
pub async fn wait_for_shutdown(shutdown: &mut Shutdown) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
