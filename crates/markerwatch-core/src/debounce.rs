//! Trailing-edge debouncer.
//!
//! Every [`Debouncer::call`] restarts the quiet window. When the window
//! elapses with no further calls, the callback runs once with the arguments
//! of the last call. A single worker task owns the timer and runs the
//! callback, so callbacks for one debouncer never overlap.
//!
//! ```ignore
//! let create = Debouncer::new(Duration::from_millis(300), move |c: Coordinate| {
//!     let _ = store.add(c);
//! });
//! create.call(coord); // from a long-press gesture
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum Msg<T> {
    Call(T),
    Cancel,
}

pub struct Debouncer<T: Send + 'static> {
    tx: mpsc::UnboundedSender<Msg<T>>,
    worker: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the worker on the current tokio runtime.
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn(T) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(rx, delay, callback));
        Self { tx, worker }
    }

    /// Schedule `value`, replacing anything still pending.
    pub fn call(&self, value: T) {
        // Send only fails after shutdown, when dropping the value is correct.
        let _ = self.tx.send(Msg::Call(value));
    }

    /// Drop the pending call, if any, without running the callback.
    pub fn cancel(&self) {
        let _ = self.tx.send(Msg::Cancel);
    }

    /// Cancel and stop the worker. Later calls are ignored.
    pub fn shutdown(&self) {
        self.cancel();
        self.worker.abort();
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run<T, F>(mut rx: mpsc::UnboundedReceiver<Msg<T>>, delay: Duration, callback: F)
where
    F: Fn(T),
{
    let mut pending: Option<T> = None;
    loop {
        match pending.take() {
            None => match rx.recv().await {
                Some(Msg::Call(v)) => pending = Some(v),
                Some(Msg::Cancel) => {}
                None => return,
            },
            Some(v) => {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(Msg::Call(next)) => pending = Some(next),
                        Some(Msg::Cancel) => {}
                        None => return,
                    },
                    _ = tokio::time::sleep(delay) => callback(v),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::{sleep, Instant};

    type Log = Arc<Mutex<Vec<(u32, Instant)>>>;

    fn recorder() -> (Log, impl Fn(u32) + Send + 'static) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |v| sink.lock().unwrap().push((v, Instant::now())))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_last_call() {
        let (log, cb) = recorder();
        let d = Debouncer::new(Duration::from_millis(300), cb);
        let start = Instant::now();

        d.call(1);
        sleep(Duration::from_millis(50)).await;
        d.call(2);
        sleep(Duration::from_millis(50)).await;
        d.call(3);
        sleep(Duration::from_millis(1_000)).await;

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, 3);
        assert_eq!(log[0].1 - start, Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn separated_calls_each_fire() {
        let (log, cb) = recorder();
        let d = Debouncer::new(Duration::from_millis(100), cb);

        d.call(1);
        sleep(Duration::from_millis(500)).await;
        d.call(2);
        sleep(Duration::from_millis(500)).await;

        let values: Vec<u32> = log.lock().unwrap().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_call() {
        let (log, cb) = recorder();
        let d = Debouncer::new(Duration::from_millis(300), cb);

        d.call(1);
        sleep(Duration::from_millis(100)).await;
        d.cancel();
        sleep(Duration::from_millis(1_000)).await;
        assert!(log.lock().unwrap().is_empty());

        // Still usable after a cancel.
        d.call(2);
        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ignores_later_calls() {
        let (log, cb) = recorder();
        let d = Debouncer::new(Duration::from_millis(300), cb);

        d.call(1);
        d.shutdown();
        d.call(2);
        sleep(Duration::from_millis(1_000)).await;
        assert!(log.lock().unwrap().is_empty());
    }
}
