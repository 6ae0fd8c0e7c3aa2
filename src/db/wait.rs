//! Delayed waiting indicator.
//!
//! A [`WaitTimer`] owns a background thread running a single-threaded tokio
//! runtime. [`WaitTimer::arm`] sends it a request and returns a [`WaitGuard`].
//! The runtime shows the indicator once the delay elapses, unless the guard was
//! dropped first. The indicator is hidden exactly once, never before it was
//! shown: by the guard, or by the worker when the guard was dropped while
//! `show_wait_indicator` was still running. No UI call is made under the
//! indicator lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::ui::FormUi;

#[derive(Debug, Default)]
struct IndicatorState {
    finished: bool,
    showing: bool,
    shown: bool,
}

type SharedState = Arc<Mutex<IndicatorState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, IndicatorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ArmRequest {
    message: String,
    state: SharedState,
    done: oneshot::Receiver<()>,
}

/// Schedules the waiting indicator for protected calls.
pub struct WaitTimer {
    ui: Arc<dyn FormUi>,
    requests: Option<mpsc::UnboundedSender<ArmRequest>>,
}

impl WaitTimer {
    /// Start the timer thread. If the thread cannot be started the indicator
    /// is never shown, but guards still hide it.
    pub fn new(ui: Arc<dyn FormUi>, delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker_ui = Arc::clone(&ui);
        let spawned = thread::Builder::new()
            .name("wait-indicator".into())
            .spawn(move || run_worker(worker_ui, delay, rx));
        let requests = match spawned {
            Ok(_) => Some(tx),
            Err(err) => {
                tracing::warn!(error = %err, "wait indicator thread unavailable");
                None
            }
        };
        Self { ui, requests }
    }

    /// Arm the indicator for one call.
    pub fn arm(&self, message: impl Into<String>) -> WaitGuard {
        let state = SharedState::default();
        let (done_tx, done_rx) = oneshot::channel();
        if let Some(requests) = &self.requests {
            let request = ArmRequest {
                message: message.into(),
                state: Arc::clone(&state),
                done: done_rx,
            };
            if requests.send(request).is_err() {
                tracing::debug!("wait indicator timer stopped");
            }
        }
        WaitGuard {
            state,
            ui: Arc::clone(&self.ui),
            done: Some(done_tx),
        }
    }
}

fn run_worker(ui: Arc<dyn FormUi>, delay: Duration, mut requests: mpsc::UnboundedReceiver<ArmRequest>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::warn!(error = %err, "wait indicator runtime unavailable");
            return;
        }
    };
    runtime.block_on(async move {
        while let Some(ArmRequest { message, state, done }) = requests.recv().await {
            let ui = Arc::clone(&ui);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => show(ui.as_ref(), &state, &message),
                    _ = done => {}
                }
            });
        }
    });
}

fn show(ui: &dyn FormUi, state: &SharedState, message: &str) {
    {
        let mut indicator = lock(state);
        if indicator.finished {
            return;
        }
        indicator.showing = true;
    }
    ui.show_wait_indicator(message);
    let finished = {
        let mut indicator = lock(state);
        indicator.showing = false;
        indicator.shown = true;
        indicator.finished
    };
    if finished {
        ui.hide_wait_indicator();
    }
}

/// Hides the indicator when dropped.
pub struct WaitGuard {
    state: SharedState,
    ui: Arc<dyn FormUi>,
    done: Option<oneshot::Sender<()>>,
}

impl WaitGuard {
    /// Whether the indicator has been shown so far.
    pub fn was_shown(&self) -> bool {
        lock(&self.state).shown
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let showing = {
            let mut indicator = lock(&self.state);
            indicator.finished = true;
            indicator.showing
        };
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        if !showing {
            self.ui.hide_wait_indicator();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedUi, UiEvent};

    fn timer(delay_ms: u64) -> (WaitTimer, Arc<ScriptedUi>) {
        let ui = Arc::new(ScriptedUi::new());
        let timer = WaitTimer::new(ui.clone(), Duration::from_millis(delay_ms));
        (timer, ui)
    }

    #[test]
    fn fast_call_hides_without_showing() {
        let (timer, ui) = timer(500);
        let guard = timer.arm("Saving...");
        assert!(!guard.was_shown());
        drop(guard);

        assert_eq!(ui.hide_count(), 1);
        assert_eq!(ui.show_count(), 0);
    }

    #[test]
    fn slow_call_shows_then_hides_once() {
        let (timer, ui) = timer(5);
        let guard = timer.arm("Saving...");
        thread::sleep(Duration::from_millis(200));
        assert!(guard.was_shown());
        drop(guard);

        assert_eq!(ui.show_count(), 1);
        assert_eq!(ui.hide_count(), 1);
        assert_eq!(ui.shown_messages(), vec!["Saving...".to_owned()]);
    }

    /// Takes a while to show the indicator, like a UI marshalling the call
    /// onto another thread.
    struct SlowShowUi {
        inner: ScriptedUi,
        show_time: Duration,
    }

    impl FormUi for SlowShowUi {
        fn confirm(&self, prompt: crate::ui::MessageKey) -> bool {
            self.inner.confirm(prompt)
        }

        fn show_wait_indicator(&self, message: &str) {
            thread::sleep(self.show_time);
            self.inner.show_wait_indicator(message);
        }

        fn hide_wait_indicator(&self) {
            self.inner.hide_wait_indicator();
        }

        fn present_choice(&self, title: crate::ui::MessageKey, options: &[String]) -> Option<usize> {
            self.inner.present_choice(title, options)
        }

        fn request_focus(&self, target: crate::ui::FocusTarget) {
            self.inner.request_focus(target);
        }
    }

    #[test]
    fn drop_during_show_does_not_wait_and_hides_after_show() {
        let ui = Arc::new(SlowShowUi {
            inner: ScriptedUi::new(),
            show_time: Duration::from_millis(300),
        });
        let timer = WaitTimer::new(ui.clone(), Duration::from_millis(1));
        let guard = timer.arm("Saving...");
        thread::sleep(Duration::from_millis(50));

        let started = std::time::Instant::now();
        drop(guard);
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(ui.inner.hide_count(), 0);

        thread::sleep(Duration::from_millis(600));
        assert_eq!(
            ui.inner.events(),
            vec![UiEvent::ShowWait("Saving...".into()), UiEvent::HideWait]
        );
    }

    #[test]
    fn never_shown_after_hidden() {
        let (timer, ui) = timer(30);
        drop(timer.arm("Loading..."));
        thread::sleep(Duration::from_millis(150));

        assert_eq!(ui.show_count(), 0);
        assert_eq!(ui.hide_count(), 1);
    }
}
