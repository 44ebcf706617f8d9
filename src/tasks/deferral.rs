use tracing::debug;

/// Handle the host waits on before reclaiming a background task.
///
/// The completion callback runs exactly once: on `complete`, or when the
/// handle is dropped on any other exit path, unwinding included.
pub struct Deferral {
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl Deferral {
    pub fn new<F>(on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            on_complete: Some(Box::new(on_complete)),
        }
    }

    pub fn complete(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
    }
}

impl Drop for Deferral {
    fn drop(&mut self) {
        self.fire();
    }
}

/// The host's view of one background task invocation.
pub trait TaskInstance: Send + Sync {
    fn get_deferral(&self) -> Deferral;
}

/// Invocation fired by the local scheduler; completion is only logged.
pub struct ScheduledRun {
    pub tick: u64,
}

impl TaskInstance for ScheduledRun {
    fn get_deferral(&self) -> Deferral {
        let tick = self.tick;
        Deferral::new(move || debug!(tick, "monitor pass complete"))
    }
}
