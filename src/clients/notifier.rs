use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::NotifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCrop {
    None,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveImage {
    pub source: String,
    pub crop: ImageCrop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastVisual {
    pub headline: String,
    pub body: String,
    pub image: Option<AdaptiveImage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBinding {
    pub headline: String,
    pub body: String,
    pub image: Option<AdaptiveImage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileVisual {
    pub medium: TileBinding,
    pub wide: TileBinding,
    pub large: TileBinding,
}

/// A toast ready for presentation. A later toast with the same `tag`
/// replaces this one instead of stacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastRequest {
    pub visual: ToastVisual,
    pub tag: String,
    /// When the toast was raised.
    pub issued: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    /// Activation arguments handed back to the app when the toast is clicked.
    pub launch: String,
}

pub trait Notifier: Send + Sync {
    fn show_toast(&self, request: &ToastRequest) -> Result<(), NotifyError>;
    fn update_tile(&self, visual: &TileVisual) -> Result<(), NotifyError>;
    fn update_badge(&self, count: u32) -> Result<(), NotifyError>;
}

/// Prints notifications to stdout.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_toast(&self, request: &ToastRequest) -> Result<(), NotifyError> {
        info!(tag = %request.tag, expires = %request.expiration, "showing toast");
        let mut out = std::io::stdout().lock();
        writeln!(out, "[{}] {}", request.visual.headline, request.visual.body)?;
        if let Some(image) = &request.visual.image {
            if !image.source.is_empty() {
                writeln!(out, "  image: {}", image.source)?;
            }
        }
        writeln!(out, "  open: {}", request.launch)?;
        Ok(())
    }

    fn update_tile(&self, visual: &TileVisual) -> Result<(), NotifyError> {
        debug!(body = %visual.wide.body, "tile updated");
        Ok(())
    }

    fn update_badge(&self, count: u32) -> Result<(), NotifyError> {
        info!(count, "badge updated");
        writeln!(std::io::stdout().lock(), "Pending lunches: {}", count)?;
        Ok(())
    }
}

#[derive(Default)]
struct CenterState {
    toasts: Vec<ToastRequest>,
    tile: Option<TileVisual>,
    badge: Option<u32>,
    badge_updates: usize,
}

/// In-memory notification surface. Toasts are keyed by tag: re-showing a
/// tag while its toast is still live replaces it and is not forwarded
/// again. Toasts that expired before a new one is raised are dropped first.
#[derive(Default)]
pub struct NotificationCenter {
    state: Mutex<CenterState>,
    forward: Option<Box<dyn Notifier>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes new toasts, tiles and badges on to `inner`.
    pub fn forwarding(inner: Box<dyn Notifier>) -> Self {
        Self {
            state: Mutex::new(CenterState::default()),
            forward: Some(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CenterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn toasts(&self) -> Vec<ToastRequest> {
        self.lock().toasts.clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.lock().toasts.iter().map(|t| t.tag.clone()).collect()
    }

    pub fn tile(&self) -> Option<TileVisual> {
        self.lock().tile.clone()
    }

    pub fn badge(&self) -> Option<u32> {
        self.lock().badge
    }

    pub fn badge_updates(&self) -> usize {
        self.lock().badge_updates
    }

    /// Drops toasts whose expiration has passed.
    pub fn expire(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        let before = state.toasts.len();
        state.toasts.retain(|toast| toast.expiration > now);
        before - state.toasts.len()
    }
}

impl Notifier for NotificationCenter {
    fn show_toast(&self, request: &ToastRequest) -> Result<(), NotifyError> {
        let replaced = {
            let mut state = self.lock();
            state.toasts.retain(|toast| toast.expiration > request.issued);
            match state.toasts.iter_mut().find(|t| t.tag == request.tag) {
                Some(existing) => {
                    *existing = request.clone();
                    true
                }
                None => {
                    state.toasts.push(request.clone());
                    false
                }
            }
        };
        if replaced {
            debug!(tag = %request.tag, "toast replaced");
            return Ok(());
        }
        match &self.forward {
            Some(inner) => inner.show_toast(request),
            None => Ok(()),
        }
    }

    fn update_tile(&self, visual: &TileVisual) -> Result<(), NotifyError> {
        self.lock().tile = Some(visual.clone());
        match &self.forward {
            Some(inner) => inner.update_tile(visual),
            None => Ok(()),
        }
    }

    fn update_badge(&self, count: u32) -> Result<(), NotifyError> {
        {
            let mut state = self.lock();
            state.badge = Some(count);
            state.badge_updates += 1;
        }
        match &self.forward {
            Some(inner) => inner.update_badge(count),
            None => Ok(()),
        }
    }
}
