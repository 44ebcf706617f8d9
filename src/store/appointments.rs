use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::models::appointment::Appointment;

pub const DEFAULT_APPOINTMENTS_FILE: &str = "LunchAppointments.json";

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Returns `StoreError::NotFound` when nothing has ever been saved.
    async fn load_appointments(&self) -> Result<Vec<Appointment>, StoreError>;
    async fn save_appointments(&self, appointments: &[Appointment]) -> Result<(), StoreError>;
}

/// Appointments persisted as one JSON array in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AppointmentStore for JsonFileStore {
    async fn load_appointments(&self) -> Result<Vec<Appointment>, StoreError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        debug!(path = %self.path.display(), bytes = json.len(), "appointments file loaded");
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        // A literal `null` is what an empty collection used to serialize to.
        let appointments: Option<Vec<Appointment>> =
            serde_json::from_str(&json).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(appointments.unwrap_or_default())
    }

    async fn save_appointments(&self, appointments: &[Appointment]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(appointments).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        debug!(path = %self.path.display(), count = appointments.len(), "appointments saved");
        Ok(())
    }
}

/// In-memory store. `None` behaves like a missing file.
#[derive(Default)]
pub struct MemoryAppointmentStore {
    appointments: Mutex<Option<Vec<Appointment>>>,
}

impl MemoryAppointmentStore {
    pub fn new(appointments: Vec<Appointment>) -> Self {
        Self {
            appointments: Mutex::new(Some(appointments)),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn load_appointments(&self) -> Result<Vec<Appointment>, StoreError> {
        self.appointments
            .lock()
            .await
            .clone()
            .ok_or_else(|| StoreError::NotFound {
                path: PathBuf::from(DEFAULT_APPOINTMENTS_FILE),
            })
    }

    async fn save_appointments(&self, appointments: &[Appointment]) -> Result<(), StoreError> {
        *self.appointments.lock().await = Some(appointments.to_vec());
        Ok(())
    }
}
