pub mod appointments;
pub mod settings;
