pub mod appointment_service;
pub mod notification_message_service;
pub mod status;
