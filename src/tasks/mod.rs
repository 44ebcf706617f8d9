pub mod deferral;
pub mod monitor_task;
