pub mod event_bus;
pub mod memory;
pub mod postgres;
