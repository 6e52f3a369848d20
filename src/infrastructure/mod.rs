pub mod event_bus;
pub mod observability;
pub mod persistence;
pub mod storage;
pub mod translation;
