pub mod alloc;
pub mod holdings;
pub mod notify;
pub mod setup;
pub mod summary;
pub mod tactical;
pub mod ui;
