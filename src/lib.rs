pub mod api;
pub mod core;
pub mod export;
pub mod persistence;
