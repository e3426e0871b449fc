pub mod api_types;
pub mod client;
pub mod render;
pub mod types;

pub use client::LazySession;
