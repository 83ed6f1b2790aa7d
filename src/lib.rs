pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod representation;
pub mod service;
pub mod util;

pub use app::reactive::L3Reactive;
pub use config::ReactiveConfig;
pub use error::{ReactiveError, Result};
