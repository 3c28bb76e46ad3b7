pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod presentation;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, BattleError, ErrorKind};
pub use services::{BattleController, GameApi, HttpGameApi, UserAction};
