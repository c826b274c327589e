//! # Courier
//!
//! Command-processing pipeline for chat bots.
//!
//! Courier takes text commands from a messaging platform, runs them through
//! a fixed chain of middleware, routes them to the handler that claims the
//! command token, and hands the reply back to the platform adapter.
//!
//! ## Quick Start
//!
//! ```ignore
//! use courier::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("courier.toml")?
//!         .with_dotenv()
//!         .with_env_prefix("COURIER")
//!         .load()?;
//!     init_logging(&config.logging.to_log_config())?;
//!
//!     let bot = BotBuilder::new(config)
//!         .with_user_service(Arc::new(MyUsers::connect().await?))
//!         .with_activity_store(Arc::new(MyActivity::connect().await?))
//!         .handler(Arc::new(WeatherHandler::new()))
//!         .with_help("Available commands")
//!         .build()?;
//!
//!     let outcome = bot.dispatch(Command::new("/weather Paris", User::new(42), Chat::private(42))).await;
//!     println!("{}", outcome.response.text);
//!
//!     bot.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Adapter bridge                         │
//! │              (platform event → Command → reply)               │
//! ├──────────────────────────────────────────────────────────────┤
//! │                          Router                               │
//! │  ┌─────────┬─────────┬────────────┬─────────┬──────┬────────┐ │
//! │  │ Logging │ Metrics │ Validation │ Caching │ Auth │  ...   │ │
//! │  └─────────┴─────────┴────────────┴─────────┴──────┴────────┘ │
//! │                     handler lookup                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │   TTL cache │ metrics registry │ background tasks │ config    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crates
//!
//! - [`core`]: commands, responses, handler and collaborator traits
//! - [`middleware`]: the chain and the standard stages
//! - [`router`]: handler registry and dispatch
//! - [`cache`]: in-memory TTL cache
//! - [`telemetry`]: logging setup and command metrics
//! - [`tasks`]: tracked background work
//! - [`config`]: layered configuration

#![doc(html_root_url = "https://docs.rs/courier/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod adapter;
mod bot;
mod error;

pub use bot::{Bot, BotBuilder};
pub use error::{BotError, BotResult};

pub use courier_cache as cache;
pub use courier_config as config;
pub use courier_core as core;
pub use courier_middleware as middleware;
pub use courier_router as router;
pub use courier_tasks as tasks;
pub use courier_telemetry as telemetry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::adapter::{AdapterBridge, IncomingMessage, IntoCommand, RenderedReply, ReplySink};
    pub use crate::{Bot, BotBuilder, BotError};
    pub use courier_config::{ConfigLoader, CourierConfig};
    pub use courier_core::{
        replies, ActivityStore, Chat, Command, DispatchContext, DispatchError, ErrorKind, FormatHint,
        Handler, HandlerError, HandlerResult, Logger, Response, User, UserRecord, UserService,
    };
    pub use courier_middleware::{Middleware, Outcome};
    pub use courier_router::{Router, RouterBuilder};
    pub use courier_telemetry::{init_logging, MetricsSnapshot};
}
