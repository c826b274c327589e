//! # Courier Test
//!
//! Test utilities for Courier: in-memory stand-ins for the external
//! collaborators and fixtures for building commands, so pipelines can be
//! exercised end to end without a database or a messaging platform.
//!
//! ## Example
//!
//! ```
//! use courier_test::{CommandBuilder, InMemoryUserService, RecordingLogger, StaticHandler};
//!
//! let users = InMemoryUserService::new().with_default_language("uz");
//! let logger = RecordingLogger::new();
//! let handler = StaticHandler::new(&["/ping"], "pong");
//! let cmd = CommandBuilder::new("/ping").user_id(42).build();
//!
//! assert_eq!(cmd.user.id, 42);
//! assert_eq!(handler.calls(), 0);
//! assert!(logger.records().is_empty());
//! # let _ = users;
//! ```

#![doc(html_root_url = "https://docs.rs/courier-test/0.1.0")]

mod activity;
mod command;
mod handler;
mod logger;
mod users;

pub use activity::InMemoryActivityStore;
pub use command::{command, CommandBuilder};
pub use handler::StaticHandler;
pub use logger::{LogRecord, RecordingLogger};
pub use users::InMemoryUserService;
