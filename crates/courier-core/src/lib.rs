//! # Courier Core
//!
//! Core types and traits for the Courier command pipeline.
//!
//! This crate provides the foundational types used throughout Courier:
//!
//! - [`Command`] - One inbound chat command (text, sender, chat, attachments)
//! - [`Response`] - One outbound reply with its [`FormatHint`]
//! - [`DispatchContext`] - Per-dispatch deadline, authoritative user, extensions
//! - [`Handler`] - The contract every command handler satisfies
//! - [`DispatchError`] - Error kinds observed by middleware
//! - [`UserService`] / [`ActivityStore`] - External collaborator contracts
//! - [`Logger`] - Structured logger collaborator

#![doc(html_root_url = "https://docs.rs/courier-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod command;
mod context;
mod error;
mod handler;
pub mod logger;
pub mod replies;
mod response;
mod services;

pub use command::{command_token, Attachment, Chat, ChatKind, Command, CommandId, User};
pub use context::DispatchContext;
pub use error::{DispatchError, ErrorKind, ServiceError};
pub use handler::{Handler, HandlerError, HandlerResult, HandlerView};
pub use logger::{Level, Logger, LoggerAdapter, PrintfLogger, TracingLogger};
pub use response::{FormatHint, Response};
pub use services::{Activity, ActivityStore, Registration, UserRecord, UserService, UserStats};
