//! # Courier Tasks
//!
//! Background task management for Courier.
//!
//! The pipeline runs two kinds of work off the request path:
//!
//! - fire-and-forget writes (activity log, last-active touches)
//! - periodic sweepers (TTL cache, rate-limit table)
//!
//! All of it is registered with one [`BackgroundTasks`] value owned by the
//! bot, and [`BackgroundTasks::close`] stops it deterministically.
//!
//! ```rust
//! use courier_tasks::{BackgroundTasks, TasksConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let tasks = BackgroundTasks::with_config(
//!     TasksConfig::new().with_shutdown_grace(Duration::from_secs(2)),
//! );
//! tasks.spawn("audit", async {}).unwrap();
//! tasks.close().await;
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod background;
mod error;
mod shutdown;
mod task;

pub use background::{BackgroundTasks, TasksConfig};
pub use error::{TaskError, TaskResult};
pub use shutdown::ShutdownSignal;
pub use task::{TaskId, TaskStats};
