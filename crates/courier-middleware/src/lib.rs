//! # Courier Middleware
//!
//! The middleware chain that wraps every command dispatch, and the standard
//! stages that make up the default stack.
//!
//! ## Chain
//!
//! ```text
//! Command → Logging → Metrics → Validation → Caching → Auth → Activity → RateLimit → Endpoint
//!                                                                                       ↓
//! Outcome ← Logging ← Metrics ← Validation ← Caching ← Auth ← Activity ← RateLimit ←───┘
//! ```
//!
//! Any stage may short-circuit by returning an [`Outcome`] without calling
//! [`Next::run`]; the stages outside it still see that outcome on the way
//! back.
//!
//! ## Example
//!
//! ```
//! use courier_middleware::{Chain, Stage};
//!
//! let chain = Chain::builder().build();
//! assert!(chain.is_empty());
//! assert_eq!(Stage::all()[0].name(), "logging");
//! ```

#![doc(html_root_url = "https://docs.rs/courier-middleware/0.1.0")]

pub mod chain;
pub mod middleware;
pub mod stages;
pub mod types;

pub use chain::{BoxedMiddleware, Chain, ChainBuilder, Stage};
pub use middleware::{BoxFuture, Endpoint, Middleware, Next};
pub use types::Outcome;
