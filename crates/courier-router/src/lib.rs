//! # Courier Router
//!
//! Maps command tokens to handlers and runs every dispatch through the
//! frozen middleware chain.
//!
//! ```text
//!   Command ──► Chain (outermost ... innermost) ──► HandlerEndpoint
//!                                                      │
//!                              lookup by token ◄───────┤
//!                              invoke under deadline ◄─┤
//!                              normalize failures ◄────┘
//! ```
//!
//! The head token is the first word of the text with any `@botname` suffix
//! removed, compared exactly and case-sensitively. The first handler in
//! registration order that claims it wins.
//!
//! Dispatch is total: whatever happens, the returned [`Outcome`] carries a
//! non-empty response.
//!
//! # Example
//!
//! ```
//! use courier_router::{HelpHandler, RouterBuilder};
//! use courier_core::{Chat, Command, DispatchContext, User};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut builder = RouterBuilder::new();
//! builder.register_handler(Arc::new(HelpHandler::new(builder.catalog()))).unwrap();
//! let router = builder.build();
//!
//! let mut ctx = DispatchContext::new();
//! let outcome = router
//!     .dispatch(&mut ctx, Command::new("/help", User::new(1), Chat::private(1)))
//!     .await;
//! assert!(outcome.response.text.contains("/help"));
//! # });
//! ```
//!
//! [`Outcome`]: courier_middleware::Outcome

#![doc(html_root_url = "https://docs.rs/courier-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod catalog;
mod endpoint;
mod error;
mod help;
mod router;

pub use catalog::Catalog;
pub use error::RegistrationError;
pub use help::HelpHandler;
pub use router::{Router, RouterBuilder};
