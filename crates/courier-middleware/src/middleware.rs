//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that every stage implements
//! and the [`Endpoint`] trait for whatever sits at the end of the chain
//! (the router's handler lookup in practice).
//!
//! # Example
//!
//! ```
//! use courier_core::DispatchContext;
//! use courier_core::Command;
//! use courier_middleware::{BoxFuture, Middleware, Next, Outcome};
//!
//! struct Shout;
//!
//! impl Middleware for Shout {
//!     fn name(&self) -> &'static str {
//!         "shout"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut DispatchContext,
//!         cmd: Command,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Outcome> {
//!         Box::pin(async move {
//!             let mut outcome = next.run(ctx, cmd).await;
//!             outcome.response.text = outcome.response.text.to_uppercase();
//!             outcome
//!         })
//!     }
//! }
//! ```

use crate::types::Outcome;
use courier_core::{Command, DispatchContext};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future, `Send` so dispatches can run on any worker thread.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core middleware trait.
///
/// A middleware receives the mutable dispatch context, the command, and a
/// [`Next`] to continue the chain. It may:
///
/// - call `next.run()` with a modified context or command,
/// - return its own [`Outcome`] without calling `next` (short-circuit),
/// - inspect or rewrite the outcome on the way back.
///
/// # Invariants
///
/// - Middleware MUST call `next.run()` at most once
/// - Middleware MUST NOT drop an error returned from downstream
/// - Implementations are shared across concurrent dispatches
pub trait Middleware: Send + Sync + 'static {
    /// Returns the stage name, used in logs and for order checks.
    fn name(&self) -> &'static str;

    /// Processes the command through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome>;
}

/// The innermost step of a chain.
pub trait Endpoint: Send + Sync {
    /// Produces the outcome for a command that passed every middleware.
    fn call<'a>(&'a self, ctx: &'a mut DispatchContext, cmd: Command) -> BoxFuture<'a, Outcome>;
}

/// Continuation handed to a middleware.
///
/// Consumed by [`run`](Next::run), so it can be invoked only once.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Creates a continuation over `remaining` that ends at `endpoint`.
    pub(crate) fn new(remaining: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Endpoint) -> Self {
        Self {
            remaining,
            endpoint,
        }
    }

    /// Invokes the next middleware, or the endpoint when none are left.
    pub fn run<'c>(self, ctx: &'c mut DispatchContext, cmd: Command) -> BoxFuture<'c, Outcome>
    where
        'a: 'c,
    {
        match self.remaining.split_first() {
            Some((middleware, rest)) => {
                middleware.process(ctx, cmd, Next::new(rest, self.endpoint))
            }
            None => self.endpoint.call(ctx, cmd),
        }
    }

    /// Returns how many middleware stages are still ahead.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field(
                "remaining",
                &self.remaining.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
