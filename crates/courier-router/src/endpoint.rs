//! The innermost link of the chain: handler lookup and invocation.
//!
//! Everything a handler can do wrong is turned into an [`Outcome`] here:
//! errors, partial responses, empty replies, panics and missed deadlines.
//! Nothing escapes as a panic or an empty response.

use courier_core::{
    replies, Command, DispatchContext, DispatchError, Handler, HandlerError, Logger, Response,
};
use courier_middleware::{BoxFuture, Endpoint, Outcome};
use courier_telemetry::logging::fields;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub(crate) struct HandlerEndpoint {
    handlers: Vec<Arc<dyn Handler>>,
    logger: Arc<dyn Logger>,
}

impl HandlerEndpoint {
    pub(crate) fn new(handlers: Vec<Arc<dyn Handler>>, logger: Arc<dyn Logger>) -> Self {
        Self { handlers, logger }
    }

    pub(crate) fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    /// First handler, in registration order, that claims `token`.
    fn lookup(&self, token: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|handler| handler.claims(token))
    }

    async fn invoke(&self, ctx: &DispatchContext, handler: &dyn Handler, cmd: &Command) -> Outcome {
        if let Err(error) = ctx.check_deadline() {
            return self.failure(cmd, None, error);
        }

        let invocation = AssertUnwindSafe(handler.invoke(ctx, cmd)).catch_unwind();
        let result = match ctx.run_until_deadline(invocation).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(HandlerError::msg(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(HandlerError::deadline_exceeded()),
        };

        match result {
            Ok(response) if !response.is_empty() => Outcome::ok(response),
            Ok(_) => {
                let (_, error) = HandlerError::msg("handler returned an empty response").into_parts();
                self.failure(cmd, None, error)
            }
            Err(error) => {
                let (partial, error) = error.into_parts();
                self.failure(cmd, partial, error)
            }
        }
    }

    /// Normalizes a failure: keeps a non-empty partial response, otherwise
    /// substitutes the generic failure text, and logs with the command id.
    fn failure(&self, cmd: &Command, partial: Option<Response>, error: DispatchError) -> Outcome {
        self.logger.error(
            "handler failed",
            &[
                (fields::COMMAND_ID, cmd.id.to_string()),
                (fields::USER_ID, cmd.user.id.to_string()),
                (fields::PREFIX, cmd.head().unwrap_or_default().to_string()),
                (fields::ERROR_KIND, error.kind().to_string()),
                (fields::ERROR, error.to_string()),
            ],
        );

        let response = partial
            .filter(|response| !response.is_empty())
            .unwrap_or_else(|| Response::plain(replies::GENERIC_FAILURE));
        Outcome::failed(response, error)
    }
}

fn unknown(head: &str) -> Outcome {
    Outcome::failed(
        Response::plain(replies::UNKNOWN_COMMAND),
        DispatchError::unknown_command(head),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl Endpoint for HandlerEndpoint {
    fn call<'a>(&'a self, ctx: &'a mut DispatchContext, cmd: Command) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(head) = cmd.head() else {
                return unknown("");
            };
            let Some(handler) = self.lookup(head) else {
                tracing::debug!(command_id = %cmd.id, head, "no handler claims command");
                return unknown(head);
            };

            self.invoke(ctx, handler.as_ref(), &cmd).await
        })
    }
}
