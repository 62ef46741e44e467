// runloop-core/src/middleware/mod.rs
// ============================================================================
// Module: Middleware Chain
// Description: Ordered wrapping of the tool handler invocation.
// Purpose: Let cross-cutting concerns (tracing, metrics, validation, audit,
//          logging) observe and gate every tool call without the handler
//          itself knowing they exist.
// Dependencies: crate::model::tool
// ============================================================================

//! ## Overview
//! A [`Middleware`] wraps a [`Next`] call. Middlewares registered with
//! [`MiddlewareChain::push`] run outermost-first: the first one pushed is
//! the outermost layer and sees the call before and after every other
//! layer.

pub mod audit;
pub mod logging;
pub mod metrics;
pub mod tracing;
pub mod validation;

use std::sync::Arc;

use serde_json::Value;

use crate::model::tool::ToolContext;
use crate::model::tool::ToolHandlerError;

/// The remaining chain, callable exactly once per invocation.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Fn(&ToolContext, &Value) -> Result<Value, ToolHandlerError>,
}

impl<'a> Next<'a> {
    /// Invokes the next middleware in the chain, or the terminal handler if
    /// none remain.
    pub fn call(&self, context: &ToolContext, input: &Value) -> Result<Value, ToolHandlerError> {
        match self.chain.split_first() {
            Some((first, rest)) => first.handle(
                context,
                input,
                &Next {
                    chain: rest,
                    handler: self.handler,
                },
            ),
            None => (self.handler)(context, input),
        }
    }
}

/// A single layer in the middleware chain.
pub trait Middleware: Send + Sync {
    /// Observes or gates the call, delegating to `next` to continue the
    /// chain. A middleware that returns without calling `next` short-circuits
    /// every remaining layer and the handler itself.
    fn handle(
        &self,
        context: &ToolContext,
        input: &Value,
        next: &Next<'_>,
    ) -> Result<Value, ToolHandlerError>;
}

/// An ordered stack of middlewares wrapping a terminal handler.
#[derive(Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` to the end of the registration order, so the
    /// first `push` call becomes the outermost layer and the last becomes
    /// the innermost (closest to the handler).
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.layers.push(middleware);
        self
    }

    /// Runs the full chain around `handler`.
    pub fn run(
        &self,
        context: &ToolContext,
        input: &Value,
        handler: &dyn Fn(&ToolContext, &Value) -> Result<Value, ToolHandlerError>,
    ) -> Result<Value, ToolHandlerError> {
        let next = Next {
            chain: &self.layers,
            handler,
        };
        next.call(context, input)
    }
}

#[cfg(test)]
mod tests {
    use super::Middleware;
    use super::MiddlewareChain;
    use super::Next;
    use crate::model::identifiers::RunId;
    use crate::model::state::State;
    use crate::model::tool::ToolContext;
    use crate::model::tool::ToolHandlerError;
    use serde_json::Value;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct RecordingLayer {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for RecordingLayer {
        fn handle(
            &self,
            context: &ToolContext,
            input: &Value,
            next: &Next<'_>,
        ) -> Result<Value, ToolHandlerError> {
            #[allow(clippy::unwrap_used, reason = "test-only mutex, never contended or poisoned")]
            self.log.lock().unwrap().push(self.name);
            next.call(context, input)
        }
    }

    fn test_context() -> ToolContext {
        ToolContext {
            run_id: RunId::new("run-1"),
            state: State::Act,
            reason: "test".to_string(),
            deadline_ms: 0,
        }
    }

    #[test]
    fn layers_run_outermost_first_then_the_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(RecordingLayer {
            name: "outer",
            log: log.clone(),
        }));
        chain.push(Arc::new(RecordingLayer {
            name: "inner",
            log: log.clone(),
        }));

        let result = chain.run(&test_context(), &Value::Null, &|_ctx, input| Ok(input.clone()));

        assert!(result.is_ok());
        #[allow(clippy::unwrap_used, reason = "test-only mutex, never contended or poisoned")]
        let observed = log.lock().unwrap().clone();
        assert_eq!(observed, vec!["outer", "inner"]);
    }

    struct ShortCircuitLayer;

    impl Middleware for ShortCircuitLayer {
        fn handle(
            &self,
            _context: &ToolContext,
            _input: &Value,
            _next: &Next<'_>,
        ) -> Result<Value, ToolHandlerError> {
            Err(ToolHandlerError::new("blocked"))
        }
    }

    #[test]
    fn a_layer_that_does_not_call_next_short_circuits_the_handler() {
        let handler_ran = Arc::new(Mutex::new(false));
        let handler_ran_inner = handler_ran.clone();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(ShortCircuitLayer));

        let result = chain.run(&test_context(), &Value::Null, &move |_ctx, input| {
            #[allow(clippy::unwrap_used, reason = "test-only mutex, never contended or poisoned")]
            {
                *handler_ran_inner.lock().unwrap() = true;
            }
            Ok(input.clone())
        });

        assert!(result.is_err());
        #[allow(clippy::unwrap_used, reason = "test-only mutex, never contended or poisoned")]
        let ran = *handler_ran.lock().unwrap();
        assert!(!ran, "handler must not run when a layer short-circuits");
    }
}
