//! Interceptors run after input validation and before the handler.
//!
//! They are awaited one at a time in declaration order, each seeing the
//! mutations made by input validation and by the interceptors before it.
//! An interceptor that commits a response on the [`Exchange`] ends the
//! pipeline: nothing after it runs and the handler is never invoked. This is
//! how authentication and similar gates reject requests.
//!
//! # Implementations
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`FnInterceptor`] | Synchronous closure over the exchange |
//! | [`RateLimit`] | Fixed-window per-client-IP request cap |

pub mod rate_limit;

use async_trait::async_trait;

use crate::{error::BoxError, exchange::Exchange};

pub use rate_limit::RateLimit;

/// A step in front of the handler that may inspect, modify or answer the
/// request.
///
/// Returning `Err` aborts the request with a generic 500.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, exchange: &mut Exchange) -> Result<(), BoxError>;
}

/// [`Interceptor`] backed by a synchronous closure.
pub struct FnInterceptor<F>(F);

/// Wrap a closure as an [`Interceptor`].
///
/// ```rust,ignore
/// let deny = interceptor_fn(|ex: &mut Exchange| {
///     ex.respond(StatusCode::UNAUTHORIZED, json!({ "error": { "msg": "Unauthorized" } }));
///     Ok(())
/// });
/// ```
pub fn interceptor_fn<F>(f: F) -> FnInterceptor<F>
where
    F: Fn(&mut Exchange) -> Result<(), BoxError> + Send + Sync,
{
    FnInterceptor(f)
}

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut Exchange) -> Result<(), BoxError> + Send + Sync,
{
    async fn intercept(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
        (self.0)(exchange)
    }
}
