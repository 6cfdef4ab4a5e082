use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type Thunk<R, E, A> = Arc<dyn Fn(R, CancellationToken) -> BoxFuture<'static, Result<A, E>> + Send + Sync>;

/// A deferred, cancellable computation requiring an environment `R`,
/// producing `Result<A, E>` once run (spec §3/§4.1).
///
/// An `Effect` is a description: constructing one has no side effects. Side
/// effects happen only inside [`Effect::run`]/[`Effect::run_with_cancellation`].
/// Cloning an `Effect` is cheap (the underlying thunk is `Arc`-shared), which
/// is what lets combinators like [`Effect::retry`] invoke the same
/// description more than once.
pub struct Effect<R, E, A> {
    thunk: Thunk<R, E, A>,
}

impl<R, E, A> Clone for Effect<R, E, A> {
    fn clone(&self) -> Self {
        Self { thunk: self.thunk.clone() }
    }
}

impl<R, E, A> Effect<R, E, A>
where
    R: Send + 'static,
    E: Send + 'static,
    A: Send + 'static,
{
    /// Builds an effect from a raw thunk. Most callers want
    /// [`Effect::from_async`]/[`Effect::succeed`]/[`Effect::fail`] instead.
    pub fn new<F, Fut>(thunk: F) -> Self
    where
        F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
    {
        Self {
            thunk: Arc::new(move |env, token| Box::pin(thunk(env, token))),
        }
    }

    /// An effect that ignores its environment and always succeeds with a
    /// clone of `value`.
    pub fn succeed(value: A) -> Self
    where
        A: Clone + Sync,
    {
        Effect::new(move |_env, _token| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// An effect that ignores its environment and always fails with a clone
    /// of `error`.
    pub fn fail(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Effect::new(move |_env, _token| {
            let error = error.clone();
            async move { Err(error) }
        })
    }

    /// Wraps an async thunk that does not need the environment or a
    /// cancellation token, for the common case of a plain future.
    pub fn from_async<F, Fut>(thunk: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
    {
        Effect::new(move |_env, _token| thunk())
    }

    /// Runs the effect against `env` with a fresh cancellation token.
    pub async fn run(&self, env: R) -> Result<A, E> {
        self.run_with_cancellation(env, CancellationToken::new()).await
    }

    /// Runs the effect against `env`, honoring an externally supplied
    /// cancellation token (used by combinators that need to cancel a running
    /// effect from the outside — `race`'s loser, `parallel`'s peers).
    pub async fn run_with_cancellation(&self, env: R, token: CancellationToken) -> Result<A, E> {
        (self.thunk)(env, token).await
    }

    /// Bakes a fixed environment into the effect, erasing `R`.
    pub fn provide(self, env: R) -> Effect<(), E, A>
    where
        R: Clone + Sync,
    {
        Effect::new(move |_unit: (), token| {
            let env = env.clone();
            let this = self.clone();
            async move { this.run_with_cancellation(env, token).await }
        })
    }

    /// Transforms a successful value. Errors pass through untouched.
    pub fn map<B, F>(self, f: F) -> Effect<R, E, B>
    where
        R: Clone,
        B: Send + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move |env, token| {
            let this = self.clone();
            let f = f.clone();
            async move { this.run_with_cancellation(env, token).await.map(|a| f(a)) }
        })
    }

    /// Monadic bind: runs `self`, then runs the effect produced by `f` with
    /// the same environment and cancellation token.
    pub fn flat_map<B, F>(self, f: F) -> Effect<R, E, B>
    where
        R: Clone,
        B: Send + 'static,
        F: Fn(A) -> Effect<R, E, B> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move |env: R, token| {
            let this = self.clone();
            let f = f.clone();
            async move {
                let a = this.run_with_cancellation(env.clone(), token.clone()).await?;
                f(a).run_with_cancellation(env, token).await
            }
        })
    }

    /// Runs both effects sequentially and pairs their results.
    pub fn zip<B>(self, other: Effect<R, E, B>) -> Effect<R, E, (A, B)>
    where
        R: Clone,
        B: Send + 'static,
    {
        Effect::new(move |env: R, token| {
            let this = self.clone();
            let other = other.clone();
            async move {
                let a = this.run_with_cancellation(env.clone(), token.clone()).await?;
                let b = other.run_with_cancellation(env, token).await?;
                Ok((a, b))
            }
        })
    }
}

/// Applicative apply for effects whose value is itself a function (spec
/// §4.1's `Effect.ap`). A free function because the function lives in `A`'s
/// position of the first effect rather than as a bound on `Effect` itself.
pub fn ap<R, E, A, B>(f: Effect<R, E, Arc<dyn Fn(A) -> B + Send + Sync>>, arg: Effect<R, E, A>) -> Effect<R, E, B>
where
    R: Clone + Send + 'static,
    E: Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
{
    Effect::new(move |env: R, token| {
        let f = f.clone();
        let arg = arg.clone();
        async move {
            let func = f.run_with_cancellation(env.clone(), token.clone()).await?;
            let a = arg.run_with_cancellation(env, token).await?;
            Ok(func(a))
        }
    })
}
