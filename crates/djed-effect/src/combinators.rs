use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};

use djed_result::Semigroup;

use crate::backoff::RetryPolicy;
use crate::effect::Effect;
use crate::error::EffectError;

impl<R, E, A> Effect<R, E, A>
where
    R: Clone + Send + 'static,
    E: Send + 'static,
    A: Send + 'static,
{
    /// Fails with [`EffectError::Timeout`] if `self` has not resolved within
    /// `duration`, cancelling the inner run (spec §4.2).
    pub fn timeout(self, duration: Duration) -> Effect<R, EffectError<E>, A> {
        Effect::new(move |env, token| {
            let this = self.clone();
            let inner_token = token.child_token();
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        inner_token.cancel();
                        Err(EffectError::Cancelled)
                    }
                    result = this.run_with_cancellation(env, inner_token.clone()) => {
                        result.map_err(EffectError::Failure)
                    }
                    _ = tokio::time::sleep(duration) => {
                        inner_token.cancel();
                        Err(EffectError::Timeout)
                    }
                }
            }
        })
    }

    /// Re-runs `self` up to `policy.attempts` times, sleeping between
    /// attempts per `policy.delay_for_attempt` (spec §4.3). Gives up and
    /// returns the last failure, wrapped in [`EffectError::Failure`], once
    /// attempts are exhausted.
    pub fn retry(self, policy: RetryPolicy) -> Effect<R, EffectError<E>, A>
    where
        E: Clone,
    {
        Effect::new(move |env: R, token| {
            let this = self.clone();
            let policy = policy.clone();
            async move {
                let mut attempt = 1;
                loop {
                    if token.is_cancelled() {
                        return Err(EffectError::Cancelled);
                    }
                    match this.run_with_cancellation(env.clone(), token.clone()).await {
                        Ok(value) => return Ok(value),
                        Err(error) => {
                            if attempt >= policy.attempts {
                                return Err(EffectError::Failure(error));
                            }
                            let delay = policy.delay_for_attempt(attempt);
                            tokio::select! {
                                _ = token.cancelled() => return Err(EffectError::Cancelled),
                                _ = tokio::time::sleep(delay) => {}
                            }
                            attempt += 1;
                        }
                    }
                }
            }
        })
    }
}

/// Runs every effect in `effects` concurrently and resolves with the first
/// to succeed, cancelling the rest. If all fail, combines their errors via
/// [`Semigroup`] (spec §4.4).
pub fn race<R, E, A>(effects: Vec<Effect<R, E, A>>) -> Effect<R, EffectError<E>, A>
where
    R: Clone + Send + Sync + 'static,
    E: Semigroup + Clone + Send + 'static,
    A: Send + 'static,
{
    Effect::new(move |env: R, token| {
        let effects = effects.clone();
        async move {
            if effects.is_empty() {
                return Err(EffectError::Cancelled);
            }
            let group = token.child_token();
            let mut handles = Vec::with_capacity(effects.len());
            for effect in effects {
                let env = env.clone();
                let child = group.child_token();
                handles.push(tokio::spawn(async move {
                    effect.run_with_cancellation(env, child).await
                }));
            }

            let mut errors: Option<E> = None;
            let mut remaining = handles.len();
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            for handle in handles {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(handle.await);
                });
            }
            drop(tx);

            while let Some(joined) = rx.recv().await {
                remaining -= 1;
                match joined {
                    Ok(Ok(value)) => {
                        group.cancel();
                        return Ok(value);
                    }
                    Ok(Err(error)) => {
                        errors = Some(match errors {
                            Some(acc) => acc.combine(error),
                            None => error,
                        });
                    }
                    Err(_join_error) => {}
                }
                if remaining == 0 {
                    break;
                }
            }
            group.cancel();
            match errors {
                Some(error) => Err(EffectError::Failure(error)),
                None => Err(EffectError::Cancelled),
            }
        }
    })
}

/// Runs every effect in `xs` with at most `n` running concurrently,
/// preserving input order in the result (spec §4.4). On the first failure,
/// cancels not-yet-started peers; already-running peers are left to finish
/// and their errors are folded in via [`Semigroup`].
pub fn parallel<R, E, A>(n: usize, xs: Vec<Effect<R, E, A>>) -> Effect<R, EffectError<E>, Vec<A>>
where
    R: Clone + Send + Sync + 'static,
    E: Semigroup + Clone + Send + 'static,
    A: Send + 'static + std::fmt::Debug,
{
    Effect::new(move |env: R, token| {
        let xs = xs.clone();
        async move {
            let total = xs.len();
            let slots = Arc::new(Semaphore::new(n.max(1)));
            let results: Arc<Mutex<Vec<Option<A>>>> = Arc::new(Mutex::new((0..total).map(|_| None).collect()));
            let errors: Arc<Mutex<Option<E>>> = Arc::new(Mutex::new(None));

            let mut handles = Vec::with_capacity(total);
            for (index, effect) in xs.into_iter().enumerate() {
                let env = env.clone();
                let token = token.clone();
                let slots = slots.clone();
                let results = results.clone();
                let errors = errors.clone();
                handles.push(tokio::spawn(async move {
                    if token.is_cancelled() {
                        return;
                    }
                    let Ok(_permit) = slots.acquire().await else { return };
                    if token.is_cancelled() {
                        return;
                    }
                    match effect.run_with_cancellation(env, token.clone()).await {
                        Ok(value) => {
                            results.lock().await[index] = Some(value);
                        }
                        Err(error) => {
                            let mut guard = errors.lock().await;
                            *guard = Some(match guard.take() {
                                Some(acc) => acc.combine(error),
                                None => error,
                            });
                            token.cancel();
                        }
                    }
                }));
            }
            for handle in handles {
                let _ = handle.await;
            }

            if let Some(error) = Arc::try_unwrap(errors).ok().and_then(|m| m.into_inner()) {
                return Err(EffectError::Failure(error));
            }
            if token.is_cancelled() {
                return Err(EffectError::Cancelled);
            }
            let values = Arc::try_unwrap(results)
                .expect("all spawned tasks have joined")
                .into_inner();
            Ok(values.into_iter().map(|v| v.expect("every slot filled when no error recorded")).collect())
        }
    })
}
