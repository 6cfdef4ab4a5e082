use std::sync::Arc;

use djed_result::Semigroup;

use crate::effect::Effect;
use crate::error::EffectError;

/// Acquire-use-release (spec §4.1, §8). `release` always runs once `acquire`
/// succeeds, regardless of whether `use_fn` fails. Nested brackets get
/// correct reverse-acquisition-order releases for free: an outer bracket's
/// `use_fn` is itself built from an inner `bracket` call, so the inner
/// release has already resolved by the time the inner `use_fn`'s effect
/// hands control back to the outer release.
pub fn bracket<R, E, Res, A>(
    acquire: Effect<R, E, Res>,
    use_fn: impl Fn(Res) -> Effect<R, E, A> + Send + Sync + 'static,
    release: impl Fn(Res) -> Effect<R, E, ()> + Send + Sync + 'static,
) -> Effect<R, EffectError<E>, A>
where
    R: Clone + Send + Sync + 'static,
    E: Semigroup + Clone + Send + 'static,
    Res: Clone + Send + 'static,
    A: Send + 'static,
{
    let use_fn = Arc::new(use_fn);
    let release = Arc::new(release);
    Effect::new(move |env: R, token| {
        let acquire = acquire.clone();
        let use_fn = use_fn.clone();
        let release = release.clone();
        async move {
            let resource = match acquire.run_with_cancellation(env.clone(), token.clone()).await {
                Ok(resource) => resource,
                Err(error) => return Err(EffectError::Failure(error)),
            };
            let use_outcome = use_fn(resource.clone())
                .run_with_cancellation(env.clone(), token.clone())
                .await;
            let release_outcome = release(resource).run_with_cancellation(env, token).await;
            match (use_outcome, release_outcome) {
                (Ok(value), Ok(())) => Ok(value),
                (Ok(_), Err(release_error)) => Err(EffectError::Failure(release_error)),
                (Err(use_error), Ok(())) => Err(EffectError::Failure(use_error)),
                (Err(use_error), Err(release_error)) => {
                    Err(EffectError::Failure(use_error.combine(release_error)))
                }
            }
        }
    })
}
