//! Running effects without a store.
//!
//! [`effect_stream`] flattens any [`Effect`] into one stream of the actions
//! it would dispatch. Parallel branches are interleaved as they complete,
//! sequential steps run one after another, and a cancellable branch stops
//! as soon as its signal fires.

use futures::stream::{self, BoxStream, StreamExt};
use rexlist_core::effect::Effect;
use std::time::Duration;

/// Flatten an effect into the stream of actions it produces
pub fn effect_stream<A>(effect: Effect<A>) -> BoxStream<'static, A>
where
    A: Send + 'static,
{
    match effect {
        Effect::None => stream::empty().boxed(),
        Effect::Future(fut) => stream::once(fut).filter_map(futures::future::ready).boxed(),
        Effect::Delay { duration, action } => stream::once(async move {
            tokio::time::sleep(duration).await;
            *action
        })
        .boxed(),
        Effect::Parallel(effects) => {
            stream::select_all(effects.into_iter().map(effect_stream)).boxed()
        },
        Effect::Sequential(effects) => stream::iter(effects).flat_map(effect_stream).boxed(),
        Effect::Stream(inner) => inner,
        Effect::Cancellable { signal, effect } => {
            if signal.is_cancelled() {
                return stream::empty().boxed();
            }
            effect_stream(*effect)
                .take_until(async move { signal.cancelled().await })
                .boxed()
        },
    }
}

/// Every action a finite effect produces, in emission order
///
/// Never returns for an effect wrapping an endless stream; use
/// [`take_actions`] for those.
pub async fn collect_actions<A>(effect: Effect<A>) -> Vec<A>
where
    A: Send + 'static,
{
    effect_stream(effect).collect().await
}

/// Up to `n` actions, giving up once no action arrives within `wait`
pub async fn take_actions<A>(effect: Effect<A>, n: usize, wait: Duration) -> Vec<A>
where
    A: Send + 'static,
{
    let mut actions = effect_stream(effect);
    let mut taken = Vec::with_capacity(n);

    while taken.len() < n {
        match tokio::time::timeout(wait, actions.next()).await {
            Ok(Some(action)) => taken.push(action),
            Ok(None) | Err(_) => break,
        }
    }

    taken
}
