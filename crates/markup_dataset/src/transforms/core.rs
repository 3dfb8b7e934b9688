use anyhow::{Context, Result};
use std::marker::PhantomData;

/// A single preprocessing step from `I` to `O`.
///
/// Steps compose with [`then`](Transform::then) into a [`Chain`]. Both image pipelines are
/// built this way, so a failure anywhere in a pipeline surfaces as one error naming the steps
/// it passed through.
///
/// `then()` needs a concrete (`Sized`) receiver whose output type matches the next step's
/// input. Boxed pipelines still implement `Transform` and can be stored behind
/// `Box<dyn Transform<I, O>>`.
pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain::new(self, next)
    }
}

impl<I, O> Transform<I, O> for Box<dyn Transform<I, O>> {
    fn apply(&self, input: I) -> Result<O> {
        (**self).apply(input)
    }
}

/// Two transforms run back to back (`A` then `B`). `M` is the type handed between them.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        let mid = self.first.apply(input).with_context(|| {
            format!("Transform step failed: {}", short_type_name::<A>())
        })?;
        self.second.apply(mid).with_context(|| {
            format!("Transform step failed: {}", short_type_name::<B>())
        })
    }
}

/// `markup_dataset::transforms::vision::color::ToGray` -> `ToGray`
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
