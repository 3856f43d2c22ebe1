//! Single-threaded promise returned by the session verbs
//!
//! A [`Promise`] settles when the session drains the engine completion for
//! its operation. It can be awaited on a local executor or polled with
//! [`Promise::try_take`] from a hand-written loop.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{Error, Result};

struct Slot<T> {
    result: Option<Result<T>>,
    settled: bool,
    waker: Option<Waker>,
}

pub struct Promise<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Settling side of a [`Promise`]; the first settle wins
pub(crate) struct Resolver<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

pub(crate) fn pair<T>() -> (Promise<T>, Resolver<T>) {
    let slot = Rc::new(RefCell::new(Slot {
        result: None,
        settled: false,
        waker: None,
    }));
    (Promise { slot: slot.clone() }, Resolver { slot })
}

impl<T> Resolver<T> {
    fn settle(&self, result: Result<T>) {
        let waker = {
            let mut slot = self.slot.borrow_mut();
            if slot.settled {
                return;
            }
            slot.settled = true;
            slot.result = Some(result);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    pub(crate) fn reject(&self, error: Error) {
        self.settle(Err(error));
    }
}

impl<T> Promise<T> {
    /// Whether the operation has completed (even if the result was taken)
    pub fn is_settled(&self) -> bool {
        self.slot.borrow().settled
    }

    /// Take the result if it is available
    ///
    /// Returns `None` while the operation is in flight, and again after the
    /// result has been taken once.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        self.slot.borrow_mut().result.take()
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match slot.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_settle_wins() {
        let (mut promise, resolver) = pair::<u32>();
        assert!(!promise.is_settled());
        assert!(promise.try_take().is_none());

        resolver.resolve(7);
        resolver.clone().reject(Error::SessionClosed);

        assert!(promise.is_settled());
        assert_eq!(promise.try_take().unwrap().unwrap(), 7);
        assert!(promise.try_take().is_none());
        assert!(promise.is_settled());
    }

    #[test]
    fn test_dropped_resolver_leaves_promise_pending() {
        let (promise, resolver) = pair::<()>();
        drop(resolver);
        assert!(!promise.is_settled());
    }
}
