use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[async_trait]
pub trait Handler<E>: 'static + Send + Sync {
    async fn handle(&self, event: E);
}

/// Releases a registration when dropped.
#[must_use = "the registration is released as soon as the subscription is dropped"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Subscription
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

pub struct Publisher<E> {
    handlers: RwLock<Vec<(u64, Arc<dyn Handler<E>>)>>,
    next_id: AtomicU64,
}

impl<E> Default for Publisher<E> {
    fn default() -> Self {
        Publisher {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<E> Publisher<E>
where
    E: Clone + Send + 'static,
{
    pub async fn emit(&self, event: E) {
        let handlers: Vec<_> = self.handlers.read().iter().map(|(_, h)| h.clone()).collect();
        for x in handlers {
            x.handle(event.clone()).await;
        }
    }

    pub fn subscribe(self: &Arc<Self>, handler: Arc<dyn Handler<E>>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().push((id, handler));
        let publisher: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(publisher) = publisher.upgrade() {
                publisher.handlers.write().retain(|(i, _)| *i != id);
            }
        })
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    #[async_trait]
    impl Handler<u32> for Counter {
        async fn handle(&self, event: u32) {
            self.0.fetch_add(event as usize, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dropped_subscription_stops_delivery() {
        let publisher = Arc::new(Publisher::<u32>::default());
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let subscription = publisher.subscribe(counter.clone());
        publisher.emit(2).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        drop(subscription);
        assert_eq!(publisher.handler_count(), 0);
        publisher.emit(5).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscription_outliving_publisher_is_harmless() {
        let publisher = Arc::new(Publisher::<u32>::default());
        let subscription = publisher.subscribe(Arc::new(Counter(AtomicUsize::new(0))));
        drop(publisher);
        subscription.cancel();
    }
}
