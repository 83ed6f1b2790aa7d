use crate::event::PacketContext;
use crate::util::publisher::Subscription;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[async_trait]
pub trait PacketProcessor: 'static + Send + Sync {
    /// Implementations check [PacketContext::is_handled] themselves.
    async fn process(&self, context: &mut PacketContext);
}

struct Entry {
    priority: u8,
    id: u64,
    name: &'static str,
    processor: Arc<dyn PacketProcessor>,
}

/// Processors ordered by descending priority. Equal priorities keep
/// registration order.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: Arc<RwLock<Vec<Entry>>>,
    next_id: Arc<AtomicU64>,
}

impl ProcessorChain {
    pub fn new() -> ProcessorChain {
        Default::default()
    }

    pub fn add(
        &self,
        priority: u8,
        name: &'static str,
        processor: Arc<dyn PacketProcessor>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut processors = self.processors.write();
            let index = processors
                .iter()
                .position(|e| priority > e.priority)
                .unwrap_or_else(|| processors.len());
            processors.insert(
                index,
                Entry {
                    priority,
                    id,
                    name,
                    processor,
                },
            );
        }
        let processors = Arc::downgrade(&self.processors);
        Subscription::new(move || {
            if let Some(processors) = processors.upgrade() {
                processors.write().retain(|e| e.id != id);
            }
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.read().iter().map(|e| e.name).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.read().is_empty()
    }

    /// Offers the packet to every processor and returns it with its final
    /// handled flag.
    pub async fn process(&self, mut context: PacketContext) -> PacketContext {
        let snapshot: Vec<(&'static str, Arc<dyn PacketProcessor>)> = self
            .processors
            .read()
            .iter()
            .map(|e| (e.name, e.processor.clone()))
            .collect();
        for (name, processor) in snapshot {
            let before = context.is_handled();
            processor.process(&mut context).await;
            if !before && context.is_handled() {
                debug!(target: "l3reactive", "packet from {:?} handled by {}", context.from, name);
            }
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::{ConnectPoint, DeviceID};
    use bytes::Bytes;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        handles: bool,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl PacketProcessor for Recorder {
        async fn process(&self, context: &mut PacketContext) {
            if context.is_handled() {
                return;
            }
            self.seen.lock().push(self.name);
            if self.handles {
                context.set_handled();
            }
        }
    }

    fn context() -> PacketContext {
        PacketContext::new(
            Bytes::from_static(&[0u8; 14]),
            ConnectPoint {
                device: DeviceID(1),
                port: 1,
            },
        )
    }

    #[tokio::test]
    async fn higher_priority_first_and_handled_stops_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = ProcessorChain::new();
        let recorder = |name: &'static str, handles: bool| -> Arc<dyn PacketProcessor> {
            Arc::new(Recorder {
                name,
                handles,
                seen: seen.clone(),
            })
        };
        let _low = chain.add(1, "low", recorder("low", false));
        let _high = chain.add(5, "high", recorder("high", false));
        let _mid = chain.add(2, "mid", recorder("mid", true));
        assert_eq!(chain.names(), vec!["high", "mid", "low"]);

        let context = chain.process(context()).await;
        assert!(context.is_handled());
        assert_eq!(*seen.lock(), vec!["high", "mid"]);
    }

    #[tokio::test]
    async fn dropping_registration_removes_processor() {
        let chain = ProcessorChain::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registration = chain.add(
            2,
            "only",
            Arc::new(Recorder {
                name: "only",
                handles: false,
                seen: seen.clone(),
            }),
        );
        assert_eq!(chain.len(), 1);
        drop(registration);
        assert!(chain.is_empty());
        chain.process(context()).await;
        assert!(seen.lock().is_empty());
    }
}
