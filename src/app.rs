use async_trait::async_trait;
use std::sync::Arc;

pub mod bootstrap;
pub mod common;
pub mod flow_store;
pub mod graph;
pub mod processor;
pub mod reactive;
pub mod resolver;
pub mod rules;

#[async_trait]
pub trait App: Sync + Send + 'static {
    #[allow(non_upper_case_globals)]
    const Name: &'static str;

    /// Completes when the app has been stopped.
    async fn run(&self);
}

#[async_trait]
impl<T> App for Arc<T>
where
    T: App,
{
    #[allow(non_upper_case_globals)]
    const Name: &'static str = T::Name;

    async fn run(&self) {
        self.as_ref().run().await;
    }
}
