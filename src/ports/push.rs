use crate::types::push::Subscription;

pub trait PushSender: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    /// Delivers an already serialized payload to one endpoint.
    fn send<'a>(&'a self, subscription: &'a Subscription, payload: &'a str) -> Self::Fut<'a>;
}
