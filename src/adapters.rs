use std::pin::Pin;
use std::sync::Arc;

use time::{OffsetDateTime, UtcOffset};

use crate::ports;
use crate::types::push::{Subscription, VapidConfig};

/// System clock shifted into the offset resolved at startup.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: UtcOffset,
}

impl LocalClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl ports::TimeProvider for LocalClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
        })
    }
}

impl ports::PushSender for WebPushSender {
    type Error = web_push::WebPushError;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a Subscription, payload: &'a str) -> Self::Fut<'a> {
        Box::pin(async move {
            let subscription_info = web_push::SubscriptionInfo::new(
                subscription.endpoint.clone(),
                subscription.keys.p256dh.clone(),
                subscription.keys.auth.clone(),
            );
            let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
            builder.set_payload(web_push::ContentEncoding::Aes128Gcm, payload.as_bytes());
            let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
                &self.vapid.private_key,
                web_push::URL_SAFE_NO_PAD,
                &subscription_info,
            )?;
            signature_builder.add_claim("sub", self.vapid.subject.as_str());
            builder.set_vapid_signature(signature_builder.build()?);
            self.client.send(builder.build()?).await?;
            Ok(())
        })
    }
}
