use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entities::KnockEvent;

// ============================================================================
// TRIGGER CAPABILITY
// ============================================================================

/// Action run once for every completed knock sequence.
///
/// The engine awaits `invoke` before it looks at the next event, so an
/// implementation sees completions in order. Whatever it does (print, open a
/// firewall hole, run a command) is its own business; failures must be
/// handled inside the trigger, the engine never observes a result.
#[async_trait]
pub trait Trigger: Send + Sync {
    async fn invoke(&self, event: &KnockEvent);
}

/// Adapts a plain closure into a `Trigger`.
pub struct FnTrigger<F>(F);

impl<F> FnTrigger<F>
where
    F: Fn(&KnockEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Trigger for FnTrigger<F>
where
    F: Fn(&KnockEvent) + Send + Sync,
{
    async fn invoke(&self, event: &KnockEvent) {
        (self.0)(event)
    }
}

#[async_trait]
impl<T> Trigger for Arc<T>
where
    T: Trigger + ?Sized,
{
    async fn invoke(&self, event: &KnockEvent) {
        (**self).invoke(event).await
    }
}

#[async_trait]
impl<T> Trigger for Box<T>
where
    T: Trigger + ?Sized,
{
    async fn invoke(&self, event: &KnockEvent) {
        (**self).invoke(event).await
    }
}
