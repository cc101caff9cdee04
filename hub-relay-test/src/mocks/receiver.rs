#![allow(non_snake_case)]

use mockall::*;
use parking_lot::Mutex;

use hub_relay_core::{CollaboratorError, CrossChainContext, MessageReceiver};

/// A call observed by a [`RecordingReceiver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCall {
    /// Context of the call
    pub ctx: CrossChainContext,
    /// Call data
    pub data: Vec<u8>,
}

/// Target failed on purpose
#[derive(Debug, thiserror::Error)]
#[error("receiver reverted: {0}")]
pub struct Reverted(pub String);

/// A receiver remembering every successful call, able to revert on demand.
#[derive(Debug, Default)]
pub struct RecordingReceiver {
    calls: Mutex<Vec<ReceivedCall>>,
    revert_with: Mutex<Option<String>>,
}

impl RecordingReceiver {
    /// A receiver accepting every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject following calls with `reason`, or accept them again with `None`
    pub fn set_revert(&self, reason: Option<&str>) {
        *self.revert_with.lock() = reason.map(str::to_owned);
    }

    /// Accepted calls in order
    pub fn calls(&self) -> Vec<ReceivedCall> {
        self.calls.lock().clone()
    }

    /// The most recent accepted call
    pub fn last(&self) -> Option<ReceivedCall> {
        self.calls.lock().last().cloned()
    }

    /// Number of accepted calls
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl MessageReceiver for RecordingReceiver {
    fn receive_message(&self, ctx: &CrossChainContext, data: &[u8]) -> Result<(), CollaboratorError> {
        if let Some(reason) = self.revert_with.lock().clone() {
            return Err(Box::new(Reverted(reason)));
        }
        self.calls.lock().push(ReceivedCall {
            ctx: *ctx,
            data: data.to_vec(),
        });
        Ok(())
    }
}

mock! {
    pub MessageReceiver {
        pub fn _receive_message(
            &self,
            ctx: &CrossChainContext,
            data: &[u8],
        ) -> Result<(), CollaboratorError> {}
    }
}

impl std::fmt::Debug for MockMessageReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockMessageReceiver")
    }
}

impl MessageReceiver for MockMessageReceiver {
    fn receive_message(&self, ctx: &CrossChainContext, data: &[u8]) -> Result<(), CollaboratorError> {
        self._receive_message(ctx, data)
    }
}
