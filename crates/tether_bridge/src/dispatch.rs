//! Frame-synchronized message pump
//!
//! Per rendered frame the pump moves through `Idle -> Flushing ->
//! Dispatching -> Idle`. The flush phase only buffers: every inbound
//! batch is appended to an internal queue, nothing is invoked while the
//! channel is drained. The dispatch phase then drains the queue from this
//! and prior frames in arrival order and clears it unconditionally.
//!
//! Malformed input is governed by [`MalformedPolicy`]: the original
//! behavior (drop silently) stays the default, but it is configurable and
//! observable through [`DispatchStats`] rather than baked in.

use crate::envelope::Envelope;
use crate::error::{DispatchError, Result};
use crate::module::{FunctionKind, ModuleContext};
use crate::registry::ModuleRegistry;

/// Pump phase within one frame tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Between frames
    Idle,
    /// Draining the channel into the buffer
    Flushing,
    /// Draining the buffer into module calls
    Dispatching,
}

/// What to do with malformed inbound protocol data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Skip silently, log at debug level, count in [`DispatchStats`]
    #[default]
    Drop,
    /// Surface as an error from the frame pump
    Fail,
}

/// Counters making the pump's leniency observable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Calls invoked successfully
    pub dispatched: u64,
    /// Batches or calls skipped as protocol malformation
    pub dropped: u64,
}

/// Buffers inbound batches between flushes and drains them at dispatch
pub struct MessagePump {
    queue: Vec<crate::envelope::InboundBatch>,
    state: PumpState,
    policy: MalformedPolicy,
    stats: DispatchStats,
}

impl MessagePump {
    /// Create a pump with the given leniency policy
    pub fn new(policy: MalformedPolicy) -> Self {
        Self {
            queue: Vec::new(),
            state: PumpState::Idle,
            policy,
            stats: DispatchStats::default(),
        }
    }

    /// Current pump phase
    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Counters accumulated since creation
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Number of buffered batches awaiting dispatch
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Enter the flush phase
    ///
    /// The pump is not reentrant; entering while a cycle is in progress
    /// is an error.
    pub(crate) fn begin_flush(&mut self) -> Result<()> {
        if self.state != PumpState::Idle {
            return Err(crate::error::BridgeError::PumpBusy);
        }
        self.state = PumpState::Flushing;
        Ok(())
    }

    /// Return to `Idle` after an aborted cycle
    ///
    /// Buffered batches are kept; they belong to the next dispatch.
    pub(crate) fn abort(&mut self) {
        self.state = PumpState::Idle;
    }

    /// Buffer one raw inbound payload
    ///
    /// Only batch envelopes are queued; every other envelope kind is not
    /// expected on this direction and is ignored, matching the transport
    /// contract of "deliver opaque envelopes, let the consumer pick".
    pub(crate) fn buffer_raw(&mut self, raw: &str) -> std::result::Result<(), DispatchError> {
        match Envelope::from_json(raw) {
            Ok(Envelope::Batch(batch)) => {
                if !batch.is_empty() {
                    self.queue.push(batch);
                }
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => self.malformed(e),
        }
    }

    /// Drain the buffered queue through the registry in arrival order
    ///
    /// The queue is cleared unconditionally, even when a `Fail` policy
    /// aborts mid-drain. Module-level invoke failures are logged and do
    /// not stop the frame: the pump must outlive a misbehaving app.
    pub(crate) fn dispatch(
        &mut self,
        registry: &mut ModuleRegistry,
        ctx: &ModuleContext,
    ) -> std::result::Result<usize, DispatchError> {
        self.state = PumpState::Dispatching;
        let batches = std::mem::take(&mut self.queue);
        let outcome = self.drain(&batches, registry, ctx);
        self.state = PumpState::Idle;
        if let Ok(count) = outcome {
            self.stats.dispatched += count as u64;
        }
        outcome
    }

    fn drain(
        &mut self,
        batches: &[crate::envelope::InboundBatch],
        registry: &mut ModuleRegistry,
        ctx: &ModuleContext,
    ) -> std::result::Result<usize, DispatchError> {
        let mut dispatched = 0;
        for batch in batches {
            if !batch.is_well_formed() {
                self.malformed(DispatchError::ArityMismatch {
                    modules: batch.modules.len(),
                    functions: batch.functions.len(),
                    args: batch.args.len(),
                })?;
                continue;
            }
            for (module_index, function_index, args) in batch.calls() {
                let (descriptor, module) = match registry.entry_mut(module_index as usize) {
                    Some(entry) => entry,
                    None => {
                        self.malformed(DispatchError::ModuleOutOfRange(module_index))?;
                        continue;
                    }
                };
                let function = match descriptor.function(function_index as usize) {
                    Some(function) => function,
                    None => {
                        let module_name = descriptor.name.clone();
                        self.malformed(DispatchError::FunctionOutOfRange {
                            module: module_name,
                            function: function_index,
                        })?;
                        continue;
                    }
                };
                if function.kind == FunctionKind::Async && args.len() < 2 {
                    let function_name = function.name.clone();
                    self.malformed(DispatchError::MissingCallbacks {
                        function: function_name,
                    })?;
                    continue;
                }
                if let Err(e) = module.invoke(function_index as usize, args, ctx) {
                    log::error!(
                        "module '{}' function {} failed: {}",
                        descriptor.name,
                        function_index,
                        e
                    );
                    continue;
                }
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    fn malformed(&mut self, error: DispatchError) -> std::result::Result<(), DispatchError> {
        match self.policy {
            MalformedPolicy::Drop => {
                self.stats.dropped += 1;
                log::debug!("dropping malformed inbound message: {}", error);
                Ok(())
            }
            MalformedPolicy::Fail => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelEndpoint;
    use crate::envelope::InboundBatch;
    use crate::module::{ModuleDescriptor, NativeModule};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter {
        hits: Arc<AtomicUsize>,
    }

    impl NativeModule for Counter {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::builder("Counter").function("bump").build()
        }

        fn invoke(&mut self, _function: usize, _args: &[Value], _ctx: &ModuleContext) -> Result<()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fixture() -> (
        MessagePump,
        ModuleRegistry,
        ModuleContext,
        Arc<AtomicUsize>,
        ChannelEndpoint,
    ) {
        let (native, app) = ChannelEndpoint::pair();
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = ModuleRegistry::new();
        registry
            .register(Box::new(Counter { hits: hits.clone() }))
            .unwrap();
        registry.seal();
        (
            MessagePump::new(MalformedPolicy::Drop),
            registry,
            ModuleContext::new(native.sender()),
            hits,
            app,
        )
    }

    #[test]
    fn test_flush_only_buffers() {
        let (mut pump, _registry, _ctx, hits, _app) = fixture();
        pump.begin_flush().unwrap();

        let mut batch = InboundBatch::new();
        batch.push(0, 0, vec![]);
        let raw = Envelope::Batch(batch).to_json().unwrap();
        pump.buffer_raw(&raw).unwrap();

        assert_eq!(pump.queued(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queue_cleared_after_dispatch() {
        let (mut pump, mut registry, ctx, hits, _app) = fixture();
        pump.begin_flush().unwrap();

        let mut batch = InboundBatch::new();
        batch.push(0, 0, vec![json!(1)]);
        pump.buffer_raw(&Envelope::Batch(batch).to_json().unwrap())
            .unwrap();

        let dispatched = pump.dispatch(&mut registry, &ctx).unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(pump.queued(), 0);
        assert_eq!(pump.state(), PumpState::Idle);
    }

    #[test]
    fn test_reentrancy_rejected() {
        let (mut pump, _registry, _ctx, _hits, _app) = fixture();
        pump.begin_flush().unwrap();
        assert!(pump.begin_flush().is_err());
    }

    #[test]
    fn test_malformed_dropped_and_counted() {
        let (mut pump, mut registry, ctx, hits, _app) = fixture();
        pump.begin_flush().unwrap();

        // Arity mismatch: two module indices, one function index.
        pump.buffer_raw(r#"{"cmd":"batch","modules":[0,0],"functions":[0],"args":[[],[]]}"#)
            .unwrap();
        // Module index out of range.
        pump.buffer_raw(r#"{"cmd":"batch","modules":[9],"functions":[0],"args":[[]]}"#)
            .unwrap();
        // Undecodable payload.
        pump.buffer_raw("garbage").unwrap();

        pump.dispatch(&mut registry, &ctx).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(pump.stats().dropped, 3);
        assert_eq!(pump.stats().dispatched, 0);
    }

    #[test]
    fn test_fail_policy_surfaces_malformation() {
        let (_, mut registry, ctx, _hits, _app) = fixture();
        let mut pump = MessagePump::new(MalformedPolicy::Fail);
        pump.begin_flush().unwrap();
        pump.buffer_raw(r#"{"cmd":"batch","modules":[9],"functions":[0],"args":[[]]}"#)
            .unwrap();

        assert!(matches!(
            pump.dispatch(&mut registry, &ctx),
            Err(DispatchError::ModuleOutOfRange(9))
        ));
        // Cleared even though the drain aborted.
        assert_eq!(pump.queued(), 0);
        assert_eq!(pump.state(), PumpState::Idle);
    }
}
