//! Bridge context
//!
//! One `BridgeContext` per hosted app session. It owns the native end of
//! the message channel, the module registry, the frame pump, and the
//! event router, and is passed by reference wherever the session is
//! needed; there is no global state.
//!
//! Order of use:
//! 1. construct with a channel endpoint and a [`BridgeConfig`],
//! 2. register modules,
//! 3. `init` with the bundle location (generates and sends the module
//!    contract, after which registration is rejected),
//! 4. `create_root`, then call `frame` once per rendered frame,
//! 5. `update_root` / `destroy_root` as needed,
//! 6. `shutdown`.

use std::collections::HashMap;

use serde_json::{json, Value};
use url::Url;

use crate::channel::ChannelEndpoint;
use crate::dispatch::{DispatchStats, MalformedPolicy, MessagePump, PumpState};
use crate::envelope::Envelope;
use crate::error::{BridgeError, Result};
use crate::events::{EventRouter, HitClass};
use crate::module::{FrameTick, ModuleContext, NativeModule};
use crate::registry::ModuleRegistry;
use crate::scene::{NodeId, SceneGraph, SceneIndex, Tag};

/// Spacing between consecutive root handles
pub const ROOT_TAG_STRIDE: u32 = 10;

/// App-side module receiving root lifecycle calls
pub const APP_REGISTRY: &str = "AppRegistry";

/// Function mounting or updating a root view
pub const RUN_APPLICATION: &str = "runApplication";

/// Function unmounting a root view
pub const UNMOUNT_ROOT: &str = "unmountApplicationComponentAtRootTag";

/// App-side module activating live reload
pub const HMR_CLIENT: &str = "HMRClient";

/// Function activating live reload
pub const HMR_ENABLE: &str = "enable";

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Send the live-reload activation call after the bundle envelope
    pub hot_reload: bool,
    /// Leniency policy for malformed inbound protocol data
    pub malformed: MalformedPolicy,
}

/// Outcome of one frame tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame counter after this tick
    pub frame: u64,
    /// Calls dispatched this tick
    pub dispatched: usize,
}

/// Native side of one hosted app session
pub struct BridgeContext {
    channel: ChannelEndpoint,
    registry: ModuleRegistry,
    pump: MessagePump,
    router: EventRouter,
    module_ctx: ModuleContext,
    config: BridgeConfig,
    initialized: bool,
    frame: u64,
    next_root_tag: u32,
    root_modules: HashMap<Tag, String>,
    /// Transform anchor per root; `None` marks a root whose transform
    /// feature was disabled after an ownership conflict.
    root_anchors: HashMap<Tag, Option<NodeId>>,
    root_transforms: HashMap<Tag, [f32; 16]>,
}

impl BridgeContext {
    /// Create a context over the native end of a channel
    pub fn new(channel: ChannelEndpoint, config: BridgeConfig) -> Self {
        let module_ctx = ModuleContext::new(channel.sender());
        Self {
            channel,
            registry: ModuleRegistry::new(),
            pump: MessagePump::new(config.malformed),
            router: EventRouter::new(),
            module_ctx,
            config,
            initialized: false,
            frame: 0,
            next_root_tag: 1,
            root_modules: HashMap::new(),
            root_anchors: HashMap::new(),
            root_transforms: HashMap::new(),
        }
    }

    /// Register a native module; allowed only before `init`
    pub fn register_module(&mut self, module: Box<dyn NativeModule>) -> Result<()> {
        self.registry.register(module)
    }

    /// Send the startup handshake
    ///
    /// Seals the registry, then sends the `moduleConfig` envelope followed
    /// by the `bundle` envelope. With `hot_reload` set, a follow-up
    /// `HMRClient.enable` call derived from the bundle URL activates live
    /// reload.
    pub fn init(&mut self, bundle: &str) -> Result<()> {
        if self.initialized {
            return Err(BridgeError::AlreadyInitialized);
        }
        self.registry.seal();
        self.channel.send(&Envelope::ModuleConfig {
            modules: self.registry.describe(),
        })?;
        self.channel.send(&Envelope::Bundle {
            path: bundle.to_string(),
        })?;
        if self.config.hot_reload {
            log::warn!("live reload enabled for {}", bundle);
            self.channel
                .sender()
                .call_function(HMR_CLIENT, HMR_ENABLE, hmr_args(bundle)?)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Whether `init` completed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Mount an app as a new root view
    ///
    /// Returns the root handle; handles start at 1 and increase by
    /// [`ROOT_TAG_STRIDE`] per creation. A transform anchor node is
    /// created in the scene graph for the root.
    pub fn create_root(
        &mut self,
        module: &str,
        props: Value,
        scene: &mut dyn SceneGraph,
    ) -> Result<Tag> {
        if !self.initialized {
            return Err(BridgeError::NotInitialized);
        }
        let tag = Tag(self.next_root_tag);
        self.next_root_tag += ROOT_TAG_STRIDE;

        self.channel.send(&Envelope::exec(
            APP_REGISTRY,
            RUN_APPLICATION,
            run_application_args(module, props, tag),
        ))?;

        self.root_modules.insert(tag, module.to_string());
        let anchor = scene.create_node();
        self.root_anchors.insert(tag, Some(anchor));
        log::debug!("created root {} for module '{}'", tag, module);
        Ok(tag)
    }

    /// Re-send a root's props
    pub fn update_root(&mut self, tag: Tag, props: Value) -> Result<()> {
        let module = self
            .root_modules
            .get(&tag)
            .ok_or(BridgeError::UnknownRoot(tag))?
            .clone();
        self.channel.send(&Envelope::exec(
            APP_REGISTRY,
            RUN_APPLICATION,
            run_application_args(&module, props, tag),
        ))
    }

    /// Unmount a root view
    ///
    /// The anchor's children are detached before the handle is discarded,
    /// then the unmount call is sent.
    pub fn destroy_root(&mut self, tag: Tag, scene: &mut dyn SceneGraph) -> Result<()> {
        if self.root_modules.remove(&tag).is_none() {
            return Err(BridgeError::UnknownRoot(tag));
        }
        if let Some(Some(anchor)) = self.root_anchors.remove(&tag) {
            scene.detach_children(anchor);
            scene.remove_node(anchor);
        }
        self.root_transforms.remove(&tag);
        self.channel.send(&Envelope::exec(
            APP_REGISTRY,
            UNMOUNT_ROOT,
            vec![json!(tag)],
        ))
    }

    /// Record the transform a root wants applied to its anchor
    ///
    /// Typically driven by a scene-level view adapter; applied during
    /// `frame` for the active root.
    pub fn set_root_transform(&mut self, tag: Tag, matrix: [f32; 16]) {
        self.root_transforms.insert(tag, matrix);
    }

    /// Drop a root's recorded transform
    pub fn clear_root_transform(&mut self, tag: Tag) {
        self.root_transforms.remove(&tag);
    }

    /// Service one frame tick
    ///
    /// Issues exactly one `flush`, buffers everything the channel holds,
    /// drains the buffered queue through the registry, runs per-module
    /// frame hooks, and applies the active root's transform.
    pub fn frame(
        &mut self,
        time_ms: f64,
        root: Tag,
        scene: &mut dyn SceneGraph,
    ) -> Result<FrameReport> {
        self.pump.begin_flush()?;
        let dispatched = match self.pump_cycle() {
            Ok(count) => count,
            Err(e) => {
                self.pump.abort();
                return Err(e);
            }
        };

        self.frame += 1;
        let tick = FrameTick {
            frame: self.frame,
            time_ms,
        };
        self.registry.frame_all(&tick, &self.module_ctx);

        self.apply_root_transform(root, scene);

        Ok(FrameReport {
            frame: self.frame,
            dispatched,
        })
    }

    /// Flush, buffer, and dispatch; any error aborts the cycle
    fn pump_cycle(&mut self) -> Result<usize> {
        self.channel.send(&Envelope::Flush)?;
        while let Some(raw) = self.channel.try_recv_raw() {
            self.pump.buffer_raw(&raw)?;
        }
        Ok(self.pump.dispatch(&mut self.registry, &self.module_ctx)?)
    }

    /// Record a new hit for an interaction class
    ///
    /// Forwards to the event router with this session's outbound sender;
    /// returns the number of envelopes emitted.
    pub fn update_hit(
        &mut self,
        scene: &dyn SceneIndex,
        class: HitClass,
        hit: Option<NodeId>,
    ) -> Result<usize> {
        self.router.update_hit(scene, class, hit, &self.module_ctx)
    }

    /// Dispatch the exit pair for a view losing focus
    pub fn focus_lost(
        &self,
        scene: &dyn SceneIndex,
        class: HitClass,
        view: NodeId,
        target: Option<NodeId>,
    ) -> Result<usize> {
        EventRouter::focus_lost(scene, class, view, target, &self.module_ctx)
    }

    /// Dispatch the enter pair for a view gaining focus
    pub fn focus_gained(
        &self,
        scene: &dyn SceneIndex,
        class: HitClass,
        view: NodeId,
        target: Option<NodeId>,
    ) -> Result<usize> {
        EventRouter::focus_gained(scene, class, view, target, &self.module_ctx)
    }

    /// Send a named exec call to the app context
    pub fn call_function(&self, module: &str, function: &str, args: Vec<Value>) -> Result<()> {
        self.module_ctx.call_function(module, function, args)
    }

    /// Resolve or reject a remote callback by id
    pub fn invoke_callback(&self, id: u64, args: Vec<Value>) -> Result<()> {
        self.module_ctx.invoke_callback(id, args)
    }

    /// Run every module's shutdown hook
    ///
    /// The context cannot be re-initialized afterwards.
    pub fn shutdown(&mut self) {
        self.registry.shutdown_all();
    }

    /// Dispatch counters for this session
    pub fn stats(&self) -> DispatchStats {
        self.pump.stats()
    }

    /// Current pump phase
    pub fn pump_state(&self) -> PumpState {
        self.pump.state()
    }

    /// Apply the recorded transform of `root` to its anchor
    ///
    /// The camera is parented under the anchor on first application so
    /// its own local transform stays untouched. A camera that already has
    /// a foreign parent is not ours to move: log a warning and disable
    /// the feature for this root permanently.
    fn apply_root_transform(&mut self, root: Tag, scene: &mut dyn SceneGraph) {
        let matrix = match self.root_transforms.get(&root) {
            Some(matrix) => *matrix,
            None => return,
        };
        let slot = match self.root_anchors.get_mut(&root) {
            Some(slot) => slot,
            None => return,
        };
        let anchor = match *slot {
            Some(anchor) => anchor,
            // Disabled after a previous conflict.
            None => return,
        };

        let camera = scene.camera();
        match scene.parent_of(camera) {
            Some(parent) if parent != anchor => {
                log::warn!(
                    "camera already has a parent; root {} transform will have no effect",
                    root
                );
                *slot = None;
                return;
            }
            Some(_) => {}
            None => scene.attach(anchor, camera),
        }
        scene.set_local_matrix(anchor, matrix);
    }
}

fn run_application_args(module: &str, props: Value, tag: Tag) -> Vec<Value> {
    vec![
        json!(module),
        json!({ "initialProps": props, "rootTag": tag }),
    ]
}

fn hmr_args(bundle: &str) -> Result<Vec<Value>> {
    let parsed = Url::parse(bundle).map_err(|e| BridgeError::InvalidBundleUrl {
        url: bundle.to_string(),
        message: e.to_string(),
    })?;
    let port = match parsed.port_or_known_default() {
        Some(port) => json!(port),
        None => Value::Null,
    };
    Ok(vec![
        json!(parsed.scheme()),
        json!(parsed.path().trim_start_matches('/')),
        json!(parsed.host_str().unwrap_or_default()),
        port,
    ])
}
