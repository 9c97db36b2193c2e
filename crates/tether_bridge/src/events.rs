//! Scene interaction event routing
//!
//! Raw focus and hover changes from the scene are reduced to a single
//! logical target and forwarded to the app context as exec envelopes
//! addressed to the fixed `EventEmitter.receiveEvent` pair. Two
//! interaction classes are tracked independently: continuous passive
//! focus ("gaze") and explicit device hits ("pointer").
//!
//! Routing walks the hit object's ownership chain upward until a node
//! carrying a routable tag is found; untagged nodes are transparent. A
//! hit with no routable ancestor emits nothing.

use serde_json::{json, Value};

use crate::error::Result;
use crate::module::ModuleContext;
use crate::scene::{NodeId, SceneIndex, Tag};

/// Module the router addresses on the app side
pub const EVENT_EMITTER: &str = "EventEmitter";

/// Function the router addresses on the app side
pub const RECEIVE_EVENT: &str = "receiveEvent";

/// Interaction class of a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitClass {
    /// Continuous passive focus
    Gaze,
    /// Explicit device hit
    Pointer,
}

impl HitClass {
    fn enter_event(self) -> &'static str {
        match self {
            Self::Gaze => "gazeEnter",
            Self::Pointer => "pointerEnter",
        }
    }

    fn exit_event(self) -> &'static str {
        match self {
            Self::Gaze => "gazeExit",
            Self::Pointer => "pointerExit",
        }
    }
}

/// Reduces raw hit changes into enter/exit call envelopes
pub struct EventRouter {
    last_gaze: Option<NodeId>,
    last_pointer: Option<NodeId>,
}

impl EventRouter {
    /// Create a router with no remembered hits
    pub fn new() -> Self {
        Self {
            last_gaze: None,
            last_pointer: None,
        }
    }

    /// Most recent hit remembered for a class
    pub fn last_hit(&self, class: HitClass) -> Option<NodeId> {
        match class {
            HitClass::Gaze => self.last_gaze,
            HitClass::Pointer => self.last_pointer,
        }
    }

    /// Walk the ownership chain to the nearest routable tag
    pub fn routable_target(scene: &dyn SceneIndex, node: NodeId) -> Option<Tag> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if let Some(tag) = scene.tag_of(candidate) {
                return Some(tag);
            }
            current = scene.parent_of(candidate);
        }
        None
    }

    /// Record a new hit for `class`, emitting exit/enter pairs on change
    ///
    /// Returns the number of envelopes emitted. An unchanged hit emits
    /// nothing.
    pub fn update_hit(
        &mut self,
        scene: &dyn SceneIndex,
        class: HitClass,
        hit: Option<NodeId>,
        ctx: &ModuleContext,
    ) -> Result<usize> {
        let slot = match class {
            HitClass::Gaze => &mut self.last_gaze,
            HitClass::Pointer => &mut self.last_pointer,
        };
        if *slot == hit {
            return Ok(0);
        }
        let previous = std::mem::replace(slot, hit);

        let mut emitted = 0;
        if let Some(lost) = previous {
            emitted += Self::focus_lost(scene, class, lost, hit, ctx)?;
        }
        if let Some(gained) = hit {
            emitted += Self::focus_gained(scene, class, gained, previous, ctx)?;
        }
        Ok(emitted)
    }

    /// Dispatch the exit pair for a view losing focus
    ///
    /// Emits, in order, the class-qualified exit event and the generic
    /// exit event, each as a separate envelope. A view with no routable
    /// ancestor emits nothing.
    pub fn focus_lost(
        scene: &dyn SceneIndex,
        class: HitClass,
        view: NodeId,
        target: Option<NodeId>,
        ctx: &ModuleContext,
    ) -> Result<usize> {
        Self::emit_pair(scene, view, target, class.exit_event(), "exit", ctx)
    }

    /// Dispatch the enter pair for a view gaining focus
    pub fn focus_gained(
        scene: &dyn SceneIndex,
        class: HitClass,
        view: NodeId,
        target: Option<NodeId>,
        ctx: &ModuleContext,
    ) -> Result<usize> {
        Self::emit_pair(scene, view, target, class.enter_event(), "enter", ctx)
    }

    fn emit_pair(
        scene: &dyn SceneIndex,
        view: NodeId,
        target: Option<NodeId>,
        class_event: &str,
        generic_event: &str,
        ctx: &ModuleContext,
    ) -> Result<usize> {
        let view_tag = match Self::routable_target(scene, view) {
            Some(tag) => tag,
            None => return Ok(0),
        };
        let target_tag = target.and_then(|t| Self::routable_target(scene, t));

        ctx.call_function(
            EVENT_EMITTER,
            RECEIVE_EVENT,
            receive_event_args(view_tag, class_event, target_tag),
        )?;
        ctx.call_function(
            EVENT_EMITTER,
            RECEIVE_EVENT,
            receive_event_args(view_tag, generic_event, target_tag),
        )?;
        Ok(2)
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn receive_event_args(view: Tag, event: &str, target: Option<Tag>) -> Vec<Value> {
    let target = match target {
        Some(tag) => json!(tag),
        None => Value::Null,
    };
    vec![json!(view), json!(event), json!([target])]
}
