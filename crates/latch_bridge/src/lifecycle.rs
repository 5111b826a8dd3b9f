//! Lifecycle dispatch
//!
//! Drives script instances through Unbound -> Created -> Active ->
//! Destroyed. Updates run in creation order. A failing callback is logged
//! to the native channel and never stops the rest of the tick.

use crate::api::ScriptApi;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::EntityHandle;
use crate::log::LogLevel;
use crate::script::{Capabilities, ScriptClass, ScriptInstance};
use latch_services::UpdateFailurePolicy;
use std::collections::{BTreeMap, HashMap};

pub type FailurePolicy = UpdateFailurePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unbound,
    Created,
    Active,
    /// Stopped by the failure policy. Still tracks its entity.
    Suspended,
    Destroyed,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub frame: u64,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub suspended: usize,
    pub destroyed: usize,
}

struct ScriptSlot {
    handle: EntityHandle,
    class: String,
    capabilities: Capabilities,
    state: LifecycleState,
    instance: Option<Box<dyn ScriptInstance>>,
    consecutive_failures: u32,
}

impl ScriptSlot {
    fn destroy(&mut self) {
        self.state = LifecycleState::Destroyed;
        self.instance = None;
    }
}

pub struct LifecycleDispatcher {
    slots: BTreeMap<u64, ScriptSlot>,
    by_handle: HashMap<EntityHandle, u64>,
    next_seq: u64,
    policy: FailurePolicy,
    created_since_tick: usize,
}

impl LifecycleDispatcher {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            slots: BTreeMap::new(),
            by_handle: HashMap::new(),
            next_seq: 0,
            policy,
            created_since_tick: 0,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Instantiate `class` for a freshly created entity and run OnCreate.
    ///
    /// Instantiation errors are returned and nothing is scheduled. An OnCreate
    /// error is logged; the instance still becomes Active.
    pub fn attach(&mut self, api: &ScriptApi, handle: EntityHandle, class: &dyn ScriptClass) -> BridgeResult<()> {
        if self.by_handle.contains_key(&handle) {
            return Err(BridgeError::Script {
                class: class.name().to_string(),
                message: format!("entity {handle} already has a script instance"),
            });
        }
        api.ensure_valid(handle)?;

        let mut slot = ScriptSlot {
            handle,
            class: class.name().to_string(),
            capabilities: class.capabilities(),
            state: LifecycleState::Unbound,
            instance: None,
            consecutive_failures: 0,
        };

        let mut instance = class.instantiate(api, handle)?;
        slot.state = LifecycleState::Created;
        tracing::debug!(entity = %handle, class = %slot.class, "script instance created");

        if slot.capabilities.on_create {
            if let Err(err) = instance.on_create(api) {
                report(api, &slot, "OnCreate", &err);
            }
        }
        slot.instance = Some(instance);
        slot.state = LifecycleState::Active;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(seq, slot);
        self.by_handle.insert(handle, seq);
        self.created_since_tick += 1;
        Ok(())
    }

    /// Fire OnUpdate on every Active instance in creation order.
    pub fn tick(&mut self, api: &ScriptApi, dt: f32) -> DispatchStats {
        self.prune();
        let mut stats = DispatchStats {
            frame: api.frame(),
            created: std::mem::take(&mut self.created_since_tick),
            ..Default::default()
        };
        let policy = self.policy;

        for slot in self.slots.values_mut() {
            if !matches!(slot.state, LifecycleState::Active | LifecycleState::Suspended) {
                continue;
            }
            // Covers entities destroyed earlier in this tick by another script.
            if !api.is_valid(slot.handle) {
                tracing::debug!(entity = %slot.handle, class = %slot.class, "entity gone, instance destroyed");
                slot.destroy();
                stats.destroyed += 1;
                continue;
            }
            if slot.state != LifecycleState::Active || !slot.capabilities.on_update {
                continue;
            }
            let Some(instance) = slot.instance.as_mut() else {
                continue;
            };

            match instance.on_update(api, dt) {
                Ok(()) => {
                    slot.consecutive_failures = 0;
                    stats.updated += 1;
                }
                Err(err) => {
                    stats.failed += 1;
                    slot.consecutive_failures += 1;
                    report(api, slot, "OnUpdate", &err);
                    if let FailurePolicy::Suspend { after } = policy {
                        if slot.consecutive_failures >= after {
                            slot.state = LifecycleState::Suspended;
                            stats.suspended += 1;
                            api.log(
                                LogLevel::Warn,
                                &slot.class,
                                format!(
                                    "suspended entity {} after {} consecutive failures",
                                    slot.handle, slot.consecutive_failures
                                ),
                            );
                        }
                    }
                }
            }
        }

        if stats.failed > 0 {
            tracing::debug!(?stats, "tick finished with failures");
        } else {
            tracing::trace!(?stats, "tick finished");
        }
        stats
    }

    /// The native side destroyed the entity. No callback fires after this.
    pub fn destroyed(&mut self, handle: EntityHandle) -> bool {
        let Some(slot) = self
            .by_handle
            .get(&handle)
            .and_then(|seq| self.slots.get_mut(seq))
        else {
            return false;
        };
        if slot.state == LifecycleState::Destroyed {
            return false;
        }
        slot.destroy();
        tracing::debug!(entity = %handle, class = %slot.class, "script instance destroyed");
        true
    }

    pub fn state(&self, handle: EntityHandle) -> Option<LifecycleState> {
        self.by_handle
            .get(&handle)
            .and_then(|seq| self.slots.get(seq))
            .map(|slot| slot.state)
    }

    /// Live instances in creation order.
    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.slots
            .values()
            .filter(|slot| slot.state != LifecycleState::Destroyed)
            .map(|slot| slot.handle)
    }

    pub fn len(&self) -> usize {
        self.handles().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Destroyed slots are dropped at the start of the following tick, so a
    // destroyed handle still reports its state for the rest of the frame.
    fn prune(&mut self) {
        self.slots
            .retain(|_, slot| slot.state != LifecycleState::Destroyed);
        let slots = &self.slots;
        self.by_handle.retain(|_, seq| slots.contains_key(seq));
    }
}

fn report(api: &ScriptApi, slot: &ScriptSlot, phase: &str, err: &BridgeError) {
    api.log(
        LogLevel::Error,
        &slot.class,
        format!("{phase} failed for entity {}: {err}", slot.handle),
    );
}
