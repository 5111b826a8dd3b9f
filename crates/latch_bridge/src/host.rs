//! Native engine state reachable from native calls

use crate::log::{LogLevel, NativeLog};
use latch_core::ecs::{ComponentId, World};
use latch_core::time::SimulationTime;
use latch_services::{InputQuery, InputState};
use std::collections::BTreeSet;

/// Everything a native implementation may touch: the entity store, the
/// current input snapshot, the frame clock and the log channel.
#[derive(Debug, Default)]
pub struct NativeHost {
    world: World,
    input: InputState,
    time: SimulationTime,
    log: NativeLog,
    exposed: BTreeSet<ComponentId>,
}

impl NativeHost {
    pub fn new(world: World) -> Self {
        Self {
            world,
            ..Default::default()
        }
    }

    pub fn with_log_capacity(world: World, retained_records: usize) -> Self {
        Self {
            world,
            log: NativeLog::with_capacity(retained_records),
            ..Default::default()
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Component types scripts are allowed to see. Set when the domain loads.
    pub fn expose_components(&mut self, ids: impl IntoIterator<Item = ComponentId>) {
        self.exposed.extend(ids);
    }

    pub fn is_exposed(&self, id: ComponentId) -> bool {
        self.exposed.contains(&id)
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn set_input(&mut self, input: InputState) {
        self.input = input;
    }

    pub fn query(&self) -> InputQuery<'_> {
        InputQuery::new(&self.input)
    }

    pub fn time(&self) -> &SimulationTime {
        &self.time
    }

    pub fn frame(&self) -> u64 {
        self.time.tick_count()
    }

    pub fn advance_frame(&mut self, delta_seconds: f32) -> u64 {
        self.time.advance(delta_seconds)
    }

    pub fn log(&self) -> &NativeLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut NativeLog {
        &mut self.log
    }

    /// Write to the native channel stamped with the current frame.
    pub fn log_message(&mut self, level: LogLevel, source: &str, message: impl Into<String>) {
        let frame = self.time.tick_count();
        self.log.write(frame, level, source, message);
    }
}
