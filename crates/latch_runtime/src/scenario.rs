//! The demo scene: one player entity driven by a script
//!
//! The same movement rule exists twice, as the Rust `PlayerController` class
//! and as `scripts/player.js`, so both scripting paths run the same frames.

use bytemuck::{Pod, Zeroable};
use latch_bridge::natives::IS_KEY_DOWN;
use latch_bridge::{
    BridgeResult, Capabilities, ClassDef, DispatchStats, DomainBuilder, EntityHandle, JsRuntime,
    LogLevel, Marshal, NativeHost, NativeImport, Param, ScriptApi, ScriptDomain, ScriptInstance,
    Signature, Value,
};
use latch_core::define_component;
use latch_core::ecs::{EntityBuilder, World};
use latch_core::math::Vec2;
use latch_services::{InputTimeline, KeyCode, Settings};
use std::rc::Rc;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Translation {
    pub x: f32,
    pub y: f32,
}
define_component!(Translation, 1, "Translation", { x: F32, y: F32 });

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}
define_component!(Velocity, 2, "Velocity", { x: F32, y: F32 });

pub const PLAYER_CONTROLLER: &str = "PlayerController";
pub const PLAYER_SPEED: f32 = 15.0;

struct PlayerController {
    handle: EntityHandle,
}

impl PlayerController {
    fn moving_right(api: &ScriptApi) -> BridgeResult<bool> {
        for key in [KeyCode::D, KeyCode::Right] {
            if api.call(IS_KEY_DOWN, &mut [Value::U32(key.code())])? == Value::U32(1) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl ScriptInstance for PlayerController {
    fn on_create(&mut self, api: &ScriptApi) -> BridgeResult<()> {
        api.log(LogLevel::Info, PLAYER_CONTROLLER, format!("player {} ready", self.handle));
        Ok(())
    }

    fn on_update(&mut self, api: &ScriptApi, dt: f32) -> BridgeResult<()> {
        if !Self::moving_right(api)? {
            return Ok(());
        }
        let speed = api
            .get_component::<Velocity>(self.handle)?
            .load_as::<Vec2>()?
            .length();
        let translation = api.get_component::<Translation>(self.handle)?;
        let position: Vec2 = translation.load_as()?;
        translation.store_as(position + Vec2::X * speed * dt)
    }
}

pub fn player_controller() -> ClassDef {
    let is_key_down = Signature::new(vec![Param::of::<u32>()], u32::value_type());
    ClassDef::new(PLAYER_CONTROLLER, Capabilities::ALL, |handle| PlayerController {
        handle,
    })
    .import(NativeImport::new(IS_KEY_DOWN, is_key_down))
}

pub struct Scene {
    domain: ScriptDomain,
}

impl Scene {
    /// Load a domain with the engine natives, the scene components, the Rust
    /// player class and every class registered by `js`.
    pub fn new(settings: &Settings, js: Option<&Rc<JsRuntime>>) -> BridgeResult<Self> {
        let host = NativeHost::with_log_capacity(World::new(), settings.logging.retained_records);
        let mut builder = DomainBuilder::with_host(host).failure_policy(settings.script.failure_policy);
        builder.engine_natives()?;
        builder.expose_component::<Translation>()?;
        builder.expose_component::<Velocity>()?;
        builder.class(player_controller())?;
        if let Some(js) = js {
            for name in js.registered_classes()? {
                builder.class(js.class(&name)?)?;
            }
        }
        Ok(Self {
            domain: builder.load()?,
        })
    }

    #[cfg(test)]
    pub fn domain(&self) -> &ScriptDomain {
        &self.domain
    }

    /// Spawn a player at the origin moving at `PLAYER_SPEED` along X.
    pub fn spawn_player(&mut self, class: &str) -> BridgeResult<EntityHandle> {
        let builder = EntityBuilder::new()
            .with(Translation { x: 0.0, y: 0.0 })
            .with(Velocity {
                x: PLAYER_SPEED,
                y: 0.0,
            });
        let handle = self.domain.spawn(builder, class)?;
        tracing::info!(entity = %handle, class, "spawned player");
        Ok(handle)
    }

    /// Run `frames` frames, replaying `timeline` into the input snapshot.
    pub fn run(&mut self, frames: u32, dt: f32, timeline: &InputTimeline) -> Vec<DispatchStats> {
        (0..frames)
            .map(|_| {
                self.domain.replay_input(timeline);
                self.domain.tick(dt)
            })
            .collect()
    }

    pub fn translation(&self, handle: EntityHandle) -> BridgeResult<Vec2> {
        self.domain
            .api()
            .get_component::<Translation>(handle)?
            .load_as()
    }
}
