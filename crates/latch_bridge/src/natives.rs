//! Built-in engine natives

use crate::calls::{native_error, NativeArgs, NativeCallTable};
use crate::error::{BindingError, BridgeError, BridgeResult};
use crate::handle::EntityHandle;
use crate::host::NativeHost;
use crate::log::LogLevel;
use crate::marshal::{Marshal, Value, ValueType};
use crate::signature::{Param, Signature};
use latch_core::math::Vec2;

pub const LOG: &str = "Latch.Log";
pub const LOG_VECTOR2: &str = "Latch.LogVector2";
pub const VECTOR_DOT: &str = "Latch.VectorDot";
pub const IS_KEY_DOWN: &str = "Input.IsKeyDown";
pub const HAS_COMPONENT: &str = "Entity.HasComponent";
pub const DESTROY: &str = "Entity.Destroy";

/// Register every engine native on `table`.
pub fn register_engine_natives(table: &mut NativeCallTable) -> Result<(), BindingError> {
    let vector2 = Vec2::value_type();
    table.register(
        LOG,
        Signature::new(vec![Param::of::<String>(), Param::of::<i32>()], ValueType::Unit),
        log,
    )?;
    table.register(
        LOG_VECTOR2,
        Signature::new(
            vec![Param::by_ref(vector2.clone()), Param::out(vector2.clone())],
            ValueType::Unit,
        ),
        log_vector2,
    )?;
    table.register(
        VECTOR_DOT,
        Signature::new(vec![Param::by_ref(vector2)], f32::value_type()),
        vector_dot,
    )?;
    table.register(
        IS_KEY_DOWN,
        Signature::new(vec![Param::of::<u32>()], u32::value_type()),
        is_key_down,
    )?;
    table.register(
        HAS_COMPONENT,
        Signature::new(vec![Param::of::<u64>(), Param::of::<u32>()], u32::value_type()),
        has_component,
    )?;
    table.register(
        DESTROY,
        Signature::new(vec![Param::of::<u64>()], ValueType::Unit),
        destroy,
    )?;
    Ok(())
}

fn log(host: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
    let message = args.str(0)?;
    let parameter: i32 = args.read(1)?;
    host.log_message(LogLevel::Info, "script", format!("{message}, {parameter}"));
    Ok(Value::Unit)
}

/// Value the engine hands back through `Latch.LogVector2`'s out slot.
pub const LOGGED_VECTOR2: Vec2 = Vec2::new(42.0, 42.0);

fn log_vector2(host: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
    let v: Vec2 = args.read(0)?;
    host.log_message(LogLevel::Info, "script", format!("Vector2({}, {})", v.x, v.y));
    args.write(1, LOGGED_VECTOR2)?;
    Ok(Value::Unit)
}

fn vector_dot(_host: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
    let v: Vec2 = args.read(0)?;
    Ok(Value::F32(v.dot(v)))
}

fn is_key_down(host: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
    let code: u32 = args.read(0)?;
    let down = host.query().key_down(code)?;
    Ok(Value::U32(u32::from(down)))
}

fn has_component(host: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
    let handle = EntityHandle::from_bits(args.read(0)?);
    let component: u32 = args.read(1)?;
    let present = host.is_exposed(component) && host.world().has_component(handle.entity(), component);
    Ok(Value::U32(u32::from(present)))
}

fn destroy(host: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
    let handle = EntityHandle::from_bits(args.read(0)?);
    if host.world_mut().despawn(handle.entity()) {
        Ok(Value::Unit)
    } else if handle.to_bits() == 0 {
        Err(native_error(DESTROY, "null handle"))
    } else {
        Err(BridgeError::InvalidHandle(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latch_core::ecs::World;
    use latch_services::{InputState, KeyCode};

    fn setup() -> (NativeCallTable, NativeHost) {
        let mut table = NativeCallTable::new();
        register_engine_natives(&mut table).unwrap();
        (table, NativeHost::new(World::new()))
    }

    #[test]
    fn test_registering_twice_is_harmless() {
        let (mut table, _) = setup();
        let before = table.len();
        register_engine_natives(&mut table).unwrap();
        assert_eq!(table.len(), before);
    }

    #[test]
    fn test_log_writes_native_channel() {
        let (table, mut host) = setup();
        let mut args = [Value::from("Hello from script"), Value::I32(42)];
        table.resolve(LOG).unwrap().invoke(&mut host, &mut args).unwrap();
        let record = host.log().records().last().unwrap();
        assert_eq!(record.message, "Hello from script, 42");
        assert_eq!(record.level, LogLevel::Info);
    }

    #[test]
    fn test_log_vector2_fills_out_param() {
        let (table, mut host) = setup();
        let mut args = [Vec2::new(1.0, 2.0).into_value(), Vec2::new(99.0, 99.0).into_value()];
        table.resolve(LOG_VECTOR2).unwrap().invoke(&mut host, &mut args).unwrap();
        assert_eq!(Vec2::from_value(args[0].clone()).unwrap(), Vec2::new(1.0, 2.0));
        assert_eq!(Vec2::from_value(args[1].clone()).unwrap(), LOGGED_VECTOR2);
        assert_eq!(host.log().records().last().unwrap().message, "Vector2(1, 2)");
    }

    #[test]
    fn test_vector_dot() {
        let (table, mut host) = setup();
        let ret = table
            .resolve(VECTOR_DOT)
            .unwrap()
            .invoke(&mut host, &mut [Vec2::new(3.0, 4.0).into_value()])
            .unwrap();
        assert_eq!(ret, Value::F32(25.0));
    }

    #[test]
    fn test_is_key_down_rejects_unknown_codes() {
        let (table, mut host) = setup();
        host.set_input(InputState::capture(1, [KeyCode::D]));
        let call = table.resolve(IS_KEY_DOWN).unwrap();
        assert_eq!(call.invoke(&mut host, &mut [Value::U32(68)]).unwrap(), Value::U32(1));
        assert_eq!(call.invoke(&mut host, &mut [Value::U32(65)]).unwrap(), Value::U32(0));
        assert_eq!(
            call.invoke(&mut host, &mut [Value::U32(12345)]).unwrap_err(),
            BridgeError::UnknownInputCode(12345)
        );
    }

    #[test]
    fn test_destroy_twice_is_invalid_handle() {
        let (table, mut host) = setup();
        let entity = host.world_mut().spawn(Default::default()).unwrap();
        let bits = Value::U64(entity.to_bits());
        let call = table.resolve(DESTROY).unwrap();
        call.invoke(&mut host, &mut [bits.clone()]).unwrap();
        assert!(matches!(
            call.invoke(&mut host, &mut [bits]),
            Err(BridgeError::InvalidHandle(_))
        ));

        let has = table.resolve(HAS_COMPONENT).unwrap();
        let ret = has
            .invoke(&mut host, &mut [Value::U64(entity.to_bits()), Value::U32(1)])
            .unwrap();
        assert_eq!(ret, Value::U32(0));
    }
}
