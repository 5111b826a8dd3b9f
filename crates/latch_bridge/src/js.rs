//! JavaScript scripting via QuickJS
//!
//! Scripts define plain classes:
//!
//! ```js
//! class Player {
//!     static natives = ["Input.IsKeyDown"];
//!     constructor(entity) { this.entity = entity; }
//!     onCreate() {}
//!     onUpdate(dt) {}
//! }
//! ```
//!
//! registered with `Latch.register(Player)`, and reach the engine through
//! the global `Latch` object. Entity handles and 64-bit integers travel as
//! `BigInt`, structs as plain objects keyed by field name, and primitive
//! `ref`/`out` arguments as `{ value }` boxes that are updated in place.
//! Numbers that do not fit the declared field kind are rejected, never
//! truncated.

use crate::api::ScriptApi;
use crate::error::{BridgeError, BridgeResult, MarshallingError};
use crate::handle::EntityHandle;
use crate::log::LogLevel;
use crate::marshal::{Value, ValueLayout, ValueType};
use crate::script::{Capabilities, NativeImport, ScriptClass, ScriptInstance};
use crate::signature::PassMode;
use rquickjs::function::{Rest, This};
use latch_core::ecs::FieldKind;
use rquickjs::{Array, BigInt, Coerced, Context, Ctx, Exception, Function, IntoJs, Object, Runtime, Undefined};
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

type JsValue<'js> = rquickjs::Value<'js>;
type ApiSlot = Rc<RefCell<Option<ScriptApi>>>;

const INSTANCES: &str = "__latch_instances";

const PRELUDE: &str = r#"
globalThis.__latch_instances = {};
globalThis.__latch_classes = [];
Latch.register = function (cls) {
    if (typeof cls !== "function") throw new TypeError("Latch.register expects a class");
    globalThis[cls.name] = cls;
    if (!__latch_classes.includes(cls.name)) __latch_classes.push(cls.name);
    return cls;
};
Latch.component = function (handle, type) {
    return {
        handle: handle,
        type: type,
        get: function (field) { return Latch.getField(handle, type, field); },
        set: function (field, value) { Latch.setField(handle, type, field, value); },
    };
};
"#;

/// Script execution context
pub struct JsRuntime {
    #[allow(dead_code)] // Kept alive for context lifetime
    runtime: Runtime,
    context: Context,
    api: ApiSlot,
    next_instance: Cell<u64>,
}

impl JsRuntime {
    pub fn new() -> BridgeResult<Rc<Self>> {
        let runtime = Runtime::new().map_err(|err| engine_error(&err))?;
        let context = Context::full(&runtime).map_err(|err| engine_error(&err))?;
        let js = Self {
            runtime,
            context,
            api: Rc::new(RefCell::new(None)),
            next_instance: Cell::new(0),
        };
        let slot = js.api.clone();
        js.run("<prelude>", |ctx| install(ctx, slot))?;
        Ok(Rc::new(js))
    }

    pub fn execute_file(&self, path: &Path) -> BridgeResult<()> {
        let source = std::fs::read_to_string(path).map_err(|err| BridgeError::Script {
            class: path.display().to_string(),
            message: err.to_string(),
        })?;
        self.run(&path.display().to_string(), |ctx| ctx.eval::<(), _>(source))?;
        tracing::debug!(path = %path.display(), "executed script file");
        Ok(())
    }

    pub fn execute(&self, source: &str) -> BridgeResult<()> {
        self.run("<eval>", |ctx| ctx.eval::<(), _>(source))
    }

    /// Names passed to `Latch.register`, in registration order.
    pub fn registered_classes(&self) -> BridgeResult<Vec<String>> {
        self.run("<registry>", |ctx| ctx.eval::<Vec<String>, _>("__latch_classes.slice()"))
    }

    /// Look up a global class and discover its capabilities and imports.
    pub fn class(self: &Rc<Self>, name: &str) -> BridgeResult<JsClass> {
        if !is_identifier(name) {
            return Err(BridgeError::Script {
                class: name.to_string(),
                message: "not a valid class name".to_string(),
            });
        }
        let lookup = format!(
            r#"(function () {{
                const c = {name};
                if (typeof c !== "function") throw new TypeError("{name} is not a class");
                const p = c.prototype;
                const natives = Array.isArray(c.natives) ? c.natives.map(String) : [];
                return [typeof p.onCreate === "function", typeof p.onUpdate === "function", natives];
            }})()"#
        );
        let (on_create, on_update, natives) = self.run(name, |ctx| {
            let found: Array = ctx.eval(lookup)?;
            Ok((
                found.get::<bool>(0)?,
                found.get::<bool>(1)?,
                found.get::<Vec<String>>(2)?,
            ))
        })?;
        tracing::debug!(class = name, on_create, on_update, imports = natives.len(), "discovered script class");
        Ok(JsClass {
            runtime: self.clone(),
            name: name.to_string(),
            capabilities: Capabilities::new(on_create, on_update),
            imports: natives.iter().map(|n| NativeImport::unchecked(n)).collect(),
        })
    }

    fn bind(&self, api: &ScriptApi) {
        *self.api.borrow_mut() = Some(api.clone());
    }

    fn next_key(&self) -> String {
        let key = self.next_instance.get();
        self.next_instance.set(key + 1);
        key.to_string()
    }

    fn run<R>(&self, source: &str, f: impl for<'js> FnOnce(&Ctx<'js>) -> rquickjs::Result<R>) -> BridgeResult<R> {
        self.context.with(|ctx| {
            f(&ctx).map_err(|err| BridgeError::Script {
                class: source.to_string(),
                message: describe(&ctx, err),
            })
        })
    }
}

/// A JavaScript class usable as a script class.
pub struct JsClass {
    runtime: Rc<JsRuntime>,
    name: String,
    capabilities: Capabilities,
    imports: Vec<NativeImport>,
}

impl ScriptClass for JsClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn imports(&self) -> Vec<NativeImport> {
        self.imports.clone()
    }

    fn bind(&self, api: &ScriptApi) -> BridgeResult<()> {
        self.runtime.bind(api);
        Ok(())
    }

    fn instantiate(&self, _api: &ScriptApi, handle: EntityHandle) -> BridgeResult<Box<dyn ScriptInstance>> {
        let key = self.runtime.next_key();
        let source = format!(
            "{INSTANCES}[\"{key}\"] = new {}({}n);",
            self.name,
            handle.to_bits()
        );
        self.runtime.run(&self.name, |ctx| ctx.eval::<(), _>(source))?;
        Ok(Box::new(JsInstance {
            runtime: self.runtime.clone(),
            class: self.name.clone(),
            key,
        }))
    }
}

struct JsInstance {
    runtime: Rc<JsRuntime>,
    class: String,
    key: String,
}

impl JsInstance {
    fn call_method(&self, method: &str, dt: Option<f32>) -> BridgeResult<()> {
        self.runtime.run(&self.class, |ctx| {
            let instances: Object = ctx.globals().get(INSTANCES)?;
            let instance: Object = instances.get(self.key.as_str())?;
            let function: Function = instance.get(method)?;
            match dt {
                Some(dt) => function.call::<_, ()>((This(instance), dt)),
                None => function.call::<_, ()>((This(instance),)),
            }
        })
    }
}

impl ScriptInstance for JsInstance {
    fn on_create(&mut self, _api: &ScriptApi) -> BridgeResult<()> {
        self.call_method("onCreate", None)
    }

    fn on_update(&mut self, _api: &ScriptApi, dt: f32) -> BridgeResult<()> {
        self.call_method("onUpdate", Some(dt))
    }
}

impl Drop for JsInstance {
    fn drop(&mut self) {
        let source = format!("delete {INSTANCES}[\"{}\"];", self.key);
        if let Err(err) = self.runtime.run(&self.class, |ctx| ctx.eval::<(), _>(source)) {
            tracing::warn!(class = %self.class, %err, "failed to release script instance");
        }
    }
}

fn install<'js>(ctx: &Ctx<'js>, slot: ApiSlot) -> rquickjs::Result<()> {
    let latch = Object::new(ctx.clone())?;

    let api = slot.clone();
    latch.set(
        "call",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: String, args: Rest<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
                let api = bound(&ctx, &api)?;
                call_native(&ctx, &api, &name, args.0)
            },
        )?,
    )?;

    let api = slot.clone();
    latch.set(
        "keyDown",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, code: u32| -> rquickjs::Result<bool> {
            bound(&ctx, &api)?.key_down(code).map_err(|err| throw(&ctx, &err))
        })?,
    )?;

    let api = slot.clone();
    latch.set(
        "hasComponent",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, handle: JsValue<'js>, ty: String| -> rquickjs::Result<bool> {
                let handle = to_handle(&ctx, &handle)?;
                Ok(bound(&ctx, &api)?.has_component_by_name(handle, &ty))
            },
        )?,
    )?;

    let api = slot.clone();
    latch.set(
        "getField",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, handle: JsValue<'js>, ty: String, field: String| -> rquickjs::Result<JsValue<'js>> {
                let handle = to_handle(&ctx, &handle)?;
                let value = bound(&ctx, &api)?
                    .get_component_by_name(handle, &ty)
                    .and_then(|accessor| accessor.get(&field))
                    .map_err(|err| throw(&ctx, &err))?;
                let ty = value.kind().map(ValueType::Prim).unwrap_or_default();
                to_js(&ctx, &ty, &value)
            },
        )?,
    )?;

    let api = slot.clone();
    latch.set(
        "setField",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, handle: JsValue<'js>, ty: String, field: String, value: JsValue<'js>| -> rquickjs::Result<()> {
                let handle = to_handle(&ctx, &handle)?;
                let accessor = bound(&ctx, &api)?
                    .get_component_by_name(handle, &ty)
                    .map_err(|err| throw(&ctx, &err))?;
                let (_, meta) = accessor
                    .layout()
                    .field(&field)
                    .map_err(|err| throw(&ctx, &BridgeError::from(err)))?;
                let value = prim_from_js(&ctx, meta.kind, &value)?;
                accessor.set(&field, value).map_err(|err| throw(&ctx, &err))
            },
        )?,
    )?;

    let api = slot.clone();
    latch.set(
        "log",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, message: String| -> rquickjs::Result<()> {
            bound(&ctx, &api)?.log(LogLevel::Info, "script", message);
            Ok(())
        })?,
    )?;

    let api = slot;
    latch.set(
        "destroy",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, handle: JsValue<'js>| -> rquickjs::Result<()> {
            let handle = to_handle(&ctx, &handle)?;
            bound(&ctx, &api)?
                .destroy(handle)
                .map_err(|err| throw(&ctx, &err))
        })?,
    )?;

    ctx.globals().set("Latch", latch)?;
    ctx.eval::<(), _>(PRELUDE)?;
    Ok(())
}

fn bound(ctx: &Ctx<'_>, slot: &ApiSlot) -> rquickjs::Result<ScriptApi> {
    slot.borrow()
        .clone()
        .ok_or_else(|| Exception::throw_message(ctx, "script domain is not loaded"))
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Handles arrive as `BigInt`, or as numbers small enough to be exact.
fn to_handle<'js>(ctx: &Ctx<'js>, value: &JsValue<'js>) -> rquickjs::Result<EntityHandle> {
    if value.as_number().is_some_and(|n| n.abs() > MAX_SAFE_INTEGER) {
        return Err(Exception::throw_range(ctx, "entity handle number is not exact; pass the BigInt handle"));
    }
    match prim_from_js(ctx, FieldKind::U64, value)? {
        Value::U64(bits) => Ok(EntityHandle::from_bits(bits)),
        _ => Err(Exception::throw_type(ctx, "expected an entity handle")),
    }
}

fn throw(ctx: &Ctx<'_>, err: &BridgeError) -> rquickjs::Error {
    Exception::throw_message(ctx, &err.to_string())
}

fn call_native<'js>(
    ctx: &Ctx<'js>,
    api: &ScriptApi,
    name: &str,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let callable = api.resolve(name).map_err(|err| throw(ctx, &err))?;
    let params = callable.signature().params();
    if args.len() != params.len() {
        let err = BridgeError::from(MarshallingError::Arity {
            expected: params.len(),
            actual: args.len(),
        });
        return Err(throw(ctx, &err));
    }

    let mut values = Vec::with_capacity(args.len());
    for (param, arg) in params.iter().zip(&args) {
        let value = match param.mode {
            PassMode::Out => Value::zeroed(&param.ty),
            PassMode::ByValue => from_js(ctx, &param.ty, arg)?,
            PassMode::Ref => from_js(ctx, &param.ty, &unbox(ctx, &param.ty, arg)?)?,
        };
        values.push(value);
    }

    let ret = api
        .invoke(&callable, &mut values)
        .map_err(|err| throw(ctx, &err))?;

    for ((param, arg), value) in params.iter().zip(&args).zip(&values) {
        if param.mode == PassMode::ByValue {
            continue;
        }
        let target = arg
            .as_object()
            .ok_or_else(|| Exception::throw_type(ctx, "ref and out arguments must be objects"))?;
        match (&param.ty, value) {
            (ValueType::Struct(layout), Value::Struct(fields)) => write_fields(ctx, layout, fields, target)?,
            (ty, other) => target.set("value", to_js(ctx, ty, other)?)?,
        }
    }

    to_js(ctx, callable.signature().ret(), &ret)
}

// Primitive ref arguments arrive boxed as `{ value }`.
fn unbox<'js>(ctx: &Ctx<'js>, ty: &ValueType, arg: &JsValue<'js>) -> rquickjs::Result<JsValue<'js>> {
    if matches!(ty, ValueType::Struct(_)) {
        return Ok(arg.clone());
    }
    arg.as_object()
        .ok_or_else(|| Exception::throw_type(ctx, "ref arguments must be { value } objects"))?
        .get("value")
}

fn from_js<'js>(ctx: &Ctx<'js>, ty: &ValueType, value: &JsValue<'js>) -> rquickjs::Result<Value> {
    match ty {
        ValueType::Unit => Ok(Value::Unit),
        ValueType::Prim(kind) => prim_from_js(ctx, *kind, value),
        ValueType::Str => Ok(Value::Str(value.get::<String>()?)),
        ValueType::Struct(layout) => {
            let object = value.as_object().ok_or_else(|| {
                Exception::throw_type(ctx, &format!("expected a {} object", layout.name()))
            })?;
            layout
                .fields()
                .iter()
                .map(|meta| prim_from_js(ctx, meta.kind, &object.get(meta.name.as_str())?))
                .collect::<rquickjs::Result<Vec<_>>>()
                .map(Value::Struct)
        }
    }
}

fn prim_from_js<'js>(ctx: &Ctx<'js>, kind: FieldKind, value: &JsValue<'js>) -> rquickjs::Result<Value> {
    let converted = if value.as_big_int().is_some() {
        let Coerced(digits) = value.get::<Coerced<String>>()?;
        Value::from_integer_text(kind, &digits)
    } else {
        let n = value.as_number().ok_or_else(|| {
            Exception::throw_type(ctx, &format!("expected {} but received {}", kind.name(), value.type_name()))
        })?;
        Value::from_number(kind, n)
    };
    converted.map_err(|err| throw(ctx, &BridgeError::from(err)))
}

fn to_js<'js>(ctx: &Ctx<'js>, ty: &ValueType, value: &Value) -> rquickjs::Result<JsValue<'js>> {
    match (ty, value) {
        (ValueType::Struct(layout), Value::Struct(fields)) => {
            let object = Object::new(ctx.clone())?;
            write_fields(ctx, layout, fields, &object)?;
            object.into_js(ctx)
        }
        (_, Value::Unit) => Undefined.into_js(ctx),
        (_, Value::Str(s)) => s.as_str().into_js(ctx),
        (_, Value::I64(v)) => BigInt::from_i64(ctx.clone(), *v)?.into_js(ctx),
        (_, Value::U64(v)) => BigInt::from_u64(ctx.clone(), *v)?.into_js(ctx),
        (_, Value::Struct(_)) => Err(Exception::throw_type(ctx, &format!("struct value declared as {ty}"))),
        (_, other) => other.to_number().unwrap_or_default().into_js(ctx),
    }
}

fn write_fields<'js>(ctx: &Ctx<'js>, layout: &ValueLayout, fields: &[Value], target: &Object<'js>) -> rquickjs::Result<()> {
    for (meta, field) in layout.fields().iter().zip(fields) {
        target.set(meta.name.as_str(), to_js(ctx, &ValueType::Prim(meta.kind), field)?)?;
    }
    Ok(())
}

fn describe(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let caught = ctx.catch();
    if let Some(object) = caught.as_object() {
        if let Ok(message) = object.get::<_, String>("message") {
            return message;
        }
    }
    caught
        .as_string()
        .and_then(|s| s.to_string().ok())
        .unwrap_or_else(|| "uncaught exception".to_string())
}

fn engine_error(err: &rquickjs::Error) -> BridgeError {
    BridgeError::Script {
        class: "<runtime>".to_string(),
        message: err.to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::NativeArgs;
    use crate::domain::{DomainBuilder, ScriptDomain};
    use crate::host::NativeHost;
    use crate::lifecycle::LifecycleState;
    use crate::marshal::Marshal;
    use crate::signature::{Param, Signature};
    use bytemuck::{Pod, Zeroable};
    use latch_core::define_component;
    use latch_core::ecs::{EntityBuilder, World};
    use latch_core::math::Vec2;
    use latch_services::KeyCode;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Translation {
        x: f32,
        y: f32,
    }
    define_component!(Translation, 1, "Translation", { x: F32, y: F32 });

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Counter {
        n: i32,
        u: u32,
    }
    define_component!(Counter, 2, "Counter", { n: I32, u: U32 });

    fn builder_with(source: &str, classes: &[&str]) -> DomainBuilder {
        let js = JsRuntime::new().unwrap();
        js.execute(source).unwrap();
        let mut builder = DomainBuilder::new(World::new());
        builder.engine_natives().unwrap();
        builder.expose_component::<Translation>().unwrap();
        builder.expose_component::<Counter>().unwrap();
        for name in classes {
            builder.class(js.class(name).unwrap()).unwrap();
        }
        builder
    }

    fn domain_with(source: &str, classes: &[&str]) -> ScriptDomain {
        builder_with(source, classes).load().unwrap()
    }

    fn messages(domain: &ScriptDomain) -> Vec<String> {
        domain.host().log().records().map(|r| r.message.clone()).collect()
    }

    fn origin() -> EntityBuilder {
        EntityBuilder::new().with(Translation { x: 0.0, y: 0.0 })
    }

    #[test]
    fn test_discovers_capabilities_and_imports() {
        let js = JsRuntime::new().unwrap();
        js.execute(
            r#"
            class Idle { onCreate() {} }
            class Mover { static natives = ["Input.IsKeyDown"]; onUpdate(dt) {} }
            "#,
        )
        .unwrap();
        let idle = js.class("Idle").unwrap();
        assert_eq!(idle.capabilities(), Capabilities::CREATE);
        assert!(idle.imports().is_empty());

        let mover = js.class("Mover").unwrap();
        assert_eq!(mover.capabilities(), Capabilities::UPDATE);
        assert_eq!(mover.imports(), vec![NativeImport::unchecked("Input.IsKeyDown")]);

        assert!(js.registered_classes().unwrap().is_empty());
        js.execute("Latch.register(Mover); Latch.register(Idle); Latch.register(Mover);")
            .unwrap();
        assert_eq!(js.registered_classes().unwrap(), ["Mover", "Idle"]);

        assert!(js.class("Missing").is_err());
        assert!(js.class("Idle; evil()").is_err());
    }

    #[test]
    fn test_unknown_import_fails_load() {
        let js = JsRuntime::new().unwrap();
        js.execute(r#"class Needy { static natives = ["Physics.Raycast"]; }"#)
            .unwrap();
        let mut builder = DomainBuilder::new(World::new());
        builder.engine_natives().unwrap();
        builder.class(js.class("Needy").unwrap()).unwrap();
        assert!(builder.load().is_err());
    }

    #[test]
    fn test_lifecycle_order_in_js() {
        let mut domain = domain_with(
            r#"
            class Probe {
                constructor(entity) { this.entity = entity; }
                onCreate() { Latch.log("create"); }
                onUpdate(dt) { Latch.log("update " + dt.toFixed(1)); }
            }
            "#,
            &["Probe"],
        );
        let handle = domain.spawn(origin(), "Probe").unwrap();
        domain.tick(0.5);
        domain.destroy(handle).unwrap();
        domain.tick(0.5);
        assert_eq!(domain.state(handle), None);
        assert_eq!(domain.classes().collect::<Vec<_>>(), ["Probe"]);

        let host = domain.host();
        let messages: Vec<_> = host.log().records().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["create", "update 0.5"]);
    }

    #[test]
    fn test_ref_and_out_from_js() {
        let mut domain = domain_with(
            r#"
            class Vectors {
                onCreate() {
                    const v = { x: 3, y: 4 };
                    const out = { x: 0, y: 0 };
                    Latch.call("Latch.LogVector2", v, out);
                    const dot = Latch.call("Latch.VectorDot", v);
                    Latch.log("out=" + out.x + "," + out.y + " dot=" + dot);
                }
            }
            "#,
            &["Vectors"],
        );
        domain.spawn(origin(), "Vectors").unwrap();
        let host = domain.host();
        let last = host.log().records().last().unwrap();
        assert_eq!(last.message, "out=42,42 dot=25");
    }

    #[test]
    fn test_exceptions_are_isolated() {
        let mut domain = domain_with(
            r#"
            var ticks = 0;
            class Broken { onUpdate(dt) { throw new Error("kaboom"); } }
            class Fine { onUpdate(dt) { ticks += 1; Latch.log("ticks " + ticks); } }
            "#,
            &["Broken", "Fine"],
        );
        let broken = domain.spawn(origin(), "Broken").unwrap();
        domain.spawn(origin(), "Fine").unwrap();
        let stats = domain.tick(0.1);
        assert_eq!((stats.failed, stats.updated), (1, 1));
        domain.tick(0.1);

        assert_eq!(domain.state(broken), Some(LifecycleState::Active));
        let host = domain.host();
        let errors: Vec<_> = host.log().at_level(LogLevel::Error).collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("kaboom"));
        assert!(host.log().records().any(|r| r.message == "ticks 2"));
    }

    #[test]
    fn test_component_access_and_invalid_handle_in_js() {
        let mut domain = domain_with(
            r#"
            class Walker {
                constructor(entity) { this.t = Latch.component(entity, "Translation"); this.entity = entity; }
                onUpdate(dt) {
                    this.t.set("x", this.t.get("x") + 1);
                    if (Latch.keyDown(32)) {
                        Latch.destroy(this.entity);
                        try {
                            this.t.get("x");
                        } catch (e) {
                            Latch.log("caught: " + e.message);
                        }
                    }
                }
            }
            "#,
            &["Walker"],
        );
        let handle = domain.spawn(origin(), "Walker").unwrap();
        domain.tick(0.1);
        domain.tick(0.1);
        let x = domain.host().world().get::<Translation>(handle.entity()).unwrap().x;
        assert_eq!(x, 2.0);

        domain.capture_input([KeyCode::Space]);
        domain.tick(0.1);
        domain.tick(0.1);
        assert_eq!(domain.state(handle), Some(LifecycleState::Destroyed));
        let host = domain.host();
        let caught = host
            .log()
            .records()
            .find(|r| r.message.starts_with("caught:"))
            .unwrap();
        assert!(caught.message.contains("destroyed entity"));
    }

    #[test]
    fn test_unknown_key_code_throws() {
        let mut domain = domain_with(
            r#"class Keys { onCreate() { Latch.keyDown(4242); } }"#,
            &["Keys"],
        );
        domain.spawn(origin(), "Keys").unwrap();
        let host = domain.host();
        let error = host.log().at_level(LogLevel::Error).next().unwrap();
        assert!(error.message.contains("unknown input code 4242"));
    }

    #[test]
    fn test_handles_survive_high_generations() {
        let mut domain = domain_with(
            r#"
            class Reader {
                constructor(entity) { this.entity = entity; }
                onCreate() {
                    const x = Latch.getField(this.entity, "Translation", "x");
                    const has = Latch.hasComponent(this.entity, "Translation");
                    Latch.log(typeof this.entity + " x=" + x + " has=" + has);
                }
                onUpdate(dt) { Latch.destroy(this.entity); }
            }
            "#,
            &["Reader"],
        );
        // Slot 0 stays occupied; slot 1 is churned until its handle needs
        // more than 53 bits.
        domain.spawn_native(origin()).unwrap();
        for _ in 0..(1u32 << 21) + 1 {
            let mut host = domain.host_mut();
            let entity = host.world_mut().spawn(EntityBuilder::new()).unwrap();
            host.world_mut().despawn(entity);
        }

        let handle = domain
            .spawn(EntityBuilder::new().with(Translation { x: 5.0, y: 0.0 }), "Reader")
            .unwrap();
        assert!(handle.entity().generation() > 1 << 21);
        assert_ne!(handle.to_bits() as f64 as u64, handle.to_bits());
        assert_eq!(handle.entity().index(), 1);
        assert_eq!(messages(&domain), ["bigint x=5 has=true"]);

        domain.tick(0.1);
        domain.tick(0.1);
        assert_eq!(domain.state(handle), Some(LifecycleState::Destroyed));
        assert!(!domain.api().is_valid(handle));
        assert_eq!(domain.host().log().at_level(LogLevel::Error).count(), 0);
    }

    #[test]
    fn test_lossy_numbers_are_rejected() {
        let mut domain = domain_with(
            r#"
            class Setter {
                constructor(entity) { this.entity = entity; }
                onCreate() {
                    for (const [field, value] of [["n", 2.7], ["u", -5], ["u", 2 ** 32], ["n", NaN]]) {
                        try {
                            Latch.setField(this.entity, "Counter", field, value);
                            Latch.log("stored " + field);
                        } catch (e) {
                            Latch.log("rejected " + field + ": " + e.message);
                        }
                    }
                    Latch.setField(this.entity, "Counter", "n", -3);
                    Latch.setField(this.entity, "Counter", "u", 7n);
                }
            }
            "#,
            &["Setter"],
        );
        let handle = domain
            .spawn(EntityBuilder::new().with(Counter { n: 1, u: 1 }), "Setter")
            .unwrap();

        let log = messages(&domain);
        assert_eq!(log.len(), 4);
        assert!(log.iter().all(|m| m.starts_with("rejected")), "{log:?}");
        assert!(log[0].contains("expected i32 but received 2.7"));
        assert!(log[1].contains("expected u32 but received -5"));
        let counter = domain.host().world().get::<Counter>(handle.entity()).unwrap();
        assert_eq!(counter, Counter { n: -3, u: 7 });
    }

    #[test]
    fn test_has_component_in_js() {
        let mut domain = domain_with(
            r#"
            class Inspector {
                constructor(entity) { this.entity = entity; }
                onCreate() {
                    const e = this.entity;
                    Latch.log([
                        Latch.hasComponent(e, "Translation"),
                        Latch.hasComponent(e, "Counter"),
                        Latch.hasComponent(e, "Nope"),
                    ].join(","));
                }
            }
            "#,
            &["Inspector"],
        );
        domain.spawn(origin(), "Inspector").unwrap();
        assert_eq!(messages(&domain), ["true,false,false"]);
    }

    #[test]
    fn test_boxed_primitives_and_struct_returns() {
        fn bump(_: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
            let n: i32 = args.read(0)?;
            args.write(0, n + 1)?;
            args.write(1, (1u64 << 60) + 1)?;
            Ok(Value::Unit)
        }
        fn half(_: &mut NativeHost, args: &mut NativeArgs) -> BridgeResult<Value> {
            let v: Vec2 = args.read(0)?;
            Ok((v * 0.5).into_value())
        }

        let mut builder = builder_with(
            r#"
            class Caller {
                static natives = ["Test.Bump", "Test.Half"];
                onCreate() {
                    const n = { value: 41 };
                    const big = { value: 0 };
                    Latch.call("Test.Bump", n, big);
                    Latch.log(n.value + " " + typeof big.value + " " + big.value);

                    const h = Latch.call("Test.Half", { x: 4, y: 2 });
                    Latch.log(Array.isArray(h) + " " + h.x + "," + h.y);

                    try {
                        Latch.call("Test.Bump", 41, big);
                    } catch (e) {
                        Latch.log("unboxed: " + e.message);
                    }
                }
            }
            "#,
            &["Caller"],
        );
        builder
            .native(
                "Test.Bump",
                Signature::new(vec![Param::by_ref(i32::value_type()), Param::out(u64::value_type())], ValueType::Unit),
                bump,
            )
            .unwrap();
        builder
            .native("Test.Half", Signature::new(vec![Param::of::<Vec2>()], Vec2::value_type()), half)
            .unwrap();
        let mut domain = builder.load().unwrap();
        domain.spawn(origin(), "Caller").unwrap();

        let log = messages(&domain);
        assert_eq!(log[0], "42 bigint 1152921504606846977");
        assert_eq!(log[1], "false 2,1");
        assert!(log[2].starts_with("unboxed: "));
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("Player"));
        assert!(is_identifier("_$a1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a.b"));
    }
}
