//! The `pm` capability object and `console` exposed to scripts

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Lua, Table, Value, Variadic};

use super::ScriptState;

/// Log target for script console output, kept apart from host logs
pub const SCRIPT_LOG_TARGET: &str = "courier::script";

type Shared = Rc<RefCell<ScriptState>>;

/// Build `pm` with `variables`, `environment`, `iterationData` and `request.headers`
pub(super) fn create_pm(lua: &Lua, state: Shared) -> mlua::Result<Table> {
    let pm = lua.create_table()?;

    pm.set("variables", variable_accessors(lua, &state)?)?;
    // Same store under a second name
    pm.set("environment", variable_accessors(lua, &state)?)?;

    let iteration_data = lua.create_table()?;
    iteration_data.set("get", lua.create_function(|_, _key: Value| Ok(Value::Nil))?)?;
    pm.set("iterationData", iteration_data)?;

    let request = lua.create_table()?;
    request.set("headers", header_accessors(lua, &state)?)?;
    pm.set("request", request)?;

    Ok(pm)
}

fn variable_accessors(lua: &Lua, state: &Shared) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let reader = Rc::clone(state);
    table.set(
        "get",
        lua.create_function(move |_, key: String| {
            Ok(reader.borrow().variable(&key).map(str::to_string))
        })?,
    )?;

    let writer = Rc::clone(state);
    table.set(
        "set",
        lua.create_function(move |_, (key, value): (String, Value)| {
            let value = stringify(&value)?;
            writer.borrow_mut().set_variable(&key, &value);
            Ok(())
        })?,
    )?;

    Ok(table)
}

fn header_accessors(lua: &Lua, state: &Shared) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let reader = Rc::clone(state);
    table.set(
        "get",
        lua.create_function(move |_, key: String| {
            Ok(reader
                .borrow()
                .header(&key)
                .filter(|h| h.enabled)
                .map(|h| h.value.clone()))
        })?,
    )?;

    // add and upsert are the same operation
    for name in ["upsert", "add"] {
        let writer = Rc::clone(state);
        table.set(
            name,
            lua.create_function(move |_, (first, second): (Value, Option<Value>)| {
                let (key, value) = header_arguments(first, second)?;
                writer.borrow_mut().upsert_header(&key, &value);
                Ok(())
            })?,
        )?;
    }

    let remover = Rc::clone(state);
    table.set(
        "remove",
        lua.create_function(move |_, key: Value| {
            let key = match key {
                Value::Table(t) => t.get::<String>("key")?,
                other => stringify(&other)?,
            };
            remover.borrow_mut().remove_header(&key);
            Ok(())
        })?,
    )?;

    Ok(table)
}

/// Accepts `{ key = .., value = .. }` or `(key, value)`
fn header_arguments(first: Value, second: Option<Value>) -> mlua::Result<(String, String)> {
    match first {
        Value::Table(t) => {
            let key: String = t.get("key")?;
            let value: Value = t.get("value")?;
            Ok((key, stringify(&value)?))
        }
        key => {
            let value = second.unwrap_or(Value::Nil);
            Ok((stringify(&key)?, stringify(&value)?))
        }
    }
}

/// Build `console` forwarding to tracing under [`SCRIPT_LOG_TARGET`]
pub(super) fn create_console(lua: &Lua) -> mlua::Result<Table> {
    let console = lua.create_table()?;

    let log = lua.create_function(|_, args: Variadic<Value>| {
        tracing::info!(target: SCRIPT_LOG_TARGET, "{}", join_args(&args));
        Ok(())
    })?;
    console.set("log", log.clone())?;
    console.set("info", log)?;
    console.set(
        "warn",
        lua.create_function(|_, args: Variadic<Value>| {
            tracing::warn!(target: SCRIPT_LOG_TARGET, "{}", join_args(&args));
            Ok(())
        })?,
    )?;
    console.set(
        "error",
        lua.create_function(|_, args: Variadic<Value>| {
            tracing::error!(target: SCRIPT_LOG_TARGET, "{}", join_args(&args));
            Ok(())
        })?,
    )?;

    Ok(console)
}

fn join_args(args: &[Value]) -> String {
    args.iter().map(display).collect::<Vec<_>>().join(" ")
}

/// Loose rendering for log output
fn display(value: &Value) -> String {
    match stringify(value) {
        Ok(s) => s,
        Err(_) => value.type_name().to_string(),
    }
}

/// Convert a scalar script value into the string stored in a variable or header
fn stringify(value: &Value) -> mlua::Result<String> {
    match value {
        Value::Nil => Ok(String::new()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(format!("{:.1}", n)),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.to_string_lossy().to_string()),
        other => Err(mlua::Error::RuntimeError(format!(
            "expected a string, number or boolean, got {}",
            other.type_name()
        ))),
    }
}
