//! Pre-request script engine
//!
//! Scripts are Lua chunks run in a sandbox that only sees two values: `pm`,
//! the variable/header capability object, and `console`. Both are also
//! passed as the chunk's arguments (`local pm, console = ...`).
//!
//! ```lua
//! pm.variables.set("nonce", tostring(math.random(1, 1000000)))
//! pm.request.headers.upsert({ key = "X-Trace", value = pm.variables.get("trace") })
//! console.log("prepared", pm.variables.get("nonce"))
//! ```

mod api;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mlua::{Function, HookTriggers, Lua, LuaOptions, MultiValue, StdLib, Table, VmState};

use crate::error::{Error, Result};
use crate::models::{Header, Variable};

/// Chunk name reported in script error messages
const CHUNK_NAME: &str = "pre-request";

/// Instructions a script may execute before it is stopped
const INSTRUCTION_BUDGET: u64 = 10_000_000;

/// Hook granularity, in VM instructions
const HOOK_INTERVAL: u32 = 1_000;

/// Heap ceiling for one script run
const MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Globals copied into the sandbox environment
const SAFE_GLOBALS: &[&str] = &[
    "string", "table", "math", "utf8", "tostring", "tonumber", "type", "pairs", "ipairs",
    "next", "select", "error", "assert", "pcall", "unpack",
];

/// Variables and headers after a successful script run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub variables: Vec<Variable>,
    pub headers: Vec<Header>,
}

/// Mutable state the capability object reads and writes
#[derive(Debug, Default)]
pub(crate) struct ScriptState {
    variables: Vec<Variable>,
    headers: Vec<Header>,
}

impl ScriptState {
    fn seed(variables: &[Variable], headers: &[Header]) -> Self {
        let mut state = ScriptState::default();
        for variable in variables {
            state.set_variable(&variable.key, &variable.value);
        }
        for header in headers {
            match state.headers.iter_mut().find(|h| h.key == header.key) {
                Some(existing) => *existing = header.clone(),
                None => state.headers.push(header.clone()),
            }
        }
        state
    }

    pub(crate) fn variable(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }

    pub(crate) fn set_variable(&mut self, key: &str, value: &str) {
        match self.variables.iter_mut().find(|v| v.key == key) {
            Some(existing) => existing.value = value.to_string(),
            None => self.variables.push(Variable::new(key, value)),
        }
    }

    pub(crate) fn header(&self, key: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.key == key)
    }

    /// Set or overwrite a header; it is always enabled afterwards
    pub(crate) fn upsert_header(&mut self, key: &str, value: &str) {
        match self.headers.iter_mut().find(|h| h.key == key) {
            Some(existing) => {
                existing.value = value.to_string();
                existing.enabled = true;
            }
            None => self.headers.push(Header::new(key, value)),
        }
    }

    pub(crate) fn remove_header(&mut self, key: &str) {
        self.headers.retain(|h| h.key != key);
    }

    fn into_outcome(self) -> ScriptOutcome {
        ScriptOutcome {
            variables: self.variables,
            headers: self.headers,
        }
    }
}

/// Run `script` against the given variables and headers.
///
/// Any parse or runtime failure becomes [`Error::Script`] carrying the
/// interpreter's message.
pub fn run(script: &str, variables: &[Variable], headers: &[Header]) -> Result<ScriptOutcome> {
    let state = Rc::new(RefCell::new(ScriptState::seed(variables, headers)));

    execute(script, Rc::clone(&state)).map_err(|e| {
        tracing::warn!(error = %e, "Pre-request script failed");
        Error::script(e.to_string())
    })?;

    Ok(state.take().into_outcome())
}

fn execute(script: &str, state: Rc<RefCell<ScriptState>>) -> mlua::Result<()> {
    // No io, os, debug or package: the script only reaches what we hand it
    let libs = StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH;
    let lua = Lua::new_with(libs, LuaOptions::default())?;
    lua.set_memory_limit(MEMORY_LIMIT)?;
    let exhausted = install_budget(&lua);

    let pm = api::create_pm(&lua, state)?;
    let console = api::create_console(&lua)?;
    let env = sandbox_env(&lua, &pm, &console, exhausted)?;

    let chunk: Function = lua
        .load(script)
        .set_name(CHUNK_NAME)
        .set_environment(env)
        .into_function()?;
    chunk.call::<()>((pm, console))
}

fn budget_error() -> mlua::Error {
    mlua::Error::RuntimeError(format!(
        "script exceeded instruction budget ({} instructions)",
        INSTRUCTION_BUDGET
    ))
}

/// Stop the script once it has run `INSTRUCTION_BUDGET` instructions.
/// Returns the flag that trips when the budget runs out.
fn install_budget(lua: &Lua) -> Rc<Cell<bool>> {
    let exhausted = Rc::new(Cell::new(false));
    let flag = Rc::clone(&exhausted);
    let executed = Cell::new(0u64);
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
        move |_, _| {
            executed.set(executed.get() + u64::from(HOOK_INTERVAL));
            if executed.get() > INSTRUCTION_BUDGET {
                flag.set(true);
                return Err(budget_error());
            }
            Ok(VmState::Continue)
        },
    );
    exhausted
}

/// `pcall` that cannot swallow the budget error
fn guarded_pcall(lua: &Lua, pcall: Function, exhausted: Rc<Cell<bool>>) -> mlua::Result<Function> {
    lua.create_function(move |_, args: MultiValue| {
        let results: MultiValue = pcall.call(args)?;
        if exhausted.get() {
            return Err(budget_error());
        }
        Ok(results)
    })
}

fn sandbox_env(
    lua: &Lua,
    pm: &Table,
    console: &Table,
    exhausted: Rc<Cell<bool>>,
) -> mlua::Result<Table> {
    let globals = lua.globals();
    let env = lua.create_table()?;
    for name in SAFE_GLOBALS {
        let value: mlua::Value = globals.get(*name)?;
        if !value.is_nil() {
            env.set(*name, value)?;
        }
    }
    let pcall: Function = globals.get("pcall")?;
    env.set("pcall", guarded_pcall(lua, pcall, exhausted)?)?;
    env.set("pm", pm.clone())?;
    env.set("console", console.clone())?;
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<Variable> {
        pairs.iter().map(|(k, v)| Variable::new(*k, *v)).collect()
    }

    #[test]
    fn test_set_variable() {
        let outcome = run(r#"pm.variables.set("x", "42")"#, &[], &[]).unwrap();
        assert_eq!(outcome.variables, vars(&[("x", "42")]));
    }

    #[test]
    fn test_get_reads_seeded_variables() {
        let script = r#"pm.variables.set("copy", pm.variables.get("base") .. "!")"#;
        let outcome = run(script, &vars(&[("base", "v")]), &[]).unwrap();
        assert_eq!(outcome.variables, vars(&[("base", "v"), ("copy", "v!")]));
    }

    #[test]
    fn test_numbers_are_stored_as_strings() {
        let outcome = run("pm.variables.set('n', 42); pm.variables.set('f', 1.5)", &[], &[]).unwrap();
        assert_eq!(outcome.variables, vars(&[("n", "42"), ("f", "1.5")]));
    }

    #[test]
    fn test_environment_aliases_variables() {
        let script = r#"pm.environment.set("a", "1"); pm.variables.set("b", pm.environment.get("a"))"#;
        let outcome = run(script, &[], &[]).unwrap();
        assert_eq!(outcome.variables, vars(&[("a", "1"), ("b", "1")]));
    }

    #[test]
    fn test_header_upsert_add_remove() {
        let headers = vec![
            Header::disabled("X-Off", "old"),
            Header::new("X-Drop", "bye"),
        ];
        let script = r#"
            pm.request.headers.upsert({ key = "X-Off", value = "new" })
            pm.request.headers.add({ key = "X-Added", value = "yes" })
            pm.request.headers.add("X-Pair", "2")
            pm.request.headers.remove("X-Drop")
        "#;
        let outcome = run(script, &[], &headers).unwrap();
        assert_eq!(
            outcome.headers,
            vec![
                Header::new("X-Off", "new"),
                Header::new("X-Added", "yes"),
                Header::new("X-Pair", "2"),
            ]
        );
    }

    #[test]
    fn test_iteration_data_is_empty() {
        let script = r#"assert(pm.iterationData.get("anything") == nil)"#;
        assert!(run(script, &[], &[]).is_ok());
    }

    #[test]
    fn test_capabilities_passed_as_arguments() {
        let script = r#"local p, c = ...; p.variables.set("via", "args"); c.log("ok")"#;
        let outcome = run(script, &[], &[]).unwrap();
        assert_eq!(outcome.variables, vars(&[("via", "args")]));
    }

    #[test]
    fn test_runtime_error_carries_message() {
        let err = run(r#"error("boom")"#, &[], &[]).unwrap_err();
        assert!(err.is_script());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_syntax_error_is_script_error() {
        let err = run("pm.variables.set(", &[], &[]).unwrap_err();
        assert!(err.is_script());
    }

    #[test]
    fn test_endless_loop_is_stopped() {
        let err = run("while true do end", &[], &[]).unwrap_err();
        assert!(err.is_script());
        assert!(err.to_string().contains("instruction budget"), "{err}");
    }

    #[test]
    fn test_pcall_cannot_swallow_budget() {
        let script = "while true do pcall(function() while true do end end) end";
        let err = run(script, &[], &[]).unwrap_err();
        assert!(err.is_script());
    }

    #[test]
    fn test_memory_limit_is_script_error() {
        let err = run(r#"local s = string.rep("x", 64 * 1024 * 1024)"#, &[], &[]).unwrap_err();
        assert!(err.is_script());
    }

    #[test]
    fn test_no_ambient_host_access() {
        for script in ["os.exit(1)", "io.write('x')", "require('socket')", "debug.traceback()"] {
            let err = run(script, &[], &[]).unwrap_err();
            assert!(err.is_script(), "{script} should fail");
        }
    }

    #[test]
    fn test_console_does_not_fail() {
        let script = r#"console.log("a", 1, true, nil); console.warn("w"); console.error({})"#;
        assert!(run(script, &[], &[]).is_ok());
    }
}
