//! A [`ScriptHost`] stand-in with no interpreter behind it.
//!
//! `real8-core` treats the scripting-language implementation as an
//! external collaborator (spec.md §1 non-goals, §9 design notes): the
//! core never constructs one. This CLI has no embedded Lua-like VM
//! either, so cart code is loaded but never executed — `_init`/`_update`/
//! `_draw` are simply absent globals, and the frame driver takes the
//! "nothing defined" path every step (spec.md §4.8). What this host does
//! exercise for real is [`real8_core::script::register_api`] itself: every
//! one of the ~120 API names gets bound to a native dispatcher, the same
//! registration call a real interpreter embedding would make.

use std::collections::HashMap;

use real8_core::fixed::FixedNum;
use real8_core::script::{LineHookFn, NativeFn, ScriptHost, ScriptRuntimeError};

pub struct StubScriptHost {
    natives: HashMap<&'static str, NativeFn>,
    line_hook: Option<LineHookFn>,
}

impl StubScriptHost {
    pub fn new() -> Self {
        StubScriptHost { natives: HashMap::new(), line_hook: None }
    }

    pub fn registered_count(&self) -> usize {
        self.natives.len()
    }
}

impl Default for StubScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost for StubScriptHost {
    fn push_number(&mut self, _value: FixedNum) {}
    fn push_boolean(&mut self, _value: bool) {}
    fn push_lstring(&mut self, _value: &str) {}
    fn push_nil(&mut self) {}

    fn get_arg_count(&self) -> usize {
        0
    }
    fn arg_number(&self, _index: usize) -> Option<FixedNum> {
        None
    }
    fn arg_string(&self, _index: usize) -> Option<String> {
        None
    }
    fn arg_boolean(&self, _index: usize) -> Option<bool> {
        None
    }

    fn call_global(&mut self, _name: &str, _nargs: usize, _nresults: usize) -> Result<(), ScriptRuntimeError> {
        Ok(())
    }

    fn register_native(&mut self, name: &'static str, f: NativeFn) {
        self.natives.insert(name, f);
    }

    fn set_line_hook(&mut self, hook: Option<LineHookFn>) {
        self.line_hook = hook;
    }

    fn global_is_callable(&self, _name: &str) -> bool {
        false
    }
}
