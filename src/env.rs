// ABOUTME: Compile-time environments, the _macro_ namespace, and the module registry

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::eval::Object;
use crate::form::Form;
use crate::munger::munge;

/// The module macro container key.
pub const MACROS: &str = "_macro_";

/// A compile-time namespace: the mapping each compiled module's
/// top-level forms execute against, and the lookup table consulted by
/// the emitter when resolving macros.
///
/// The `_macro_` namespace is kept alongside the variable bindings; its
/// attributes are the macro functions for the module. An attribute name
/// ending in the munged `#` (`QzHASH_`) denotes a reader tag.
#[derive(Debug)]
pub struct Environment {
    qualname: String,
    vars: RefCell<HashMap<String, Object>>,
    macros: RefCell<HashMap<String, Object>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new module environment seeded with `__name__`,
    /// `__package__`, `__annotations__`, and `__builtins__`.
    pub fn new(qualname: &str) -> Rc<Self> {
        let env = Rc::new(Environment {
            qualname: qualname.to_string(),
            vars: RefCell::new(HashMap::new()),
            macros: RefCell::new(HashMap::new()),
            parent: None,
        });
        env.define("__name__", Object::Form(Form::sym(qualname)));
        env.define("__package__", Object::Form(Form::Nil));
        env.define("__annotations__", Object::Form(Form::Map(Vec::new())));
        env.define("__builtins__", Object::Form(Form::sym("builtins.")));
        env
    }

    /// Creates (or retrieves) a registered module environment. Like the
    /// host's module import, `__main__` is never registered.
    pub fn new_module(qualname: &str) -> Rc<Self> {
        if qualname != "__main__" {
            if let Some(existing) = lookup_module(qualname) {
                return existing;
            }
        }
        let env = Environment::new(qualname);
        if qualname != "__main__" {
            register_module(&env);
        }
        env
    }

    /// Creates a child scope (used by lambda application).
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            qualname: parent.qualname.clone(),
            vars: RefCell::new(HashMap::new()),
            macros: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// The module's `__name__`, defaulting like the reader does.
    pub fn name(&self) -> String {
        match self.get("__name__") {
            Some(Object::Form(Form::Str(s))) => s,
            _ => "__main__".to_string(),
        }
    }

    pub fn define(&self, name: &str, value: Object) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Looks up a name in this scope, parent scopes, then the builtins
    /// module.
    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        if let Some(ref parent) = self.parent {
            return parent.get(name);
        }
        if self.qualname != "builtins" {
            if let Some(builtins) = lookup_module("builtins") {
                return builtins.vars.borrow().get(name).cloned();
            }
        }
        None
    }

    /// Membership in this module's own dict (no builtins fallback);
    /// this is what shadowing checks consult.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains(name))
    }

    /// Gets a `_macro_` attribute by its (munged) name.
    pub fn get_macro(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.macros.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get_macro(name))
    }

    /// Binds a compile-time macro in this module's `_macro_` namespace.
    /// The name is munged, so Lissp spellings work directly.
    pub fn define_macro(&self, name: &str, value: Object) {
        self.macros.borrow_mut().insert(munge(name), value);
    }

    /// Binds a reader tag: a `_macro_` attribute with the munged `#`
    /// suffix.
    pub fn define_tag(&self, name: &str, value: Object) {
        let key = format!("{}{}", munge(name), munge("#"));
        self.macros.borrow_mut().insert(key, value);
    }

    /// Whether a `_macro_` namespace is present at all.
    pub fn has_macro_namespace(&self) -> bool {
        !self.macros.borrow().is_empty()
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.has_macro_namespace())
    }
}

thread_local! {
    /// The `sys.modules` analog: dynamically-created modules register
    /// here for cross-module macro and qualified-identifier lookup. The
    /// compiler is single-threaded; each thread gets its own registry.
    static MODULES: RefCell<HashMap<String, Rc<Environment>>> = RefCell::new(HashMap::new());
}

/// Registers a module environment under its qualname.
pub fn register_module(env: &Rc<Environment>) {
    MODULES.with(|m| {
        m.borrow_mut()
            .entry(env.qualname.clone())
            .or_insert_with(|| env.clone());
    });
}

/// Finds a registered module. The native `builtins` module is created
/// on first use.
pub fn lookup_module(name: &str) -> Option<Rc<Environment>> {
    ensure_builtins();
    MODULES.with(|m| m.borrow().get(name).cloned())
}

fn ensure_builtins() {
    let present = MODULES.with(|m| m.borrow().contains_key("builtins"));
    if !present {
        let builtins = crate::builtins::builtins_env();
        MODULES.with(|m| {
            m.borrow_mut()
                .insert("builtins".to_string(), builtins)
        });
    }
}
