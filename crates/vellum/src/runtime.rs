//! Per-execution runtime state
//!
//! A `Runtime` is created for each top-level execute call and borrowed
//! down through recursive template invocations (include, yield, exec).
//! It owns the writer slot, the scope chain, the current context value,
//! and the active content continuation.

use std::io::Write;
use std::sync::Arc;

use crate::builtins;
use crate::error::Result;
use crate::exec::ContentClosure;
use crate::scope::ScopeChain;
use crate::template::{SetCore, Template, VarMap};
use crate::value::Value;

/// The state of one template execution.
///
/// Not safe for concurrent use; create one runtime per execution.
/// Multiple runtimes may run in parallel against a shared
/// [`Set`](crate::Set).
pub struct Runtime<'r> {
    pub(crate) set: &'r Arc<SetCore>,
    pub(crate) writer: Box<dyn Write + 'r>,
    pub(crate) scope: ScopeChain,
    pub(crate) context: Value,
    pub(crate) content: Option<Arc<ContentClosure>>,
}

impl<'r> Runtime<'r> {
    pub(crate) fn new(
        set: &'r Arc<SetCore>,
        writer: Box<dyn Write + 'r>,
        variables: VarMap,
        context: Value,
    ) -> Self {
        Runtime {
            set,
            writer,
            scope: ScopeChain::new(variables),
            context,
            content: None,
        }
    }

    /// The current context value (what `.` resolves to).
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Bind `name` in the template scope: mutates the binding where it
    /// lives, or defines it in the innermost frame.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.scope.set_value(name, value.into());
    }

    /// Resolve a name: scope chain innermost→outermost, then the set's
    /// globals, then the process-wide defaults. `.` resolves to the
    /// context. Absent names yield `Value::Invalid`.
    pub fn resolve(&self, name: &str) -> Value {
        if name == "." {
            return self.context.clone();
        }
        if let Some(v) = self.scope.resolve(name) {
            return v.clone();
        }
        if let Some(v) = self.set.resolve_global(name) {
            return v;
        }
        builtins::default_variable(name).unwrap_or(Value::Invalid)
    }

    /// Execute a template's effective root in a fresh frame seeded with
    /// its collected block table, optionally swapping the context.
    pub(crate) fn run_template(
        &mut self,
        template: &Template,
        context: Option<Value>,
    ) -> Result<Option<Value>> {
        self.scope.enter_template(template.collected.clone());
        let saved_context = self.context.clone();
        if let Some(ctx) = context {
            if !ctx.is_invalid() {
                self.context = ctx;
            }
        }

        let result = self
            .execute_list(template.effective_root())
            .map_err(|err| err.in_template(&template.path));

        self.context = saved_context;
        self.scope.exit();
        result
    }

    /// Resolve a path through the owning set and execute it with the
    /// current writer (the `include` path).
    pub(crate) fn execute_template(
        &mut self,
        path: &str,
        context: Option<Value>,
    ) -> Result<Option<Value>> {
        let template = self.set.get_template(path)?;
        self.run_template(&template, context)
    }

    /// Like [`execute_template`](Self::execute_template) but discarding
    /// all output (the `exec` builtin).
    pub(crate) fn execute_template_discarding(
        &mut self,
        path: &str,
        context: Option<Value>,
    ) -> Result<Option<Value>> {
        let saved = std::mem::replace(&mut self.writer, Box::new(std::io::sink()));
        let result = self.execute_template(path, context);
        self.writer = saved;
        result
    }
}
