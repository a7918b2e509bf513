//! Statement execution
//!
//! Drives the statement list of a template: text, actions, conditionals,
//! ranges, block invocation with content continuations, includes and
//! returns. A `return` short-circuits the enclosing list and propagates
//! outward until a template boundary hands it to the caller.

use std::io::Write;
use std::sync::Arc;

use crate::ast::{
    BlockNode, Expr, IfNode, IncludeNode, List, ListNode, Pos, RangeNode, SetClause, Stmt,
    YieldArg, YieldNode,
};
use crate::error::{Error, EvalErrorKind, Result};
use crate::escape::{print_value, EscapeWriter};
use crate::eval::{eval_pipeline, Evaluate};
use crate::ranger::get_ranger;
use crate::runtime::Runtime;
use crate::template;
use crate::value::{is_true, MapKey, Value};

/// The body a caller supplied to a block, captured together with the
/// frame it closes over and the continuation that was active before it.
pub(crate) struct ContentClosure {
    pub(crate) list: List,
    pub(crate) scope: usize,
    pub(crate) prior: Option<Arc<ContentClosure>>,
}

impl<'r> Runtime<'r> {
    /// Execute a statement list. `Some(value)` means a `return` fired
    /// and the rest of the list was skipped.
    pub(crate) fn execute_list(&mut self, list: &ListNode) -> Result<Option<Value>> {
        // a `:=` action opens one frame for the rest of the list
        let mut opened_scope = false;
        let mut returned: Option<Value> = None;

        for node in &list.nodes {
            match node {
                Stmt::Text { text } => {
                    self.writer.write_all(text.as_bytes())?;
                }

                Stmt::Action { set, pipe } => {
                    if let Some(set) = set {
                        if set.is_let {
                            if !opened_scope {
                                self.scope.enter();
                                opened_scope = true;
                            }
                            self.execute_let_list(set)?;
                        } else {
                            self.execute_set_list(set)?;
                        }
                    }
                    if let Some(pipe) = pipe {
                        let (value, safe_writer) = eval_pipeline(self, pipe)?;
                        if !safe_writer && !value.is_invalid() {
                            if let Value::Renderer(renderer) = &value {
                                renderer.render(&mut *self.writer)?;
                            } else {
                                let escape = self.set.escape;
                                let mut ew = EscapeWriter::new(&mut *self.writer, escape);
                                print_value(&mut ew, &value)?;
                            }
                        }
                    }
                }

                Stmt::If(node) => {
                    returned = self.execute_if(node)?;
                }

                Stmt::Range(node) => {
                    returned = self.execute_range(node)?;
                }

                Stmt::Yield(node) => {
                    self.execute_yield(node)?;
                }

                Stmt::Block(node) => {
                    self.execute_block_stmt(node)?;
                }

                Stmt::Include(node) => {
                    returned = self.execute_include(node)?;
                }

                Stmt::Return { expr } => {
                    returned = Some(expr.eval(self)?);
                }
            }
            if returned.is_some() {
                break;
            }
        }

        if opened_scope {
            self.scope.exit();
        }
        Ok(returned)
    }

    fn execute_if(&mut self, node: &IfNode) -> Result<Option<Value>> {
        let mut is_let = false;
        if let Some(set) = &node.set {
            if set.is_let {
                is_let = true;
                self.scope.enter();
                self.execute_let_list(set)?;
            } else {
                self.execute_set_list(set)?;
            }
        }

        let mut returned = None;
        if is_true(&node.cond.eval(self)?) {
            returned = self.execute_list(&node.then_list)?;
        } else if let Some(else_list) = &node.else_list {
            returned = self.execute_list(else_list)?;
        }

        if is_let {
            self.scope.exit();
        }
        Ok(returned)
    }

    fn execute_range(&mut self, node: &RangeNode) -> Result<Option<Value>> {
        let saved_context = self.context.clone();
        let mut is_let = false;
        let mut key_val = false;

        let expression = match &node.set {
            Some(set) => {
                key_val = set.left.len() > 1;
                let v = set.right[0].eval(self)?;
                if set.is_let {
                    is_let = true;
                    self.scope.enter();
                }
                v
            }
            None => match &node.expr {
                Some(expr) => expr.eval(self)?,
                None => Value::Invalid,
            },
        };

        let mut ranger =
            get_ranger(&expression).map_err(|kind| Error::eval(kind, node.pos))?;
        let mut returned = None;

        match ranger.next() {
            None => {
                if let Some(else_list) = &node.else_list {
                    returned = self.execute_list(else_list)?;
                }
            }
            Some(first) => {
                let mut entry = first;
                loop {
                    let (key, value) = entry;
                    match &node.set {
                        Some(set) if set.is_let => {
                            if key_val {
                                self.define_target(&set.left[0], key)?;
                                self.define_target(&set.left[1], value)?;
                            } else {
                                self.define_target(&set.left[0], value)?;
                            }
                        }
                        Some(set) => {
                            if key_val {
                                self.execute_set(&set.left[0], key)?;
                                self.execute_set(&set.left[1], value)?;
                            } else {
                                self.execute_set(&set.left[0], value)?;
                            }
                        }
                        None => {
                            self.context = value;
                        }
                    }
                    returned = self.execute_list(&node.body)?;
                    if returned.is_some() {
                        break;
                    }
                    match ranger.next() {
                        Some(next) => entry = next,
                        None => break,
                    }
                }
            }
        }

        self.context = saved_context;
        if is_let {
            self.scope.exit();
        }
        Ok(returned)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Assignment
    // ═══════════════════════════════════════════════════════════════════

    fn execute_set_list(&mut self, set: &SetClause) -> Result<()> {
        if set.lookup {
            let value = set.right[0].eval(self)?;
            let found = !value.is_invalid();
            self.execute_set(&set.left[0], value)?;
            self.execute_set(&set.left[1], Value::Bool(found))?;
            return Ok(());
        }
        for (target, expr) in set.left.iter().zip(set.right.iter()) {
            let value = expr.eval(self)?;
            self.execute_set(target, value)?;
        }
        Ok(())
    }

    fn execute_let_list(&mut self, set: &SetClause) -> Result<()> {
        if set.lookup {
            let value = set.right[0].eval(self)?;
            let found = !value.is_invalid();
            self.define_target(&set.left[0], value)?;
            self.define_target(&set.left[1], Value::Bool(found))?;
            return Ok(());
        }
        for (target, expr) in set.left.iter().zip(set.right.iter()) {
            let value = expr.eval(self)?;
            self.define_target(target, value)?;
        }
        Ok(())
    }

    fn define_target(&mut self, target: &Expr, value: Value) -> Result<()> {
        match target {
            Expr::Ident(id) => {
                self.scope.define(&id.name, value);
                Ok(())
            }
            other => Err(Error::eval(EvalErrorKind::BadAssignTarget, other.pos())),
        }
    }

    fn execute_set(&mut self, target: &Expr, value: Value) -> Result<()> {
        match target {
            Expr::Ident(id) => {
                self.scope.set_value(&id.name, value);
                Ok(())
            }
            Expr::Field(field) => {
                let root = self.context.clone();
                self.context = rebuild_path(&root, &field.names, value, field.pos)?;
                Ok(())
            }
            Expr::Chain(chain) => match &chain.base {
                Expr::Ident(id) => {
                    let root = self.resolve(&id.name);
                    if root.is_invalid() {
                        return Err(Error::eval(
                            EvalErrorKind::UndefinedIdentifier {
                                name: id.name.clone(),
                            },
                            id.pos,
                        ));
                    }
                    let updated = rebuild_path(&root, &chain.fields, value, chain.pos)?;
                    self.scope.set_value(&id.name, updated);
                    Ok(())
                }
                other => Err(Error::eval(EvalErrorKind::BadAssignTarget, other.pos())),
            },
            other => Err(Error::eval(EvalErrorKind::BadAssignTarget, other.pos())),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Blocks, Yields, Content
    // ═══════════════════════════════════════════════════════════════════

    fn execute_yield(&mut self, node: &YieldNode) -> Result<()> {
        match node {
            YieldNode::Content { expr } => {
                if let Some(closure) = self.content.clone() {
                    self.invoke_content(&closure, expr.as_ref())?;
                }
                Ok(())
            }
            YieldNode::Block {
                name,
                args,
                expr,
                content,
                pos,
            } => {
                let block = self.scope.block_lookup(name).ok_or_else(|| {
                    Error::eval(
                        EvalErrorKind::UnresolvedBlock { name: name.clone() },
                        *pos,
                    )
                })?;
                self.execute_yield_block(&block, args, expr.as_ref(), content.clone(), *pos)
            }
        }
    }

    /// A block definition in statement position invokes the effective
    /// block (an override may shadow the definition) with its own
    /// defaults, context expression and default content.
    fn execute_block_stmt(&mut self, node: &Arc<BlockNode>) -> Result<()> {
        let block = self
            .scope
            .block_lookup(&node.name)
            .unwrap_or_else(|| node.clone());
        let content = block.content.clone();
        self.execute_yield_block(&block, &[], block.expr.as_ref(), content, node.pos)
    }

    /// Invoke a block: bind yield arguments, then unbound defaults, in a
    /// fresh frame; capture the caller content; run the body with an
    /// optional context swap.
    fn execute_yield_block(
        &mut self,
        block: &Arc<BlockNode>,
        yield_args: &[YieldArg],
        expr: Option<&Expr>,
        content: Option<List>,
        pos: Pos,
    ) -> Result<()> {
        let needs_scope = !block.params.is_empty() || !yield_args.is_empty();
        if needs_scope {
            self.scope.enter();
            // caller arguments first: named bind by name, bare ones
            // positionally against the declared parameters
            for (i, arg) in yield_args.iter().enumerate() {
                let name = match &arg.name {
                    Some(name) => name.clone(),
                    None => block
                        .params
                        .get(i)
                        .map(|p| p.name.clone())
                        .ok_or_else(|| {
                            Error::eval(
                                EvalErrorKind::ArgumentCount {
                                    name: block.name.clone(),
                                },
                                pos,
                            )
                        })?,
                };
                let value = arg.expr.eval(self)?;
                self.scope.define(&name, value);
            }
            // block defaults for whatever the caller left unbound
            for param in &block.params {
                if self.scope.defined_in_current(&param.name) {
                    continue;
                }
                let value = match &param.default {
                    Some(default) => default.eval(self)?,
                    None => Value::Bool(false),
                };
                self.scope.define(&param.name, value);
            }
        }

        let outer_content = self.content.clone();
        if let Some(list) = content {
            self.content = Some(Arc::new(ContentClosure {
                list,
                scope: self.scope.current_index(),
                prior: outer_content.clone(),
            }));
        }

        let result = match expr {
            Some(expr) => match expr.eval(self) {
                Ok(ctx) => {
                    let saved = std::mem::replace(&mut self.context, ctx);
                    let r = self.execute_list(&block.body);
                    self.context = saved;
                    r
                }
                Err(err) => Err(err),
            },
            None => self.execute_list(&block.body),
        };

        self.content = outer_content;
        if needs_scope {
            self.scope.exit();
        }
        result.map(|_| ())
    }

    /// Run a captured content continuation: re-enter its frame, restore
    /// the continuation that was active when it was captured, and
    /// optionally evaluate a context expression in that frame.
    fn invoke_content(
        &mut self,
        closure: &ContentClosure,
        expr: Option<&Expr>,
    ) -> Result<()> {
        let outer_scope = self.scope.current_index();
        let outer_content = self.content.clone();
        self.scope.set_current(closure.scope);
        self.content = closure.prior.clone();

        let result = match expr {
            Some(expr) => match expr.eval(self) {
                Ok(ctx) => {
                    let saved = std::mem::replace(&mut self.context, ctx);
                    let r = self.execute_list(&closure.list);
                    self.context = saved;
                    r
                }
                Err(err) => Err(err),
            },
            None => self.execute_list(&closure.list),
        };

        self.scope.set_current(outer_scope);
        self.content = outer_content;
        result.map(|_| ())
    }

    fn execute_include(&mut self, node: &IncludeNode) -> Result<Option<Value>> {
        let path_value = node.path.eval(self)?;
        let path = match &path_value {
            Value::String(s) => s.to_string(),
            other => {
                return Err(Error::eval(
                    EvalErrorKind::IncludePath {
                        type_name: other.type_name(),
                    },
                    node.pos,
                ))
            }
        };
        let resolved = template::resolve_path(&path, &node.owner);
        tracing::trace!(from = %node.owner, path = %resolved, "including template");
        let context = match &node.context {
            Some(expr) => Some(expr.eval(self)?),
            None => None,
        };
        self.execute_template(&resolved, context)
    }
}

/// Functional write-back for `a.b.c = v` targets: rebuild the spine of
/// mappings/records along the path with the new leaf value.
fn rebuild_path(current: &Value, path: &[String], leaf: Value, pos: Pos) -> Result<Value> {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return Ok(leaf),
    };
    match current {
        Value::Mapping(map) => {
            let key = MapKey::from(first.as_str());
            let new_inner = if rest.is_empty() {
                leaf
            } else {
                let inner = map.get(&key).cloned().unwrap_or(Value::Invalid);
                if inner.is_invalid() {
                    return Err(Error::eval(
                        EvalErrorKind::NoFieldOrMethod {
                            name: first.clone(),
                            type_name: current.type_name(),
                        },
                        pos,
                    ));
                }
                rebuild_path(&inner, rest, leaf, pos)?
            };
            let mut rebuilt = (**map).clone();
            rebuilt.insert(key, new_inner);
            Ok(Value::Mapping(Arc::new(rebuilt)))
        }
        Value::Record(record) => {
            let inner = record.field(first).cloned().ok_or_else(|| {
                Error::eval(
                    EvalErrorKind::NoFieldOrMethod {
                        name: first.clone(),
                        type_name: current.type_name(),
                    },
                    pos,
                )
            })?;
            let new_inner = if rest.is_empty() {
                leaf
            } else {
                rebuild_path(&inner, rest, leaf, pos)?
            };
            let mut rebuilt = (**record).clone();
            rebuilt.set_field(first, new_inner);
            Ok(Value::record(rebuilt))
        }
        other => Err(Error::eval(
            EvalErrorKind::BadAssignPath {
                type_name: other.type_name(),
            },
            pos,
        )),
    }
}
