//! Recursive-descent template parser
//!
//! Builds the AST of [`crate::ast`] from the token stream, pre-classifying
//! literals and collecting block definitions, the `extends` reference and
//! the import list for the loader to resolve.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{lex, Token, TokenKind};

/// The raw parse of one template source, before the loader resolves
/// `extends`/`import` references.
pub(crate) struct ParsedTemplate {
    pub root: List,
    pub blocks: HashMap<String, Arc<BlockNode>>,
    pub extends: Option<String>,
    pub imports: Vec<String>,
}

/// Parse a template source.
pub(crate) fn parse(path: &str, source: &str) -> Result<ParsedTemplate, ParseError> {
    let tokens = lex(path, source)?;
    let mut parser = Parser {
        path: Arc::from(path),
        tokens,
        idx: 0,
        blocks: HashMap::new(),
        extends: None,
        imports: Vec::new(),
        body_started: false,
    };
    let (root, _) = parser.parse_list(&[Terminator::Eof])?;
    Ok(ParsedTemplate {
        root,
        blocks: parser.blocks,
        extends: parser.extends,
        imports: parser.imports,
    })
}

/// What may legally close a statement list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Terminator {
    End,
    Else,
    /// The `{{content}}` marker splitting a block definition
    ContentMarker,
    Eof,
}

struct Parser {
    path: Arc<str>,
    tokens: Vec<Token>,
    idx: usize,
    blocks: HashMap<String, Arc<BlockNode>>,
    extends: Option<String>,
    imports: Vec<String>,
    /// True once a statement other than `extends`/`import` was parsed
    body_started: bool,
}

impl Parser {
    fn error(&self, pos: Pos, message: impl Into<String>) -> ParseError {
        ParseError {
            path: self.path.to_string(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.idx].kind
    }

    fn peek2(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx + 1).map(|t| &t.kind)
    }

    fn pos(&self) -> Pos {
        self.tokens[self.idx].pos
    }

    fn next(&mut self) -> Token {
        let token = self.tokens[self.idx].clone();
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        token
    }

    fn accept(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.next();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, ParseError> {
        if self.peek() == &kind {
            return Ok(self.next());
        }
        Err(self.error(
            self.pos(),
            format!(
                "expected {} in {}, found {}",
                kind.describe(),
                context,
                self.peek().describe()
            ),
        ))
    }

    fn expect_ident(&mut self, context: &str) -> Result<(String, Pos), ParseError> {
        let pos = self.pos();
        match self.peek() {
            TokenKind::Ident(_) => {
                let token = self.next();
                match token.kind {
                    TokenKind::Ident(name) => Ok((name, pos)),
                    _ => unreachable!(),
                }
            }
            other => Err(self.error(
                pos,
                format!("expected identifier in {}, found {}", context, other.describe()),
            )),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statement Lists
    // ═══════════════════════════════════════════════════════════════════

    fn parse_list(&mut self, allowed: &[Terminator]) -> Result<(List, Terminator), ParseError> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Text(_) => {
                    let token = self.next();
                    if let TokenKind::Text(text) = token.kind {
                        if !text.trim().is_empty() {
                            self.body_started = true;
                        }
                        nodes.push(Stmt::Text {
                            text: Arc::from(text.as_str()),
                        });
                    }
                }
                TokenKind::Eof => {
                    if allowed.contains(&Terminator::Eof) {
                        return Ok((Arc::new(ListNode { nodes }), Terminator::Eof));
                    }
                    return Err(
                        self.error(self.pos(), "unexpected end of template, expected {{end}}")
                    );
                }
                TokenKind::LeftDelim => {
                    let delim_pos = self.pos();
                    self.next();
                    match self.peek() {
                        TokenKind::End if allowed.contains(&Terminator::End) => {
                            self.next();
                            self.expect(TokenKind::RightDelim, "end statement")?;
                            return Ok((Arc::new(ListNode { nodes }), Terminator::End));
                        }
                        TokenKind::Else if allowed.contains(&Terminator::Else) => {
                            self.next();
                            // caller consumes the rest of the else clause
                            return Ok((Arc::new(ListNode { nodes }), Terminator::Else));
                        }
                        TokenKind::Content if allowed.contains(&Terminator::ContentMarker) => {
                            self.next();
                            self.expect(TokenKind::RightDelim, "content marker")?;
                            return Ok((Arc::new(ListNode { nodes }), Terminator::ContentMarker));
                        }
                        _ => {
                            if let Some(stmt) = self.parse_statement(delim_pos)? {
                                nodes.push(stmt);
                            }
                        }
                    }
                }
                other => {
                    let describe = other.describe();
                    return Err(self.error(self.pos(), format!("unexpected {}", describe)));
                }
            }
        }
    }

    /// Parse one statement; the opening `{{` is already consumed.
    /// Returns `None` for `extends`/`import`, which produce no node.
    fn parse_statement(&mut self, pos: Pos) -> Result<Option<Stmt>, ParseError> {
        match self.peek() {
            TokenKind::If => {
                self.next();
                self.body_started = true;
                Ok(Some(self.parse_if(pos)?))
            }
            TokenKind::Range => {
                self.next();
                self.body_started = true;
                Ok(Some(self.parse_range(pos)?))
            }
            TokenKind::Block => {
                self.next();
                self.body_started = true;
                Ok(Some(self.parse_block(pos)?))
            }
            TokenKind::Yield => {
                self.next();
                self.body_started = true;
                Ok(Some(self.parse_yield(pos)?))
            }
            TokenKind::Include => {
                self.next();
                self.body_started = true;
                Ok(Some(self.parse_include(pos)?))
            }
            TokenKind::Return => {
                self.next();
                self.body_started = true;
                let expr = if self.peek() == &TokenKind::RightDelim {
                    Expr::Nil(pos)
                } else {
                    self.parse_expr()?
                };
                self.expect(TokenKind::RightDelim, "return statement")?;
                Ok(Some(Stmt::Return { expr }))
            }
            TokenKind::Extends => {
                self.next();
                if self.extends.is_some() {
                    return Err(self.error(pos, "duplicate extends statement"));
                }
                if self.body_started {
                    return Err(
                        self.error(pos, "extends must be the first statement of the template")
                    );
                }
                let path = self.parse_string_literal("extends statement")?;
                self.expect(TokenKind::RightDelim, "extends statement")?;
                self.extends = Some(path);
                Ok(None)
            }
            TokenKind::Import => {
                self.next();
                if self.body_started {
                    return Err(self.error(pos, "import must precede the template body"));
                }
                let path = self.parse_string_literal("import statement")?;
                self.expect(TokenKind::RightDelim, "import statement")?;
                self.imports.push(path);
                Ok(None)
            }
            TokenKind::End => Err(self.error(pos, "unexpected {{end}}")),
            TokenKind::Else => Err(self.error(pos, "unexpected {{else}}")),
            TokenKind::Content => Err(self.error(pos, "unexpected {{content}} outside a block")),
            _ => {
                self.body_started = true;
                Ok(Some(self.parse_action(pos)?))
            }
        }
    }

    fn parse_string_literal(&mut self, context: &str) -> Result<String, ParseError> {
        let pos = self.pos();
        match self.peek() {
            TokenKind::Str(_) => {
                let token = self.next();
                match token.kind {
                    TokenKind::Str(s) => Ok(s),
                    _ => unreachable!(),
                }
            }
            other => Err(self.error(
                pos,
                format!(
                    "expected string literal in {}, found {}",
                    context,
                    other.describe()
                ),
            )),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════

    fn parse_action(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        let exprs = self.parse_expr_list()?;
        if matches!(self.peek(), TokenKind::Assign | TokenKind::Declare) {
            let set = self.parse_set_clause(exprs, pos, false)?;
            self.expect(TokenKind::RightDelim, "assignment")?;
            return Ok(Stmt::Action {
                set: Some(set),
                pipe: None,
            });
        }

        let mut exprs = exprs;
        if exprs.len() != 1 {
            return Err(self.error(pos, "unexpected ',' in expression action"));
        }
        let first = exprs.remove(0);
        let pipe = self.parse_pipeline_from(first)?;
        self.expect(TokenKind::RightDelim, "action")?;
        Ok(Stmt::Action {
            set: None,
            pipe: Some(pipe),
        })
    }

    /// Parse the `= rhs` / `:= rhs` tail of an assignment whose targets
    /// are already parsed. A range clause pairs up to two targets with
    /// one iterable, so it skips the count matching.
    fn parse_set_clause(
        &mut self,
        left: Vec<Expr>,
        pos: Pos,
        range_form: bool,
    ) -> Result<SetClause, ParseError> {
        let is_let = match self.next().kind {
            TokenKind::Declare => true,
            TokenKind::Assign => false,
            _ => unreachable!(),
        };
        let right = self.parse_expr_list()?;

        for target in &left {
            let valid = match target {
                Expr::Ident(_) => true,
                Expr::Field(_) | Expr::Chain(_) => !is_let,
                _ => false,
            };
            if !valid {
                return Err(self.error(
                    target.pos(),
                    if is_let {
                        "':=' targets must be identifiers"
                    } else {
                        "assignment targets must be identifiers, fields or chains"
                    },
                ));
            }
        }

        let lookup = !range_form
            && left.len() == 2
            && right.len() == 1
            && matches!(right[0], Expr::Index(_));
        if !range_form && !lookup && left.len() != right.len() {
            return Err(self.error(
                pos,
                format!(
                    "assignment mismatch: {} targets but {} values",
                    left.len(),
                    right.len()
                ),
            ));
        }

        Ok(SetClause {
            is_let,
            lookup,
            left,
            right,
        })
    }

    fn parse_pipeline_from(&mut self, first: Expr) -> Result<PipeNode, ParseError> {
        let mut cmds = vec![self.finish_command(first)?];
        while self.accept(&TokenKind::Pipe) {
            let base = self.parse_expr()?;
            cmds.push(self.finish_command(base)?);
        }
        Ok(PipeNode { cmds })
    }

    fn finish_command(&mut self, base: Expr) -> Result<CommandNode, ParseError> {
        let pos = base.pos();
        if self.accept(&TokenKind::Colon) {
            let args = self.parse_expr_list()?;
            return Ok(CommandNode {
                base,
                call: true,
                args,
                pos,
            });
        }
        Ok(CommandNode {
            base,
            call: false,
            args: Vec::new(),
            pos,
        })
    }

    fn parse_if(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        let exprs = self.parse_expr_list()?;
        let (set, cond) = if matches!(self.peek(), TokenKind::Assign | TokenKind::Declare) {
            let set = self.parse_set_clause(exprs, pos, false)?;
            let cond = if self.accept(&TokenKind::Semicolon) {
                self.parse_expr()?
            } else {
                // condition defaults to the first bound name
                match &set.left[0] {
                    Expr::Ident(id) => Expr::Ident(IdentNode {
                        name: id.name.clone(),
                        pos: id.pos,
                    }),
                    other => {
                        return Err(self.error(
                            other.pos(),
                            "if assignment prelude without ';' requires an identifier target",
                        ))
                    }
                }
            };
            (Some(set), cond)
        } else {
            let mut exprs = exprs;
            if exprs.len() != 1 {
                return Err(self.error(pos, "unexpected ',' in if condition"));
            }
            (None, exprs.remove(0))
        };
        self.expect(TokenKind::RightDelim, "if statement")?;

        let (then_list, term) = self.parse_list(&[Terminator::Else, Terminator::End])?;
        let else_list = match term {
            Terminator::Else => {
                if self.peek() == &TokenKind::If {
                    let else_pos = self.pos();
                    self.next();
                    let nested = self.parse_if(else_pos)?;
                    Some(Arc::new(ListNode {
                        nodes: vec![nested],
                    }))
                } else {
                    self.expect(TokenKind::RightDelim, "else clause")?;
                    let (list, _) = self.parse_list(&[Terminator::End])?;
                    Some(list)
                }
            }
            _ => None,
        };

        Ok(Stmt::If(Box::new(IfNode {
            set,
            cond,
            then_list,
            else_list,
        })))
    }

    fn parse_range(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        let exprs = self.parse_expr_list()?;
        let (set, expr) = if matches!(self.peek(), TokenKind::Assign | TokenKind::Declare) {
            let set = self.parse_set_clause(exprs, pos, true)?;
            if set.right.len() != 1 {
                return Err(self.error(pos, "range expects a single iterable expression"));
            }
            if set.left.len() > 2 {
                return Err(self.error(pos, "range accepts at most two assignment targets"));
            }
            (Some(set), None)
        } else {
            let mut exprs = exprs;
            if exprs.len() != 1 {
                return Err(self.error(pos, "unexpected ',' in range expression"));
            }
            (None, Some(exprs.remove(0)))
        };
        self.expect(TokenKind::RightDelim, "range statement")?;

        let (body, term) = self.parse_list(&[Terminator::Else, Terminator::End])?;
        let else_list = match term {
            Terminator::Else => {
                self.expect(TokenKind::RightDelim, "range else clause")?;
                let (list, _) = self.parse_list(&[Terminator::End])?;
                Some(list)
            }
            _ => None,
        };

        Ok(Stmt::Range(Box::new(RangeNode {
            set,
            expr,
            body,
            else_list,
            pos,
        })))
    }

    fn parse_block(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        let (name, _) = self.expect_ident("block statement")?;
        self.expect(TokenKind::LParen, "block parameter list")?;
        let mut params = Vec::new();
        while self.peek() != &TokenKind::RParen {
            let (pname, _) = self.expect_ident("block parameter list")?;
            let default = if self.accept(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(BlockParam {
                name: pname,
                default,
            });
            if !self.accept(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "block parameter list")?;

        let expr = if self.peek() != &TokenKind::RightDelim {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::RightDelim, "block statement")?;

        let (body, term) = self.parse_list(&[Terminator::ContentMarker, Terminator::End])?;
        let content = if term == Terminator::ContentMarker {
            let (list, _) = self.parse_list(&[Terminator::End])?;
            Some(list)
        } else {
            None
        };

        let node = Arc::new(BlockNode {
            name: name.clone(),
            params,
            expr,
            body,
            content,
            pos,
        });
        self.blocks.insert(name, node.clone());
        Ok(Stmt::Block(node))
    }

    fn parse_yield(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        if self.accept(&TokenKind::Content) {
            let expr = if self.peek() != &TokenKind::RightDelim {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(TokenKind::RightDelim, "yield content statement")?;
            return Ok(Stmt::Yield(YieldNode::Content { expr }));
        }

        let (name, _) = self.expect_ident("yield statement")?;
        self.expect(TokenKind::LParen, "yield argument list")?;
        let mut args = Vec::new();
        while self.peek() != &TokenKind::RParen {
            let named = matches!(self.peek(), TokenKind::Ident(_))
                && self.peek2() == Some(&TokenKind::Assign);
            if named {
                let (arg_name, _) = self.expect_ident("yield argument")?;
                self.next(); // '='
                let expr = self.parse_expr()?;
                args.push(YieldArg {
                    name: Some(arg_name),
                    expr,
                });
            } else {
                let expr = self.parse_expr()?;
                args.push(YieldArg { name: None, expr });
            }
            if !self.accept(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "yield argument list")?;

        let mut expr = None;
        let mut has_content = false;
        if self.accept(&TokenKind::Content) {
            has_content = true;
        } else if self.peek() != &TokenKind::RightDelim {
            expr = Some(self.parse_expr()?);
            if self.accept(&TokenKind::Content) {
                has_content = true;
            }
        }
        self.expect(TokenKind::RightDelim, "yield statement")?;

        let content = if has_content {
            let (list, _) = self.parse_list(&[Terminator::End])?;
            Some(list)
        } else {
            None
        };

        Ok(Stmt::Yield(YieldNode::Block {
            name,
            args,
            expr,
            content,
            pos,
        }))
    }

    fn parse_include(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        let path = self.parse_expr()?;
        let context = if self.peek() != &TokenKind::RightDelim {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::RightDelim, "include statement")?;
        Ok(Stmt::Include(Box::new(IncludeNode {
            path,
            context,
            owner: self.path.clone(),
            pos,
        })))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.accept(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if !self.accept(&TokenKind::Question) {
            return Ok(cond);
        }
        let pos = cond.pos();
        let then_expr = self.parse_expr()?;
        self.expect(TokenKind::Colon, "ternary expression")?;
        let else_expr = self.parse_expr()?;
        Ok(Expr::Ternary(Box::new(TernaryNode {
            cond,
            then_expr,
            else_expr,
            pos,
        })))
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == &TokenKind::Or {
            let pos = self.pos();
            self.next();
            let right = self.parse_and()?;
            left = Expr::Logical(Box::new(LogicalNode {
                left,
                and: false,
                right,
                pos,
            }));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.peek() == &TokenKind::And {
            let pos = self.pos();
            self.next();
            let right = self.parse_equality()?;
            left = Expr::Logical(Box::new(LogicalNode {
                left,
                and: true,
                right,
                pos,
            }));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let negated = match self.peek() {
                TokenKind::Eq => false,
                TokenKind::Ne => true,
                _ => break,
            };
            let pos = self.pos();
            self.next();
            let right = self.parse_relational()?;
            left = Expr::Equality(Box::new(EqualityNode {
                left,
                negated,
                right,
                pos,
            }));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Ge => CmpOp::Ge,
                _ => break,
            };
            let pos = self.pos();
            self.next();
            let right = self.parse_additive()?;
            left = Expr::Compare(Box::new(CompareNode {
                left,
                op,
                right,
                pos,
            }));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Add => AddOp::Add,
                TokenKind::Sub => AddOp::Sub,
                _ => break,
            };
            let pos = self.pos();
            self.next();
            let right = self.parse_multiplicative()?;
            left = Expr::Additive(Box::new(AdditiveNode {
                left: Some(left),
                op,
                right,
                pos,
            }));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Mul => MulOp::Mul,
                TokenKind::Div => MulOp::Div,
                TokenKind::Mod => MulOp::Rem,
                _ => break,
            };
            let pos = self.pos();
            self.next();
            let right = self.parse_unary()?;
            left = Expr::Multiplicative(Box::new(MultiplicativeNode {
                left,
                op,
                right,
                pos,
            }));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        match self.peek() {
            TokenKind::Not => {
                self.next();
                let operand = self.parse_unary()?;
                Ok(Expr::Not(Box::new(operand), pos))
            }
            TokenKind::Sub => {
                self.next();
                let right = self.parse_unary()?;
                Ok(Expr::Additive(Box::new(AdditiveNode {
                    left: None,
                    op: AddOp::Sub,
                    right,
                    pos,
                })))
            }
            TokenKind::Add => {
                self.next();
                let right = self.parse_unary()?;
                Ok(Expr::Additive(Box::new(AdditiveNode {
                    left: None,
                    op: AddOp::Add,
                    right,
                    pos,
                })))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    let pos = self.pos();
                    self.next();
                    let (name, _) = self.expect_ident("field access")?;
                    expr = match expr {
                        Expr::Chain(mut chain) => {
                            chain.fields.push(name);
                            Expr::Chain(chain)
                        }
                        Expr::Field(mut field) => {
                            field.names.push(name);
                            Expr::Field(field)
                        }
                        base => Expr::Chain(Box::new(ChainNode {
                            base,
                            fields: vec![name],
                            pos,
                        })),
                    };
                }
                TokenKind::LBracket => {
                    let pos = self.pos();
                    self.next();
                    expr = self.parse_index_or_slice(expr, pos)?;
                }
                TokenKind::LParen => {
                    let pos = self.pos();
                    self.next();
                    let args = if self.peek() == &TokenKind::RParen {
                        Vec::new()
                    } else {
                        self.parse_expr_list()?
                    };
                    self.expect(TokenKind::RParen, "call arguments")?;
                    expr = Expr::Call(Box::new(CallNode {
                        base: expr,
                        args,
                        pos,
                    }));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_index_or_slice(&mut self, base: Expr, pos: Pos) -> Result<Expr, ParseError> {
        if self.accept(&TokenKind::Colon) {
            // [:hi] or [:]
            let hi = if self.peek() == &TokenKind::RBracket {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(TokenKind::RBracket, "slice expression")?;
            return Ok(Expr::Slice(Box::new(SliceNode {
                base,
                lo: None,
                hi,
                pos,
            })));
        }

        let index = self.parse_expr()?;
        if self.accept(&TokenKind::Colon) {
            let hi = if self.peek() == &TokenKind::RBracket {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(TokenKind::RBracket, "slice expression")?;
            return Ok(Expr::Slice(Box::new(SliceNode {
                base,
                lo: Some(index),
                hi,
                pos,
            })));
        }

        self.expect(TokenKind::RBracket, "index expression")?;
        Ok(Expr::Index(Box::new(IndexNode { base, index, pos })))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        match self.peek().clone() {
            TokenKind::Nil => {
                self.next();
                Ok(Expr::Nil(pos))
            }
            TokenKind::True => {
                self.next();
                Ok(Expr::Bool(true, pos))
            }
            TokenKind::False => {
                self.next();
                Ok(Expr::Bool(false, pos))
            }
            TokenKind::Number(n) => {
                self.next();
                Ok(Expr::Number(n, pos))
            }
            TokenKind::Str(s) => {
                self.next();
                Ok(Expr::Str(Arc::from(s.as_str()), pos))
            }
            TokenKind::Ident(name) => {
                self.next();
                Ok(Expr::Ident(IdentNode { name, pos }))
            }
            TokenKind::Dot => {
                self.next();
                let mut names = Vec::new();
                if let TokenKind::Ident(_) = self.peek() {
                    let (first, _) = self.expect_ident("field access")?;
                    names.push(first);
                    while self.peek() == &TokenKind::Dot
                        && matches!(self.peek2(), Some(TokenKind::Ident(_)))
                    {
                        self.next();
                        let (name, _) = self.expect_ident("field access")?;
                        names.push(name);
                    }
                }
                Ok(Expr::Field(FieldNode { names, pos }))
            }
            TokenKind::LParen => {
                self.next();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "parenthesized expression")?;
                Ok(inner)
            }
            other => Err(self.error(
                pos,
                format!("unexpected {} in expression", other.describe()),
            )),
        }
    }
}
