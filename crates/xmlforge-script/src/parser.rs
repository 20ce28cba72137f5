//! Recursive-descent parser producing [`SourceFile`].
//!
//! Nesting depth is bounded so hostile input produces a syntax error instead
//! of exhausting the host stack.

use crate::ast::{
    AssignOp, AssignTarget, BinaryOp, Block, Expr, ExprKind, FunctionDecl, Item, Literal,
    SourceFile, Stmt, StmtKind, UnaryOp,
};
use crate::error::{LoadError, Position};
use crate::lexer::{tokenize, Token, TokenKind};

/// Maximum combined block/expression nesting.
pub const MAX_NESTING: usize = 96;

/// Parse a complete source file.
pub fn parse_source(source: &str) -> Result<SourceFile, LoadError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.source_file()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

type ParseResult<T> = Result<T, LoadError>;

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn position(&self) -> Position {
        self.tokens[self.pos].position
    }

    fn line(&self) -> u32 {
        self.position().line
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(LoadError::Syntax {
            message: message.into(),
            position: self.position(),
        })
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> ParseResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            self.error(format!(
                "expected {} {}, found {}",
                kind.describe(),
                context,
                self.peek().describe()
            ))
        }
    }

    fn ident(&mut self, context: &str) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => self.error(format!(
                "expected identifier {}, found {}",
                context,
                other.describe()
            )),
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return self.error(format!("nesting deeper than {MAX_NESTING} levels"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ── items ──────────────────────────────────────────────────────────────

    fn source_file(&mut self) -> ParseResult<SourceFile> {
        let mut items = Vec::new();
        while !self.check(&TokenKind::Eof) {
            items.push(self.item()?);
        }
        Ok(SourceFile { items })
    }

    fn item(&mut self) -> ParseResult<Item> {
        let line = self.line();
        match self.peek() {
            TokenKind::Import => {
                if self.peek_at(1) == &TokenKind::LParen {
                    return self.error("dynamic import(...) is only allowed inside functions");
                }
                let module = self.import_name()?;
                Ok(Item::Import { module, line })
            }
            TokenKind::Fn => Ok(Item::Function(self.function()?)),
            TokenKind::Let => {
                self.advance();
                let name = self.ident("after 'let'")?;
                self.expect(TokenKind::Assign, "in global declaration")?;
                let value = self.expression()?;
                self.expect(TokenKind::Semicolon, "after global declaration")?;
                Ok(Item::Global { name, value, line })
            }
            other => self.error(format!(
                "expected 'fn', 'let' or 'import' at top level, found {}",
                other.describe()
            )),
        }
    }

    /// `import "name";` or `import name;` (the `import` keyword is current).
    fn import_name(&mut self) -> ParseResult<String> {
        self.advance();
        let module = match self.peek().clone() {
            TokenKind::Str(name) | TokenKind::Ident(name) => {
                self.advance();
                name
            }
            other => {
                return self.error(format!(
                    "expected module name after 'import', found {}",
                    other.describe()
                ))
            }
        };
        self.expect(TokenKind::Semicolon, "after import")?;
        Ok(module)
    }

    fn function(&mut self) -> ParseResult<FunctionDecl> {
        let line = self.line();
        self.advance();
        let name = self.ident("after 'fn'")?;
        self.expect(TokenKind::LParen, "after function name")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param = self.ident("in parameter list")?;
                if params.contains(&param) {
                    return self.error(format!("duplicate parameter '{param}'"));
                }
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "after parameters")?;
        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            line,
        })
    }

    // ── statements ─────────────────────────────────────────────────────────

    fn block(&mut self) -> ParseResult<Block> {
        self.enter()?;
        self.expect(TokenKind::LBrace, "to open block")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return self.error("unexpected end of input inside block");
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        self.leave();
        Ok(stmts)
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            TokenKind::Let => {
                self.advance();
                let name = self.ident("after 'let'")?;
                self.expect(TokenKind::Assign, "in let statement")?;
                let value = self.expression()?;
                self.expect(TokenKind::Semicolon, "after let statement")?;
                StmtKind::Let { name, value }
            }
            TokenKind::If => self.if_statement()?,
            TokenKind::While => {
                self.advance();
                let condition = self.expression()?;
                let body = self.block()?;
                StmtKind::While { condition, body }
            }
            TokenKind::For => {
                self.advance();
                let var = self.ident("after 'for'")?;
                self.expect(TokenKind::In, "in for loop")?;
                let iterable = self.expression()?;
                let body = self.block()?;
                StmtKind::For {
                    var,
                    iterable,
                    body,
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::Semicolon, "after return")?;
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, "after break")?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "after continue")?;
                StmtKind::Continue
            }
            TokenKind::Import if self.peek_at(1) != &TokenKind::LParen => {
                let module = self.import_name()?;
                StmtKind::Import { module }
            }
            TokenKind::Fn => return self.error("functions may only be declared at top level"),
            _ => self.expression_statement()?,
        };
        Ok(Stmt { kind, line })
    }

    fn if_statement(&mut self) -> ParseResult<StmtKind> {
        let mut branches = Vec::new();
        let mut otherwise = None;
        self.advance();
        let condition = self.expression()?;
        let body = self.block()?;
        branches.push((condition, body));
        while self.eat(&TokenKind::Else) {
            if self.eat(&TokenKind::If) {
                let condition = self.expression()?;
                let body = self.block()?;
                branches.push((condition, body));
            } else {
                otherwise = Some(self.block()?);
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn expression_statement(&mut self) -> ParseResult<StmtKind> {
        let expr = self.expression()?;
        let op = match self.peek() {
            TokenKind::Assign => Some(AssignOp::Set),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            _ => None,
        };
        let kind = match op {
            Some(op) => {
                let target = match into_target(expr) {
                    Some(target) => target,
                    None => return self.error("invalid assignment target"),
                };
                self.advance();
                let value = self.expression()?;
                StmtKind::Assign { target, op, value }
            }
            None => StmtKind::Expr(expr),
        };
        self.expect(TokenKind::Semicolon, "after statement")?;
        Ok(kind)
    }

    // ── expressions ────────────────────────────────────────────────────────

    fn expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let expr = self.or_expr();
        self.leave();
        expr
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.check(&TokenKind::OrOr) {
            let line = self.line();
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr {
                kind: ExprKind::Or(Box::new(lhs), Box::new(rhs)),
                line,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.equality()?;
        while self.check(&TokenKind::AndAnd) {
            let line = self.line();
            self.advance();
            let rhs = self.equality()?;
            lhs = Expr {
                kind: ExprKind::And(Box::new(lhs), Box::new(rhs)),
                line,
            };
        }
        Ok(lhs)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> ParseResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> ParseResult<Expr> {
        let mut lhs = next(self)?;
        loop {
            let Some(op) = ops
                .iter()
                .find(|(token, _)| token == self.peek())
                .map(|(_, op)| *op)
            else {
                return Ok(lhs);
            };
            let line = self.line();
            self.advance();
            let rhs = next(self)?;
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                line,
            };
        }
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            Self::comparison,
            &[
                (TokenKind::EqEq, BinaryOp::Eq),
                (TokenKind::NotEq, BinaryOp::NotEq),
            ],
        )
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            Self::additive,
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
        )
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            Self::multiplicative,
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
        )
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            Self::unary,
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary();
        self.leave();
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand?),
            },
            line,
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        while self.check(&TokenKind::LBracket) {
            let line = self.line();
            self.advance();
            let index = self.expression()?;
            self.expect(TokenKind::RBracket, "after index")?;
            expr = Expr {
                kind: ExprKind::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                },
                line,
            };
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::LParen, "to open argument list")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) || self.check(&TokenKind::RParen) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close argument list")?;
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let kind = match self.peek().clone() {
            TokenKind::Int(v) => {
                self.advance();
                ExprKind::Literal(Literal::Int(v))
            }
            TokenKind::Float(v) => {
                self.advance();
                ExprKind::Literal(Literal::Float(v))
            }
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::Literal(Literal::Str(s))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Literal(Literal::Null)
            }
            TokenKind::Import => {
                self.advance();
                let mut args = self.arguments()?;
                if args.len() != 1 {
                    return self.error("import(...) takes exactly one module name");
                }
                ExprKind::DynamicImport(Box::new(args.remove(0)))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::ColonColon) {
                    let function = self.ident("after '::'")?;
                    let args = self.arguments()?;
                    ExprKind::ModuleCall {
                        module: name,
                        function,
                        args,
                    }
                } else if self.check(&TokenKind::LParen) {
                    let args = self.arguments()?;
                    ExprKind::Call { name, args }
                } else {
                    ExprKind::Var(name)
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "to close parenthesis")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "to close list literal")?;
                ExprKind::List(items)
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.expression()?;
                    self.expect(TokenKind::Colon, "after map key")?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "to close map literal")?;
                ExprKind::Map(entries)
            }
            other => {
                return self.error(format!("expected expression, found {}", other.describe()))
            }
        };
        Ok(Expr { kind, line })
    }
}

fn into_target(expr: Expr) -> Option<AssignTarget> {
    let mut indices = Vec::new();
    let mut current = expr;
    loop {
        match current.kind {
            ExprKind::Var(root) => {
                indices.reverse();
                return Some(AssignTarget { root, indices });
            }
            ExprKind::Index { target, index } => {
                indices.push(*index);
                current = *target;
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_entry_point() {
        let file = parse_source(
            r#"
            import "xml";
            fn transform_xml(input) {
                return input;
            }
            "#,
        )
        .unwrap();
        assert_eq!(file.items.len(), 2);
        match &file.items[1] {
            Item::Function(decl) => {
                assert_eq!(decl.name, "transform_xml");
                assert_eq!(decl.params, vec!["input".to_string()]);
                assert_eq!(decl.line, 3);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_mul_binds_tighter_than_add() {
        let file = parse_source("let x = 1 + 2 * 3;").unwrap();
        let Item::Global { value, .. } = &file.items[0] else {
            panic!("expected global");
        };
        match &value.kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(
                rhs.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_index_assignment_target() {
        let file = parse_source("fn f(m) { m[\"a\"][0] += 1; }").unwrap();
        let Item::Function(decl) = &file.items[0] else {
            panic!("expected function");
        };
        match &decl.body[0].kind {
            StmtKind::Assign { target, op, .. } => {
                assert_eq!(target.root, "m");
                assert_eq!(target.indices.len(), 2);
                assert_eq!(*op, AssignOp::Add);
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_source("fn f() { len(x) = 2; }").unwrap_err();
        assert!(err.to_string().contains("invalid assignment target"));
    }

    #[test]
    fn test_missing_semicolon_reports_line() {
        let err = parse_source("fn f() {\n  let a = 1\n}").unwrap_err();
        match err {
            LoadError::Syntax { position, .. } => assert_eq!(position.line, 3),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!("let x = {}1{};", "(".repeat(500), ")".repeat(500));
        let err = parse_source(&source).unwrap_err();
        assert!(err.to_string().contains("nesting deeper"));
    }

    #[test]
    fn test_dynamic_import_expression_inside_function() {
        let file = parse_source("fn f() { import(\"xml\"); }").unwrap();
        let Item::Function(decl) = &file.items[0] else {
            panic!("expected function");
        };
        assert!(matches!(
            &decl.body[0].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::DynamicImport(_),
                ..
            })
        ));
    }

    #[test]
    fn test_dynamic_import_rejected_at_top_level() {
        assert!(parse_source("import(\"xml\");").unwrap_err().is_syntax());
    }

    #[test]
    fn test_nested_function_rejected() {
        let err = parse_source("fn f() { fn g() {} }").unwrap_err();
        assert!(err.to_string().contains("top level"));
    }
}
