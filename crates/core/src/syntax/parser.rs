//! Recursive-descent parser producing a statement list from tokens

use std::sync::Arc;

use super::ast::{
    Argument, AssignTarget, BinOp, CmpOp, Expr, FunctionDef, Param, Stmt, StmtKind, UnaryOp,
};
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::ScriptError;

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not",
    "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

type ParseResult<T> = Result<T, ScriptError>;

/// Bound on bracket, unary, block and operator-chain nesting
const MAX_NESTING: usize = 100;

/// Parses a descriptor body into statements
pub fn parse_module(source: &str) -> ParseResult<Vec<Stmt>> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn module(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.advance();
                }
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    fn statement(&mut self) -> ParseResult<Vec<Stmt>> {
        let line = self.peek().line;
        let stmt = match self.peek_name() {
            Some("if") => self.if_statement()?,
            Some("for") => self.for_statement()?,
            Some("def") => self.def_statement()?,
            Some(kw @ ("while" | "class" | "try" | "with" | "lambda" | "global" | "del"
            | "raise" | "assert" | "yield" | "nonlocal")) => {
                return Err(self.error(format!("unsupported statement '{kw}'")));
            }
            _ => return self.simple_line(),
        };
        Ok(vec![Stmt { kind: stmt, line }])
    }

    /// `simple (';' simple)* [';'] NEWLINE`
    fn simple_line(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            let line = self.peek().line;
            let kind = self.simple_statement()?;
            stmts.push(Stmt { kind, line });

            if self.eat(&TokenKind::Semicolon) {
                if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
                    break;
                }
                continue;
            }
            break;
        }
        match self.peek_kind() {
            TokenKind::Newline => {
                self.advance();
            }
            TokenKind::Eof | TokenKind::Dedent => {}
            _ => return Err(self.unexpected("end of statement")),
        }
        Ok(stmts)
    }

    fn simple_statement(&mut self) -> ParseResult<StmtKind> {
        match self.peek_name() {
            Some("pass") => {
                self.advance();
                return Ok(StmtKind::Pass);
            }
            Some("break") => {
                self.advance();
                return Ok(StmtKind::Break);
            }
            Some("continue") => {
                self.advance();
                return Ok(StmtKind::Continue);
            }
            Some("return") => {
                self.advance();
                if matches!(
                    self.peek_kind(),
                    TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
                ) {
                    return Ok(StmtKind::Return(None));
                }
                return Ok(StmtKind::Return(Some(self.test_list()?)));
            }
            Some("import") => return self.import_statement(),
            Some("from") => return self.from_import_statement(),
            _ => {}
        }

        let expr = self.test_list()?;
        match self.peek_kind() {
            TokenKind::Assign => {
                self.advance();
                let mut targets = vec![expr];
                let mut value = self.test_list()?;
                // a = b = value
                while self.eat(&TokenKind::Assign) {
                    targets.push(value);
                    value = self.test_list()?;
                }
                if targets.len() > 1 {
                    return Err(self.error("chained assignment is not supported"));
                }
                let target = self.assign_target(targets.remove(0))?;
                Ok(StmtKind::Assign { target, value })
            }
            TokenKind::PlusAssign | TokenKind::MinusAssign => {
                let op = if self.advance().kind == TokenKind::PlusAssign {
                    BinOp::Add
                } else {
                    BinOp::Sub
                };
                let Expr::Name(name) = expr else {
                    return Err(self.error("augmented assignment requires a plain name"));
                };
                let value = self.test_list()?;
                Ok(StmtKind::AugAssign { name, op, value })
            }
            _ => Ok(StmtKind::Expr(expr)),
        }
    }

    fn assign_target(&self, expr: Expr) -> ParseResult<AssignTarget> {
        match expr {
            Expr::Name(name) => Ok(AssignTarget::Name(name)),
            Expr::Tuple(items) | Expr::List(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Expr::Name(name) => names.push(name),
                        _ => return Err(self.error("cannot unpack into a non-name target")),
                    }
                }
                Ok(AssignTarget::Unpack(names))
            }
            expr @ (Expr::Attribute { .. } | Expr::Subscript { .. }) => {
                Ok(AssignTarget::Other(expr))
            }
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    fn import_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let mut bindings = Vec::new();
        loop {
            let path = self.dotted_name()?;
            // `import a.b` binds `a`, `import a.b as c` binds `c` to `a.b`
            let (bound, bound_path) = if self.eat_name("as") {
                (self.identifier()?, path)
            } else {
                let top = path.split('.').next().unwrap_or_default().to_string();
                (top.clone(), top)
            };
            bindings.push((bound, bound_path));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(StmtKind::Import(bindings))
    }

    fn from_import_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let mut module = String::new();
        while self.eat(&TokenKind::Dot) {
            module.push('.');
        }
        if !self.at_name("import") {
            module.push_str(&self.dotted_name()?);
        }
        if !self.eat_name("import") {
            return Err(self.unexpected("'import'"));
        }

        if self.eat(&TokenKind::Star) {
            return Ok(StmtKind::Import(Vec::new()));
        }

        let parenthesized = self.eat(&TokenKind::LParen);
        let mut bindings = Vec::new();
        loop {
            if parenthesized && self.peek_kind() == &TokenKind::RParen {
                break;
            }
            let name = self.identifier()?;
            let bound = if self.eat_name("as") {
                self.identifier()?
            } else {
                name.clone()
            };
            let separator = if module.ends_with('.') || module.is_empty() { "" } else { "." };
            bindings.push((bound, format!("{module}{separator}{name}")));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if parenthesized {
            self.expect(&TokenKind::RParen, "')'")?;
        }
        Ok(StmtKind::Import(bindings))
    }

    fn dotted_name(&mut self) -> ParseResult<String> {
        let mut path = self.identifier()?;
        while self.eat(&TokenKind::Dot) {
            path.push('.');
            path.push_str(&self.identifier()?);
        }
        Ok(path)
    }

    fn if_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let mut branches = Vec::new();
        let condition = self.test()?;
        let body = self.block()?;
        branches.push((condition, body));

        let mut otherwise = Vec::new();
        loop {
            if self.eat_name("elif") {
                let condition = self.test()?;
                let body = self.block()?;
                branches.push((condition, body));
            } else if self.eat_name("else") {
                otherwise = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn for_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let targets = self.loop_targets()?;
        if !self.eat_name("in") {
            return Err(self.unexpected("'in'"));
        }
        let iter = self.test_list()?;
        let body = self.block()?;
        Ok(StmtKind::For {
            targets,
            iter,
            body,
        })
    }

    fn loop_targets(&mut self) -> ParseResult<Vec<String>> {
        let parenthesized = self.eat(&TokenKind::LParen);
        let mut targets = vec![self.identifier()?];
        while self.eat(&TokenKind::Comma) {
            if self.at_name("in") || self.peek_kind() == &TokenKind::RParen {
                break;
            }
            targets.push(self.identifier()?);
        }
        if parenthesized {
            self.expect(&TokenKind::RParen, "')'")?;
        }
        Ok(targets)
    }

    fn def_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let name = self.identifier()?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while self.peek_kind() != &TokenKind::RParen {
            if matches!(self.peek_kind(), TokenKind::Star | TokenKind::DoubleStar) {
                return Err(self.error("variadic parameters are not supported"));
            }
            let param = self.identifier()?;
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.test()?)
            } else {
                None
            };
            params.push(Param {
                name: param,
                default,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.block()?;
        Ok(StmtKind::Def(Arc::new(FunctionDef { name, params, body })))
    }

    /// `':' (simple_line | NEWLINE INDENT statement+ DEDENT)`
    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.nested(Self::suite)
    }

    fn suite(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::Colon, "':'")?;
        if !self.eat(&TokenKind::Newline) {
            return self.simple_line();
        }
        self.expect(&TokenKind::Indent, "an indented block")?;
        let mut body = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
            body.extend(self.statement()?);
        }
        self.eat(&TokenKind::Dedent);
        Ok(body)
    }

    // Expressions

    /// `test (',' test)* [',']`, a bare comma list becomes a tuple
    fn test_list(&mut self) -> ParseResult<Expr> {
        let first = self.test()?;
        if self.peek_kind() != &TokenKind::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if !self.starts_expression() {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn test(&mut self) -> ParseResult<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        if self.at_name("lambda") {
            return Err(self.error("lambda expressions are not supported"));
        }
        let expr = self.or_test()?;
        if self.eat_name("if") {
            let condition = self.or_test()?;
            if !self.eat_name("else") {
                return Err(self.unexpected("'else'"));
            }
            let otherwise = self.test()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(expr),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(expr)
    }

    fn or_test(&mut self) -> ParseResult<Expr> {
        let mut left = self.and_test()?;
        let mut links = 0;
        while self.eat_name("or") {
            self.descend()?;
            links += 1;
            let right = self.and_test()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn and_test(&mut self) -> ParseResult<Expr> {
        let mut left = self.not_test()?;
        let mut links = 0;
        while self.eat_name("and") {
            self.descend()?;
            links += 1;
            let right = self.not_test()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn not_test(&mut self) -> ParseResult<Expr> {
        if self.eat_name("not") {
            let operand = self.nested(Self::not_test)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.arith()?;
        let mut links = 0;
        loop {
            let (op, width) = match self.peek_kind() {
                TokenKind::Eq => (CmpOp::Eq, 1),
                TokenKind::NotEq => (CmpOp::NotEq, 1),
                TokenKind::Lt => (CmpOp::Lt, 1),
                TokenKind::LtEq => (CmpOp::LtEq, 1),
                TokenKind::Gt => (CmpOp::Gt, 1),
                TokenKind::GtEq => (CmpOp::GtEq, 1),
                TokenKind::Name(n) if n == "in" => (CmpOp::In, 1),
                TokenKind::Name(n) if n == "is" && self.peek_name_at(1) == Some("not") => {
                    (CmpOp::IsNot, 2)
                }
                TokenKind::Name(n) if n == "is" => (CmpOp::Is, 1),
                TokenKind::Name(n) if n == "not" && self.peek_name_at(1) == Some("in") => {
                    (CmpOp::NotIn, 2)
                }
                _ => break,
            };
            for _ in 0..width {
                self.advance();
            }
            self.descend()?;
            links += 1;
            let right = self.arith()?;
            left = Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn arith(&mut self) -> ParseResult<Expr> {
        let mut left = self.term()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.descend()?;
            links += 1;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut left = self.factor()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            self.descend()?;
            links += 1;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.primary(),
        };
        self.advance();
        let operand = self.nested(Self::factor)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.atom()?;
        let mut links = 0;
        loop {
            if matches!(
                self.peek_kind(),
                TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot
            ) {
                self.descend()?;
                links += 1;
            }
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.call_arguments()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    if self.peek_kind() == &TokenKind::Colon {
                        return Err(self.error("slices are not supported"));
                    }
                    let index = self.test_list()?;
                    if self.peek_kind() == &TokenKind::Colon {
                        return Err(self.error("slices are not supported"));
                    }
                    self.expect(&TokenKind::RBracket, "']'")?;
                    expr = Expr::Subscript {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.identifier()?;
                    expr = Expr::Attribute {
                        object: Box::new(expr),
                        name,
                    };
                }
                _ => break,
            }
        }
        self.depth -= links;
        Ok(expr)
    }

    fn call_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        let mut args = Vec::new();
        while self.peek_kind() != &TokenKind::RParen {
            let arg = match self.peek_kind() {
                TokenKind::Star => {
                    self.advance();
                    Argument::Splat(self.test()?)
                }
                TokenKind::DoubleStar => {
                    self.advance();
                    Argument::KwSplat(self.test()?)
                }
                TokenKind::Name(name)
                    if !is_keyword(name)
                        && self.tokens.get(self.pos + 1).map(|t| &t.kind)
                            == Some(&TokenKind::Assign) =>
                {
                    let name = name.clone();
                    self.advance();
                    self.advance();
                    Argument::Keyword(name, self.test()?)
                }
                _ => {
                    let value = self.test()?;
                    if self.at_name("for") {
                        return Err(self.error("generator arguments are not supported"));
                    }
                    Argument::Positional(value)
                }
            };
            args.push(arg);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Name(name) => match name.as_str() {
                "True" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "False" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "None" => {
                    self.advance();
                    Ok(Expr::None)
                }
                _ if is_keyword(&name) => Err(self.unexpected("an expression")),
                _ => {
                    self.advance();
                    Ok(Expr::Name(name.clone()))
                }
            },
            TokenKind::LParen => {
                self.advance();
                if self.eat(&TokenKind::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.test()?;
                if self.eat(&TokenKind::RParen) {
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.eat(&TokenKind::Comma) {
                    if self.peek_kind() == &TokenKind::RParen {
                        break;
                    }
                    items.push(self.test()?);
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::Tuple(items))
            }
            TokenKind::LBracket => {
                self.advance();
                if self.eat(&TokenKind::RBracket) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.test()?;
                if self.eat_name("for") {
                    let targets = self.loop_targets()?;
                    if !self.eat_name("in") {
                        return Err(self.unexpected("'in'"));
                    }
                    let iter = self.or_test()?;
                    let condition = if self.eat_name("if") {
                        Some(Box::new(self.or_test()?))
                    } else {
                        None
                    };
                    self.expect(&TokenKind::RBracket, "']'")?;
                    return Ok(Expr::ListComp {
                        element: Box::new(first),
                        targets,
                        iter: Box::new(iter),
                        condition,
                    });
                }
                let mut items = vec![first];
                while self.eat(&TokenKind::Comma) {
                    if self.peek_kind() == &TokenKind::RBracket {
                        break;
                    }
                    items.push(self.test()?);
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while self.peek_kind() != &TokenKind::RBrace {
                    let key = self.test()?;
                    self.expect(&TokenKind::Colon, "':'")?;
                    let value = self.test()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace, "'}'")?;
                Ok(Expr::Dict(entries))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    // Token helpers

    fn starts_expression(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Name(name) => !is_keyword(name) || name == "not" || name == "lambda",
            TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Minus
            | TokenKind::Plus => true,
            _ => false,
        }
    }

    fn identifier(&mut self) -> ParseResult<String> {
        match self.peek_kind() {
            TokenKind::Name(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_name(&self) -> Option<&str> {
        self.peek_name_at(0)
    }

    fn peek_name_at(&self, offset: usize) -> Option<&str> {
        match self.tokens.get(self.pos + offset).map(|t| &t.kind) {
            Some(TokenKind::Name(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    fn at_name(&self, keyword: &str) -> bool {
        self.peek_name() == Some(keyword)
    }

    fn eat_name(&mut self, keyword: &str) -> bool {
        if self.at_name(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Runs `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("too many nested expressions or blocks"));
        }
        self.depth += 1;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let token = self.peek();
        ScriptError::syntax(token.line, token.column, message)
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        let found = match self.peek_kind() {
            TokenKind::Name(name) => format!("'{name}'"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Int(_) | TokenKind::Float(_) => "number".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("{other:?}"),
        };
        self.error(format!("expected {expected}, found {found}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_expr(source: &str) -> Expr {
        let stmts = parse_module(source).unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StmtKind::Expr(expr) => expr.clone(),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_target_call() {
        let expr = single_expr(
            r#"
java_library(
  name = 'util',
  dependencies = [':base', '3rdparty/jvm/com/google/guava'],
  sources = globs('*.java', exclude = ['Gen.java']),
)
"#,
        );
        let Expr::Call { func, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(*func, Expr::Name("java_library".to_string()));
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0], Argument::Keyword(k, Expr::Str(v)) if k == "name" && v == "util"));
        assert!(matches!(&args[2], Argument::Keyword(k, Expr::Call { .. }) if k == "sources"));
    }

    #[test]
    fn test_precedence() {
        let expr = single_expr("a + b * c");
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_attribute_chain_and_splat() {
        let expr = single_expr("artifact(org = 'x').publish(*extra, **opts)");
        let Expr::Call { func, args } = expr else {
            panic!("expected call");
        };
        assert!(matches!(*func, Expr::Attribute { ref name, .. } if name == "publish"));
        assert!(matches!(args[0], Argument::Splat(_)));
        assert!(matches!(args[1], Argument::KwSplat(_)));
    }

    #[test]
    fn test_compound_statements() {
        let stmts = parse_module(
            r#"
import os.path
from pants.base import build_environment as env, Target
DEPS = []
for name in ['a', 'b']:
    DEPS += [':' + name]
if len(DEPS) > 1:
    pass
elif True: pass
else:
    DEPS = None

def helper(prefix, suffix = '-lib'):
    return prefix + suffix
"#,
        )
        .unwrap();

        assert_eq!(stmts.len(), 6);
        assert_eq!(
            stmts[0].kind,
            StmtKind::Import(vec![("os".to_string(), "os".to_string())])
        );
        assert_eq!(
            stmts[1].kind,
            StmtKind::Import(vec![
                ("env".to_string(), "pants.base.build_environment".to_string()),
                ("Target".to_string(), "pants.base.Target".to_string()),
            ])
        );
        assert!(matches!(stmts[3].kind, StmtKind::For { .. }));
        let StmtKind::If { branches, otherwise } = &stmts[4].kind else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise.len(), 1);
        let StmtKind::Def(def) = &stmts[5].kind else {
            panic!("expected def");
        };
        assert_eq!(def.params.len(), 2);
        assert!(def.params[1].default.is_some());
    }

    #[test]
    fn test_list_comprehension() {
        let expr = single_expr("[':' + n for n in names if n != 'skip']");
        assert!(matches!(expr, Expr::ListComp { condition: Some(_), .. }));
    }

    #[test]
    fn test_not_in_and_conditional() {
        let expr = single_expr("'a' if x not in y else 'b'");
        let Expr::Conditional { condition, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*condition, Expr::Compare { op: CmpOp::NotIn, .. }));
    }

    #[test]
    fn test_missing_comma_is_syntax_error() {
        let err = parse_module("java_library(\n  name = 'a'\n  sources = []\n)\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let parens = format!("x = {}1{}\n", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(parse_module(&parens), Err(ScriptError::Syntax { .. })));

        let chain = format!("x = 1{}\n", " + 1".repeat(5_000));
        assert!(matches!(parse_module(&chain), Err(ScriptError::Syntax { .. })));
        let negations = format!("x = {}1\n", "-".repeat(5_000));
        assert!(parse_module(&negations).is_err());
        let attributes = format!("x = a{}\n", ".b".repeat(5_000));
        assert!(parse_module(&attributes).is_err());

        let lists = format!("x = {}1{}\n", "[".repeat(30), "]".repeat(30));
        assert!(parse_module(&lists).is_ok());
        assert!(parse_module(&format!("x = 1{}\n", " + 1".repeat(30))).is_ok());
    }

    #[test]
    fn test_unsupported_statement() {
        let err = parse_module("while True:\n  pass\n").unwrap_err();
        assert!(err.to_string().contains("while"));
    }

    #[test]
    fn test_tuple_unpacking_assignment() {
        let stmts = parse_module("a, b = 1, 2\n").unwrap();
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Assign { target: AssignTarget::Unpack(names), value: Expr::Tuple(_) } if names.len() == 2
        ));
    }
}
