//! `expr` lexer, AST, parser, and evaluator.
//!
//! Operands are numbers, `$var` references, `[script]` substitutions,
//! `"quoted"` and `{braced}` strings, boolean barewords, and math function
//! calls. Substitutions inside the expression happen at evaluation time, so
//! `&&`, `||` and `?:` only evaluate the branch they need.
//!
//! Operator precedence (lowest → highest):
//!   ternary  →  or  →  and  →  bit-or  →  bit-xor  →  bit-and  →
//!   in/ni  →  eq/ne  →  equality  →  relational  →  shift  →
//!   additive  →  multiplicative  →  power  →  unary  →  primary

use std::cmp::Ordering;

use super::interp::{matching_brace, scan_var_name, Exception, Outcome};
use super::list::parse_list;
use super::value::{is_legacy_octal, parse_boolean, parse_wide_int, Num, Value};

// ── EvalContext ───────────────────────────────────────────────────────────────

/// What the evaluator needs from the interpreter.
pub trait EvalContext {
    /// Apply `$`, `[...]` and backslash substitution to `text`.
    fn subst(&mut self, text: &str) -> Result<String, Exception>;

    /// Evaluate a script operand.
    fn eval_script(&mut self, script: &str) -> Outcome;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Operands
    Num(Value),
    /// Source text of a variable reference, `$` included.
    Var(String),
    /// Script inside `[...]`.
    Cmd(String),
    /// Text inside `"..."`, substituted on evaluation.
    Quoted(String),
    /// Text inside `{...}`, taken literally.
    Braced(String),
    Ident(String),

    // Arithmetic and bitwise
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow, // **
    Bang,
    Tilde,
    Ampersand,
    Pipe,
    Caret,
    ShiftLeft,
    ShiftRight,

    // Comparison
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,
    StrEq, // eq
    StrNe, // ne
    In,
    Ni,

    // Logical
    And, // &&
    Or,  // ||

    Question,
    Colon,
    Comma,
    LParen,
    RParen,
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    text: &'a str,
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer {
            text,
            src: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Lex a number starting at `start`: integers in any Tcl radix and
    /// decimal floats with optional exponent.
    fn read_number(&mut self, start: usize) -> Result<Token, String> {
        while matches!(self.peek(), Some(b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.')) {
            self.pos += 1;
            let hex = self.text[start..].starts_with("0x") || self.text[start..].starts_with("0X");
            if !hex
                && matches!(self.src[self.pos - 1], b'e' | b'E')
                && matches!(self.peek(), Some(b'+' | b'-'))
                && matches!(self.peek2(), Some(b'0'..=b'9'))
            {
                self.pos += 1;
            }
        }
        let text = &self.text[start..self.pos];
        match parse_wide_int(text) {
            Ok(n) => return Ok(Token::Num(Value::Int(n))),
            Err(e) if is_legacy_octal(text) => return Err(e),
            Err(_) => {}
        }
        match text.parse::<f64>() {
            Ok(x) => Ok(Token::Num(Value::Float(x))),
            Err(_) => Err(format!("invalid number \"{text}\" in expression")),
        }
    }

    /// Lex `$name`, `$name(index)` or `${name}` starting at the `$`.
    fn read_var(&mut self, start: usize) -> Result<Token, String> {
        if self.eat(b'{') {
            let close = self.text[self.pos..]
                .find('}')
                .ok_or("missing close-brace for variable name")?;
            self.pos += close + 1;
        } else {
            self.pos = scan_var_name(self.src, self.pos);
            if self.pos == start + 1 {
                return Err("invalid character \"$\" in expression".into());
            }
            if self.peek() == Some(b'(') {
                let close = self.text[self.pos..].find(')').ok_or("missing )")?;
                self.pos += close + 1;
            }
        }
        Ok(Token::Var(self.text[start..self.pos].to_owned()))
    }

    /// Lex `[script]`, returning the script.
    fn read_command(&mut self) -> Result<Token, String> {
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => self.pos += 1,
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Token::Cmd(self.text[start..self.pos - 1].to_owned()));
                    }
                }
                _ => {}
            }
        }
        Err("missing close-bracket".into())
    }

    fn read_quoted(&mut self) -> Result<Token, String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => self.pos += 1,
                b'"' => return Ok(Token::Quoted(self.text[start..self.pos - 1].to_owned())),
                _ => {}
            }
        }
        Err("missing \"".into())
    }

    fn read_braced(&mut self, open: usize) -> Result<Token, String> {
        let close = matching_brace(self.src, open).ok_or("missing close-brace")?;
        self.pos = close + 1;
        Ok(Token::Braced(self.text[open + 1..close].to_owned()))
    }

    fn read_ident(&mut self, start: usize) -> Token {
        while matches!(
            self.peek(),
            Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b':')
        ) {
            self.pos += 1;
        }
        match &self.text[start..self.pos] {
            "eq" => Token::StrEq,
            "ne" => Token::StrNe,
            "in" => Token::In,
            "ni" => Token::Ni,
            word => Token::Ident(word.to_owned()),
        }
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.skip_ws();
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };
        self.pos += 1;

        Ok(match ch {
            b'0'..=b'9' => self.read_number(start)?,
            b'.' if matches!(self.peek(), Some(b'0'..=b'9')) => self.read_number(start)?,
            b'$' => self.read_var(start)?,
            b'[' => self.read_command()?,
            b'"' => self.read_quoted()?,
            b'{' => self.read_braced(start)?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.read_ident(start),
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => {
                if self.eat(b'*') {
                    Token::Pow
                } else {
                    Token::Star
                }
            }
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'!' => {
                if self.eat(b'=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            b'~' => Token::Tilde,
            b'^' => Token::Caret,
            b'&' => {
                if self.eat(b'&') {
                    Token::And
                } else {
                    Token::Ampersand
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    Token::ShiftLeft
                } else if self.eat(b'=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    Token::ShiftRight
                } else if self.eat(b'=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    Token::Eq
                } else {
                    Token::Unknown('=')
                }
            }
            b'?' => Token::Question,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            _ => {
                let c = self.text[start..].chars().next().unwrap_or('?');
                self.pos = start + c.len_utf8();
                Token::Unknown(c)
            }
        })
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t == Token::Eof;
            tokens.push(t);
            if done {
                return Ok(tokens);
            }
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StrEq,
    StrNe,
    In,
    Ni,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::StrEq => "eq",
            BinOp::StrNe => "ne",
            BinOp::In => "in",
            BinOp::Ni => "ni",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Cmd(String),
    Quoted(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Limit on recursive descents: parentheses, unary operators, `**`, `?:`
/// branches and function arguments.
const MAX_NESTING: usize = 64;
/// Limit on binary operators along one path of the tree.
const MAX_CHAIN: usize = 1000;

const TOO_DEEP: &str = "expression nested too deeply";

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    chain: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            nesting: 0,
            chain: 0,
        }
    }

    /// Run `f` one recursion level deeper.
    fn descend<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        if self.nesting >= MAX_NESTING {
            return Err(TOO_DEEP.into());
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parse one left-associative level: `next (op next)*`.
    fn binary_level(
        &mut self,
        ops: fn(&Token) -> Option<BinOp>,
        next: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let start = self.chain;
        let mut lhs = next(self)?;
        while let Some(op) = ops(self.peek()) {
            self.pos += 1;
            // Every operator adds a level to the left spine.
            self.chain += 1;
            if self.chain > MAX_CHAIN {
                return Err(TOO_DEEP.into());
            }
            let rhs = next(self)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.chain = start;
        Ok(lhs)
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_ternary(&mut self) -> Result<Expr, String> {
        let cond = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then = self.descend(Self::parse_ternary)?;
            if !self.eat(&Token::Colon) {
                return Err("missing \":\" in ternary".into());
            }
            let else_ = self.descend(Self::parse_ternary)?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(else_)))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.binary_level(|t| (t == &Token::Or).then_some(BinOp::Or), Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        self.binary_level(|t| (t == &Token::And).then_some(BinOp::And), Self::parse_bitor)
    }

    fn parse_bitor(&mut self) -> Result<Expr, String> {
        self.binary_level(|t| (t == &Token::Pipe).then_some(BinOp::BitOr), Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, String> {
        self.binary_level(|t| (t == &Token::Caret).then_some(BinOp::BitXor), Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| (t == &Token::Ampersand).then_some(BinOp::BitAnd),
            Self::parse_membership,
        )
    }

    fn parse_membership(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| match t {
                Token::In => Some(BinOp::In),
                Token::Ni => Some(BinOp::Ni),
                _ => None,
            },
            Self::parse_string_equality,
        )
    }

    fn parse_string_equality(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| match t {
                Token::StrEq => Some(BinOp::StrEq),
                Token::StrNe => Some(BinOp::StrNe),
                _ => None,
            },
            Self::parse_equality,
        )
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| match t {
                Token::Eq => Some(BinOp::Eq),
                Token::Ne => Some(BinOp::Ne),
                _ => None,
            },
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| match t {
                Token::Lt => Some(BinOp::Lt),
                Token::Le => Some(BinOp::Le),
                Token::Gt => Some(BinOp::Gt),
                Token::Ge => Some(BinOp::Ge),
                _ => None,
            },
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| match t {
                Token::ShiftLeft => Some(BinOp::Shl),
                Token::ShiftRight => Some(BinOp::Shr),
                _ => None,
            },
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| match t {
                Token::Plus => Some(BinOp::Add),
                Token::Minus => Some(BinOp::Sub),
                _ => None,
            },
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        self.binary_level(
            |t| match t {
                Token::Star => Some(BinOp::Mul),
                Token::Slash => Some(BinOp::Div),
                Token::Percent => Some(BinOp::Rem),
                _ => None,
            },
            Self::parse_pow,
        )
    }

    /// `**` is right-associative.
    fn parse_pow(&mut self) -> Result<Expr, String> {
        let base = self.parse_unary()?;
        if self.eat(&Token::Pow) {
            let exp = self.descend(Self::parse_pow)?;
            Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Bang => UnaryOp::Not,
            Token::Tilde => UnaryOp::BitNot,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        Ok(Expr::Unary(op, Box::new(self.descend(Self::parse_unary)?)))
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Num(v) => Ok(Expr::Literal(v)),
            Token::Braced(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Var(raw) => Ok(Expr::Var(raw)),
            Token::Cmd(script) => Ok(Expr::Cmd(script)),
            Token::Quoted(raw) => Ok(Expr::Quoted(raw)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args.push(self.descend(Self::parse_ternary)?);
                        while self.eat(&Token::Comma) {
                            args.push(self.descend(Self::parse_ternary)?);
                        }
                    }
                    if !self.eat(&Token::RParen) {
                        return Err(format!("missing close parenthesis after arguments to {name}"));
                    }
                    Ok(Expr::Call(name, args))
                } else if parse_boolean(&name).is_ok() || matches!(name.as_str(), "Inf" | "NaN") {
                    Ok(Expr::Literal(bareword(name)))
                } else {
                    Err(format!("invalid bareword \"{name}\""))
                }
            }
            Token::LParen => {
                let inner = self.descend(Self::parse_ternary)?;
                if !self.eat(&Token::RParen) {
                    return Err("missing close parenthesis".into());
                }
                Ok(inner)
            }
            Token::Eof => Err("missing operand".into()),
            Token::Unknown(c) => Err(format!("invalid character \"{c}\"")),
            other => Err(format!("unexpected operator {other:?}")),
        }
    }
}

fn bareword(name: String) -> Value {
    match name.as_str() {
        "Inf" => Value::Float(f64::INFINITY),
        "NaN" => Value::Float(f64::NAN),
        _ => Value::Str(name),
    }
}

/// Parse an expression into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let tokens = Lexer::new(src).tokenize()?;
    if tokens.first() == Some(&Token::Eof) {
        return Err("empty expression".into());
    }
    let mut parser = Parser::new(tokens);
    let expr = parser
        .parse_ternary()
        .map_err(|e| format!("syntax error in expression \"{src}\": {e}"))?;
    if parser.peek() != &Token::Eof {
        return Err(format!(
            "syntax error in expression \"{src}\": extra tokens at end of expression"
        ));
    }
    Ok(expr)
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] against the given context.
pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value, Exception> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(raw) | Expr::Quoted(raw) => Ok(Value::Str(ctx.subst(raw)?)),
        Expr::Cmd(script) => Ok(Value::Str(ctx.eval_script(script)?)),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            Ok(match op {
                UnaryOp::Neg => match v.num("-")? {
                    Num::Int(n) => Value::Int(n.wrapping_neg()),
                    Num::Float(x) => Value::Float(-x),
                },
                UnaryOp::Plus => v.num("+")?.into(),
                UnaryOp::Not => Value::from(!v.truth()?),
                UnaryOp::BitNot => Value::Int(!v.int("~")?),
            })
        }

        Expr::Binary(op @ (BinOp::And | BinOp::Or), lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?.truth()?;
            if (*op == BinOp::And) != l {
                return Ok(Value::from(l));
            }
            Ok(Value::from(eval_expr(rhs, ctx)?.truth()?))
        }

        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            Ok(eval_binop(*op, &l, &r)?)
        }

        Expr::Ternary(cond, then, else_) => {
            if eval_expr(cond, ctx)?.truth()? {
                eval_expr(then, ctx)
            } else {
                eval_expr(else_, ctx)
            }
        }

        Expr::Call(name, arg_exprs) => {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for ae in arg_exprs {
                args.push(eval_expr(ae, ctx)?);
            }
            Ok(call_function(name, &args)?)
        }
    }
}

fn eval_binop(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    let sym = op.symbol();
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow => {
            match (l.num(sym)?, r.num(sym)?) {
                (Num::Int(a), Num::Int(b)) => int_arith(op, a, b),
                (a, b) => Ok(Value::Float(float_arith(op, a.as_f64(), b.as_f64()))),
            }
        }
        BinOp::Rem => {
            let (a, b) = (l.int(sym)?, r.int(sym)?);
            if b == 0 {
                return Err("divide by zero".into());
            }
            let rem = a.wrapping_rem(b);
            Ok(Value::Int(if rem != 0 && (rem < 0) != (b < 0) { rem + b } else { rem }))
        }

        BinOp::Eq => Ok(Value::from(l.compare(r) == Ordering::Equal)),
        BinOp::Ne => Ok(Value::from(l.compare(r) != Ordering::Equal)),
        BinOp::Lt => Ok(Value::from(l.compare(r) == Ordering::Less)),
        BinOp::Le => Ok(Value::from(l.compare(r) != Ordering::Greater)),
        BinOp::Gt => Ok(Value::from(l.compare(r) == Ordering::Greater)),
        BinOp::Ge => Ok(Value::from(l.compare(r) != Ordering::Less)),

        BinOp::StrEq => Ok(Value::from(l.to_string() == r.to_string())),
        BinOp::StrNe => Ok(Value::from(l.to_string() != r.to_string())),
        BinOp::In | BinOp::Ni => {
            let needle = l.to_string();
            let found = parse_list(&r.to_string())?.contains(&needle);
            Ok(Value::from(found == (op == BinOp::In)))
        }

        BinOp::BitAnd => Ok(Value::Int(l.int(sym)? & r.int(sym)?)),
        BinOp::BitOr => Ok(Value::Int(l.int(sym)? | r.int(sym)?)),
        BinOp::BitXor => Ok(Value::Int(l.int(sym)? ^ r.int(sym)?)),
        BinOp::Shl | BinOp::Shr => {
            let (a, b) = (l.int(sym)?, r.int(sym)?);
            if b < 0 {
                return Err("negative shift argument".into());
            }
            let shift = u32::try_from(b.min(63)).unwrap_or(63);
            Ok(Value::Int(match op {
                BinOp::Shl if b > 63 => 0,
                BinOp::Shl => a.wrapping_shl(shift),
                _ => a >> shift,
            }))
        }

        BinOp::And | BinOp::Or => Err(format!("unexpected operator \"{sym}\"")),
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, String> {
    Ok(Value::Int(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err("divide by zero".into());
            }
            // Integer division rounds toward negative infinity.
            let q = a.wrapping_div(b);
            if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
                q - 1
            } else {
                q
            }
        }
        BinOp::Pow => {
            if b < 0 {
                match a {
                    0 => return Err("exponentiation of zero by negative power".into()),
                    1 => 1,
                    -1 => {
                        if b % 2 == 0 {
                            1
                        } else {
                            -1
                        }
                    }
                    _ => 0,
                }
            } else {
                a.wrapping_pow(u32::try_from(b).unwrap_or(u32::MAX))
            }
        }
        _ => return Err(format!("unexpected operator \"{}\"", op.symbol())),
    }))
}

fn float_arith(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => a.powf(b),
    }
}

// ── Math functions ────────────────────────────────────────────────────────────

fn call_function(name: &str, args: &[Value]) -> Result<Value, String> {
    let arity = |min: usize, max: usize| -> Result<(), String> {
        if args.len() < min {
            Err(format!("too few arguments for math function \"{name}\""))
        } else if args.len() > max {
            Err(format!("too many arguments for math function \"{name}\""))
        } else {
            Ok(())
        }
    };
    let num = |i: usize| args[i].num(name);

    match name {
        "abs" => {
            arity(1, 1)?;
            Ok(match num(0)? {
                Num::Int(n) => Value::Int(n.wrapping_abs()),
                Num::Float(x) => Value::Float(x.abs()),
            })
        }
        "int" => {
            arity(1, 1)?;
            Ok(match num(0)? {
                Num::Int(n) => Value::Int(n),
                Num::Float(x) => Value::Int(float_to_int(x)?),
            })
        }
        "double" => {
            arity(1, 1)?;
            Ok(Value::Float(num(0)?.as_f64()))
        }
        "round" => {
            arity(1, 1)?;
            Ok(match num(0)? {
                Num::Int(n) => Value::Int(n),
                Num::Float(x) => Value::Int(float_to_int(x.round())?),
            })
        }
        "floor" | "ceil" | "sqrt" => {
            arity(1, 1)?;
            let x = num(0)?.as_f64();
            Ok(Value::Float(match name {
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                _ => x.sqrt(),
            }))
        }
        "pow" => {
            arity(2, 2)?;
            Ok(Value::Float(num(0)?.as_f64().powf(num(1)?.as_f64())))
        }
        "min" | "max" => {
            arity(1, usize::MAX)?;
            let mut best = num(0)?;
            for i in 1..args.len() {
                let candidate = num(i)?;
                let ord = match (candidate, best) {
                    (Num::Int(a), Num::Int(b)) => a.cmp(&b),
                    (a, b) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
                };
                let wanted = if name == "min" { Ordering::Less } else { Ordering::Greater };
                if ord == wanted {
                    best = candidate;
                }
            }
            Ok(best.into())
        }
        _ => Err(format!("invalid command name \"tcl::mathfunc::{name}\"")),
    }
}

fn float_to_int(x: f64) -> Result<i64, String> {
    if x.is_finite() {
        Ok(x as i64)
    } else {
        Err(format!("integer value too large to represent: {x}"))
    }
}

/// Parse and evaluate an expression string.
pub fn eval_str(src: &str, ctx: &mut dyn EvalContext) -> Result<Value, Exception> {
    let expr = parse_expr(src)?;
    eval_expr(&expr, ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
