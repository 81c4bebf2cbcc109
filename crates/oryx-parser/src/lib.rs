//! Oryx specification parsers
//!
//! Recursive descent parsers for the two concrete syntaxes: contract
//! expressions (pre/post-conditions and invariants) and test
//! specifications (argument lists plus goals). Both bottom out in the
//! `oryx-ast` operand and predicate trees.
//!
//! Parsing is a pure single pass from text to AST; a parse error is local
//! to the one specification being parsed. Bracket-pattern literals and
//! object construction are delegated to parse-time collaborators.

use std::sync::atomic::{AtomicU32, Ordering};

use oryx_ast::{
    ArgumentList, ArithOp, CmpOp, Contract, Goal, OldId, Operand, Predicate, SmolStr, Span,
    TestSpec, Value, ValueSet, EPSILON,
};
use oryx_lexer::{Lexer, Token, TokenKind};
use thiserror::Error;

/// Parser error type with source positions
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at position {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of input - expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { position: usize, character: char },

    #[error("Invalid number literal `{literal}` at position {span:?}")]
    InvalidNumber { literal: SmolStr, span: Span },

    #[error("Invalid regular expression `{pattern}` at position {span:?}: {message}")]
    InvalidRegex {
        pattern: SmolStr,
        message: String,
        span: Span,
    },

    #[error("Cannot expand pattern `{pattern}` at position {span:?}: {message}")]
    PatternExpansion {
        pattern: SmolStr,
        message: String,
        span: Span,
    },

    #[error("Cannot instantiate {class_name} at position {span:?}: {message}")]
    Instantiation {
        class_name: SmolStr,
        message: String,
        span: Span,
    },

    #[error("Cannot resolve field `{name}` at position {span:?}: {message}")]
    UnresolvedField {
        name: SmolStr,
        message: String,
        span: Span,
    },
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Collaborator expanding a bracket-pattern literal (such as `1[0-5]`)
/// into its concrete value sequence.
pub trait PatternExpander {
    fn expand(&self, pattern: &str) -> Result<Vec<Value>, String>;
}

/// Collaborator constructing target-environment objects and resolving
/// field values while argument lists are being built.
pub trait TargetBuilder {
    /// Construct an object of the named class from already-adapted
    /// argument values.
    fn instantiate(&self, class_name: &str, args: &[Value]) -> Result<Value, String>;

    /// Current value of a dot-qualified field.
    fn field_value(&self, qualified: &str) -> Result<Value, String>;
}

/// `old(...)` wrapper identities are process-unique so that contracts
/// parsed separately can share one lookup context when chained.
static NEXT_OLD_ID: AtomicU32 = AtomicU32::new(0);

fn fresh_old_id() -> OldId {
    OldId(NEXT_OLD_ID.fetch_add(1, Ordering::Relaxed))
}

/// Parse a contract expression into a single-link contract chain.
pub fn parse_contract(source: &str) -> ParseResult<Contract> {
    Ok(Contract::new(parse_predicate(source)?))
}

/// Parse a contract expression into its predicate tree.
pub fn parse_predicate(source: &str) -> ParseResult<Predicate> {
    let mut parser = Parser::new(source)?;
    let predicate = parser.contract()?;
    parser.expect_eof("end of contract")?;
    Ok(predicate)
}

/// Parse a test specification. Pattern literals are expanded and object
/// arguments constructed through the supplied collaborators.
pub fn parse_test_spec(
    source: &str,
    expander: &dyn PatternExpander,
    builder: &dyn TargetBuilder,
) -> ParseResult<TestSpec> {
    let mut parser = Parser::new(source)?;
    let spec = parser.test_spec(expander, builder)?;
    parser.expect_eof("end of specification")?;
    Ok(spec)
}

/// Parser state
pub struct Parser<'src> {
    #[allow(dead_code)]
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'src> Parser<'src> {
    /// Create a new parser from specification text
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let (tokens, lex_errors) = Lexer::new(source).tokenize();
        if let Some(oryx_lexer::LexerError::UnexpectedCharacter(position, character)) =
            lex_errors.into_iter().next()
        {
            return Err(ParseError::UnexpectedCharacter {
                position,
                character,
            });
        }
        Ok(Self {
            source,
            tokens,
            pos: 0,
        })
    }

    // ========================================================================
    // Token navigation
    // ========================================================================

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn current_span(&self) -> Span {
        self.current().map(|t| t.span).unwrap_or_else(Span::dummy)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_eof() {
            self.pos += 1;
        }
        self.tokens.get(self.pos - 1)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_eof(&self, expected: &str) -> ParseResult<()> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(token) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
                span: token.span,
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }

    /// A dotted name: identifier or type segments joined by `.`.
    fn dotted_name(&mut self) -> ParseResult<(SmolStr, bool)> {
        let mut name = String::new();
        let mut segments = 0;
        loop {
            match self.current_kind() {
                Some(TokenKind::Ident(s)) | Some(TokenKind::TypeIdent(s)) => {
                    name.push_str(s);
                    segments += 1;
                    self.advance();
                }
                _ => return Err(self.unexpected("an identifier")),
            }
            if self.eat(&TokenKind::Dot) {
                name.push('.');
            } else {
                break;
            }
        }
        Ok((SmolStr::new(name), segments > 1))
    }

    // ========================================================================
    // Contract grammar
    // ========================================================================

    /// contract := andExpr ('||' andExpr)*
    fn contract(&mut self) -> ParseResult<Predicate> {
        let mut left = self.and_expr()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.and_expr()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// andExpr := atom ('&&' atom)*
    fn and_expr(&mut self) -> ParseResult<Predicate> {
        let mut left = self.predicate_atom()?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.predicate_atom()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// atom := simple | '(' contract ')'
    ///
    /// A leading `(` is ambiguous: it may open a parenthesized contract or
    /// a parenthesized arithmetic expression inside `simple`. The
    /// expression reading is tried first; on failure the parser rewinds
    /// and reads a nested contract.
    fn predicate_atom(&mut self) -> ParseResult<Predicate> {
        if self.check(&TokenKind::LParen) {
            let rewind = self.pos;
            match self.simple() {
                Ok(predicate) => return Ok(predicate),
                Err(_) => self.pos = rewind,
            }
            self.expect(&TokenKind::LParen, "`(`")?;
            let predicate = self.contract()?;
            self.expect(&TokenKind::RParen, "`)`")?;
            Ok(predicate)
        } else {
            self.simple()
        }
    }

    /// simple := expr (cmpOp expr | 'within' ... | 'isEmpty' | 'notEmpty'
    ///           | 'instanceof' ID | 'matches' STRING | 'satisfies' ID args?)
    fn simple(&mut self) -> ParseResult<Predicate> {
        let lhs = self.expr()?;

        if let Some(op) = self.try_cmp_op() {
            let rhs = self.expr()?;
            return Ok(Predicate::Cmp { op, lhs, rhs });
        }

        match self.current_kind() {
            Some(TokenKind::Within) => {
                self.advance();
                let first = self.expr()?;
                if self.eat(&TokenKind::Comma) {
                    let high = self.expr()?;
                    Ok(Predicate::Within {
                        value: lhs,
                        low: first,
                        high,
                    })
                } else if self.eat(&TokenKind::PlusMinus) {
                    let delta = self.expr()?;
                    Ok(Predicate::WithinDelta {
                        value: lhs,
                        center: first,
                        delta,
                    })
                } else {
                    Err(self.unexpected("`,` or `+-` after within bound"))
                }
            }
            Some(TokenKind::IsEmpty) => {
                self.advance();
                Ok(Predicate::IsEmpty(lhs))
            }
            Some(TokenKind::NotEmpty) => {
                self.advance();
                Ok(Predicate::NotEmpty(lhs))
            }
            Some(TokenKind::InstanceOf) => {
                self.advance();
                let (class_name, _) = self.dotted_name()?;
                Ok(Predicate::InstanceOf {
                    value: lhs,
                    class_name,
                })
            }
            Some(TokenKind::Matches) => {
                self.advance();
                let pattern = self.regex_literal()?;
                Ok(Predicate::Matches {
                    value: lhs,
                    pattern,
                })
            }
            Some(TokenKind::Satisfies) => {
                self.advance();
                let (name, _) = self.dotted_name()?;
                let args = self.optional_operand_args()?;
                Ok(Predicate::Satisfies {
                    value: lhs,
                    name,
                    args,
                })
            }
            _ => Err(self.unexpected("a comparison or predicate keyword")),
        }
    }

    fn try_cmp_op(&mut self) -> Option<CmpOp> {
        let op = match self.current_kind()? {
            TokenKind::EqEq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::Ge,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// A string literal validated as a regular expression.
    fn regex_literal(&mut self) -> ParseResult<SmolStr> {
        let span = self.current_span();
        let pattern = match self.current_kind() {
            Some(TokenKind::Str(raw)) => unquote(raw),
            _ => return Err(self.unexpected("a pattern string")),
        };
        self.advance();
        if let Err(e) = regex::Regex::new(&pattern) {
            return Err(ParseError::InvalidRegex {
                pattern: pattern.into(),
                message: e.to_string(),
                span,
            });
        }
        Ok(pattern.into())
    }

    fn optional_operand_args(&mut self) -> ParseResult<Vec<Operand>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::LParen) {
            if !self.check(&TokenKind::RParen) {
                args.push(self.expr()?);
                while self.eat(&TokenKind::Comma) {
                    args.push(self.expr()?);
                }
            }
            self.expect(&TokenKind::RParen, "`)`")?;
        }
        Ok(args)
    }

    // ========================================================================
    // Arithmetic expressions
    // ========================================================================

    /// expr := term (('+'|'-') term)*
    fn expr(&mut self) -> ParseResult<Operand> {
        let mut left = self.term()?;
        loop {
            let op = match self.current_kind() {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Operand::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    /// term := logTerm (('*'|'/') logTerm)*
    fn term(&mut self) -> ParseResult<Operand> {
        let mut left = self.log_term()?;
        loop {
            let op = match self.current_kind() {
                Some(TokenKind::Star) => ArithOp::Mul,
                Some(TokenKind::Slash) => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.log_term()?;
            left = Operand::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    /// logTerm := power | 'log10' '(' power ')' | 'log' '(' power ')'
    fn log_term(&mut self) -> ParseResult<Operand> {
        match self.current_kind() {
            Some(TokenKind::Log) => {
                self.advance();
                self.expect(&TokenKind::LParen, "`(` after log")?;
                let inner = self.power()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(Operand::Log(Box::new(inner)))
            }
            Some(TokenKind::Log10) => {
                self.advance();
                self.expect(&TokenKind::LParen, "`(` after log10")?;
                let inner = self.power()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(Operand::Log10(Box::new(inner)))
            }
            _ => self.power(),
        }
    }

    /// power := atomExpr ('^' atomExpr)?
    fn power(&mut self) -> ParseResult<Operand> {
        let base = self.atom_expr()?;
        if self.eat(&TokenKind::Caret) {
            let exponent = self.atom_expr()?;
            Ok(Operand::Binary {
                op: ArithOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            })
        } else {
            Ok(base)
        }
    }

    /// atomExpr := 'null' | 'return' | 'EPS' | NUMBER | ID | STRING
    ///           | 'old' '(' expr ')' | '(' expr ')' | ID '(' args ')'
    fn atom_expr(&mut self) -> ParseResult<Operand> {
        match self.current_kind() {
            Some(TokenKind::Null) => {
                self.advance();
                Ok(Operand::Const(Value::Null))
            }
            Some(TokenKind::Return) => {
                self.advance();
                Ok(Operand::Result)
            }
            Some(TokenKind::Eps) => {
                self.advance();
                Ok(Operand::Const(Value::Real(EPSILON)))
            }
            Some(TokenKind::Integer(_)) => Ok(Operand::Const(Value::Int(self.int_literal()?))),
            Some(TokenKind::Real(_)) => Ok(Operand::Const(Value::Real(self.real_literal()?))),
            Some(TokenKind::Str(raw)) => {
                let value = Value::Str(unquote(raw).into());
                self.advance();
                Ok(Operand::Const(value))
            }
            Some(TokenKind::Old) => {
                self.advance();
                self.expect(&TokenKind::LParen, "`(` after old")?;
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(Operand::Old {
                    id: fresh_old_id(),
                    inner: Box::new(inner),
                })
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            Some(TokenKind::Ident(_)) | Some(TokenKind::TypeIdent(_)) => {
                let (name, dotted) = self.dotted_name()?;
                if !dotted && self.check(&TokenKind::LParen) {
                    let args = self.optional_operand_args()?;
                    Ok(Operand::Call { name, args })
                } else if dotted {
                    Ok(Operand::Field(name))
                } else {
                    Ok(Operand::Var(name))
                }
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn int_literal(&mut self) -> ParseResult<i64> {
        let span = self.current_span();
        match self.current_kind() {
            Some(TokenKind::Integer(raw)) => {
                let literal = raw.clone();
                self.advance();
                literal
                    .replace('_', "")
                    .parse::<i64>()
                    .map_err(|_| ParseError::InvalidNumber { literal, span })
            }
            _ => Err(self.unexpected("an integer")),
        }
    }

    fn real_literal(&mut self) -> ParseResult<f64> {
        let span = self.current_span();
        match self.current_kind() {
            Some(TokenKind::Real(raw)) => {
                let literal = raw.clone();
                self.advance();
                literal
                    .replace('_', "")
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber { literal, span })
            }
            _ => Err(self.unexpected("a real number")),
        }
    }

    // ========================================================================
    // Test-specification grammar
    // ========================================================================

    /// spec := (env ('|' env)* '.')? arglist ('|' arglist)* (goal (',' goal)*)?
    fn test_spec(
        &mut self,
        expander: &dyn PatternExpander,
        builder: &dyn TargetBuilder,
    ) -> ParseResult<TestSpec> {
        let mut env_args = Vec::new();
        if self.check(&TokenKind::This) {
            loop {
                self.expect(&TokenKind::This, "`this`")?;
                env_args.push(self.arg_list(expander, builder)?);
                if !self.eat(&TokenKind::Pipe) {
                    break;
                }
            }
            self.expect(&TokenKind::Dot, "`.` after target-construction lists")?;
        }

        let mut call_args = vec![self.arg_list(expander, builder)?];
        while self.eat(&TokenKind::Pipe) {
            call_args.push(self.arg_list(expander, builder)?);
        }

        let mut goals = Vec::new();
        if self.current_kind().is_some_and(TokenKind::starts_goal) {
            goals.push(self.goal(expander, builder)?);
            while self.eat(&TokenKind::Comma) {
                goals.push(self.goal(expander, builder)?);
            }
        }

        Ok(TestSpec {
            env_args,
            call_args,
            goals,
        })
    }

    /// arglist := '(' (arg (',' arg)*)? ')'
    fn arg_list(
        &mut self,
        expander: &dyn PatternExpander,
        builder: &dyn TargetBuilder,
    ) -> ParseResult<ArgumentList> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut list = ArgumentList::new();
        if !self.check(&TokenKind::RParen) {
            list.push(self.arg(expander, builder)?);
            while self.eat(&TokenKind::Comma) {
                list.push(self.arg(expander, builder)?);
            }
        }
        self.expect(&TokenKind::RParen, "`)`")?;
        Ok(list)
    }

    /// arg := argValue ('|' argValue)*: the union of the alternatives'
    /// value sets, in source order.
    fn arg(
        &mut self,
        expander: &dyn PatternExpander,
        builder: &dyn TargetBuilder,
    ) -> ParseResult<ValueSet> {
        let mut set = ValueSet::new();
        self.arg_value(&mut set, expander, builder)?;
        while self.eat(&TokenKind::Pipe) {
            self.arg_value(&mut set, expander, builder)?;
        }
        Ok(set)
    }

    fn arg_value(
        &mut self,
        set: &mut ValueSet,
        expander: &dyn PatternExpander,
        builder: &dyn TargetBuilder,
    ) -> ParseResult<()> {
        if let Some(TokenKind::Pattern(raw)) = self.current_kind() {
            let pattern = raw.clone();
            let span = self.current_span();
            self.advance();
            let values = expander
                .expand(&pattern)
                .map_err(|message| ParseError::PatternExpansion {
                    pattern,
                    message,
                    span,
                })?;
            set.add_all(values);
            return Ok(());
        }
        let value = self.single_value(builder)?;
        set.add(value);
        Ok(())
    }

    /// One concrete value: a literal, `@field`, an object construction, or
    /// a `{...}` list.
    fn single_value(&mut self, builder: &dyn TargetBuilder) -> ParseResult<Value> {
        match self.current_kind() {
            Some(TokenKind::Integer(_)) => Ok(Value::Int(self.int_literal()?)),
            Some(TokenKind::Real(_)) => Ok(Value::Real(self.real_literal()?)),
            Some(TokenKind::Minus) => {
                self.advance();
                match self.current_kind() {
                    Some(TokenKind::Integer(_)) => Ok(Value::Int(-self.int_literal()?)),
                    Some(TokenKind::Real(_)) => Ok(Value::Real(-self.real_literal()?)),
                    _ => Err(self.unexpected("a number after `-`")),
                }
            }
            Some(TokenKind::Str(raw)) => {
                let value = Value::Str(unquote(raw).into());
                self.advance();
                Ok(value)
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Value::Bool(true))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Value::Bool(false))
            }
            Some(TokenKind::Null) => {
                self.advance();
                Ok(Value::Null)
            }
            Some(TokenKind::At) => {
                self.advance();
                let span = self.current_span();
                let (name, _) = self.dotted_name()?;
                builder
                    .field_value(&name)
                    .map_err(|message| ParseError::UnresolvedField {
                        name,
                        message,
                        span,
                    })
            }
            Some(TokenKind::TypeIdent(_)) => {
                let span = self.current_span();
                let (class_name, _) = self.dotted_name()?;
                self.expect(&TokenKind::LParen, "`(` after class name")?;
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    args.push(self.single_value(builder)?);
                    while self.eat(&TokenKind::Comma) {
                        args.push(self.single_value(builder)?);
                    }
                }
                self.expect(&TokenKind::RParen, "`)`")?;
                builder
                    .instantiate(&class_name, &args)
                    .map_err(|message| ParseError::Instantiation {
                        class_name,
                        message,
                        span,
                    })
            }
            Some(TokenKind::LBrace) => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    items.push(self.single_value(builder)?);
                    while self.eat(&TokenKind::Comma) {
                        items.push(self.single_value(builder)?);
                    }
                }
                self.expect(&TokenKind::RBrace, "`}`")?;
                Ok(Value::List(std::rc::Rc::new(items)))
            }
            _ => Err(self.unexpected("an argument value")),
        }
    }

    /// goal := cmpOp values | 'matches' STRING | 'within' bound (',' bound
    ///       | '+-' bound) | 'throws' name ('|' name)* | 'noThrows'
    ///       | 'satisfies' ID args? | 'memory' NUMBER
    fn goal(
        &mut self,
        expander: &dyn PatternExpander,
        builder: &dyn TargetBuilder,
    ) -> ParseResult<Goal> {
        if let Some(op) = self.try_cmp_op() {
            let candidates = self.arg(expander, builder)?;
            return Ok(Goal::Compare { op, candidates });
        }

        match self.current_kind() {
            Some(TokenKind::Matches) => {
                self.advance();
                let pattern = self.regex_literal()?;
                Ok(Goal::Match { pattern })
            }
            Some(TokenKind::Within) => {
                self.advance();
                let first = self.goal_bound()?;
                if self.eat(&TokenKind::Comma) {
                    let high = self.goal_bound()?;
                    Ok(Goal::Within { low: first, high })
                } else if self.eat(&TokenKind::PlusMinus) {
                    let delta = self.goal_bound()?;
                    Ok(Goal::WithinDelta {
                        center: first,
                        delta,
                    })
                } else {
                    Err(self.unexpected("`,` or `+-` after within bound"))
                }
            }
            Some(TokenKind::Throws) => {
                self.advance();
                let mut class_names = vec![self.dotted_name()?.0];
                while self.eat(&TokenKind::Pipe) {
                    class_names.push(self.dotted_name()?.0);
                }
                Ok(Goal::Throws { class_names })
            }
            Some(TokenKind::NoThrows) => {
                self.advance();
                Ok(Goal::NoThrows)
            }
            Some(TokenKind::Satisfies) => {
                self.advance();
                let (name, _) = self.dotted_name()?;
                let args = self.optional_operand_args()?;
                Ok(Goal::Satisfies { name, args })
            }
            Some(TokenKind::Memory) => {
                self.advance();
                let max_growth = self.int_literal()?;
                if max_growth < 0 {
                    return Err(self.unexpected("a non-negative memory bound"));
                }
                Ok(Goal::Memory {
                    max_growth: max_growth as u64,
                })
            }
            _ => Err(self.unexpected("a goal")),
        }
    }

    /// A goal boundary operand; unlike contract expressions these may lead
    /// with a sign.
    fn goal_bound(&mut self) -> ParseResult<Operand> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.expr()?;
            return Ok(Operand::Binary {
                op: ArithOp::Sub,
                lhs: Box::new(Operand::Const(Value::Int(0))),
                rhs: Box::new(inner),
            });
        }
        self.expr()
    }
}

/// Strip the surrounding quotes from a string token and process escapes.
/// Escapes other than `\"`, `\\`, `\n`, `\t` and `\r` pass through intact
/// so that regex escapes like `\d` survive.
fn unquote(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    out
}
