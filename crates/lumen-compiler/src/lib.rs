// src/lib.rs
//! Lumen Compiler - parseur de Pratt en une passe + émission directe de bytecode
//!
//! - Entrée : texte source (ou n'importe quel `TokenSource`)
//! - Sortie : `Chunk` (code + lignes + constantes) prêt pour `runtime::eval`
//! - Diagnostics : première erreur seulement (mode panique jamais réarmé)
//! - Pas d'AST : chaque règle de parsing émet ses instructions au fil de l'eau
//!
//! API principale :
//! ```
//! use lumen_compiler::{compile, Compiler, CompilerOptions};
//! use lumen_core::runtime::eval::{eval_chunk, EvalOptions};
//!
//! let chunk = compile("1 + 2 * 3").unwrap();
//! let out = eval_chunk(&chunk, &EvalOptions::default()).unwrap();
//! assert_eq!(out.value.map(|v| v.as_f64()), Some(7.0));
//!
//! let compilation = Compiler::new(CompilerOptions::default()).compile("(1 +");
//! assert!(compilation.had_error());
//! assert_eq!(
//!     compilation.diagnostics[0].to_string(),
//!     "[line 1] Error at end: Expect expression."
//! );
//! ```

#![deny(missing_docs)]

use core::fmt;

use lumen_core::{
    bytecode::{Chunk, OpCode, MAX_CONSTANTS},
    disasm::disassemble_chunk,
    Value,
};
use lumen_lexer::{Scanner, Token, TokenKind, TokenSource};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Profondeur d'imbrication par défaut (groupes, négations, opérandes droits)
pub const MAX_NESTING: u32 = 256;

/// Options du compilateur
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Réutiliser l'entrée du pool pour un littéral bit à bit identique
    pub dedupe_constants: bool,
    /// Journaliser le désassemblage (niveau `debug`) après une compilation réussie
    pub print_code: bool,
    /// Nombre maximal d'appels imbriqués de `parse_precedence`
    pub max_nesting: u32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { dedupe_constants: false, print_code: false, max_nesting: MAX_NESTING }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Diagnostics */
// ─────────────────────────────────────────────────────────────────────────────

/// Message quand un jeton ne peut pas commencer une expression.
pub const EXPECT_EXPRESSION: &str = "Expect expression.";
/// Message quand la parenthèse fermante manque.
pub const EXPECT_RIGHT_PAREN: &str = "Expect ')' after expression.";
/// Message quand l'entrée continue après l'expression.
pub const EXPECT_END: &str = "Expect end of expression.";
/// Message au-delà de 256 constantes distinctes.
pub const TOO_MANY_CONSTANTS: &str = "Too many constants in one chunk.";
/// Message pour un lexème `Number` illisible (sources de jetons externes).
pub const INVALID_NUMBER: &str = "Invalid number literal.";
/// Message au-delà de `CompilerOptions::max_nesting` niveaux.
pub const NESTING_TOO_DEEP: &str = "Expression nests too deeply.";

/// Où pointe un diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Sur un lexème du source
    Token(String),
    /// Sur la fin de l'entrée
    End,
    /// Erreur lexicale : le message suffit
    Lexical,
}

/// Un diagnostic (ligne, localisation, message)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Ligne du jeton fautif
    pub line: u32,
    /// Localisation
    pub location: Location,
    /// Message humain
    pub message: String,
}

impl Diagnostic {
    /// Construit un diagnostic pointant sur `token`
    pub fn at(token: &Token<'_>, message: impl Into<String>) -> Self {
        let location = match token.kind {
            TokenKind::Eof => Location::End,
            TokenKind::Error => Location::Lexical,
            _ => Location::Token(token.lexeme.to_owned()),
        };
        Self { line: token.line, location, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error", self.line)?;
        match &self.location {
            Location::Token(lexeme) => write!(f, " at '{lexeme}'")?,
            Location::End => f.write_str(" at end")?,
            Location::Lexical => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Une ligne par diagnostic
pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

/// Erreur globale de compilation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", render_diagnostics(.diagnostics))]
pub struct CompileError {
    /// Diagnostics accumulés
    pub diagnostics: Vec<Diagnostic>,
    /// Chunk partiel, à inspecter seulement (jamais à exécuter)
    pub chunk: Chunk,
}

/// Alias résultat du compilateur
pub type CompileResult<T> = core::result::Result<T, CompileError>;

/// Sortie brute d'une compilation : le chunk et ce qui a été signalé
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    /// Chunk émis (partiel si erreur)
    pub chunk: Chunk,
    /// Diagnostics (au plus un)
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    /// Vrai si au moins une erreur a été signalée
    pub fn had_error(&self) -> bool { !self.diagnostics.is_empty() }

    /// `Ok(chunk)` sans erreur, sinon `CompileError`
    pub fn into_result(self) -> CompileResult<Chunk> {
        if self.had_error() {
            Err(CompileError { diagnostics: self.diagnostics, chunk: self.chunk })
        } else {
            Ok(self.chunk)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Précédences & table des règles */
// ─────────────────────────────────────────────────────────────────────────────

/// Niveaux de précédence, du plus lâche au plus serré
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Pas d'opérateur infixe
    None,
    /// `=`
    Assignment,
    /// `or`
    Or,
    /// `and`
    And,
    /// `==` `!=`
    Equality,
    /// `<` `>` `<=` `>=`
    Comparison,
    /// `+` `-`
    Term,
    /// `*` `/`
    Factor,
    /// `!` `-`
    Unary,
    /// `.` `()`
    Call,
    /// Littéraux, groupes
    Primary,
}

impl Precedence {
    /// Niveau immédiatement supérieur (sature à `Primary`)
    pub const fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

/// Gestionnaires de parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFn {
    /// `( expr )`
    Grouping,
    /// `-expr`
    Unary,
    /// `a op b`
    Binary,
    /// littéral numérique
    Number,
}

/// Ligne de la table : préfixe, infixe, précédence infixe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRule {
    /// Gestionnaire quand le jeton ouvre une expression
    pub prefix: Option<ParseFn>,
    /// Gestionnaire quand le jeton suit un opérande
    pub infix: Option<ParseFn>,
    /// Précédence du jeton en position infixe
    pub precedence: Precedence,
}

impl ParseRule {
    const fn new(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> Self {
        Self { prefix, infix, precedence }
    }
}

/// Règle associée à `kind` (totale sur `TokenKind`)
pub const fn rule(kind: TokenKind) -> ParseRule {
    use ParseFn::{Binary, Grouping, Number, Unary};
    match kind {
        TokenKind::LeftParen => ParseRule::new(Some(Grouping), None, Precedence::None),
        TokenKind::Minus => ParseRule::new(Some(Unary), Some(Binary), Precedence::Term),
        TokenKind::Plus => ParseRule::new(None, Some(Binary), Precedence::Term),
        TokenKind::Slash | TokenKind::Star => ParseRule::new(None, Some(Binary), Precedence::Factor),
        TokenKind::Number => ParseRule::new(Some(Number), None, Precedence::None),
        _ => ParseRule::new(None, None, Precedence::None),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Contexte de compilation */
// ─────────────────────────────────────────────────────────────────────────────

struct Parser<'a> {
    current: Token<'a>,
    previous: Token<'a>,
    had_error: bool,
    panic_mode: bool,
}

/// État mutable d'une compilation
struct Ctx<'a, 'o, S> {
    parser: Parser<'a>,
    tokens: S,
    opts: &'o CompilerOptions,
    diags: Vec<Diagnostic>,
    chunk: Chunk,
    depth: u32,
}

impl<'a, S: TokenSource<'a>> Ctx<'a, '_, S> {
    /* ────────── Jetons ────────── */

    fn advance(&mut self) {
        self.parser.previous = self.parser.current;
        loop {
            self.parser.current = self.tokens.next_token();
            if self.parser.current.kind != TokenKind::Error {
                break;
            }
            let message = self.parser.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.parser.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    /* ────────── Erreurs ────────── */

    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.parser.panic_mode {
            return;
        }
        self.parser.panic_mode = true;
        self.parser.had_error = true;
        let diag = Diagnostic::at(&token, message);
        log::debug!("{diag}");
        self.diags.push(diag);
    }

    fn error(&mut self, message: &str) { self.error_at(self.parser.previous, message); }

    fn error_at_current(&mut self, message: &str) { self.error_at(self.parser.current, message); }

    /* ────────── Émission ────────── */

    fn emit_byte(&mut self, byte: u8) { self.chunk.write(byte, self.parser.previous.line); }

    fn emit_op(&mut self, op: OpCode) { self.emit_byte(op.into()); }

    fn make_constant(&mut self, value: Value) -> Option<u8> {
        if self.opts.dedupe_constants {
            if let Some(ix) = self.chunk.constants().find(value) {
                return u8::try_from(ix).ok();
            }
        }
        if self.chunk.constants().len() >= MAX_CONSTANTS {
            self.error(TOO_MANY_CONSTANTS);
            return None;
        }
        u8::try_from(self.chunk.add_constant(value)).ok()
    }

    fn emit_constant(&mut self, value: Value) {
        if let Some(ix) = self.make_constant(value) {
            self.emit_op(OpCode::Constant);
            self.emit_byte(ix);
        }
    }

    fn end(&mut self) {
        self.emit_op(OpCode::Return);
        if self.opts.print_code && !self.parser.had_error {
            log::debug!("{}", disassemble_chunk(&self.chunk, "code"));
        }
    }

    /* ────────── Règles ────────── */

    fn apply(&mut self, f: ParseFn) {
        match f {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
        }
    }

    fn parse_precedence(&mut self, min: Precedence) {
        // la pile native borne la récursion : on s'arrête avant elle
        if self.depth >= self.opts.max_nesting {
            self.error_at_current(NESTING_TOO_DEEP);
            return;
        }
        self.depth += 1;

        self.advance();
        if let Some(prefix) = rule(self.parser.previous.kind).prefix {
            self.apply(prefix);
            while min <= rule(self.parser.current.kind).precedence {
                self.advance();
                if let Some(infix) = rule(self.parser.previous.kind).infix {
                    self.apply(infix);
                }
            }
        } else {
            self.error(EXPECT_EXPRESSION);
        }

        self.depth -= 1;
    }

    fn expression(&mut self) { self.parse_precedence(Precedence::Assignment); }

    fn number(&mut self) {
        match self.parser.previous.lexeme.parse::<f64>() {
            Ok(n) => self.emit_constant(Value::number(n)),
            Err(_) => self.error(INVALID_NUMBER),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, EXPECT_RIGHT_PAREN);
    }

    fn unary(&mut self) {
        let operator = self.parser.previous.kind;
        self.parse_precedence(Precedence::Unary);
        if operator == TokenKind::Minus {
            self.emit_op(OpCode::Negate);
        }
    }

    fn binary(&mut self) {
        let operator = self.parser.previous.kind;
        self.parse_precedence(rule(operator).precedence.next());
        let op = match operator {
            TokenKind::Plus => OpCode::Add,
            TokenKind::Minus => OpCode::Subtract,
            TokenKind::Star => OpCode::Multiply,
            TokenKind::Slash => OpCode::Divide,
            _ => return,
        };
        self.emit_op(op);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Points d'entrée */
// ─────────────────────────────────────────────────────────────────────────────

/// Compile une expression depuis n'importe quelle source de jetons.
pub fn compile_tokens<'a, S: TokenSource<'a>>(tokens: S, options: &CompilerOptions) -> Compilation {
    let placeholder = Token::eof(1);
    let mut ctx = Ctx {
        parser: Parser { current: placeholder, previous: placeholder, had_error: false, panic_mode: false },
        tokens,
        opts: options,
        diags: Vec::new(),
        chunk: Chunk::new(),
        depth: 0,
    };

    ctx.advance();
    ctx.expression();
    ctx.consume(TokenKind::Eof, EXPECT_END);
    ctx.end();

    log::trace!(
        "compiled {} bytes, {} constants, {} diagnostic(s)",
        ctx.chunk.len(),
        ctx.chunk.constants().len(),
        ctx.diags.len()
    );
    Compilation { chunk: ctx.chunk, diagnostics: ctx.diags }
}

/// Compile `source` avec les options par défaut.
pub fn compile(source: &str) -> CompileResult<Chunk> {
    Compiler::default().compile(source).into_result()
}

/// Le compilateur Lumen : options + points d'entrée
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    /// Options
    pub options: CompilerOptions,
}

impl Compiler {
    /// Crée un compilateur
    pub fn new(options: CompilerOptions) -> Self { Self { options } }

    /// Compile un texte source
    pub fn compile(&self, source: &str) -> Compilation {
        compile_tokens(Scanner::new(source), &self.options)
    }

    /// Compile une suite de jetons déjà produite
    pub fn compile_tokens<'a, S: TokenSource<'a>>(&self, tokens: S) -> Compilation {
        compile_tokens(tokens, &self.options)
    }
}
