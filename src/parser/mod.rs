//! Template compiler, built on [pest](https://pest.rs/).
//!
//! The grammar in `template.pest` covers three jobs:
//!
//! - splitting source into [`Token`]s (text, `{{ }}`, `{% %}`, `{# #}`),
//! - splitting a tag's contents into bits with [`Token::split_contents`],
//! - compiling one bit into a [`FilterExpression`] with
//!   [`Parser::compile_filter`].
//!
//! [`Parser`] drives compilation: it owns the tags and filters visible at
//! the current point of the template and dispatches each `{% %}` token to
//! the [`TagCompiler`](crate::registry::TagCompiler) registered under the
//! tag's name.

use std::collections::HashMap;
use std::sync::Arc;

use pest::Parser as _;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::ast::expr::{FilterCall, FilterExpression, Variable};
use crate::ast::span::{Span, Spanned};
use crate::ast::template::{NodeKind, Template};
use crate::ast::value::Value;
use crate::error::TemplateSyntaxError;
use crate::registry::{Filter, Library, TagCompiler};

#[derive(Parser)]
#[grammar = "parser/template.pest"]
struct TemplateGrammar;

// ── Tokens ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Variable,
    Block,
    Comment,
}

/// One lexical piece of template source.
///
/// For `Variable` and `Block` tokens, `contents` is the text between the
/// delimiters with surrounding whitespace trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub contents: String,
    pub span: Span,
    /// 1-based line the token starts on.
    pub line: usize,
}

impl Token {
    /// Split the contents on whitespace, keeping quoted strings whole.
    ///
    /// `append_key qd "a key" value` yields
    /// `["append_key", "qd", "\"a key\"", "value"]`.
    pub fn split_contents(&self) -> Result<Vec<String>, TemplateSyntaxError> {
        split_contents(&self.contents).map_err(|e| e.or_span(self.span))
    }
}

/// Lex template source into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, TemplateSyntaxError> {
    let pairs = TemplateGrammar::parse(Rule::template, source).map_err(|e| {
        let span = pest_error_span(&e);
        TemplateSyntaxError::new(format!(
            "Unclosed tag on line {}",
            span.line_in(source)
        ))
        .with_span(span)
        .with_hint("every '{{', '{%' and '{#' needs a matching '}}', '%}' or '#}'")
    })?;

    let mut tokens = Vec::new();
    for pair in pairs.flatten() {
        let kind = match pair.as_rule() {
            Rule::text => TokenKind::Text,
            Rule::variable_tag => TokenKind::Variable,
            Rule::block_tag => TokenKind::Block,
            Rule::comment_tag => TokenKind::Comment,
            _ => continue,
        };
        let span = pair_span(&pair);
        let contents = match kind {
            TokenKind::Text => pair.as_str().to_string(),
            TokenKind::Comment => String::new(),
            TokenKind::Variable | TokenKind::Block => pair
                .into_inner()
                .next()
                .map(|inner| inner.as_str().trim().to_string())
                .unwrap_or_default(),
        };
        tokens.push(Token {
            kind,
            contents,
            span,
            line: span.line_in(source),
        });
    }
    Ok(tokens)
}

/// Split tag contents into bits. See [`Token::split_contents`].
pub fn split_contents(contents: &str) -> Result<Vec<String>, TemplateSyntaxError> {
    let pairs = TemplateGrammar::parse(Rule::bits, contents)
        .map_err(|e| TemplateSyntaxError::new(format!("could not split tag contents: {e}")))?;
    Ok(pairs
        .flatten()
        .filter(|pair| pair.as_rule() == Rule::bit)
        .map(|pair| pair.as_str().to_string())
        .collect())
}

fn pest_error_span(e: &pest::error::Error<Rule>) -> Span {
    match &e.location {
        pest::error::InputLocation::Pos(p) => Span::new(*p, *p + 1),
        pest::error::InputLocation::Span((s, e)) => Span::new(*s, *e),
    }
}

fn pest_error_offset(e: &pest::error::Error<Rule>) -> usize {
    match &e.location {
        pest::error::InputLocation::Pos(p) => *p,
        pest::error::InputLocation::Span((s, _)) => *s,
    }
}

fn pair_span(pair: &Pair<Rule>) -> Span {
    let s = pair.as_span();
    Span::new(s.start(), s.end())
}

// ── Parser ──────────────────────────────────────────────────────────────

/// Compiles a token stream into a [`Template`].
///
/// Tag compilers receive the parser so they can compile their arguments
/// with [`compile_filter`](Parser::compile_filter) and, for `{% load %}`,
/// extend the set of available tags.
pub struct Parser<'e> {
    libraries: &'e HashMap<String, Library>,
    tags: HashMap<String, Arc<dyn TagCompiler>>,
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl<'e> Parser<'e> {
    /// A parser seeded with `builtins`, able to load any of `libraries`.
    pub fn new(builtins: &Library, libraries: &'e HashMap<String, Library>) -> Self {
        let mut parser = Self {
            libraries,
            tags: HashMap::new(),
            filters: HashMap::new(),
        };
        parser.add_library(builtins);
        parser
    }

    /// Make every tag and filter of `library` available from here on.
    pub fn add_library(&mut self, library: &Library) {
        for (name, compiler) in library.tags() {
            self.tags.insert(name.clone(), Arc::clone(compiler));
        }
        for (name, filter) in library.filters() {
            self.filters.insert(name.clone(), Arc::clone(filter));
        }
    }

    /// Load a library registered with the engine under `name`.
    pub fn load_library(&mut self, name: &str) -> Result<(), TemplateSyntaxError> {
        let libraries = self.libraries;
        match libraries.get(name) {
            Some(library) => {
                self.add_library(library);
                Ok(())
            }
            None => {
                let mut known: Vec<&str> = libraries.keys().map(String::as_str).collect();
                known.sort_unstable();
                Err(TemplateSyntaxError::new(format!(
                    "'{name}' is not a registered tag library"
                ))
                .with_hint(format!("registered libraries: {}", known.join(", "))))
            }
        }
    }

    /// Compile template source into a node list.
    pub fn parse(&mut self, source: &str) -> Result<Template, TemplateSyntaxError> {
        let mut nodes = Vec::new();

        for token in tokenize(source)? {
            let kind = match token.kind {
                TokenKind::Text => NodeKind::Text(token.contents.clone()),
                TokenKind::Comment => continue,
                TokenKind::Variable => {
                    if token.contents.is_empty() {
                        return Err(TemplateSyntaxError::new(format!(
                            "Empty variable tag on line {}",
                            token.line
                        ))
                        .with_span(token.span));
                    }
                    let expr = self
                        .compile_filter(&token.contents)
                        .map_err(|e| e.or_span(token.span))?;
                    NodeKind::Variable(expr)
                }
                TokenKind::Block => {
                    let bits = token.split_contents()?;
                    let Some(command) = bits.first() else {
                        return Err(TemplateSyntaxError::new(format!(
                            "Empty block tag on line {}",
                            token.line
                        ))
                        .with_span(token.span));
                    };
                    let Some(compiler) = self.tags.get(command).map(Arc::clone) else {
                        return Err(TemplateSyntaxError::new(format!(
                            "Invalid block tag on line {}: '{command}'. Did you forget to register or load this tag?",
                            token.line
                        ))
                        .with_span(token.span));
                    };
                    let node = compiler
                        .compile(self, &token)
                        .map_err(|e| e.or_span(token.span))?;
                    NodeKind::Tag(node)
                }
            };
            nodes.push(Spanned::new(kind, token.span));
        }

        Ok(Template { nodes })
    }

    /// Compile one bit such as `query_dict.urlencode|safe` or `"foo"`.
    pub fn compile_filter(&self, token: &str) -> Result<FilterExpression, TemplateSyntaxError> {
        let pairs = TemplateGrammar::parse(Rule::filter_expression, token)
            .map_err(|e| remainder_error(token, pest_error_offset(&e)))?;

        let mut var = None;
        let mut filters = Vec::new();
        for pair in pairs.flatten() {
            match pair.as_rule() {
                Rule::operand if var.is_none() => var = Some(build_operand(pair)?),
                Rule::filter => filters.push(self.build_filter(pair)?),
                _ => {}
            }
        }

        let var = var.ok_or_else(|| remainder_error(token, 0))?;
        Ok(FilterExpression {
            source: token.to_string(),
            var,
            filters,
        })
    }

    fn build_filter(&self, pair: Pair<Rule>) -> Result<FilterCall, TemplateSyntaxError> {
        let mut inner = pair.into_inner();
        let name = inner
            .next()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default();
        let arg = inner.next().map(build_operand).transpose()?;
        let filter = self
            .filters
            .get(&name)
            .map(Arc::clone)
            .ok_or_else(|| TemplateSyntaxError::new(format!("Invalid filter: '{name}'")))?;
        Ok(FilterCall { name, filter, arg })
    }
}

impl std::fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.tags.keys().collect();
        tags.sort_unstable();
        f.debug_struct("Parser").field("tags", &tags).finish()
    }
}

fn remainder_error(token: &str, offset: usize) -> TemplateSyntaxError {
    let remainder = token.get(offset..).unwrap_or(token);
    TemplateSyntaxError::new(format!(
        "Could not parse the remainder: '{remainder}' from '{token}'"
    ))
}

// ── Operand building ────────────────────────────────────────────────────

fn build_operand(pair: Pair<Rule>) -> Result<Variable, TemplateSyntaxError> {
    let source = pair.as_str().to_string();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| remainder_error(&source, 0))?;

    match inner.as_rule() {
        Rule::string_literal => {
            // Both quote styles are one byte wide.
            let quoted = inner.as_str();
            let text = unescape_string(&quoted[1..quoted.len() - 1]);
            Ok(Variable::literal(source, Value::String(text)))
        }
        Rule::number => {
            let n: f64 = inner
                .as_str()
                .parse()
                .map_err(|_| TemplateSyntaxError::new(format!("invalid number: {source}")))?;
            Ok(Variable::literal(source, Value::Number(n)))
        }
        Rule::variable_path => Ok(match inner.as_str() {
            "True" => Variable::literal(source, Value::Bool(true)),
            "False" => Variable::literal(source, Value::Bool(false)),
            "None" => Variable::literal(source, Value::None),
            path => Variable::lookup(path),
        }),
        rule => Err(TemplateSyntaxError::new(format!(
            "unexpected rule in operand position: {rule:?}"
        ))),
    }
}

/// Undo `\"`, `\'` and `\\` escapes inside a quoted literal.
fn unescape_string(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(c @ ('"' | '\'' | '\\')) => result.push(c),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }
    result
}
