// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Statement parser: labels, assignments, directives, instructions, and
// parse-time include expansion.

use std::io;

use crate::error::{AsmError, Location};
use crate::expr::{parse_expr, Expr};
use crate::instructions::AddressMode;
use crate::tokenizer::{tokenize, Punct, Token};

/// Resolved include content. `file_name` overrides the include path in
/// error messages and nested include resolution when present.
pub struct IncludeSource {
    pub contents: String,
    pub file_name: Option<String>,
}

/// Caller-supplied include resolution. The library itself performs no I/O.
pub trait IncludeResolver {
    fn resolve(&self, path: &str, from_file: &str) -> io::Result<IncludeSource>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Accumulator,
    Immediate(Expr),
    Indirect(Expr, Option<Register>),
    Expression(Expr, Option<Register>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Org,
    Byte,
    Word,
    Reserve,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveArg {
    Str(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Symbol(String),
    LocationCounter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: AssignTarget,
        expr: Expr,
    },
    Directive {
        directive: Directive,
        args: Vec<DirectiveArg>,
    },
    Instruction {
        mnemonic: String,
        operand: Operand,
        /// Addressing mode chosen during the discovery pass and reused
        /// verbatim while encoding.
        mode: Option<AddressMode>,
    },
}

/// One parsed line: its labels, the statement (if any), and where it came
/// from. Include directives are expanded away before this level.
#[derive(Debug, Clone)]
pub struct Item {
    pub labels: Vec<String>,
    pub statement: Option<Statement>,
    pub location: Location,
}

enum DirectiveKind {
    Plain(Directive),
    Include,
}

fn directive_of(name: &str) -> Option<DirectiveKind> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        ".ORG" | "ORG" => Some(DirectiveKind::Plain(Directive::Org)),
        ".BYTE" | "BYTE" | ".DB" | "DB" => Some(DirectiveKind::Plain(Directive::Byte)),
        ".WORD" | "WORD" | ".DW" | "DW" => Some(DirectiveKind::Plain(Directive::Word)),
        ".RES" | "RES" | ".DS" | "DS" => Some(DirectiveKind::Plain(Directive::Reserve)),
        ".INCLUDE" | "INCLUDE" => Some(DirectiveKind::Include),
        _ => None,
    }
}

/// Parse a whole source into a flat statement list, splicing includes in
/// place as they are encountered.
pub fn parse_source(
    source: &str,
    file_name: &str,
    resolver: Option<&dyn IncludeResolver>,
) -> Result<Vec<Item>, AsmError> {
    let mut parser = SourceParser {
        resolver,
        include_stack: vec![file_name.to_string()],
        items: Vec::new(),
    };
    parser.parse(source, file_name)?;
    Ok(parser.items)
}

struct SourceParser<'a> {
    resolver: Option<&'a dyn IncludeResolver>,
    include_stack: Vec<String>,
    items: Vec<Item>,
}

impl<'a> SourceParser<'a> {
    fn parse(&mut self, source: &str, file: &str) -> Result<(), AsmError> {
        let normalized = source.replace("\r\n", "\n");
        for (idx, line) in normalized.split('\n').enumerate() {
            let location = Location::new(file, idx as u32 + 1, line);
            self.parse_line(line, &location)
                .map_err(|err| err.at(&location))?;
        }
        Ok(())
    }

    fn parse_line(&mut self, line: &str, location: &Location) -> Result<(), AsmError> {
        let tokens = tokenize(line).map_err(|err| AsmError::new(err.message))?;
        let mut lp = LineParser { tokens, index: 0 };

        let mut labels = Vec::new();
        while let Some(name) = lp.match_label() {
            labels.push(name);
        }

        if lp.at_end() {
            if !labels.is_empty() {
                self.items.push(Item {
                    labels,
                    statement: None,
                    location: location.clone(),
                });
            }
            return Ok(());
        }

        // '* = expr' sets the location counter.
        if lp.peek_punct(Punct::Star) && lp.peek_punct_at(1, Punct::Eq) {
            lp.index += 2;
            let expr = lp.parse_expr()?;
            lp.expect_end()?;
            self.items.push(Item {
                labels,
                statement: Some(Statement::Assignment {
                    target: AssignTarget::LocationCounter,
                    expr,
                }),
                location: location.clone(),
            });
            return Ok(());
        }

        let name = match lp.peek() {
            Some(Token::Symbol(name)) => name.clone(),
            _ => {
                return Err(AsmError::new(
                    "Expected a label, assignment, directive, or instruction",
                ))
            }
        };

        if lp.peek_punct_at(1, Punct::Eq) {
            lp.index += 2;
            let expr = lp.parse_expr()?;
            lp.expect_end()?;
            self.items.push(Item {
                labels,
                statement: Some(Statement::Assignment {
                    target: AssignTarget::Symbol(name),
                    expr,
                }),
                location: location.clone(),
            });
            return Ok(());
        }

        match directive_of(&name) {
            Some(DirectiveKind::Include) => {
                lp.index += 1;
                let path = match lp.next() {
                    Some(Token::Str(path)) => path,
                    _ => return Err(AsmError::new("Expected file name after include")),
                };
                lp.expect_end()?;
                if !labels.is_empty() {
                    self.items.push(Item {
                        labels,
                        statement: None,
                        location: location.clone(),
                    });
                }
                self.expand_include(&path, location)
            }
            Some(DirectiveKind::Plain(directive)) => {
                lp.index += 1;
                let args = match directive {
                    Directive::Byte | Directive::Word => lp.parse_directive_args()?,
                    Directive::Org | Directive::Reserve => {
                        vec![DirectiveArg::Expr(lp.parse_expr()?)]
                    }
                };
                lp.expect_end()?;
                self.items.push(Item {
                    labels,
                    statement: Some(Statement::Directive { directive, args }),
                    location: location.clone(),
                });
                Ok(())
            }
            None => {
                lp.index += 1;
                let operand = lp.parse_operand()?;
                lp.expect_end()?;
                self.items.push(Item {
                    labels,
                    statement: Some(Statement::Instruction {
                        mnemonic: name,
                        operand,
                        mode: None,
                    }),
                    location: location.clone(),
                });
                Ok(())
            }
        }
    }

    fn expand_include(&mut self, path: &str, location: &Location) -> Result<(), AsmError> {
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => return Err(AsmError::new("No include resolver provided")),
        };
        if self.include_stack.iter().any(|entry| entry == path) {
            return Err(AsmError::new(format!("Recursive include: {path}")));
        }
        let resolved = resolver
            .resolve(path, &location.file)
            .map_err(|err| AsmError::new(format!("Cannot include '{path}': {err}")))?;
        let file_name = resolved.file_name.unwrap_or_else(|| path.to_string());
        if self.include_stack.iter().any(|entry| *entry == file_name) {
            return Err(AsmError::new(format!("Recursive include: {path}")));
        }
        self.include_stack.push(file_name.clone());
        let result = self.parse(&resolved.contents, &file_name);
        self.include_stack.pop();
        result
    }
}

struct LineParser {
    tokens: Vec<Token>,
    index: usize,
}

impl LineParser {
    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn peek_punct(&self, punct: Punct) -> bool {
        self.peek_punct_at(0, punct)
    }

    fn peek_punct_at(&self, offset: usize, punct: Punct) -> bool {
        matches!(
            self.tokens.get(self.index + offset),
            Some(Token::Punct(p)) if *p == punct
        )
    }

    fn consume_punct(&mut self, punct: Punct) -> bool {
        if self.peek_punct(punct) {
            self.index += 1;
            return true;
        }
        false
    }

    fn expect_punct(&mut self, punct: Punct, message: &str) -> Result<(), AsmError> {
        if self.consume_punct(punct) {
            Ok(())
        } else {
            Err(AsmError::new(message))
        }
    }

    fn expect_end(&self) -> Result<(), AsmError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(AsmError::new("Unexpected trailing tokens"))
        }
    }

    /// Consume a `name ":"` pair if present.
    fn match_label(&mut self) -> Option<String> {
        if let Some(Token::Symbol(name)) = self.tokens.get(self.index) {
            if self.peek_punct_at(1, Punct::Colon) {
                let name = name.clone();
                self.index += 2;
                return Some(name);
            }
        }
        None
    }

    fn parse_expr(&mut self) -> Result<Expr, AsmError> {
        parse_expr(&self.tokens, &mut self.index)
    }

    fn parse_register(&mut self) -> Result<Register, AsmError> {
        match self.next() {
            Some(Token::Symbol(name)) if name.eq_ignore_ascii_case("X") => Ok(Register::X),
            Some(Token::Symbol(name)) if name.eq_ignore_ascii_case("Y") => Ok(Register::Y),
            _ => Err(AsmError::new("Expected X or Y after ','")),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, AsmError> {
        if self.at_end() {
            return Ok(Operand::None);
        }

        if self.tokens.len() - self.index == 1 {
            if let Some(Token::Symbol(name)) = self.peek() {
                if name.eq_ignore_ascii_case("A") {
                    self.index += 1;
                    return Ok(Operand::Accumulator);
                }
            }
        }

        if self.consume_punct(Punct::Hash) {
            let expr = self.parse_expr()?;
            return Ok(Operand::Immediate(expr));
        }

        if self.consume_punct(Punct::OpenParen) {
            let expr = self.parse_expr()?;
            if self.consume_punct(Punct::Comma) {
                let register = self.parse_register()?;
                self.expect_punct(Punct::CloseParen, "Missing ')' in operand")?;
                return Ok(Operand::Indirect(expr, Some(register)));
            }
            self.expect_punct(Punct::CloseParen, "Missing ')' in operand")?;
            if self.consume_punct(Punct::Comma) {
                let register = self.parse_register()?;
                return Ok(Operand::Indirect(expr, Some(register)));
            }
            return Ok(Operand::Indirect(expr, None));
        }

        let expr = self.parse_expr()?;
        if self.consume_punct(Punct::Comma) {
            let register = self.parse_register()?;
            return Ok(Operand::Expression(expr, Some(register)));
        }
        Ok(Operand::Expression(expr, None))
    }

    /// Comma-separated byte/word args: string literals stay strings, all
    /// else parses as an expression.
    fn parse_directive_args(&mut self) -> Result<Vec<DirectiveArg>, AsmError> {
        let mut args = Vec::new();
        loop {
            let arg_is_string = matches!(self.peek(), Some(Token::Str(_)))
                && (self.peek_punct_at(1, Punct::Comma) || self.tokens.get(self.index + 1).is_none());
            if arg_is_string {
                match self.next() {
                    Some(Token::Str(text)) => args.push(DirectiveArg::Str(text)),
                    _ => unreachable!(),
                }
            } else {
                args.push(DirectiveArg::Expr(self.parse_expr()?));
            }
            if !self.consume_punct(Punct::Comma) {
                break;
            }
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<Item> {
        parse_source(src, "(test)", None).unwrap()
    }

    fn parse_err(src: &str) -> AsmError {
        parse_source(src, "(test)", None).unwrap_err()
    }

    #[test]
    fn labels_collect_before_statement() {
        let items = parse("a: b: RTS");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].labels, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(
            items[0].statement,
            Some(Statement::Instruction { .. })
        ));
    }

    #[test]
    fn label_only_line() {
        let items = parse("start:");
        assert_eq!(items.len(), 1);
        assert!(items[0].statement.is_none());
    }

    #[test]
    fn location_counter_assignment() {
        let items = parse("* = $0801");
        assert!(matches!(
            items[0].statement,
            Some(Statement::Assignment {
                target: AssignTarget::LocationCounter,
                ..
            })
        ));
    }

    #[test]
    fn directive_aliases_case_insensitive() {
        for src in [".byte 1", "BYTE 1", "db 1", ".DB 1"] {
            let items = parse(src);
            assert!(
                matches!(
                    items[0].statement,
                    Some(Statement::Directive {
                        directive: Directive::Byte,
                        ..
                    })
                ),
                "failed for {src}"
            );
        }
    }

    #[test]
    fn byte_args_mix_strings_and_exprs() {
        let items = parse(".byte \"hi\", 13, 0");
        match &items[0].statement {
            Some(Statement::Directive { args, .. }) => {
                assert_eq!(args.len(), 3);
                assert_eq!(args[0], DirectiveArg::Str("hi".to_string()));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn operand_shapes() {
        let shapes = [
            ("RTS", Operand::None),
            ("ASL A", Operand::Accumulator),
            ("LDA #1", Operand::Immediate(Expr::Number(1))),
            (
                "JMP ($fffc)",
                Operand::Indirect(Expr::Number(0xfffc), None),
            ),
            (
                "LDA ($20,X)",
                Operand::Indirect(Expr::Number(0x20), Some(Register::X)),
            ),
            (
                "LDA ($20),Y",
                Operand::Indirect(Expr::Number(0x20), Some(Register::Y)),
            ),
            (
                "LDA $20,X",
                Operand::Expression(Expr::Number(0x20), Some(Register::X)),
            ),
            (
                "LDA $d020",
                Operand::Expression(Expr::Number(0xd020), None),
            ),
        ];
        for (src, expected) in shapes {
            let items = parse(src);
            match &items[0].statement {
                Some(Statement::Instruction { operand, .. }) => {
                    assert_eq!(operand, &expected, "for {src}")
                }
                other => panic!("unexpected for {src}: {other:?}"),
            }
        }
    }

    #[test]
    fn trailing_tokens_rejected() {
        let err = parse_err("LDA #1 2");
        assert!(err.message.contains("trailing"));
        assert_eq!(err.location.as_ref().map(|l| l.line), Some(1));
    }

    #[test]
    fn missing_register_after_comma() {
        let err = parse_err("LDA $20,");
        assert!(err.message.contains("Expected X or Y"));
    }

    #[test]
    fn include_without_resolver_fails() {
        let err = parse_err(".include \"macros.asm\"");
        assert!(err.message.contains("No include resolver"));
    }

    struct MapResolver(Vec<(&'static str, &'static str)>);

    impl IncludeResolver for MapResolver {
        fn resolve(&self, path: &str, _from: &str) -> std::io::Result<IncludeSource> {
            for (name, contents) in &self.0 {
                if *name == path {
                    return Ok(IncludeSource {
                        contents: contents.to_string(),
                        file_name: Some(path.to_string()),
                    });
                }
            }
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            ))
        }
    }

    #[test]
    fn include_splices_statements_in_place() {
        let resolver = MapResolver(vec![("inc.asm", "NOP")]);
        let items =
            parse_source("RTS\n.include \"inc.asm\"\nRTS", "(test)", Some(&resolver)).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].location.file, "inc.asm");
    }

    #[test]
    fn recursive_include_rejected() {
        let resolver = MapResolver(vec![
            ("a.asm", ".include \"b.asm\""),
            ("b.asm", ".include \"a.asm\""),
        ]);
        let err = parse_source(".include \"a.asm\"", "(test)", Some(&resolver)).unwrap_err();
        assert!(err.message.contains("Recursive include"));
    }

    #[test]
    fn missing_include_propagates_located() {
        let resolver = MapResolver(vec![]);
        let err =
            parse_source("NOP\n.include \"gone.asm\"", "(test)", Some(&resolver)).unwrap_err();
        assert!(err.message.contains("gone.asm"));
        assert_eq!(err.location.as_ref().map(|l| l.line), Some(2));
    }
}
