// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression engine shared by operand, directive-argument, and assignment
//! contexts: a precedence-climbing parser over the token stream and an
//! integer evaluator.

use std::fmt;

use crate::error::AsmError;
use crate::tokenizer::{Punct, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(i32),
    Symbol(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    LogicNot,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
}

/// Binding strength, low to high. Parentheses reset to the lowest level.
fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => 1,
        BinaryOp::BitXor => 2,
        BinaryOp::BitAnd => 3,
        BinaryOp::Eq | BinaryOp::Ne => 4,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
        BinaryOp::Shl | BinaryOp::Shr => 6,
        BinaryOp::Add | BinaryOp::Subtract => 7,
        BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Mod => 8,
    }
}

fn binary_op_of(punct: Punct) -> Option<BinaryOp> {
    Some(match punct {
        Punct::Pipe => BinaryOp::BitOr,
        Punct::Caret => BinaryOp::BitXor,
        Punct::Amp => BinaryOp::BitAnd,
        Punct::EqEq => BinaryOp::Eq,
        Punct::Ne => BinaryOp::Ne,
        Punct::Lt => BinaryOp::Lt,
        Punct::Le => BinaryOp::Le,
        Punct::Gt => BinaryOp::Gt,
        Punct::Ge => BinaryOp::Ge,
        Punct::Shl => BinaryOp::Shl,
        Punct::Shr => BinaryOp::Shr,
        Punct::Plus => BinaryOp::Add,
        Punct::Minus => BinaryOp::Subtract,
        Punct::Star => BinaryOp::Multiply,
        Punct::Slash => BinaryOp::Divide,
        Punct::Percent => BinaryOp::Mod,
        _ => return None,
    })
}

/// Parse an expression starting at `*index`, advancing it past the last
/// consumed token.
pub fn parse_expr(tokens: &[Token], index: &mut usize) -> Result<Expr, AsmError> {
    let lhs = parse_unary(tokens, index)?;
    parse_binary(tokens, index, lhs, 1)
}

fn parse_binary(
    tokens: &[Token],
    index: &mut usize,
    mut lhs: Expr,
    min_prec: u8,
) -> Result<Expr, AsmError> {
    while let Some(op) = peek_binary_op(tokens, *index) {
        let prec = precedence(op);
        if prec < min_prec {
            break;
        }
        *index += 1;
        let mut rhs = parse_unary(tokens, index)?;
        while let Some(next) = peek_binary_op(tokens, *index) {
            if precedence(next) <= prec {
                break;
            }
            rhs = parse_binary(tokens, index, rhs, prec + 1)?;
        }
        lhs = Expr::Binary {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_unary(tokens: &[Token], index: &mut usize) -> Result<Expr, AsmError> {
    if let Some(Token::Punct(punct)) = tokens.get(*index) {
        let op = match punct {
            Punct::Plus => Some(UnaryOp::Plus),
            Punct::Minus => Some(UnaryOp::Minus),
            Punct::Bang => Some(UnaryOp::LogicNot),
            Punct::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            *index += 1;
            let expr = parse_unary(tokens, index)?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
    }
    parse_primary(tokens, index)
}

fn parse_primary(tokens: &[Token], index: &mut usize) -> Result<Expr, AsmError> {
    let token = match tokens.get(*index) {
        Some(token) => token.clone(),
        None => return Err(AsmError::new("Unexpected end of expression")),
    };
    *index += 1;
    match token {
        Token::Number(value) => Ok(Expr::Number(value)),
        Token::Symbol(name) => Ok(Expr::Symbol(name)),
        // The location counter read as a value.
        Token::Punct(Punct::Star) => Ok(Expr::Symbol("*".to_string())),
        Token::Str(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Expr::Number(c as i32)),
                _ => Err(AsmError::new(
                    "Multi-character string not allowed in expression",
                )),
            }
        }
        Token::Punct(Punct::OpenParen) => {
            let expr = parse_expr(tokens, index)?;
            match tokens.get(*index) {
                Some(Token::Punct(Punct::CloseParen)) => {
                    *index += 1;
                    Ok(expr)
                }
                _ => Err(AsmError::new("Missing ')' in expression")),
            }
        }
        _ => Err(AsmError::new("Unexpected token in expression")),
    }
}

fn peek_binary_op(tokens: &[Token], index: usize) -> Option<BinaryOp> {
    match tokens.get(index) {
        Some(Token::Punct(punct)) => binary_op_of(*punct),
        _ => None,
    }
}

/// Error returned from expression evaluation. An `Undefined` result is
/// tolerated in the discovery pass for instruction operands and directive
/// args; everything else is fatal in both passes.
#[derive(Debug, Clone)]
pub enum EvalError {
    Undefined(String),
    Message(String),
}

impl EvalError {
    pub fn message(&self) -> String {
        match self {
            EvalError::Undefined(name) => format!("Undefined symbol: {name}"),
            EvalError::Message(message) => message.clone(),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EvalError {}

/// Context for expression evaluation: symbol resolution plus the current
/// location counter for `*` reads.
pub trait EvalContext {
    fn lookup_symbol(&self, name: &str) -> Result<Option<i32>, EvalError>;

    fn current_address(&self) -> Option<i32>;
}

/// Evaluate an expression to an integer value.
pub fn eval_expr(expr: &Expr, ctx: &dyn EvalContext) -> Result<i32, EvalError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Symbol(name) => {
            if name == "*" {
                if let Some(pc) = ctx.current_address() {
                    return Ok(pc);
                }
            }
            match ctx.lookup_symbol(name)? {
                Some(value) => Ok(value),
                None => Err(EvalError::Undefined(name.clone())),
            }
        }
        Expr::Unary { op, expr } => {
            let value = eval_expr(expr, ctx)?;
            Ok(apply_unary(*op, value))
        }
        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, ctx)?;
            let r = eval_expr(right, ctx)?;
            apply_binary(*op, l, r)
        }
    }
}

pub fn apply_unary(op: UnaryOp, value: i32) -> i32 {
    match op {
        UnaryOp::Plus => value,
        UnaryOp::Minus => value.wrapping_neg(),
        UnaryOp::BitNot => !value,
        UnaryOp::LogicNot => {
            if value == 0 {
                1
            } else {
                0
            }
        }
    }
}

pub fn apply_binary(op: BinaryOp, l: i32, r: i32) -> Result<i32, EvalError> {
    Ok(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Subtract => l.wrapping_sub(r),
        BinaryOp::Multiply => l.wrapping_mul(r),
        BinaryOp::Divide => {
            if r == 0 {
                return Err(EvalError::Message("Division by zero".to_string()));
            }
            l.wrapping_div(r)
        }
        BinaryOp::Mod => {
            if r == 0 {
                return Err(EvalError::Message("Modulo by zero".to_string()));
            }
            l.wrapping_rem(r)
        }
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Shl => l.wrapping_shl(r as u32),
        BinaryOp::Shr => l.wrapping_shr(r as u32),
        BinaryOp::Eq => (l == r) as i32,
        BinaryOp::Ne => (l != r) as i32,
        BinaryOp::Lt => (l < r) as i32,
        BinaryOp::Le => (l <= r) as i32,
        BinaryOp::Gt => (l > r) as i32,
        BinaryOp::Ge => (l >= r) as i32,
    })
}
