use std::fmt;

use crate::symbols::SymbolTable;
use crate::types::AssemblerError;

/// Static shape of an operand expression, known without any symbol values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprCategory {
    Number,
    Symbol,
    Arithmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    And,
    Xor,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::Xor => "^",
            BinaryOp::Or => "|",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i64),
    Symbol(String),
    /// `$`: address of the instruction being assembled.
    CurrentAddress,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn neg(expr: Expr) -> Self {
        Expr::Unary(UnaryOp::Neg, Box::new(expr))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn category(&self) -> ExprCategory {
        match self {
            Expr::Number(_) => ExprCategory::Number,
            Expr::Unary(UnaryOp::Neg | UnaryOp::Plus, inner)
                if matches!(**inner, Expr::Number(_)) =>
            {
                ExprCategory::Number
            }
            Expr::Symbol(_) | Expr::CurrentAddress => ExprCategory::Symbol,
            _ => ExprCategory::Arithmetic,
        }
    }

    /// A literal written with a leading minus sign, like `-1`.
    pub fn is_signed_literal(&self) -> bool {
        matches!(self, Expr::Unary(UnaryOp::Neg, inner) if matches!(**inner, Expr::Number(_)))
    }

    /// Value of a plain (optionally signed) number literal.
    pub fn literal_value(&self) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            Expr::Unary(UnaryOp::Neg, inner) => match **inner {
                Expr::Number(n) => n.checked_neg(),
                _ => None,
            },
            Expr::Unary(UnaryOp::Plus, inner) => match **inner {
                Expr::Number(n) => Some(n),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Symbol(name) => f.write_str(name),
            Expr::CurrentAddress => f.write_str("$"),
            Expr::Unary(op, inner) => {
                let sign = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::Not => "~",
                };
                write!(f, "{}{}", sign, inner)
            }
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
        }
    }
}

/// Turns an operand expression into an integer.
///
/// `address` is the value of `$` at the point of use.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        expr: &Expr,
        symbols: &SymbolTable,
        address: u16,
    ) -> Result<i64, AssemblerError>;
}

/// Integer arithmetic with overflow and division-by-zero checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEvaluator;

impl Evaluator for StandardEvaluator {
    fn evaluate(
        &self,
        expr: &Expr,
        symbols: &SymbolTable,
        address: u16,
    ) -> Result<i64, AssemblerError> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::CurrentAddress => Ok(i64::from(address)),
            Expr::Symbol(name) => symbols
                .value(name)
                .ok_or_else(|| AssemblerError::UndefinedSymbol(name.clone())),
            Expr::Unary(op, inner) => {
                let value = self.evaluate(inner, symbols, address)?;
                match op {
                    UnaryOp::Neg => value.checked_neg().ok_or_else(overflow),
                    UnaryOp::Plus => Ok(value),
                    UnaryOp::Not => Ok(!value),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.evaluate(lhs, symbols, address)?;
                let r = self.evaluate(rhs, symbols, address)?;
                apply(*op, l, r)
            }
        }
    }
}

fn apply(op: BinaryOp, l: i64, r: i64) -> Result<i64, AssemblerError> {
    match op {
        BinaryOp::Add => l.checked_add(r).ok_or_else(overflow),
        BinaryOp::Sub => l.checked_sub(r).ok_or_else(overflow),
        BinaryOp::Mul => l.checked_mul(r).ok_or_else(overflow),
        BinaryOp::Div | BinaryOp::Rem if r == 0 => Err(AssemblerError::InvalidExpression(
            "division by zero".to_string(),
        )),
        BinaryOp::Div => l.checked_div(r).ok_or_else(overflow),
        BinaryOp::Rem => l.checked_rem(r).ok_or_else(overflow),
        BinaryOp::Shl | BinaryOp::Shr if !(0..64).contains(&r) => Err(
            AssemblerError::InvalidExpression(format!("shift amount {} out of range", r)),
        ),
        BinaryOp::Shl => l.checked_shl(r as u32).ok_or_else(overflow),
        BinaryOp::Shr => l.checked_shr(r as u32).ok_or_else(overflow),
        BinaryOp::And => Ok(l & r),
        BinaryOp::Xor => Ok(l ^ r),
        BinaryOp::Or => Ok(l | r),
    }
}

fn overflow() -> AssemblerError {
    AssemblerError::InvalidExpression("arithmetic overflow".to_string())
}
