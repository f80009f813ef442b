//! Symbolic arithmetic expressions for the filter-graph compiler.
//!
//! Placement math that depends on dimensions only the external engine knows
//! at execution time (overlay size, rendered text size) is kept symbolic and
//! printed in the engine's infix expression syntax. Arithmetic on known
//! constants folds at construction so a centered element prints as the
//! canonical `(main_w-overlay_w)/2` rather than a longer equivalent.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use crate::geometry::PositionSpec;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    /// Engine-provided variable such as `main_w` or `text_h`.
    Sym(&'static str),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn token(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }

    /// Whether an equal-precedence right operand changes meaning without
    /// parentheses, as in `a-(b+c)` or `a/(b*c)`.
    fn needs_right_parens(self) -> bool {
        matches!(self, BinaryOp::Sub | BinaryOp::Div)
    }
}

impl Expr {
    pub fn num(value: f64) -> Self {
        Expr::Num(value)
    }

    pub fn sym(name: &'static str) -> Self {
        Expr::Sym(name)
    }

    /// Build a binary node, folding constant and identity operations.
    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        if let (Expr::Num(a), Expr::Num(b)) = (&left, &right) {
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
            };
            return Expr::Num(v);
        }
        match op {
            BinaryOp::Add => match (&left, &right) {
                (Expr::Num(n), _) if *n == 0.0 => return right,
                (_, Expr::Num(n)) if *n == 0.0 => return left,
                // Normalize `x + -n` so the printed form never reads "+-".
                (_, Expr::Num(n)) if *n < 0.0 => {
                    return Expr::binary(BinaryOp::Sub, left, Expr::Num(-n));
                }
                _ => {}
            },
            BinaryOp::Sub => {
                if let Expr::Num(n) = &right {
                    if *n == 0.0 {
                        return left;
                    }
                    if *n < 0.0 {
                        return Expr::binary(BinaryOp::Add, left, Expr::Num(-n));
                    }
                }
                if left == right {
                    return Expr::Num(0.0);
                }
            }
            BinaryOp::Mul => match (&left, &right) {
                (Expr::Num(n), _) if *n == 0.0 => return Expr::Num(0.0),
                (_, Expr::Num(n)) if *n == 0.0 => return Expr::Num(0.0),
                (Expr::Num(n), _) if *n == 1.0 => return right,
                (_, Expr::Num(n)) if *n == 1.0 => return left,
                _ => {}
            },
            BinaryOp::Div => match (&left, &right) {
                (Expr::Num(n), _) if *n == 0.0 => return Expr::Num(0.0),
                (_, Expr::Num(n)) if *n == 1.0 => return left,
                _ => {}
            },
        }
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Num(_) | Expr::Sym(_) => u8::MAX,
            Expr::Binary { op, .. } => op.precedence(),
        }
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, self, rhs)
    }
}

impl Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Div, self, rhs)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{v}"),
            Expr::Sym(name) => f.write_str(name),
            Expr::Binary { op, left, right } => {
                if left.precedence() < op.precedence() {
                    write!(f, "({left})")?;
                } else {
                    write!(f, "{left}")?;
                }
                write!(f, "{}", op.token())?;
                let needs = right.precedence() < op.precedence()
                    || (right.precedence() == op.precedence() && op.needs_right_parens());
                if needs {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
        }
    }
}

/// `(extent - element) / 2`, the centered placement offset.
pub fn centered_offset(extent: Expr, element: Expr) -> Expr {
    (extent - element) / Expr::num(2.0)
}

/// Symbolic form of [`crate::geometry::resolve_offset`]: half the free space
/// plus the signed percentage of that half.
pub fn position_offset(spec: PositionSpec, extent: Expr, element: Expr) -> Expr {
    let half = centered_offset(extent, element);
    if spec.0 > 0.0 {
        half.clone() + Expr::num(spec.0 / 100.0) * half
    } else if spec.0 < 0.0 {
        half.clone() - Expr::num(-spec.0 / 100.0) * half
    } else {
        half
    }
}
