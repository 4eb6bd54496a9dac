//! Expression evaluation over a context resolver
//!
//! Walks the parsed expression tree, resolving symbol paths through the
//! injected [`ContextResolver`]. Arithmetic follows the original runtime:
//! `/` is float division, `%` takes the divisor's sign, `**` stays integral
//! for non-negative integer exponents, `+` concatenates strings, and
//! booleans act as 0/1 in arithmetic.

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use varka_core::{ContextResolver, ExecutionContext, Value};

use crate::expr::{parse_expr, BinOp, BoolOpKind, CmpOp, Expr, UnaryOp};
use crate::{EvalError, EvalResult};

/// Evaluates whitelisted expressions against an execution context
pub struct ExpressionEvaluator {
    resolver: Arc<dyn ContextResolver>,
}

impl ExpressionEvaluator {
    pub fn new(resolver: Arc<dyn ContextResolver>) -> Self {
        Self { resolver }
    }

    /// Evaluate an expression string to a value
    pub fn evaluate(&self, input: &str, ctx: &ExecutionContext) -> EvalResult<Value> {
        let expr = parse_expr(input)?;
        self.eval(&expr, ctx)
    }

    /// Evaluate at the condition boundary: every failure degrades to `false`
    pub fn evaluate_truthy(&self, input: &str, ctx: &ExecutionContext) -> bool {
        match self.evaluate(input, ctx) {
            Ok(value) => value.is_truthy(),
            Err(err) => {
                debug!(input, error = %err, "Expression evaluation failed");
                false
            }
        }
    }

    fn eval(&self, expr: &Expr, ctx: &ExecutionContext) -> EvalResult<Value> {
        match expr {
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Symbol(path) => Ok(self.resolve(path, ctx)),
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                apply_binary(*op, l, r)
            }
            Expr::Compare { left, ops } => {
                // every comparator is checked against the first left operand
                let l = self.eval(left, ctx)?;
                for (op, right_expr) in ops {
                    let r = self.eval(right_expr, ctx)?;
                    if !apply_compare(*op, &l, &r)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::BoolChain { op, values } => {
                match op {
                    BoolOpKind::And => {
                        for value in values {
                            if !self.eval(value, ctx)?.is_truthy() {
                                return Ok(Value::Bool(false));
                            }
                        }
                        Ok(Value::Bool(true))
                    }
                    BoolOpKind::Or => {
                        for value in values {
                            if self.eval(value, ctx)?.is_truthy() {
                                return Ok(Value::Bool(true));
                            }
                        }
                        Ok(Value::Bool(false))
                    }
                }
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, ctx)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnaryOp::Neg => match v {
                        Value::Int(i) => Ok(Value::Int(-i)),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        Value::Bool(b) => Ok(Value::Int(-i64::from(b))),
                        Value::Str(s) => Err(EvalError::TypeMismatch(format!(
                            "cannot negate string {:?}",
                            s
                        ))),
                    },
                }
            }
        }
    }

    /// Resolve a symbol path; string results are coerced, and an absent
    /// path self-quotes (the path text becomes the value, then coerces)
    fn resolve(&self, path: &str, ctx: &ExecutionContext) -> Value {
        match self.resolver.resolve(path, ctx) {
            Some(value) => value.coerced(),
            None => Value::coerce_str(path),
        }
    }
}

fn numeric_pair(l: &Value, r: &Value) -> Option<(f64, f64)> {
    let lf = match l {
        Value::Str(_) => return None,
        other => other.as_f64()?,
    };
    let rf = match r {
        Value::Str(_) => return None,
        other => other.as_f64()?,
    };
    Some((lf, rf))
}

fn both_int(l: &Value, r: &Value) -> Option<(i64, i64)> {
    let to_i = |v: &Value| match v {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    Some((to_i(l)?, to_i(r)?))
}

fn apply_binary(op: BinOp, l: Value, r: Value) -> EvalResult<Value> {
    match op {
        BinOp::Add => {
            if let (Value::Str(a), Value::Str(b)) = (&l, &r) {
                return Ok(Value::Str(format!("{}{}", a, b)));
            }
            if let Some((a, b)) = both_int(&l, &r) {
                if let Some(sum) = a.checked_add(b) {
                    return Ok(Value::Int(sum));
                }
            }
            let (a, b) = numeric_pair(&l, &r)
                .ok_or_else(|| type_error("+", &l, &r))?;
            Ok(Value::Float(a + b))
        }
        BinOp::Sub => {
            if let Some((a, b)) = both_int(&l, &r) {
                if let Some(diff) = a.checked_sub(b) {
                    return Ok(Value::Int(diff));
                }
            }
            let (a, b) = numeric_pair(&l, &r)
                .ok_or_else(|| type_error("-", &l, &r))?;
            Ok(Value::Float(a - b))
        }
        BinOp::Mul => {
            // string repetition by an integer count
            match (&l, &r) {
                (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                    let count = usize::try_from(*n).unwrap_or(0);
                    return Ok(Value::Str(s.repeat(count)));
                }
                _ => {}
            }
            if let Some((a, b)) = both_int(&l, &r) {
                if let Some(prod) = a.checked_mul(b) {
                    return Ok(Value::Int(prod));
                }
            }
            let (a, b) = numeric_pair(&l, &r)
                .ok_or_else(|| type_error("*", &l, &r))?;
            Ok(Value::Float(a * b))
        }
        BinOp::Div => {
            let (a, b) = numeric_pair(&l, &r)
                .ok_or_else(|| type_error("/", &l, &r))?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        BinOp::Mod => {
            if let Some((a, b)) = both_int(&l, &r) {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                // result takes the divisor's sign
                return Ok(Value::Int(((a % b) + b) % b));
            }
            let (a, b) = numeric_pair(&l, &r)
                .ok_or_else(|| type_error("%", &l, &r))?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(a - b * (a / b).floor()))
        }
        BinOp::Pow => {
            if let Some((a, b)) = both_int(&l, &r) {
                if b >= 0 {
                    if let Ok(exp) = u32::try_from(b) {
                        if let Some(pow) = a.checked_pow(exp) {
                            return Ok(Value::Int(pow));
                        }
                    }
                }
            }
            let (a, b) = numeric_pair(&l, &r)
                .ok_or_else(|| type_error("**", &l, &r))?;
            Ok(Value::Float(a.powf(b)))
        }
    }
}

fn apply_compare(op: CmpOp, l: &Value, r: &Value) -> EvalResult<bool> {
    match op {
        CmpOp::In => member_of(l, r),
        CmpOp::NotIn => member_of(l, r).map(|b| !b),
        CmpOp::Eq => Ok(values_equal(l, r)),
        CmpOp::Ne => Ok(!values_equal(l, r)),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ord = value_order(l, r).ok_or_else(|| {
                EvalError::TypeMismatch(format!("cannot order {} and {}", kind(l), kind(r)))
            })?;
            Ok(match op {
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
                _ => unreachable!(),
            })
        }
    }
}

fn member_of(needle: &Value, haystack: &Value) -> EvalResult<bool> {
    match (needle, haystack) {
        (Value::Str(n), Value::Str(h)) => Ok(h.contains(n.as_str())),
        _ => Err(EvalError::TypeMismatch(format!(
            "membership requires strings, got {} in {}",
            kind(needle),
            kind(haystack)
        ))),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    if let Some((a, b)) = numeric_pair(l, r) {
        return a == b;
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn value_order(l: &Value, r: &Value) -> Option<Ordering> {
    if let Some((a, b)) = numeric_pair(l, r) {
        return a.partial_cmp(&b);
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Str(_) => "string",
    }
}

fn type_error(op: &str, l: &Value, r: &Value) -> EvalError {
    EvalError::TypeMismatch(format!("{} {} {}", kind(l), op, kind(r)))
}
