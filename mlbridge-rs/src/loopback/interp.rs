//! Evaluator for the loopback workspace.

use std::collections::BTreeMap;

use regex::Regex;

use super::expr::{parse_program, BinOp, Expr, Stmt, UnaryOp};
use crate::value::{format_number, NumericArray, Value};

/// Named variables of one workspace.
pub type Workspace = BTreeMap<String, Value>;

/// Why a run produced no value.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The source is valid but yields no value (statements, assignments).
    NoResult,
    Error(String),
}

impl From<String> for Fault {
    fn from(msg: String) -> Self {
        Fault::Error(msg)
    }
}

impl From<&str> for Fault {
    fn from(msg: &str) -> Self {
        Fault::Error(msg.to_owned())
    }
}

type EvalResult<T> = Result<T, Fault>;

/// Guard against runaway `while` loops.
const MAX_ITERATIONS: usize = 1_000_000;

/// Execute `src` for its side effects.
pub fn run(ws: &mut Workspace, src: &str) -> EvalResult<()> {
    let prog = parse_program(src)?;
    Interp { ws }.exec_block(&prog)
}

/// Evaluate `src` as a single expression and return its value.
///
/// Anything else (assignments, control flow, several statements) is
/// [`Fault::NoResult`] and is not executed.
pub fn run_returning(ws: &mut Workspace, src: &str) -> EvalResult<Value> {
    let prog = parse_program(src)?;
    match prog.as_slice() {
        [Stmt::Expr(e)] => Interp { ws }.eval(e),
        [Stmt::Command(name, args)] if name == "who" => {
            Interp { ws }.command(name, args)?.ok_or(Fault::NoResult)
        }
        _ => Err(Fault::NoResult),
    }
}

struct Interp<'w> {
    ws: &'w mut Workspace,
}

impl Interp<'_> {
    // ── Statements ────────────────────────────────────────────────────────────

    fn exec_block(&mut self, stmts: &[Stmt]) -> EvalResult<()> {
        for stmt in stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match stmt {
            Stmt::Assign(name, e) => {
                let v = self.eval(e)?;
                self.ws.insert(name.clone(), v);
            }
            Stmt::Expr(Expr::Call(name, args)) if name == "eval" && !self.ws.contains_key(name) => {
                let [arg] = args.as_slice() else {
                    return Err("eval: expected one argument".into());
                };
                let src = self.eval_text(arg)?;
                run(self.ws, &src)?;
            }
            Stmt::Expr(e) => match self.eval(e) {
                Ok(v) => {
                    self.ws.insert("ans".into(), v);
                }
                Err(Fault::NoResult) => {}
                Err(e) => return Err(e),
            },
            Stmt::Command(name, args) => {
                self.command(name, args)?;
            }
            Stmt::If { arms, otherwise } => {
                for (cond, body) in arms {
                    if truthy(&self.eval(cond)?) {
                        return self.exec_block(body);
                    }
                }
                self.exec_block(otherwise)?;
            }
            Stmt::While(cond, body) => {
                let mut n = 0;
                while truthy(&self.eval(cond)?) {
                    n += 1;
                    if n > MAX_ITERATIONS {
                        return Err("while: iteration limit exceeded".into());
                    }
                    self.exec_block(body)?;
                }
            }
            Stmt::For(var, range, body) => {
                let items = to_array(&self.eval(range)?)?;
                for x in items.real() {
                    self.ws.insert(var.clone(), Value::Numeric(NumericArray::scalar(*x)));
                    self.exec_block(body)?;
                }
            }
        }
        Ok(())
    }

    /// Workspace commands.  Returns a value for those that produce one.
    fn command(&mut self, name: &str, args: &[String]) -> EvalResult<Option<Value>> {
        match name {
            "clear" | "clearvars" => {
                if args.is_empty() {
                    self.ws.clear();
                } else {
                    for a in args {
                        self.ws.remove(a);
                    }
                }
                Ok(None)
            }
            "who" => Ok(Some(Value::TextList(self.ws.keys().cloned().collect()))),
            "format" | "close" => Ok(None),
            other => Err(format!("unknown command '{other}'").into()),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn eval(&mut self, e: &Expr) -> EvalResult<Value> {
        match e {
            Expr::Num(x) => Ok(num(*x)),
            Expr::Str(s) => Ok(Value::Text(s.clone())),
            Expr::Var(name) => self.lookup(name),
            Expr::Call(name, args) => self.call(name, args),
            Expr::Unary(op, inner) => {
                let v = self.eval(inner)?;
                match op {
                    UnaryOp::Neg => Ok(array_value(map(&to_array(&v)?, |x| -x))),
                    UnaryOp::Not => compare(&v, &num(0.0), |a, _| a == 0.0),
                }
            }
            Expr::Binary(BinOp::AndAnd, l, r) => {
                Ok(Value::Bool(truthy(&self.eval(l)?) && truthy(&self.eval(r)?)))
            }
            Expr::Binary(BinOp::OrOr, l, r) => {
                Ok(Value::Bool(truthy(&self.eval(l)?) || truthy(&self.eval(r)?)))
            }
            Expr::Binary(op, l, r) => {
                let (a, b) = (self.eval(l)?, self.eval(r)?);
                binary(*op, &a, &b)
            }
            Expr::Range(start, step, stop) => {
                let start = self.eval_scalar(start)?;
                let step = match step {
                    Some(s) => self.eval_scalar(s)?,
                    None => 1.0,
                };
                let stop = self.eval_scalar(stop)?;
                Ok(Value::Numeric(range(start, step, stop)))
            }
            Expr::Matrix(rows) => self.matrix(rows),
            Expr::Transpose(inner) => {
                let a = to_array(&self.eval(inner)?)?;
                Ok(array_value(transpose(&a)?))
            }
        }
    }

    fn eval_scalar(&mut self, e: &Expr) -> EvalResult<f64> {
        let v = self.eval(e)?;
        let a = to_array(&v)?;
        match a.real_value(0) {
            Some(x) if a.is_scalar() => Ok(x),
            _ => Err("expected a scalar".into()),
        }
    }

    fn eval_text(&mut self, e: &Expr) -> EvalResult<String> {
        match self.eval(e)? {
            Value::Text(s) => Ok(s),
            other => Err(format!("expected text, got {}", other.type_name()).into()),
        }
    }

    fn lookup(&mut self, name: &str) -> EvalResult<Value> {
        if let Some(v) = self.ws.get(name) {
            return Ok(v.clone());
        }
        match name {
            "pi" => Ok(num(std::f64::consts::PI)),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "Inf" | "inf" => Ok(num(f64::INFINITY)),
            "NaN" | "nan" => Ok(num(f64::NAN)),
            "eps" => Ok(num(f64::EPSILON)),
            _ if is_builtin(name) => self.call(name, &[]),
            _ => Err(format!("Undefined function or variable '{name}'.").into()),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> EvalResult<Value> {
        if let Some(target) = self.ws.get(name).cloned() {
            let subs = args
                .iter()
                .map(|a| self.eval(a).and_then(|v| to_array(&v).map_err(Fault::from)))
                .collect::<EvalResult<Vec<_>>>()?;
            return index(&target, &subs);
        }

        if name == "eval" {
            let [arg] = args else {
                return Err("eval: expected one argument".into());
            };
            let src = self.eval_text(arg)?;
            return run_returning(self.ws, &src);
        }

        let vals = args
            .iter()
            .map(|a| self.eval(a))
            .collect::<EvalResult<Vec<_>>>()?;
        builtin(name, &vals)
    }

    fn matrix(&mut self, rows: &[Vec<Expr>]) -> EvalResult<Value> {
        let mut evaluated = Vec::with_capacity(rows.len());
        for row in rows {
            let vals = row
                .iter()
                .map(|e| self.eval(e))
                .collect::<EvalResult<Vec<_>>>()?;
            evaluated.push(vals);
        }

        // A single row of text concatenates to text.
        if let [only] = evaluated.as_slice() {
            if !only.is_empty() && only.iter().all(|v| matches!(v, Value::Text(_))) {
                let s: String = only.iter().filter_map(Value::as_text).collect();
                return Ok(Value::Text(s));
            }
        }

        let mut blocks = Vec::new();
        for row in &evaluated {
            let parts = row.iter().map(to_array).collect::<Result<Vec<_>, _>>()?;
            let joined = hcat(&parts)?;
            if !joined.is_empty() {
                blocks.push(joined);
            }
        }
        if blocks.is_empty() {
            return Ok(Value::Empty);
        }
        Ok(array_value(vcat(&blocks)?))
    }
}

// ── Values ────────────────────────────────────────────────────────────────────

fn num(x: f64) -> Value {
    Value::Numeric(NumericArray::scalar(x))
}

/// Collapse empty arrays to `[]`.
fn array_value(a: NumericArray) -> Value {
    if a.is_empty() && a.dims().iter().all(|&d| d == 0) {
        Value::Empty
    } else {
        Value::Numeric(a)
    }
}

/// Numeric view of a value, as `double(...)` would produce it.
fn to_array(v: &Value) -> Result<NumericArray, String> {
    match v {
        Value::Empty => Ok(NumericArray::empty()),
        Value::Scalar(x) => Ok(NumericArray::scalar(*x)),
        Value::Bool(b) => Ok(NumericArray::scalar(if *b { 1.0 } else { 0.0 })),
        Value::Numeric(a) => Ok(a.clone()),
        Value::Text(s) => Ok(NumericArray::row(s.chars().map(|c| c as u32 as f64).collect())),
        Value::List(_) | Value::TextList(_) => {
            NumericArray::try_from(v).map_err(|_| "cell arrays cannot be converted to double".into())
        }
        Value::Host(h) => Err(format!("cannot convert {} to double", h.type_name())),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        other => match to_array(other) {
            Ok(a) => !a.is_empty() && a.real().iter().all(|&x| x != 0.0),
            Err(_) => false,
        },
    }
}

fn map(a: &NumericArray, f: impl Fn(f64) -> f64) -> NumericArray {
    let data = a.real().iter().map(|&x| f(x)).collect();
    NumericArray::try_new(a.dims().to_vec(), data).unwrap_or_else(NumericArray::empty)
}

/// Element-wise combination with scalar expansion.
fn zip_with(a: &NumericArray, b: &NumericArray, f: impl Fn(f64, f64) -> f64) -> EvalResult<NumericArray> {
    if b.is_scalar() {
        let y = b.real()[0];
        return Ok(map(a, |x| f(x, y)));
    }
    if a.is_scalar() {
        let x = a.real()[0];
        return Ok(map(b, |y| f(x, y)));
    }
    if a.dims() != b.dims() {
        return Err("Matrix dimensions must agree.".into());
    }
    let data = a.real().iter().zip(b.real()).map(|(&x, &y)| f(x, y)).collect();
    NumericArray::try_new(a.dims().to_vec(), data).ok_or_else(|| "bad dimensions".into())
}

fn compare(a: &Value, b: &Value, f: impl Fn(f64, f64) -> bool) -> EvalResult<Value> {
    let r = zip_with(&to_array(a)?, &to_array(b)?, |x, y| if f(x, y) { 1.0 } else { 0.0 })?;
    if r.is_scalar() {
        Ok(Value::Bool(r.real()[0] != 0.0))
    } else {
        Ok(array_value(r))
    }
}

fn binary(op: BinOp, a: &Value, b: &Value) -> EvalResult<Value> {
    let arith = |f: fn(f64, f64) -> f64| -> EvalResult<Value> {
        Ok(array_value(zip_with(&to_array(a)?, &to_array(b)?, f)?))
    };
    match op {
        BinOp::Add => arith(|x, y| x + y),
        BinOp::Sub => arith(|x, y| x - y),
        BinOp::Mul => arith(|x, y| x * y),
        BinOp::Div => arith(|x, y| x / y),
        BinOp::Pow => arith(f64::powf),
        BinOp::MatMul => {
            let (x, y) = (to_array(a)?, to_array(b)?);
            if x.is_scalar() || y.is_scalar() {
                Ok(array_value(zip_with(&x, &y, |p, q| p * q)?))
            } else {
                Ok(array_value(matmul(&x, &y)?))
            }
        }
        BinOp::Eq => compare(a, b, |x, y| x == y),
        BinOp::Ne => compare(a, b, |x, y| x != y),
        BinOp::Lt => compare(a, b, |x, y| x < y),
        BinOp::Le => compare(a, b, |x, y| x <= y),
        BinOp::Gt => compare(a, b, |x, y| x > y),
        BinOp::Ge => compare(a, b, |x, y| x >= y),
        BinOp::And => compare(a, b, |x, y| x != 0.0 && y != 0.0),
        BinOp::Or => compare(a, b, |x, y| x != 0.0 || y != 0.0),
        BinOp::AndAnd => Ok(Value::Bool(truthy(a) && truthy(b))),
        BinOp::OrOr => Ok(Value::Bool(truthy(a) || truthy(b))),
    }
}

fn matrix_dims(a: &NumericArray) -> EvalResult<(usize, usize)> {
    match a.dims() {
        [r, c] => Ok((*r, *c)),
        _ => Err("operation requires a 2-D array".into()),
    }
}

fn matmul(a: &NumericArray, b: &NumericArray) -> EvalResult<NumericArray> {
    let (ar, ac) = matrix_dims(a)?;
    let (br, bc) = matrix_dims(b)?;
    if ac != br {
        return Err("Inner matrix dimensions must agree.".into());
    }
    let mut out = vec![0.0; ar * bc];
    for j in 0..bc {
        for i in 0..ar {
            out[j * ar + i] = (0..ac).map(|k| a.real()[k * ar + i] * b.real()[j * br + k]).sum();
        }
    }
    NumericArray::try_new(vec![ar, bc], out).ok_or_else(|| "bad dimensions".into())
}

fn transpose(a: &NumericArray) -> EvalResult<NumericArray> {
    let (r, c) = matrix_dims(a)?;
    let mut out = Vec::with_capacity(a.len());
    for i in 0..r {
        for j in 0..c {
            out.push(a.real()[j * r + i]);
        }
    }
    NumericArray::try_new(vec![c, r], out).ok_or_else(|| "bad dimensions".into())
}

fn range(start: f64, step: f64, stop: f64) -> NumericArray {
    if step == 0.0 || (stop - start) / step < 0.0 || !start.is_finite() || !stop.is_finite() {
        return NumericArray::row(Vec::new());
    }
    let n = ((stop - start) / step + 1e-10).floor() as usize + 1;
    NumericArray::row((0..n).map(|i| start + i as f64 * step).collect())
}

/// Horizontal concatenation; column-major data appends directly.
fn hcat(parts: &[NumericArray]) -> EvalResult<NumericArray> {
    let parts: Vec<&NumericArray> = parts.iter().filter(|p| !p.is_empty()).collect();
    let Some(first) = parts.first() else {
        return Ok(NumericArray::empty());
    };
    let (rows, _) = matrix_dims(first)?;
    let mut cols = 0;
    let mut data = Vec::new();
    for p in &parts {
        let (r, c) = matrix_dims(p)?;
        if r != rows {
            return Err("Dimensions of arrays being concatenated are not consistent.".into());
        }
        cols += c;
        data.extend_from_slice(p.real());
    }
    NumericArray::try_new(vec![rows, cols], data).ok_or_else(|| "bad dimensions".into())
}

fn vcat(blocks: &[NumericArray]) -> EvalResult<NumericArray> {
    let (_, cols) = matrix_dims(&blocks[0])?;
    let mut rows = 0;
    for b in blocks {
        let (r, c) = matrix_dims(b)?;
        if c != cols {
            return Err("Dimensions of arrays being concatenated are not consistent.".into());
        }
        rows += r;
    }
    let mut data = Vec::with_capacity(rows * cols);
    for j in 0..cols {
        for b in blocks {
            let r = b.dims()[0];
            data.extend_from_slice(&b.real()[j * r..(j + 1) * r]);
        }
    }
    NumericArray::try_new(vec![rows, cols], data).ok_or_else(|| "bad dimensions".into())
}

/// One-based subscripts into a variable.
fn index(target: &Value, subs: &[NumericArray]) -> EvalResult<Value> {
    let to_idx = |x: f64| -> EvalResult<usize> {
        if x < 1.0 || x.fract() != 0.0 {
            return Err("Array indices must be positive integers.".into());
        }
        Ok(x as usize - 1)
    };
    let oob = || Fault::from("Index exceeds array bounds.");

    if let Value::Text(s) = target {
        let chars: Vec<char> = s.chars().collect();
        let [sub] = subs else {
            return Err("text supports linear indexing only".into());
        };
        let picked = sub
            .real()
            .iter()
            .map(|&x| to_idx(x).and_then(|i| chars.get(i).copied().ok_or_else(oob)))
            .collect::<EvalResult<String>>()?;
        return Ok(Value::Text(picked));
    }

    let a = to_array(target)?;
    match subs {
        [] => Ok(target.clone()),
        [sub] => {
            let picked = sub
                .real()
                .iter()
                .map(|&x| to_idx(x).and_then(|i| a.real_value(i).ok_or_else(oob)))
                .collect::<EvalResult<Vec<f64>>>()?;
            if picked.len() == 1 {
                Ok(num(picked[0]))
            } else {
                Ok(array_value(NumericArray::row(picked)))
            }
        }
        _ => {
            let idx = subs
                .iter()
                .map(|s| match s.real() {
                    [x] => to_idx(*x),
                    _ => Err("only scalar subscripts are supported with several dimensions".into()),
                })
                .collect::<EvalResult<Vec<usize>>>()?;
            a.get(&idx).map(num).ok_or_else(oob)
        }
    }
}

// ── Builtins ──────────────────────────────────────────────────────────────────

const BUILTINS: &[&str] = &[
    "sprintf", "double", "numel", "size", "zeros", "ones", "sum", "abs", "mod", "isempty",
    "num2str", "disp", "eval", "regexprep", "regexp",
];

fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn builtin(name: &str, args: &[Value]) -> EvalResult<Value> {
    let arg = |i: usize| -> EvalResult<&Value> {
        args.get(i).ok_or_else(|| Fault::from(format!("{name}: not enough input arguments")))
    };
    match name {
        "sprintf" => {
            let fmt = match arg(0)? {
                Value::Text(s) => s.clone(),
                other => return Err(format!("sprintf: format must be text, got {}", other.type_name()).into()),
            };
            Ok(Value::Text(sprintf(&fmt, &args[1..])?))
        }
        "double" => Ok(array_value(to_array(arg(0)?)?)),
        "numel" => Ok(num(to_array(arg(0)?)?.len() as f64)),
        "size" => {
            let a = to_array(arg(0)?)?;
            Ok(Value::Numeric(NumericArray::row(a.dims().iter().map(|&d| d as f64).collect())))
        }
        "zeros" | "ones" => {
            let fill = if name == "ones" { 1.0 } else { 0.0 };
            let dims: Vec<usize> = match args {
                [] => vec![1, 1],
                [n] => {
                    let n = scalar_of(n)? as usize;
                    vec![n, n]
                }
                many => many.iter().map(|v| scalar_of(v).map(|x| x as usize)).collect::<EvalResult<_>>()?,
            };
            let count = dims.iter().product();
            Ok(array_value(
                NumericArray::try_new(dims, vec![fill; count]).ok_or("bad dimensions")?,
            ))
        }
        "sum" => {
            let a = to_array(arg(0)?)?;
            let (r, c) = matrix_dims(&a)?;
            if r == 1 || c == 1 {
                return Ok(num(a.real().iter().sum()));
            }
            let sums = (0..c).map(|j| a.real()[j * r..(j + 1) * r].iter().sum()).collect();
            Ok(Value::Numeric(NumericArray::row(sums)))
        }
        "abs" => Ok(array_value(map(&to_array(arg(0)?)?, f64::abs))),
        "mod" => {
            let (a, b) = (to_array(arg(0)?)?, to_array(arg(1)?)?);
            Ok(array_value(zip_with(&a, &b, |x, y| {
                if y == 0.0 { x } else { x - (x / y).floor() * y }
            })?))
        }
        "isempty" => Ok(Value::Bool(match arg(0)? {
            Value::Text(s) => s.is_empty(),
            other => to_array(other)?.is_empty(),
        })),
        "num2str" => match arg(0)? {
            Value::Text(s) => Ok(Value::Text(s.clone())),
            other => Ok(Value::Text(other.to_string())),
        },
        "regexprep" => {
            let (text, pattern, replacement) =
                (text_of(arg(0)?)?, text_of(arg(1)?)?, text_of(arg(2)?)?);
            let re = compile(name, pattern)?;
            Ok(Value::Text(re.replace_all(text, replacement).into_owned()))
        }
        "regexp" => {
            let (text, pattern) = (text_of(arg(0)?)?, text_of(arg(1)?)?);
            let re = compile(name, pattern)?;
            match args.get(2).and_then(Value::as_text) {
                Some("match") => Ok(Value::TextList(
                    re.find_iter(text).map(|m| m.as_str().to_owned()).collect(),
                )),
                Some(other) => Err(format!("regexp: unsupported option '{other}'").into()),
                // One-based character offsets of each match.
                None => Ok(Value::Numeric(NumericArray::row(
                    re.find_iter(text)
                        .map(|m| (text[..m.start()].chars().count() + 1) as f64)
                        .collect(),
                ))),
            }
        }
        "disp" => {
            arg(0)?;
            Err(Fault::NoResult)
        }
        other => Err(format!("Undefined function or variable '{other}'.").into()),
    }
}

fn text_of(v: &Value) -> EvalResult<&str> {
    v.as_text()
        .ok_or_else(|| format!("expected text, got {}", v.type_name()).into())
}

fn compile(caller: &str, pattern: &str) -> EvalResult<Regex> {
    Regex::new(pattern).map_err(|e| format!("{caller}: invalid pattern: {e}").into())
}

fn scalar_of(v: &Value) -> EvalResult<f64> {
    let a = to_array(v)?;
    match a.real() {
        [x] => Ok(*x),
        _ => Err("expected a scalar".into()),
    }
}

/// The engine's `sprintf`: backslash escapes, `%%`, and `%d %i %u %f %e %g %s %c`
/// conversions with optional flags, width and precision.  The format is
/// reused while arguments remain.
fn sprintf(fmt: &str, args: &[Value]) -> EvalResult<String> {
    enum Arg {
        Num(f64),
        Text(String),
    }
    let mut queue = Vec::new();
    for a in args {
        match a {
            Value::Text(s) => queue.push(Arg::Text(s.clone())),
            other => queue.extend(to_array(other)?.real().iter().map(|&x| Arg::Num(x))),
        }
    }

    let chars: Vec<char> = fmt.chars().collect();
    let mut out = String::new();
    let mut next = 0;
    loop {
        let mut consumed = false;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            i += 1;
            match c {
                '\\' => {
                    let esc = chars.get(i).copied();
                    i += 1;
                    match esc {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('\\') => out.push('\\'),
                        Some(other) => {
                            out.push('\\');
                            out.push(other);
                        }
                        None => out.push('\\'),
                    }
                }
                '%' if chars.get(i) == Some(&'%') => {
                    i += 1;
                    out.push('%');
                }
                '%' => {
                    let start = i;
                    while i < chars.len() && !chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let Some(&conv) = chars.get(i) else {
                        out.extend(&chars[start - 1..]);
                        break;
                    };
                    i += 1;
                    let spec: String = chars[start..i - 1].iter().collect();
                    if next >= queue.len() {
                        if !queue.is_empty() {
                            return Ok(out);
                        }
                        continue;
                    }
                    consumed = true;
                    let arg = match &queue[next] {
                        Arg::Num(x) => Ok(*x),
                        Arg::Text(s) => Err(s.as_str()),
                    };
                    next += 1;
                    out.push_str(&convert(&spec, conv, arg)?);
                }
                other => out.push(other),
            }
        }
        if !consumed || next >= queue.len() {
            return Ok(out);
        }
    }
}

/// Format one argument; `arg` is `Ok(number)` or `Err(text)`.
fn convert(spec: &str, conv: char, arg: Result<f64, &str>) -> EvalResult<String> {
    let left = spec.contains('-');
    let zero = spec.starts_with('0') || spec.contains("+0") || spec.contains("-0");
    let plus = spec.contains('+');
    let digits = spec.trim_start_matches(['-', '+', '0', ' ', '#']);
    let (width, precision) = match digits.split_once('.') {
        Some((w, p)) => (w.parse::<usize>().unwrap_or(0), p.parse::<usize>().ok()),
        None => (digits.parse::<usize>().unwrap_or(0), None),
    };

    let body = match (conv, arg) {
        ('s' | 'c', Err(s)) => match precision {
            Some(p) => s.chars().take(p).collect(),
            None => s.to_owned(),
        },
        ('s', Ok(x)) => format_number(x),
        ('d' | 'i' | 'u', Ok(x)) if x.fract() == 0.0 || !x.is_finite() => format_number(x),
        ('d' | 'i' | 'u', Ok(x)) => format_e(x, 6),
        ('c', Ok(x)) => char::from_u32(x as u32).map(String::from).unwrap_or_default(),
        ('f' | 'F', Ok(x)) => format!("{:.*}", precision.unwrap_or(6), x),
        ('e' | 'E', Ok(x)) => {
            let s = format_e(x, precision.unwrap_or(6));
            if conv == 'E' {
                s.to_uppercase()
            } else {
                s
            }
        }
        ('g' | 'G', Ok(x)) => format_g(x, precision),
        (_, Err(s)) => s.to_owned(),
        (other, Ok(_)) => {
            return Err(format!("sprintf: unsupported conversion '%{other}'").into())
        }
    };

    let body = if plus && arg_is_nonneg(&body) { format!("+{body}") } else { body };
    let pad = width.saturating_sub(body.chars().count());
    Ok(if pad == 0 {
        body
    } else if left {
        format!("{body}{}", " ".repeat(pad))
    } else if zero && conv != 's' {
        let (sign, rest) = match body.strip_prefix('-') {
            Some(r) => ("-", r),
            None => ("", body.as_str()),
        };
        format!("{sign}{}{rest}", "0".repeat(pad))
    } else {
        format!("{}{body}", " ".repeat(pad))
    })
}

fn arg_is_nonneg(body: &str) -> bool {
    !body.starts_with('-') && body.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// C-style `%e`: mantissa with `p` decimals and a signed two-digit exponent.
fn format_e(x: f64, p: usize) -> String {
    let s = format!("{:.*e}", p, x);
    match s.split_once('e') {
        Some((m, e)) => {
            let (sign, digits) = match e.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', e),
            };
            format!("{m}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

/// C-style `%g`: shortest of `%e`/`%f` at `p` significant digits, trailing
/// zeros removed.
fn format_g(x: f64, p: Option<usize>) -> String {
    if !x.is_finite() {
        return format_number(x);
    }
    let p = p.unwrap_or(6).max(1);
    if x == 0.0 {
        return "0".into();
    }
    let exp = x.abs().log10().floor() as i32;
    let trim = |s: String| -> String {
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_owned()
        } else {
            s
        }
    };
    if exp < -4 || exp >= p as i32 {
        let s = format_e(x, p - 1);
        match s.split_once('e') {
            Some((m, e)) => format!("{}e{e}", trim(m.to_owned())),
            None => s,
        }
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        trim(format!("{:.*}", decimals, x))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
