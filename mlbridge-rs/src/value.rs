//! Host-side representation of workspace values.
//!
//! The engine's own type system is much richer than this; the bridge only
//! distinguishes what it needs to route a value through the right channel:
//! numeric arrays go through the typed array channel (which keeps their
//! shape), everything else through a plain variable write.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ── NumericArray ──────────────────────────────────────────────────────────────

/// A dense numeric array with explicit dimensions.
///
/// Data is stored column-major, the engine's native order.  `dims` always has
/// at least two entries; a scalar is `[1, 1]` and a row vector `[1, n]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericArray {
    dims: Vec<usize>,
    real: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    imag: Option<Vec<f64>>,
}

impl NumericArray {
    /// Build an array from dimensions and column-major real data.
    ///
    /// Returns `None` if the element count does not match the dimensions.
    pub fn try_new(dims: Vec<usize>, real: Vec<f64>) -> Option<Self> {
        let dims = normalize_dims(dims);
        if dims.iter().product::<usize>() != real.len() {
            return None;
        }
        Some(Self { dims, real, imag: None })
    }

    /// Attach an imaginary part of the same length.
    pub fn with_imag(mut self, imag: Vec<f64>) -> Option<Self> {
        if imag.len() != self.real.len() {
            return None;
        }
        self.imag = Some(imag);
        Some(self)
    }

    /// A `1 × n` row vector.
    pub fn row(data: Vec<f64>) -> Self {
        Self { dims: vec![1, data.len()], real: data, imag: None }
    }

    /// A `1 × 1` array.
    pub fn scalar(x: f64) -> Self {
        Self::row(vec![x])
    }

    /// The `0 × 0` array.
    pub fn empty() -> Self {
        Self { dims: vec![0, 0], real: Vec::new(), imag: None }
    }

    /// Build a 2-D array from row-major nested rows.
    ///
    /// Returns `None` for ragged input.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return None;
        }
        let mut real = Vec::with_capacity(nrows * ncols);
        for c in 0..ncols {
            for r in rows {
                real.push(r[c]);
            }
        }
        Some(Self { dims: vec![nrows, ncols], real, imag: None })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn real(&self) -> &[f64] {
        &self.real
    }

    pub fn imag(&self) -> Option<&[f64]> {
        self.imag.as_deref()
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.real.len() == 1
    }

    /// Real part of the `i`-th element in column-major order.
    pub fn real_value(&self, i: usize) -> Option<f64> {
        self.real.get(i).copied()
    }

    /// Element at zero-based subscripts (one per dimension).
    pub fn get(&self, subs: &[usize]) -> Option<f64> {
        if subs.len() != self.dims.len() {
            return None;
        }
        let mut index = 0;
        let mut stride = 1;
        for (&s, &d) in subs.iter().zip(&self.dims) {
            if s >= d {
                return None;
            }
            index += s * stride;
            stride *= d;
        }
        self.real_value(index)
    }

    /// The same data with its shape collapsed to a `1 × n` row, which is what
    /// a plain variable read hands back for any numeric array.
    pub fn flattened(&self) -> Self {
        Self {
            dims: vec![1, self.real.len()],
            real: self.real.clone(),
            imag: self.imag.clone(),
        }
    }

    pub fn into_real(self) -> Vec<f64> {
        self.real
    }
}

/// Trailing singleton dimensions beyond the second are dropped, and fewer
/// than two dimensions are padded, matching the engine's `size` conventions.
fn normalize_dims(mut dims: Vec<usize>) -> Vec<usize> {
    while dims.len() > 2 && dims.last() == Some(&1) {
        dims.pop();
    }
    while dims.len() < 2 {
        dims.insert(0, 1);
    }
    dims
}

impl TryFrom<&Value> for NumericArray {
    type Error = ();

    /// Values that have a natural array form.  Plain scalars are deliberately
    /// excluded: they go through the generic variable write.
    fn try_from(value: &Value) -> Result<Self, ()> {
        match value {
            Value::Numeric(a) => Ok(a.clone()),
            Value::List(items) if !items.is_empty() => items
                .iter()
                .map(|v| match v {
                    Value::Scalar(x) => Some(*x),
                    _ => None,
                })
                .collect::<Option<Vec<f64>>>()
                .map(NumericArray::row)
                .ok_or(()),
            _ => Err(()),
        }
    }
}

// ── HostObject ────────────────────────────────────────────────────────────────

/// An opaque object that only exists in the calling process.
///
/// Equality is identity: two handles are equal if they point at the same
/// allocation.
#[derive(Clone)]
pub struct HostObject {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(inner: Arc<T>) -> Self {
        Self { type_name: std::any::type_name::<T>(), inner }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject<{}>", self.type_name)
    }
}

impl PartialEq for HostObject {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A value stored in, or read from, the engine workspace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// The empty matrix `[]`; also used to overwrite a variable with nothing.
    #[default]
    Empty,
    Scalar(f64),
    Bool(bool),
    Text(String),
    /// A cell array of strings, e.g. the answer to `who`.
    TextList(Vec<String>),
    Numeric(NumericArray),
    /// Several ordinal results, or a cell array of mixed values.
    List(Vec<Value>),
    /// Never crosses the wire.
    #[serde(skip)]
    Host(HostObject),
}

impl Value {
    /// Whether a plain variable read of this value may have lost its shape.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Numeric(_) | Value::Bool(_) | Value::List(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(x) => Some(*x),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Numeric(a) if a.is_scalar() => a.real_value(0),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            Value::Numeric(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostObject> {
        match self {
            Value::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Scalar(_) => "scalar",
            Value::Bool(_) => "logical",
            Value::Text(_) => "char",
            Value::TextList(_) => "cellstr",
            Value::Numeric(_) => "double",
            Value::List(_) => "cell",
            Value::Host(_) => "host object",
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(x)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Scalar(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Scalar(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Numeric(NumericArray::row(v))
    }
}

impl From<NumericArray> for Value {
    fn from(a: NumericArray) -> Self {
        Value::Numeric(a)
    }
}

impl From<HostObject> for Value {
    fn from(h: HostObject) -> Self {
        Value::Host(h)
    }
}

/// Numbers print without a trailing `.0` when they are integral.
pub(crate) fn format_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

impl fmt::Display for NumericArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scalar() {
            return f.write_str(&format_number(self.real[0]));
        }
        if self.dims.len() > 2 {
            let shape: Vec<String> = self.dims.iter().map(usize::to_string).collect();
            return write!(f, "[{} double]", shape.join("x"));
        }
        let (rows, cols) = (self.dims[0], self.dims[1]);
        f.write_str("[")?;
        for r in 0..rows {
            if r > 0 {
                f.write_str("; ")?;
            }
            let row: Vec<String> = (0..cols)
                .map(|c| format_number(self.real[c * rows + r]))
                .collect();
            f.write_str(&row.join(" "))?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("[]"),
            Value::Scalar(x) => f.write_str(&format_number(*x)),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => f.write_str(s),
            Value::TextList(items) => {
                let quoted: Vec<String> = items.iter().map(|s| format!("'{s}'")).collect();
                write!(f, "{{{}}}", quoted.join(", "))
            }
            Value::Numeric(a) => write!(f, "{a}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_string).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Host(h) => write!(f, "<{}>", h.type_name()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_new_checks_element_count() {
        assert!(NumericArray::try_new(vec![2, 3], vec![0.0; 6]).is_some());
        assert!(NumericArray::try_new(vec![2, 3], vec![0.0; 5]).is_none());
    }

    #[test]
    fn dims_are_normalized() {
        let a = NumericArray::try_new(vec![4], vec![0.0; 4]).unwrap();
        assert_eq!(a.dims(), &[1, 4]);
        let b = NumericArray::try_new(vec![2, 2, 1, 1], vec![0.0; 4]).unwrap();
        assert_eq!(b.dims(), &[2, 2]);
    }

    #[test]
    fn from_rows_is_column_major() {
        let a = NumericArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(a.real(), &[1.0, 3.0, 2.0, 4.0]);
        assert_eq!(a.get(&[0, 1]), Some(2.0));
        assert_eq!(a.get(&[1, 0]), Some(3.0));
        assert_eq!(a.get(&[2, 0]), None);
    }

    #[test]
    fn from_rows_rejects_ragged() {
        assert!(NumericArray::from_rows(&[vec![1.0], vec![2.0, 3.0]]).is_none());
    }

    #[test]
    fn flattened_keeps_data() {
        let a = NumericArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let flat = a.flattened();
        assert_eq!(flat.dims(), &[1, 4]);
        assert_eq!(flat.real(), a.real());
    }

    #[test]
    fn scalar_is_not_array_convertible() {
        assert!(NumericArray::try_from(&Value::Scalar(1.0)).is_err());
        assert!(NumericArray::try_from(&Value::from("x")).is_err());
    }

    #[test]
    fn list_of_scalars_converts_to_row() {
        let v = Value::List(vec![Value::Scalar(1.0), Value::Scalar(2.0)]);
        assert_eq!(NumericArray::try_from(&v), Ok(NumericArray::row(vec![1.0, 2.0])));
        let mixed = Value::List(vec![Value::Scalar(1.0), Value::from("a")]);
        assert!(NumericArray::try_from(&mixed).is_err());
    }

    #[test]
    fn host_equality_is_identity() {
        let a = HostObject::new(5u32);
        let b = a.clone();
        let c = HostObject::new(5u32);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<u32>(), Some(&5));
    }

    #[test]
    fn display_matrix_and_scalar() {
        assert_eq!(Value::Scalar(3.0).to_string(), "3");
        assert_eq!(Value::Scalar(0.5).to_string(), "0.5");
        let m = NumericArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(Value::Numeric(m).to_string(), "[1 2; 3 4]");
        let cube = NumericArray::try_new(vec![1, 2, 3], vec![0.0; 6]).unwrap();
        assert_eq!(cube.to_string(), "[1x2x3 double]");
    }

    #[test]
    fn serde_tags_values() {
        let json = serde_json::to_string(&Value::Scalar(2.0)).unwrap();
        assert_eq!(json, r#"{"type":"scalar","value":2.0}"#);
        let back: Value = serde_json::from_str(r#"{"type":"text_list","value":["a","b"]}"#).unwrap();
        assert_eq!(back, Value::TextList(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn host_values_do_not_serialize() {
        let v = Value::Host(HostObject::new(()));
        assert!(serde_json::to_string(&v).is_err());
    }
}
