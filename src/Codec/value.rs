/// A native argument value as the codec sees it.
///
/// `Pod` holds the host-order bytes of one scalar, `Struct` the members in
/// declaration order, and `Array` the elements of a fixed-size array. A value
/// for a pointer or reference parameter is the pointee itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Pod(Vec<u8>),
    Struct(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    pub fn pod_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Pod(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn members(&self) -> Option<&[Value]> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn array<T: WireScalar>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(items.into_iter().map(|item| item.to_value()).collect())
    }

    /// Typed view of a `Pod`, `None` on shape or size mismatch.
    pub fn get<T: WireScalar>(&self) -> Option<T> {
        T::from_value(self)
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Pod(_) => "pod",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Pod(bytes) => format!("pod of {} bytes", bytes.len()),
            other => format!("{} of {} items", other.kind(), other.len()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Value::Pod(bytes) => bytes.len(),
            Value::Struct(items) | Value::Array(items) => items.len(),
        }
    }
}

/// Rust values with a direct wire representation.
pub trait WireScalar: Sized {
    fn to_value(&self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! wire_scalar {
    ($($t:ty),*) => {
        $(
            impl WireScalar for $t {
                fn to_value(&self) -> Value {
                    Value::Pod(self.to_ne_bytes().to_vec())
                }

                fn from_value(value: &Value) -> Option<Self> {
                    Some(<$t>::from_ne_bytes(value.pod_bytes()?.try_into().ok()?))
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Value {
                    v.to_value()
                }
            }
        )*
    };
}

wire_scalar!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl<T: WireScalar, const N: usize> WireScalar for [T; N] {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(WireScalar::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        let items = value
            .elements()?
            .iter()
            .map(T::from_value)
            .collect::<Option<Vec<T>>>()?;
        items.try_into().ok()
    }
}

impl<T: WireScalar, const N: usize> From<[T; N]> for Value {
    fn from(v: [T; N]) -> Value {
        v.to_value()
    }
}

impl WireScalar for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}
