//! Approximate in-memory size of cached values
//!
//! Text counts two bytes per character, structured values count their
//! serialized JSON length, primitives count a small constant.

use serde::Serialize;

/// Size estimate used by the cache byte budget
pub trait ApproxSize {
    fn approx_size(&self) -> usize;
}

/// Serialized JSON length of any value (0 if it cannot be serialized)
pub fn serialized_size<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

impl ApproxSize for String {
    fn approx_size(&self) -> usize {
        self.len() * 2
    }
}

impl ApproxSize for str {
    fn approx_size(&self) -> usize {
        self.len() * 2
    }
}

impl ApproxSize for bool {
    fn approx_size(&self) -> usize {
        4
    }
}

macro_rules! numeric_size {
    ($($t:ty),*) => {
        $(impl ApproxSize for $t {
            fn approx_size(&self) -> usize {
                8
            }
        })*
    };
}

numeric_size!(i32, i64, u32, u64, usize, f32, f64);

impl ApproxSize for serde_json::Value {
    fn approx_size(&self) -> usize {
        match self {
            serde_json::Value::Null => 0,
            serde_json::Value::Bool(b) => b.approx_size(),
            serde_json::Value::Number(_) => 8,
            serde_json::Value::String(s) => s.approx_size(),
            other => serialized_size(other),
        }
    }
}

impl<T: ApproxSize> ApproxSize for Vec<T> {
    fn approx_size(&self) -> usize {
        self.iter().map(ApproxSize::approx_size).sum()
    }
}

impl<T: ApproxSize + ?Sized> ApproxSize for std::sync::Arc<T> {
    fn approx_size(&self) -> usize {
        (**self).approx_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_counts_two_bytes_per_char() {
        assert_eq!("hello".to_string().approx_size(), 10);
    }

    #[test]
    fn test_structured_uses_serialized_length() {
        let value = json!({"a": 1});
        assert_eq!(value.approx_size(), r#"{"a":1}"#.len());
    }

    #[test]
    fn test_primitives_are_constant() {
        assert_eq!(true.approx_size(), 4);
        assert_eq!(42u64.approx_size(), 8);
        assert_eq!(json!(null).approx_size(), 0);
    }
}
