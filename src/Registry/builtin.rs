use super::declarations::TypeDecl;
use crate::Core::{hash_case_sensitive, Hash};
use lazy_static::lazy_static;

/// Scalar shape of a root POD type, used when rendering decoded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    LongLong,
    ULongLong,
    Float,
    Double,
}

impl ScalarKind {
    pub fn size(self) -> u32 {
        match self {
            ScalarKind::Char | ScalarKind::UChar => 1,
            ScalarKind::Short | ScalarKind::UShort => 2,
            ScalarKind::Int | ScalarKind::UInt | ScalarKind::Float => 4,
            ScalarKind::LongLong | ScalarKind::ULongLong | ScalarKind::Double => 8,
        }
    }

    /// Renders host-order `bytes`. `None` when the length does not match.
    pub fn render(self, bytes: &[u8]) -> Option<String> {
        macro_rules! show {
            ($t:ty) => {
                <$t>::from_ne_bytes(bytes.try_into().ok()?).to_string()
            };
        }
        Some(match self {
            ScalarKind::Char => show!(i8),
            ScalarKind::UChar => show!(u8),
            ScalarKind::Short => show!(i16),
            ScalarKind::UShort => show!(u16),
            ScalarKind::Int => show!(i32),
            ScalarKind::UInt => show!(u32),
            ScalarKind::LongLong => show!(i64),
            ScalarKind::ULongLong => show!(u64),
            ScalarKind::Float => show!(f32),
            ScalarKind::Double => show!(f64),
        })
    }
}

const SCALARS: [(&str, ScalarKind); 10] = [
    ("char", ScalarKind::Char),
    ("unsigned char", ScalarKind::UChar),
    ("short", ScalarKind::Short),
    ("unsigned short", ScalarKind::UShort),
    ("int", ScalarKind::Int),
    ("unsigned int", ScalarKind::UInt),
    ("long long int", ScalarKind::LongLong),
    ("unsigned long long int", ScalarKind::ULongLong),
    ("float", ScalarKind::Float),
    ("double", ScalarKind::Double),
];

lazy_static! {
    static ref SCALAR_HASHES: Vec<(Hash, ScalarKind)> = SCALARS
        .iter()
        .map(|&(name, kind)| (hash_case_sensitive(name), kind))
        .collect();

    /// The compiled-in scalar types: each numeric type plus its pointer and
    /// reference forms, and `void` for return types.
    pub static ref BUILTIN_TYPES: Vec<TypeDecl> = {
        let mut types = vec![TypeDecl::pod("void", 0)];
        for (name, kind) in SCALARS {
            types.push(TypeDecl::pod(name, kind.size()));
            types.push(TypeDecl::pod_pointer(name));
            types.push(TypeDecl::pod_reference(name));
        }
        types
    };
}

/// Scalar kind of the builtin type hashing to `hash`.
pub fn scalar_kind(hash: Hash) -> Option<ScalarKind> {
    SCALAR_HASHES
        .iter()
        .find(|(h, _)| *h == hash)
        .map(|&(_, kind)| kind)
}
