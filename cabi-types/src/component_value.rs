// CABI - cabi-types
// Module: Host-side component values
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Host-side value tree mirroring [`ValType`].
//!
//! Lifted values are plain Rust data owned by the caller; the engine keeps
//! no references into them after returning. Strings are always UTF-8 on the
//! host regardless of the wire encoding.

use crate::prelude::*;
use crate::val_type::ValType;

/// Immutable bitset backing a flags value.
///
/// Exactly `ceil(label_count / 32)` little-endian words wide; bits beyond
/// the label count are always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagsValue {
    label_count: usize,
    words: Vec<u32>,
}

impl FlagsValue {
    /// Number of 32-bit words needed for `label_count` labels
    pub fn word_count_for(label_count: usize) -> usize {
        label_count.div_ceil(32)
    }

    /// Create a flags value from raw words.
    ///
    /// The word vector must be exactly the required width and must not have
    /// bits set beyond the label count.
    pub fn new(label_count: usize, words: Vec<u32>) -> Result<Self> {
        if words.len() != Self::word_count_for(label_count) {
            return Err(Error::type_mismatch(format!(
                "flags value has {} words, {} labels require {}",
                words.len(),
                label_count,
                Self::word_count_for(label_count)
            )));
        }
        if let Some(last) = words.last() {
            let used_bits = label_count % 32;
            if used_bits != 0 && (last >> used_bits) != 0 {
                return Err(Error::type_mismatch(
                    "flags value has bits set beyond the label count",
                ));
            }
        }
        Ok(Self { label_count, words })
    }

    /// Create an all-clear flags value
    pub fn empty(label_count: usize) -> Self {
        Self {
            label_count,
            words: vec![0; Self::word_count_for(label_count)],
        }
    }

    /// Create a flags value with the given label indices set
    pub fn from_indices(label_count: usize, indices: &[usize]) -> Result<Self> {
        let mut words = vec![0u32; Self::word_count_for(label_count)];
        for &index in indices {
            if index >= label_count {
                return Err(Error::type_mismatch(format!(
                    "flag index {index} out of range for {label_count} labels"
                )));
            }
            words[index / 32] |= 1 << (index % 32);
        }
        Ok(Self { label_count, words })
    }

    /// Whether the bit for the given label index is set
    pub fn is_set(&self, index: usize) -> bool {
        index < self.label_count && (self.words[index / 32] >> (index % 32)) & 1 == 1
    }

    /// The raw little-endian words
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Number of labels this bitset covers
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// Width of the bitset in words
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Host-side component value
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    /// Boolean value
    Bool(bool),
    /// Signed 8-bit integer
    S8(i8),
    /// Unsigned 8-bit integer
    U8(u8),
    /// Signed 16-bit integer
    S16(i16),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Signed 32-bit integer
    S32(i32),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Signed 64-bit integer
    S64(i64),
    /// Unsigned 64-bit integer
    U64(u64),
    /// 32-bit floating point
    F32(f32),
    /// 64-bit floating point
    F64(f64),
    /// Unicode scalar value
    Char(char),
    /// UTF-8 string
    String(String),
    /// List of values of the element type
    List(Vec<ComponentValue>),
    /// Record field values in declaration order
    Record(Vec<ComponentValue>),
    /// Tuple values in positional order
    Tuple(Vec<ComponentValue>),
    /// Variant case discriminant and optional payload
    Variant(u32, Option<Box<ComponentValue>>),
    /// Enum case discriminant
    Enum(u32),
    /// Optional value; the discriminant is implied by presence
    Option(Option<Box<ComponentValue>>),
    /// Result value; the discriminant is implied by ok/err
    Result(core::result::Result<Option<Box<ComponentValue>>, Option<Box<ComponentValue>>>),
    /// Flags bitset
    Flags(FlagsValue),
    /// Owned resource handle
    Own(u32),
    /// Borrowed resource handle
    Borrow(u32),
}

impl ComponentValue {
    /// Structurally check this value against a type.
    ///
    /// Discriminants must be in range, payload presence must match the
    /// selected case, and flags widths must agree with the label count.
    pub fn matches_type(&self, ty: &ValType) -> bool {
        match (self, ty) {
            (Self::Bool(_), ValType::Bool)
            | (Self::S8(_), ValType::S8)
            | (Self::U8(_), ValType::U8)
            | (Self::S16(_), ValType::S16)
            | (Self::U16(_), ValType::U16)
            | (Self::S32(_), ValType::S32)
            | (Self::U32(_), ValType::U32)
            | (Self::S64(_), ValType::S64)
            | (Self::U64(_), ValType::U64)
            | (Self::F32(_), ValType::F32)
            | (Self::F64(_), ValType::F64)
            | (Self::Char(_), ValType::Char)
            | (Self::String(_), ValType::String) => true,

            (Self::List(items), ValType::List(elem)) => {
                items.iter().all(|item| item.matches_type(elem))
            },
            (Self::Record(values), ValType::Record(fields)) => {
                values.len() == fields.len()
                    && values
                        .iter()
                        .zip(fields.iter())
                        .all(|(value, (_, field_ty))| value.matches_type(field_ty))
            },
            (Self::Tuple(values), ValType::Tuple(elems)) => {
                values.len() == elems.len()
                    && values
                        .iter()
                        .zip(elems.iter())
                        .all(|(value, elem_ty)| value.matches_type(elem_ty))
            },
            (Self::Variant(discriminant, payload), ValType::Variant(cases)) => {
                match cases.get(*discriminant as usize) {
                    Some((_, Some(payload_ty))) => payload
                        .as_ref()
                        .is_some_and(|value| value.matches_type(payload_ty)),
                    Some((_, None)) => payload.is_none(),
                    None => false,
                }
            },
            (Self::Enum(discriminant), ValType::Enum(labels)) => {
                (*discriminant as usize) < labels.len()
            },
            (Self::Option(value), ValType::Option(inner)) => match value {
                Some(value) => value.matches_type(inner),
                None => true,
            },
            (Self::Result(value), ValType::Result(ok_ty, err_ty)) => {
                let (payload, payload_ty) = match value {
                    Ok(payload) => (payload, ok_ty),
                    Err(payload) => (payload, err_ty),
                };
                match (payload, payload_ty) {
                    (Some(value), Some(ty)) => value.matches_type(ty),
                    (None, None) => true,
                    _ => false,
                }
            },
            (Self::Flags(flags), ValType::Flags(labels)) => {
                flags.label_count() == labels.len()
            },
            (Self::Own(_), ValType::Own(_)) | (Self::Borrow(_), ValType::Borrow(_)) => true,

            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_width() {
        assert_eq!(FlagsValue::word_count_for(0), 0);
        assert_eq!(FlagsValue::word_count_for(1), 1);
        assert_eq!(FlagsValue::word_count_for(32), 1);
        assert_eq!(FlagsValue::word_count_for(33), 2);

        assert!(FlagsValue::new(33, vec![0, 0]).is_ok());
        assert!(FlagsValue::new(33, vec![0]).is_err());
        // bit 1 of the second word is beyond label 32
        assert!(FlagsValue::new(33, vec![0, 0b10]).is_err());
        assert!(FlagsValue::new(33, vec![u32::MAX, 0b1]).is_ok());
    }

    #[test]
    fn test_flags_indices() {
        let flags = FlagsValue::from_indices(40, &[0, 5, 39]).unwrap();
        assert!(flags.is_set(0));
        assert!(flags.is_set(5));
        assert!(flags.is_set(39));
        assert!(!flags.is_set(4));
        assert_eq!(flags.word_count(), 2);
        assert_eq!(flags.words()[0], 0b100001);
        assert_eq!(flags.words()[1], 1 << 7);

        assert!(FlagsValue::from_indices(4, &[4]).is_err());
    }

    #[test]
    fn test_matches_primitive() {
        assert!(ComponentValue::U8(3).matches_type(&ValType::U8));
        assert!(!ComponentValue::U8(3).matches_type(&ValType::S8));
        assert!(ComponentValue::String("x".to_string()).matches_type(&ValType::String));
    }

    #[test]
    fn test_matches_variant() {
        let ty = ValType::Variant(vec![
            ("none".to_string(), None),
            ("some".to_string(), Some(ValType::U64)),
        ]);
        let none = ComponentValue::Variant(0, None);
        let some = ComponentValue::Variant(1, Some(Box::new(ComponentValue::U64(42))));
        assert!(none.matches_type(&ty));
        assert!(some.matches_type(&ty));

        // payload on a payload-free case
        let bad = ComponentValue::Variant(0, Some(Box::new(ComponentValue::U64(1))));
        assert!(!bad.matches_type(&ty));
        // out-of-range discriminant
        assert!(!ComponentValue::Variant(2, None).matches_type(&ty));
    }

    #[test]
    fn test_matches_result() {
        let ty = ValType::Result(Some(Box::new(ValType::U32)), None);
        let ok = ComponentValue::Result(Ok(Some(Box::new(ComponentValue::U32(7)))));
        let err = ComponentValue::Result(Err(None));
        assert!(ok.matches_type(&ty));
        assert!(err.matches_type(&ty));
        assert!(!ComponentValue::Result(Ok(None)).matches_type(&ty));
    }

    #[test]
    fn test_matches_flags() {
        let ty = ValType::Flags(vec!["a".to_string(), "b".to_string()]);
        assert!(ComponentValue::Flags(FlagsValue::empty(2)).matches_type(&ty));
        assert!(!ComponentValue::Flags(FlagsValue::empty(3)).matches_type(&ty));
    }
}
