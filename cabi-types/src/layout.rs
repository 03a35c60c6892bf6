// CABI - cabi-types
// Module: Memory layout calculator
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Size and alignment calculation for the flat canonical layout.
//!
//! Both directions of value translation derive field offsets from the
//! rules here, which keeps guest-visible layouts identical between lift
//! and lower.

use crate::prelude::*;
use crate::val_type::ValType;

/// Soft bound on type tree depth
pub const MAX_TYPE_DEPTH: usize = 64;

/// Discriminant size in bytes for variant-shaped types
pub const DISCRIMINANT_SIZE: u32 = 4;

/// Memory layout information for a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Size of the type in bytes
    pub size: u32,
    /// Alignment requirement in bytes, always at least 1
    pub alignment: u32,
}

impl MemoryLayout {
    /// Create a new memory layout
    pub const fn new(size: u32, alignment: u32) -> Self {
        Self { size, alignment }
    }
}

/// Align a cursor up to the given alignment.
///
/// `alignment` must be a nonzero power of two; every layout produced by
/// [`abi`] satisfies that. The arithmetic is done in 64 bits so callers
/// can detect address-space overflow before touching guest memory.
pub fn align_up(value: u64, alignment: u32) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    let mask = u64::from(alignment) - 1;
    (value + mask) & !mask
}

/// Calculate the flat size and alignment of a type.
///
/// Fails with a type error for shapes the engine does not implement
/// (streams, futures, error contexts) and for type trees nested deeper
/// than [`MAX_TYPE_DEPTH`].
pub fn abi(ty: &ValType) -> Result<MemoryLayout> {
    abi_at_depth(ty, 0)
}

/// Layout of the widest case payload of a variant-shaped type.
///
/// Payload-free variants yield the zero layout with alignment 1.
pub fn max_payload_layout(payloads: &[Option<&ValType>]) -> Result<MemoryLayout> {
    max_payload_at_depth(payloads, 0)
}

/// Offset of the payload area within a variant-shaped type: the i32
/// discriminant, aligned up to the widest case payload alignment.
pub fn payload_offset(payloads: &[Option<&ValType>]) -> Result<u32> {
    let payload = max_payload_layout(payloads)?;
    Ok(align_up(u64::from(DISCRIMINANT_SIZE), payload.alignment) as u32)
}

fn abi_at_depth(ty: &ValType, depth: usize) -> Result<MemoryLayout> {
    if depth > MAX_TYPE_DEPTH {
        return Err(Error::bad_type("type tree exceeds maximum nesting depth"));
    }

    let layout = match ty {
        ValType::Bool | ValType::S8 | ValType::U8 => MemoryLayout::new(1, 1),
        ValType::S16 | ValType::U16 => MemoryLayout::new(2, 2),
        ValType::S32 | ValType::U32 | ValType::F32 | ValType::Char => MemoryLayout::new(4, 4),
        ValType::S64 | ValType::U64 | ValType::F64 => MemoryLayout::new(8, 8),

        // Strings and lists occupy an (offset, length) pair in memory
        ValType::String | ValType::List(_) => {
            // Element layout must still be valid even though it does not
            // influence the pair layout
            if let ValType::List(elem) = ty {
                abi_at_depth(elem, depth + 1)?;
            }
            MemoryLayout::new(8, 4)
        },

        ValType::Record(fields) => {
            sequence_layout(fields.iter().map(|(_, ty)| ty), depth)?
        },
        ValType::Tuple(elems) => sequence_layout(elems.iter(), depth)?,

        ValType::Variant(_) | ValType::Option(_) | ValType::Result(..) => {
            let payloads = ty
                .case_payloads()
                .ok_or_else(|| Error::bad_type("variant shape without cases"))?;
            let payload = max_payload_at_depth(&payloads, depth)?;
            let alignment = payload.alignment.max(DISCRIMINANT_SIZE);
            let payload_start = align_up(u64::from(DISCRIMINANT_SIZE), payload.alignment);
            let end = payload_start + u64::from(payload.size);
            checked_layout(align_up(end, alignment), alignment)?
        },

        ValType::Enum(_) => MemoryLayout::new(4, 4),

        ValType::Flags(labels) => {
            let words = labels.len().div_ceil(32) as u32;
            MemoryLayout::new(words * 4, 4)
        },

        ValType::Own(_) | ValType::Borrow(_) => MemoryLayout::new(4, 4),

        ValType::Stream(_) | ValType::Future(_) | ValType::ErrorContext => {
            return Err(Error::bad_type(format!(
                "{} is not implemented by this engine",
                ty.kind_name()
            )));
        },
    };

    if layout.alignment == 0 {
        return Err(Error::bad_type("computed zero alignment"));
    }
    Ok(layout)
}

/// Layout of fields placed sequentially, each at its own alignment, with
/// the total size padded to the composite alignment.
fn sequence_layout<'a>(
    fields: impl Iterator<Item = &'a ValType>,
    depth: usize,
) -> Result<MemoryLayout> {
    let mut cursor: u64 = 0;
    let mut alignment: u32 = 1;

    for field in fields {
        let field_layout = abi_at_depth(field, depth + 1)?;
        cursor = align_up(cursor, field_layout.alignment);
        cursor += u64::from(field_layout.size);
        alignment = alignment.max(field_layout.alignment);
    }

    checked_layout(align_up(cursor, alignment), alignment)
}

fn max_payload_at_depth(payloads: &[Option<&ValType>], depth: usize) -> Result<MemoryLayout> {
    let mut size: u32 = 0;
    let mut alignment: u32 = 1;

    for payload in payloads.iter().flatten() {
        let layout = abi_at_depth(payload, depth + 1)?;
        size = size.max(layout.size);
        alignment = alignment.max(layout.alignment);
    }

    Ok(MemoryLayout::new(size, alignment))
}

fn checked_layout(size: u64, alignment: u32) -> Result<MemoryLayout> {
    let size = u32::try_from(size)
        .map_err(|_| Error::bad_type("type size exceeds the 32-bit address space"))?;
    Ok(MemoryLayout::new(size, alignment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_layouts() {
        assert_eq!(abi(&ValType::Bool).unwrap(), MemoryLayout::new(1, 1));
        assert_eq!(abi(&ValType::U8).unwrap(), MemoryLayout::new(1, 1));
        assert_eq!(abi(&ValType::U16).unwrap(), MemoryLayout::new(2, 2));
        assert_eq!(abi(&ValType::U32).unwrap(), MemoryLayout::new(4, 4));
        assert_eq!(abi(&ValType::U64).unwrap(), MemoryLayout::new(8, 8));
        assert_eq!(abi(&ValType::F32).unwrap(), MemoryLayout::new(4, 4));
        assert_eq!(abi(&ValType::F64).unwrap(), MemoryLayout::new(8, 8));
        assert_eq!(abi(&ValType::Char).unwrap(), MemoryLayout::new(4, 4));
    }

    #[test]
    fn test_pair_layouts() {
        assert_eq!(abi(&ValType::String).unwrap(), MemoryLayout::new(8, 4));
        let list = ValType::List(Box::new(ValType::U64));
        assert_eq!(abi(&list).unwrap(), MemoryLayout::new(8, 4));
    }

    #[test]
    fn test_record_layout() {
        // u32 at 0, u16 at 4, u32 aligned from 6 up to 8; total 12, align 4
        let record = ValType::Record(vec![
            ("a".to_string(), ValType::U32),
            ("b".to_string(), ValType::U16),
            ("c".to_string(), ValType::U32),
        ]);
        assert_eq!(abi(&record).unwrap(), MemoryLayout::new(12, 4));
    }

    #[test]
    fn test_empty_record_layout() {
        let record = ValType::Record(vec![]);
        let layout = abi(&record).unwrap();
        assert_eq!(layout.size, 0);
        assert!(layout.alignment >= 1);
    }

    #[test]
    fn test_variant_layout() {
        // i32 discriminant, pad to 8, u64 payload; total 16, align 8
        let variant = ValType::Variant(vec![
            ("none".to_string(), None),
            ("some".to_string(), Some(ValType::U64)),
        ]);
        assert_eq!(abi(&variant).unwrap(), MemoryLayout::new(16, 8));

        let payloads = variant.case_payloads().unwrap();
        assert_eq!(payload_offset(&payloads).unwrap(), 8);
    }

    #[test]
    fn test_payload_free_variant_layout() {
        let variant = ValType::Variant(vec![
            ("a".to_string(), None),
            ("b".to_string(), None),
        ]);
        assert_eq!(abi(&variant).unwrap(), MemoryLayout::new(4, 4));
        let payloads = variant.case_payloads().unwrap();
        assert_eq!(payload_offset(&payloads).unwrap(), 4);
    }

    #[test]
    fn test_option_and_result_layouts() {
        let opt = ValType::Option(Box::new(ValType::U8));
        // discriminant 4 bytes, payload at 4, size padded to align 4 -> 8
        assert_eq!(abi(&opt).unwrap(), MemoryLayout::new(8, 4));

        let res = ValType::Result(Some(Box::new(ValType::U64)), None);
        assert_eq!(abi(&res).unwrap(), MemoryLayout::new(16, 8));

        let bare = ValType::Result(None, None);
        assert_eq!(abi(&bare).unwrap(), MemoryLayout::new(4, 4));
    }

    #[test]
    fn test_flags_layout() {
        let flags = |n: usize| {
            ValType::Flags((0..n).map(|i| format!("f{i}")).collect())
        };
        assert_eq!(abi(&flags(1)).unwrap(), MemoryLayout::new(4, 4));
        assert_eq!(abi(&flags(32)).unwrap(), MemoryLayout::new(4, 4));
        assert_eq!(abi(&flags(33)).unwrap(), MemoryLayout::new(8, 4));
        assert_eq!(abi(&flags(0)).unwrap().size, 0);
    }

    #[test]
    fn test_handle_layouts() {
        assert_eq!(abi(&ValType::Own(0)).unwrap(), MemoryLayout::new(4, 4));
        assert_eq!(abi(&ValType::Borrow(9)).unwrap(), MemoryLayout::new(4, 4));
    }

    #[test]
    fn test_unimplemented_shapes() {
        assert!(abi(&ValType::Stream(None)).is_err());
        assert!(abi(&ValType::Future(Some(Box::new(ValType::U8)))).is_err());
        assert!(abi(&ValType::ErrorContext).is_err());
    }

    #[test]
    fn test_depth_guard() {
        let mut ty = ValType::U8;
        for _ in 0..(MAX_TYPE_DEPTH + 2) {
            ty = ValType::List(Box::new(ty));
        }
        let err = abi(&ty).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(3, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(5, 4), 8);
        assert_eq!(align_up(6, 8), 8);
        assert_eq!(align_up(u64::from(u32::MAX), 2), u64::from(u32::MAX) + 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_val_type() -> impl Strategy<Value = ValType> {
            let primitives = prop::sample::select(vec![
                ValType::Bool,
                ValType::S8,
                ValType::U8,
                ValType::S16,
                ValType::U16,
                ValType::S32,
                ValType::U32,
                ValType::S64,
                ValType::U64,
                ValType::F32,
                ValType::F64,
                ValType::Char,
                ValType::String,
            ]);
            let leaf = prop_oneof![
                primitives,
                (1usize..80).prop_map(|n| {
                    ValType::Flags((0..n).map(|i| format!("f{i}")).collect())
                }),
                (1usize..5).prop_map(|n| {
                    ValType::Enum((0..n).map(|i| format!("e{i}")).collect())
                }),
            ];
            leaf.prop_recursive(4, 24, 4, |inner| {
                prop_oneof![
                    inner.clone().prop_map(|t| ValType::List(Box::new(t))),
                    inner.clone().prop_map(|t| ValType::Option(Box::new(t))),
                    prop::collection::vec(inner.clone(), 0..4).prop_map(ValType::Tuple),
                    prop::collection::vec(inner.clone().prop_map(Some), 1..4).prop_map(|cases| {
                        ValType::Variant(
                            cases
                                .into_iter()
                                .enumerate()
                                .map(|(i, p)| (format!("c{i}"), p))
                                .collect(),
                        )
                    }),
                    prop::collection::vec(inner, 0..4).prop_map(|fields| {
                        ValType::Record(
                            fields
                                .into_iter()
                                .enumerate()
                                .map(|(i, t)| (format!("f{i}"), t))
                                .collect(),
                        )
                    }),
                ]
            })
        }

        proptest! {
            #[test]
            fn size_is_multiple_of_alignment(ty in arb_val_type()) {
                let layout = abi(&ty).unwrap();
                prop_assert!(layout.alignment >= 1);
                prop_assert_eq!(layout.size % layout.alignment, 0);
            }
        }
    }
}
