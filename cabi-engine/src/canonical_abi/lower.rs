// CABI - cabi-engine
// Module: Lower (host to guest)
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Lowering: host values to guest memory and core operands.
//!
//! Layout is computed before anything is written, allocations happen once
//! per string/list/struct, and fields are stored in declaration order so
//! guest-observable allocation order is deterministic. When a nested store
//! fails after an allocation, the engine frees the region through the
//! active reallocator if it can; otherwise the leak is logged and counted
//! while the primary error still propagates.

use cabi_types::layout;

use crate::canonical_abi::{check_flat_signature, CanonicalAbi, ResolvedOptions, Telemetry};
use crate::memory::GuestMemory;
use crate::prelude::*;
use crate::string_encoding;

impl CanonicalAbi {
    /// Lower a host value of the given type, producing core operands.
    ///
    /// `op_types` is the flat signature the caller expects and must match
    /// the one the type demands. Offset-bearing types allocate in guest
    /// memory through the options-selected reallocator.
    pub fn lower<M: GuestMemory>(
        &mut self,
        value: &ComponentValue,
        ty: &ValType,
        op_types: &[CoreType],
        options: &ResolvedOptions,
        memory: &mut M,
    ) -> Result<(Vec<CoreValue>, Telemetry)> {
        let expected = ty.flat_types()?;
        check_flat_signature(&expected, op_types)?;

        let mut telemetry = Telemetry::default();
        let operands = self.lower_operands(value, ty, options, memory, &mut telemetry)?;
        self.bump_lowers(&telemetry);
        Ok((operands, telemetry))
    }

    fn lower_operands<M: GuestMemory>(
        &mut self,
        value: &ComponentValue,
        ty: &ValType,
        options: &ResolvedOptions,
        memory: &mut M,
        telemetry: &mut Telemetry,
    ) -> Result<Vec<CoreValue>> {
        match ty {
            ValType::Bool
            | ValType::S8
            | ValType::U8
            | ValType::S16
            | ValType::U16
            | ValType::S32
            | ValType::U32
            | ValType::S64
            | ValType::U64
            | ValType::F32
            | ValType::F64
            | ValType::Char => Ok(vec![lower_primitive_operand(value, ty)?]),

            ValType::String => {
                let ComponentValue::String(s) = value else {
                    return Err(mismatch(value, ty));
                };
                let (ptr, units) = self.lower_string(s, options, memory, telemetry)?;
                Ok(vec![CoreValue::I32(ptr as i32), CoreValue::I32(units as i32)])
            },
            ValType::List(elem) => {
                let ComponentValue::List(items) = value else {
                    return Err(mismatch(value, ty));
                };
                let (ptr, len) = self.lower_list(items, elem, options, memory, telemetry, 0)?;
                Ok(vec![CoreValue::I32(ptr as i32), CoreValue::I32(len as i32)])
            },

            ValType::Enum(labels) => {
                let ComponentValue::Enum(discriminant) = value else {
                    return Err(mismatch(value, ty));
                };
                if *discriminant as usize >= labels.len() {
                    return Err(Error::invalid_discriminant(format!(
                        "enum discriminant {discriminant} out of range for {} cases",
                        labels.len()
                    )));
                }
                Ok(vec![CoreValue::I32(*discriminant as i32)])
            },

            ValType::Own(_) => {
                let ComponentValue::Own(handle) = value else {
                    return Err(mismatch(value, ty));
                };
                Ok(vec![CoreValue::I32(*handle as i32)])
            },
            ValType::Borrow(_) => {
                let ComponentValue::Borrow(handle) = value else {
                    return Err(mismatch(value, ty));
                };
                Ok(vec![CoreValue::I32(*handle as i32)])
            },

            ValType::Record(_)
            | ValType::Tuple(_)
            | ValType::Variant(_)
            | ValType::Option(_)
            | ValType::Result(..)
            | ValType::Flags(_) => {
                options.require_memory()?;
                let struct_layout = abi(ty)?;
                let ptr = self.allocate(
                    options,
                    memory,
                    struct_layout.alignment,
                    struct_layout.size,
                    telemetry,
                )?;
                if let Err(e) = self.store(value, ty, ptr, options, memory, telemetry, 0) {
                    self.release_or_leak(
                        options,
                        memory,
                        ptr,
                        struct_layout.size,
                        struct_layout.alignment,
                        telemetry,
                    );
                    return Err(e);
                }
                Ok(vec![CoreValue::I32(ptr as i32)])
            },

            ValType::Stream(_) | ValType::Future(_) | ValType::ErrorContext => Err(
                Error::bad_type(format!("cannot lower {}", ty.kind_name())),
            ),
        }
    }

    /// Store a value of the given type at `offset` in guest memory.
    pub(crate) fn store<M: GuestMemory>(
        &mut self,
        value: &ComponentValue,
        ty: &ValType,
        offset: u32,
        options: &ResolvedOptions,
        memory: &mut M,
        telemetry: &mut Telemetry,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_TYPE_DEPTH {
            return Err(Error::bad_type("value tree exceeds maximum nesting depth"));
        }

        match (value, ty) {
            (ComponentValue::Bool(v), ValType::Bool) => memory.write_u8(offset, u8::from(*v)),
            (ComponentValue::S8(v), ValType::S8) => memory.write_u8(offset, *v as u8),
            (ComponentValue::U8(v), ValType::U8) => memory.write_u8(offset, *v),
            (ComponentValue::S16(v), ValType::S16) => memory.write_u16_le(offset, *v as u16),
            (ComponentValue::U16(v), ValType::U16) => memory.write_u16_le(offset, *v),
            (ComponentValue::S32(v), ValType::S32) => memory.write_u32_le(offset, *v as u32),
            (ComponentValue::U32(v), ValType::U32) => memory.write_u32_le(offset, *v),
            (ComponentValue::S64(v), ValType::S64) => memory.write_u64_le(offset, *v as u64),
            (ComponentValue::U64(v), ValType::U64) => memory.write_u64_le(offset, *v),
            (ComponentValue::F32(v), ValType::F32) => memory.write_u32_le(offset, v.to_bits()),
            (ComponentValue::F64(v), ValType::F64) => memory.write_u64_le(offset, v.to_bits()),
            (ComponentValue::Char(v), ValType::Char) => memory.write_u32_le(offset, *v as u32),

            (ComponentValue::String(s), ValType::String) => {
                let (ptr, units) = self.lower_string(s, options, memory, telemetry)?;
                memory.write_u32_le(offset, ptr)?;
                memory.write_u32_le(offset + 4, units)
            },
            (ComponentValue::List(items), ValType::List(elem)) => {
                let (ptr, len) =
                    self.lower_list(items, elem, options, memory, telemetry, depth + 1)?;
                memory.write_u32_le(offset, ptr)?;
                memory.write_u32_le(offset + 4, len)
            },

            (ComponentValue::Record(values), ValType::Record(fields)) => {
                if values.len() != fields.len() {
                    return Err(Error::type_mismatch(format!(
                        "record value has {} fields, type has {}",
                        values.len(),
                        fields.len()
                    )));
                }
                self.store_sequence(
                    values.iter().zip(fields.iter().map(|(_, ty)| ty)),
                    offset,
                    options,
                    memory,
                    telemetry,
                    depth,
                )
            },
            (ComponentValue::Tuple(values), ValType::Tuple(elems)) => {
                if values.len() != elems.len() {
                    return Err(Error::type_mismatch(format!(
                        "tuple value has {} elements, type has {}",
                        values.len(),
                        elems.len()
                    )));
                }
                self.store_sequence(
                    values.iter().zip(elems.iter()),
                    offset,
                    options,
                    memory,
                    telemetry,
                    depth,
                )
            },

            (ComponentValue::Variant(discriminant, payload), ValType::Variant(_)) => self
                .store_variant(
                    *discriminant,
                    payload.as_deref(),
                    ty,
                    offset,
                    options,
                    memory,
                    telemetry,
                    depth,
                ),
            (ComponentValue::Option(payload), ValType::Option(_)) => {
                let discriminant = u32::from(payload.is_some());
                self.store_variant(
                    discriminant,
                    payload.as_deref(),
                    ty,
                    offset,
                    options,
                    memory,
                    telemetry,
                    depth,
                )
            },
            (ComponentValue::Result(result), ValType::Result(..)) => {
                let (discriminant, payload) = match result {
                    Ok(payload) => (0, payload.as_deref()),
                    Err(payload) => (1, payload.as_deref()),
                };
                self.store_variant(
                    discriminant,
                    payload,
                    ty,
                    offset,
                    options,
                    memory,
                    telemetry,
                    depth,
                )
            },

            (ComponentValue::Enum(discriminant), ValType::Enum(labels)) => {
                if *discriminant as usize >= labels.len() {
                    return Err(Error::invalid_discriminant(format!(
                        "enum discriminant {discriminant} out of range for {} cases",
                        labels.len()
                    )));
                }
                memory.write_u32_le(offset, *discriminant)
            },

            (ComponentValue::Flags(flags), ValType::Flags(labels)) => {
                if flags.label_count() != labels.len() {
                    return Err(Error::type_mismatch(format!(
                        "flags value covers {} labels, type has {}",
                        flags.label_count(),
                        labels.len()
                    )));
                }
                for (i, word) in flags.words().iter().enumerate() {
                    memory.write_u32_le(offset + (i as u32) * 4, *word)?;
                }
                Ok(())
            },

            (ComponentValue::Own(handle), ValType::Own(_))
            | (ComponentValue::Borrow(handle), ValType::Borrow(_)) => {
                memory.write_u32_le(offset, *handle)
            },

            (_, ValType::Stream(_) | ValType::Future(_) | ValType::ErrorContext) => Err(
                Error::bad_type(format!("cannot lower {}", ty.kind_name())),
            ),

            _ => Err(mismatch(value, ty)),
        }
    }

    /// Store sequential fields in declaration order, each at its own
    /// alignment
    fn store_sequence<'a, M: GuestMemory>(
        &mut self,
        pairs: impl Iterator<Item = (&'a ComponentValue, &'a ValType)>,
        offset: u32,
        options: &ResolvedOptions,
        memory: &mut M,
        telemetry: &mut Telemetry,
        depth: usize,
    ) -> Result<()> {
        let mut cursor = u64::from(offset);

        for (field_value, field_ty) in pairs {
            let field_layout = abi(field_ty)?;
            cursor = align_up(cursor, field_layout.alignment);
            memory.validate(cursor, u64::from(field_layout.size))?;
            let at = cursor_to_offset(cursor)?;
            self.store(field_value, field_ty, at, options, memory, telemetry, depth + 1)?;
            cursor += u64::from(field_layout.size);
        }

        Ok(())
    }

    fn store_variant<M: GuestMemory>(
        &mut self,
        discriminant: u32,
        payload: Option<&ComponentValue>,
        ty: &ValType,
        offset: u32,
        options: &ResolvedOptions,
        memory: &mut M,
        telemetry: &mut Telemetry,
        depth: usize,
    ) -> Result<()> {
        let payloads = ty
            .case_payloads()
            .ok_or_else(|| Error::bad_type("variant shape without cases"))?;

        let Some(payload_ty) = payloads.get(discriminant as usize) else {
            return Err(Error::invalid_discriminant(format!(
                "discriminant {discriminant} out of range for {} cases",
                payloads.len()
            )));
        };

        memory.write_u32_le(offset, discriminant)?;

        match (payload, payload_ty) {
            (Some(payload_value), Some(payload_ty)) => {
                let at = u64::from(offset) + u64::from(layout::payload_offset(&payloads)?);
                let payload_layout = abi(payload_ty)?;
                memory.validate(at, u64::from(payload_layout.size))?;
                let at = cursor_to_offset(at)?;
                self.store(payload_value, payload_ty, at, options, memory, telemetry, depth + 1)
            },
            (None, None) => Ok(()),
            (Some(_), None) => Err(Error::type_mismatch(format!(
                "case {discriminant} carries no payload but a value was provided"
            ))),
            (None, Some(_)) => Err(Error::type_mismatch(format!(
                "case {discriminant} requires a payload"
            ))),
        }
    }

    /// Encode and write a string, returning its (offset, code units) pair.
    pub(crate) fn lower_string<M: GuestMemory>(
        &mut self,
        s: &str,
        options: &ResolvedOptions,
        memory: &mut M,
        telemetry: &mut Telemetry,
    ) -> Result<(u32, u32)> {
        options.require_memory()?;

        let encoding = options.string_encoding;
        let bytes = string_encoding::encode_string(s, encoding)?;
        let units = string_encoding::wire_code_units(s, encoding)?;
        let byte_len = u32::try_from(bytes.len())
            .map_err(|_| Error::alloc_failed("encoded string exceeds 32-bit length"))?;

        let align = string_encoding::code_unit_size(encoding);
        let ptr = self.allocate(options, memory, align, byte_len, telemetry)?;
        if let Err(e) = memory.write_bytes(ptr, &bytes) {
            self.release_or_leak(options, memory, ptr, byte_len, align, telemetry);
            return Err(e);
        }
        Ok((ptr, units))
    }

    /// Lay out and write list elements, returning the (offset, length)
    /// pair.
    pub(crate) fn lower_list<M: GuestMemory>(
        &mut self,
        items: &[ComponentValue],
        elem: &ValType,
        options: &ResolvedOptions,
        memory: &mut M,
        telemetry: &mut Telemetry,
        depth: usize,
    ) -> Result<(u32, u32)> {
        options.require_memory()?;
        if depth > MAX_TYPE_DEPTH {
            return Err(Error::bad_type("value tree exceeds maximum nesting depth"));
        }

        let elem_layout = abi(elem)?;
        let len = u32::try_from(items.len())
            .map_err(|_| Error::alloc_failed("list exceeds 32-bit length"))?;

        // Dry layout pass: total size with per-element alignment
        let mut end: u64 = 0;
        for _ in items {
            end = align_up(end, elem_layout.alignment) + u64::from(elem_layout.size);
        }
        let total = u32::try_from(end)
            .map_err(|_| Error::alloc_failed("list exceeds the 32-bit address space"))?;

        let ptr = self.allocate(options, memory, elem_layout.alignment, total, telemetry)?;

        let mut cursor = u64::from(ptr);
        for item in items {
            cursor = align_up(cursor, elem_layout.alignment);
            let at = match cursor_to_offset(cursor) {
                Ok(at) => at,
                Err(e) => {
                    self.release_or_leak(options, memory, ptr, total, elem_layout.alignment, telemetry);
                    return Err(e);
                },
            };
            if let Err(e) = self.store(item, elem, at, options, memory, telemetry, depth + 1) {
                self.release_or_leak(options, memory, ptr, total, elem_layout.alignment, telemetry);
                return Err(e);
            }
            cursor += u64::from(elem_layout.size);
        }

        Ok((ptr, len))
    }
}

fn lower_primitive_operand(value: &ComponentValue, ty: &ValType) -> Result<CoreValue> {
    let operand = match (value, ty) {
        (ComponentValue::Bool(v), ValType::Bool) => CoreValue::I32(i32::from(*v)),
        // Narrow integers widen to i32 per their signedness
        (ComponentValue::S8(v), ValType::S8) => CoreValue::I32(i32::from(*v)),
        (ComponentValue::U8(v), ValType::U8) => CoreValue::I32(i32::from(*v)),
        (ComponentValue::S16(v), ValType::S16) => CoreValue::I32(i32::from(*v)),
        (ComponentValue::U16(v), ValType::U16) => CoreValue::I32(i32::from(*v)),
        (ComponentValue::S32(v), ValType::S32) => CoreValue::I32(*v),
        (ComponentValue::U32(v), ValType::U32) => CoreValue::I32(*v as i32),
        (ComponentValue::S64(v), ValType::S64) => CoreValue::I64(*v),
        (ComponentValue::U64(v), ValType::U64) => CoreValue::I64(*v as i64),
        (ComponentValue::F32(v), ValType::F32) => CoreValue::F32(*v),
        (ComponentValue::F64(v), ValType::F64) => CoreValue::F64(*v),
        (ComponentValue::Char(v), ValType::Char) => CoreValue::I32(*v as u32 as i32),
        _ => return Err(mismatch(value, ty)),
    };
    Ok(operand)
}

fn mismatch(value: &ComponentValue, ty: &ValType) -> Error {
    Error::type_mismatch(format!("value {value:?} does not have type {}", ty.kind_name()))
}

fn cursor_to_offset(cursor: u64) -> Result<u32> {
    u32::try_from(cursor)
        .map_err(|_| Error::out_of_bounds("cursor exceeds the 32-bit address space"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BumpAllocator, LinearMemory};
    use crate::string_encoding::StringEncoding;

    fn engine() -> CanonicalAbi {
        CanonicalAbi::new().with_host_allocator(Box::new(BumpAllocator::new(8)))
    }

    fn mem_opts() -> ResolvedOptions {
        ResolvedOptions::for_memory(0)
    }

    #[test]
    fn test_lower_sign_extends_s8() {
        let mut memory = LinearMemory::new(0);
        let (operands, _) = engine()
            .lower(
                &ComponentValue::S8(-1),
                &ValType::S8,
                &[CoreType::I32],
                &ResolvedOptions::new(),
                &mut memory,
            )
            .unwrap();
        assert_eq!(operands, vec![CoreValue::I32(-1)]);
    }

    #[test]
    fn test_lower_zero_extends_u8() {
        let mut memory = LinearMemory::new(0);
        let (operands, _) = engine()
            .lower(
                &ComponentValue::U8(0xFF),
                &ValType::U8,
                &[CoreType::I32],
                &ResolvedOptions::new(),
                &mut memory,
            )
            .unwrap();
        assert_eq!(operands, vec![CoreValue::I32(255)]);
    }

    #[test]
    fn test_lower_string_utf8() {
        let mut memory = LinearMemory::new(256);
        let mut abi = engine();
        let (operands, telemetry) = abi
            .lower(
                &ComponentValue::String("hello".to_string()),
                &ValType::String,
                &[CoreType::I32, CoreType::I32],
                &mem_opts(),
                &mut memory,
            )
            .unwrap();
        let ptr = operands[0].as_u32().unwrap();
        assert_eq!(operands[1], CoreValue::I32(5));
        assert_eq!(memory.read_bytes(ptr, 5).unwrap(), b"hello");
        assert_eq!(telemetry.allocations, 1);
        assert_eq!(telemetry.bytes_allocated, 5);
    }

    #[test]
    fn test_lower_empty_string_needs_no_allocator() {
        let mut memory = LinearMemory::new(16);
        // no allocator registered at all
        let mut abi = CanonicalAbi::new();
        let (operands, telemetry) = abi
            .lower(
                &ComponentValue::String(String::new()),
                &ValType::String,
                &[CoreType::I32, CoreType::I32],
                &mem_opts(),
                &mut memory,
            )
            .unwrap();
        assert_eq!(operands, vec![CoreValue::I32(0), CoreValue::I32(0)]);
        assert_eq!(telemetry.allocations, 0);
    }

    #[test]
    fn test_lower_string_utf16_units() {
        let mut memory = LinearMemory::new(256);
        let options = mem_opts().with_string_encoding(StringEncoding::Utf16Le);
        let (operands, _) = engine()
            .lower(
                &ComponentValue::String("🦀".to_string()),
                &ValType::String,
                &[CoreType::I32, CoreType::I32],
                &options,
                &mut memory,
            )
            .unwrap();
        // one supplementary plane character is two code units
        assert_eq!(operands[1], CoreValue::I32(2));
        let ptr = operands[0].as_u32().unwrap();
        assert_eq!(ptr % 2, 0);
        let bytes = memory.read_bytes(ptr, 4).unwrap();
        let units = [
            u16::from_le_bytes([bytes[0], bytes[1]]),
            u16::from_le_bytes([bytes[2], bytes[3]]),
        ];
        assert_eq!(char::decode_utf16(units).next().unwrap().unwrap(), '🦀');
    }

    #[test]
    fn test_lower_list_of_u16() {
        let mut memory = LinearMemory::new(256);
        let ty = ValType::List(Box::new(ValType::U16));
        let value = ComponentValue::List(vec![
            ComponentValue::U16(0x1111),
            ComponentValue::U16(0x2222),
            ComponentValue::U16(0x3333),
        ]);
        let (operands, telemetry) = engine()
            .lower(&value, &ty, &[CoreType::I32, CoreType::I32], &mem_opts(), &mut memory)
            .unwrap();
        let ptr = operands[0].as_u32().unwrap();
        assert_eq!(operands[1], CoreValue::I32(3));
        assert_eq!(ptr % 2, 0);
        assert_eq!(
            memory.read_bytes(ptr, 6).unwrap(),
            vec![0x11, 0x11, 0x22, 0x22, 0x33, 0x33]
        );
        assert_eq!(telemetry.bytes_allocated, 6);
    }

    #[test]
    fn test_lower_record_layout() {
        let mut memory = LinearMemory::new(256);
        let ty = ValType::Record(vec![
            ("a".to_string(), ValType::U32),
            ("b".to_string(), ValType::U16),
            ("c".to_string(), ValType::U32),
        ]);
        let value = ComponentValue::Record(vec![
            ComponentValue::U32(1),
            ComponentValue::U16(2),
            ComponentValue::U32(3),
        ]);
        let (operands, _) = engine()
            .lower(&value, &ty, &[CoreType::I32], &mem_opts(), &mut memory)
            .unwrap();
        let ptr = operands[0].as_u32().unwrap();
        assert_eq!(memory.read_u32_le(ptr).unwrap(), 1);
        assert_eq!(memory.read_u16_le(ptr + 4).unwrap(), 2);
        assert_eq!(memory.read_u32_le(ptr + 8).unwrap(), 3);
    }

    #[test]
    fn test_lower_variant_writes_aligned_payload() {
        let mut memory = LinearMemory::new(256);
        let ty = ValType::Variant(vec![
            ("none".to_string(), None),
            ("some".to_string(), Some(ValType::U64)),
        ]);
        let value = ComponentValue::Variant(1, Some(Box::new(ComponentValue::U64(42))));
        let (operands, _) = engine()
            .lower(&value, &ty, &[CoreType::I32], &mem_opts(), &mut memory)
            .unwrap();
        let ptr = operands[0].as_u32().unwrap();
        assert_eq!(memory.read_u32_le(ptr).unwrap(), 1);
        assert_eq!(memory.read_u64_le(ptr + 8).unwrap(), 42);
    }

    #[test]
    fn test_lower_variant_payload_presence_checked() {
        let mut memory = LinearMemory::new(256);
        let ty = ValType::Variant(vec![("none".to_string(), None)]);
        let value = ComponentValue::Variant(0, Some(Box::new(ComponentValue::U8(1))));
        let err = engine()
            .lower(&value, &ty, &[CoreType::I32], &mem_opts(), &mut memory)
            .unwrap_err();
        assert_eq!(err.code, codes::TYPE_MISMATCH);
    }

    #[test]
    fn test_lower_enum_is_a_bare_operand() {
        let mut memory = LinearMemory::new(0);
        let ty = ValType::Enum(vec!["a".to_string(), "b".to_string()]);
        let (operands, telemetry) = engine()
            .lower(
                &ComponentValue::Enum(1),
                &ty,
                &[CoreType::I32],
                &ResolvedOptions::new(),
                &mut memory,
            )
            .unwrap();
        assert_eq!(operands, vec![CoreValue::I32(1)]);
        assert_eq!(telemetry.allocations, 0);

        let err = engine()
            .lower(
                &ComponentValue::Enum(2),
                &ty,
                &[CoreType::I32],
                &ResolvedOptions::new(),
                &mut memory,
            )
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINANT);
    }

    #[test]
    fn test_lower_flags_words() {
        let mut memory = LinearMemory::new(256);
        let labels: Vec<String> = (0..33).map(|i| format!("f{i}")).collect();
        let ty = ValType::Flags(labels);
        let flags = FlagsValue::from_indices(33, &[0, 1, 32]).unwrap();
        let (operands, _) = engine()
            .lower(
                &ComponentValue::Flags(flags),
                &ty,
                &[CoreType::I32],
                &mem_opts(),
                &mut memory,
            )
            .unwrap();
        let ptr = operands[0].as_u32().unwrap();
        assert_eq!(memory.read_u32_le(ptr).unwrap(), 0b11);
        assert_eq!(memory.read_u32_le(ptr + 4).unwrap(), 0b1);
    }

    #[test]
    fn test_lower_alloc_failure() {
        // memory too small for the allocation
        let mut memory = LinearMemory::new(8);
        let err = engine()
            .lower(
                &ComponentValue::String("a long enough string".to_string()),
                &ValType::String,
                &[CoreType::I32, CoreType::I32],
                &mem_opts(),
                &mut memory,
            )
            .unwrap_err();
        assert_eq!(err.code, codes::ALLOC_FAILED);
    }

    #[test]
    fn test_lower_without_allocator_fails() {
        let mut memory = LinearMemory::new(256);
        let mut abi = CanonicalAbi::new();
        let err = abi
            .lower(
                &ComponentValue::String("hi".to_string()),
                &ValType::String,
                &[CoreType::I32, CoreType::I32],
                &mem_opts(),
                &mut memory,
            )
            .unwrap_err();
        assert_eq!(err.code, codes::ALLOC_FAILED);
    }

    #[test]
    fn test_lower_realloc_bound_but_unregistered() {
        let mut memory = LinearMemory::new(256);
        let mut abi = engine();
        let options = mem_opts().with_realloc(3);
        let err = abi
            .lower(
                &ComponentValue::String("hi".to_string()),
                &ValType::String,
                &[CoreType::I32, CoreType::I32],
                &options,
                &mut memory,
            )
            .unwrap_err();
        assert_eq!(err.code, codes::BAD_OPTIONS);
    }

    #[test]
    fn test_lower_nested_failure_counts_leak() {
        // The outer list allocates, then the inner string allocation fails;
        // the bump allocator accepts frees as no-ops, so no leak is counted,
        // but the primary error must surface.
        let mut memory = LinearMemory::new(24);
        let ty = ValType::List(Box::new(ValType::String));
        let value = ComponentValue::List(vec![ComponentValue::String(
            "does not fit in what remains".to_string(),
        )]);
        let err = engine()
            .lower(&value, &ty, &[CoreType::I32, CoreType::I32], &mem_opts(), &mut memory)
            .unwrap_err();
        assert_eq!(err.code, codes::ALLOC_FAILED);
    }

    #[test]
    fn test_lower_guest_trap_propagates() {
        struct Trapping;
        impl crate::memory::GuestRealloc for Trapping {
            fn realloc(
                &mut self,
                _memory: &mut dyn GuestMemory,
                _old_ptr: u32,
                _old_size: u32,
                _align: u32,
                _new_size: u32,
            ) -> Result<u32> {
                Err(Error::guest_trap("unreachable executed"))
            }
        }

        let mut memory = LinearMemory::new(256);
        let mut abi = CanonicalAbi::new().with_host_allocator(Box::new(Trapping));
        let err = abi
            .lower(
                &ComponentValue::String("hi".to_string()),
                &ValType::String,
                &[CoreType::I32, CoreType::I32],
                &mem_opts(),
                &mut memory,
            )
            .unwrap_err();
        assert_eq!(err.code, codes::GUEST_TRAP);
        assert!(err.message.contains("unreachable executed"));
    }

    #[test]
    fn test_lower_flat_signature_checked() {
        let mut memory = LinearMemory::new(0);
        let err = engine()
            .lower(
                &ComponentValue::U8(1),
                &ValType::U8,
                &[CoreType::I64],
                &ResolvedOptions::new(),
                &mut memory,
            )
            .unwrap_err();
        assert_eq!(err.code, codes::TYPE_MISMATCH);
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut memory = LinearMemory::new(256);
        let mut abi = engine();
        abi.lower(
            &ComponentValue::String("abcd".to_string()),
            &ValType::String,
            &[CoreType::I32, CoreType::I32],
            &mem_opts(),
            &mut memory,
        )
        .unwrap();
        assert_eq!(abi.metrics().lowers, 1);
        assert_eq!(abi.metrics().bytes_lowered, 4);
    }
}
