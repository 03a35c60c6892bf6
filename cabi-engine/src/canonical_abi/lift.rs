// CABI - cabi-engine
// Module: Lift (guest to host)
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Lifting: core operands and guest memory to host values.
//!
//! The entry point consumes the flat operands of a call boundary; the
//! recursive loader walks composite types inside guest memory. Cursor
//! arithmetic is done in 64 bits and every region is validated before a
//! byte is read. Sibling fields are read in declaration order, list
//! elements in ascending index order.

use cabi_types::layout;

use crate::canonical_abi::{check_flat_signature, check_operands, CanonicalAbi, ResolvedOptions};
use crate::memory::GuestMemory;
use crate::prelude::*;
use crate::string_encoding::{self, StringEncoding};

impl CanonicalAbi {
    /// Lift core operands into a host value of the given type.
    ///
    /// `op_types` is the caller's flat signature and must match the one the
    /// type demands. Offset-bearing types additionally require a memory
    /// option to be bound.
    pub fn lift<M: GuestMemory>(
        &mut self,
        operands: &[CoreValue],
        op_types: &[CoreType],
        ty: &ValType,
        options: &ResolvedOptions,
        memory: &M,
    ) -> Result<ComponentValue> {
        let expected = ty.flat_types()?;
        check_flat_signature(&expected, op_types)?;
        check_operands(operands, op_types)?;
        self.bump_lifts();

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
            | ValType::Char => lift_primitive_operand(&operands[0], ty),

            ValType::String => {
                let offset = want_u32(&operands[0])?;
                let units = want_u32(&operands[1])?;
                self.load_string(memory, options, offset, units)
                    .map(ComponentValue::String)
            },
            ValType::List(elem) => {
                let offset = want_u32(&operands[0])?;
                let len = want_u32(&operands[1])?;
                self.load_list(memory, options, elem, offset, len, 0)
            },

            ValType::Enum(labels) => {
                let discriminant = want_u32(&operands[0])?;
                if discriminant as usize >= labels.len() {
                    return Err(Error::invalid_discriminant(format!(
                        "enum discriminant {discriminant} out of range for {} cases",
                        labels.len()
                    )));
                }
                Ok(ComponentValue::Enum(discriminant))
            },

            // Handles pass through opaquely; liveness is the embedder's call
            ValType::Own(_) => Ok(ComponentValue::Own(want_u32(&operands[0])?)),
            ValType::Borrow(_) => Ok(ComponentValue::Borrow(want_u32(&operands[0])?)),

            ValType::Record(_)
            | ValType::Tuple(_)
            | ValType::Variant(_)
            | ValType::Option(_)
            | ValType::Result(..)
            | ValType::Flags(_) => {
                options.require_memory()?;
                let offset = want_u32(&operands[0])?;
                self.load(memory, options, ty, offset, 0)
            },

            ValType::Stream(_) | ValType::Future(_) | ValType::ErrorContext => Err(
                Error::bad_type(format!("cannot lift {}", ty.kind_name())),
            ),
        }
    }

    /// Load a value of the given type from guest memory at `offset`.
    pub(crate) fn load<M: GuestMemory>(
        &self,
        memory: &M,
        options: &ResolvedOptions,
        ty: &ValType,
        offset: u32,
        depth: usize,
    ) -> Result<ComponentValue> {
        if depth > MAX_TYPE_DEPTH {
            return Err(Error::bad_type("value tree exceeds maximum nesting depth"));
        }

        match ty {
            ValType::Bool => Ok(ComponentValue::Bool(memory.read_u8(offset)? != 0)),
            ValType::S8 => Ok(ComponentValue::S8(memory.read_u8(offset)? as i8)),
            ValType::U8 => Ok(ComponentValue::U8(memory.read_u8(offset)?)),
            ValType::S16 => Ok(ComponentValue::S16(memory.read_u16_le(offset)? as i16)),
            ValType::U16 => Ok(ComponentValue::U16(memory.read_u16_le(offset)?)),
            ValType::S32 => Ok(ComponentValue::S32(memory.read_u32_le(offset)? as i32)),
            ValType::U32 => Ok(ComponentValue::U32(memory.read_u32_le(offset)?)),
            ValType::S64 => Ok(ComponentValue::S64(memory.read_u64_le(offset)? as i64)),
            ValType::U64 => Ok(ComponentValue::U64(memory.read_u64_le(offset)?)),
            ValType::F32 => Ok(ComponentValue::F32(f32::from_bits(memory.read_u32_le(offset)?))),
            ValType::F64 => Ok(ComponentValue::F64(f64::from_bits(memory.read_u64_le(offset)?))),
            ValType::Char => {
                let code = memory.read_u32_le(offset)?;
                char::from_u32(code)
                    .map(ComponentValue::Char)
                    .ok_or_else(|| {
                        Error::type_mismatch(format!("0x{code:X} is not a unicode scalar value"))
                    })
            },

            ValType::String => {
                memory.validate(u64::from(offset), 8)?;
                let ptr = memory.read_u32_le(offset)?;
                let units = memory.read_u32_le(offset + 4)?;
                self.load_string(memory, options, ptr, units)
                    .map(ComponentValue::String)
            },
            ValType::List(elem) => {
                memory.validate(u64::from(offset), 8)?;
                let ptr = memory.read_u32_le(offset)?;
                let len = memory.read_u32_le(offset + 4)?;
                self.load_list(memory, options, elem, ptr, len, depth + 1)
            },

            ValType::Record(fields) => self
                .load_sequence(memory, options, fields.iter().map(|(_, ty)| ty), offset, depth)
                .map(ComponentValue::Record),
            ValType::Tuple(elems) => self
                .load_sequence(memory, options, elems.iter(), offset, depth)
                .map(ComponentValue::Tuple),

            ValType::Variant(_) | ValType::Option(_) | ValType::Result(..) => {
                self.load_variant(memory, options, ty, offset, depth)
            },

            ValType::Enum(labels) => {
                let discriminant = memory.read_u32_le(offset)?;
                if discriminant as usize >= labels.len() {
                    return Err(Error::invalid_discriminant(format!(
                        "enum discriminant {discriminant} out of range for {} cases",
                        labels.len()
                    )));
                }
                Ok(ComponentValue::Enum(discriminant))
            },

            ValType::Flags(labels) => {
                let word_count = FlagsValue::word_count_for(labels.len());
                memory.validate(u64::from(offset), word_count as u64 * 4)?;
                let mut words = Vec::with_capacity(word_count);
                for i in 0..word_count {
                    words.push(memory.read_u32_le(offset + (i as u32) * 4)?);
                }
                FlagsValue::new(labels.len(), words).map(ComponentValue::Flags)
            },

            ValType::Own(_) => Ok(ComponentValue::Own(memory.read_u32_le(offset)?)),
            ValType::Borrow(_) => Ok(ComponentValue::Borrow(memory.read_u32_le(offset)?)),

            ValType::Stream(_) | ValType::Future(_) | ValType::ErrorContext => Err(
                Error::bad_type(format!("cannot lift {}", ty.kind_name())),
            ),
        }
    }

    /// Load sequential fields, each at its own alignment
    fn load_sequence<'a, M: GuestMemory>(
        &self,
        memory: &M,
        options: &ResolvedOptions,
        fields: impl Iterator<Item = &'a ValType>,
        offset: u32,
        depth: usize,
    ) -> Result<Vec<ComponentValue>> {
        let mut values = Vec::new();
        let mut cursor = u64::from(offset);

        for field_ty in fields {
            let field_layout = abi(field_ty)?;
            cursor = align_up(cursor, field_layout.alignment);
            memory.validate(cursor, u64::from(field_layout.size))?;
            let at = cursor_to_offset(cursor)?;
            values.push(self.load(memory, options, field_ty, at, depth + 1)?);
            cursor += u64::from(field_layout.size);
        }

        Ok(values)
    }

    fn load_variant<M: GuestMemory>(
        &self,
        memory: &M,
        options: &ResolvedOptions,
        ty: &ValType,
        offset: u32,
        depth: usize,
    ) -> Result<ComponentValue> {
        let payloads = ty
            .case_payloads()
            .ok_or_else(|| Error::bad_type("variant shape without cases"))?;

        memory.validate(u64::from(offset), u64::from(DISCRIMINANT_SIZE))?;
        let discriminant = memory.read_u32_le(offset)?;
        if discriminant as usize >= payloads.len() {
            return Err(Error::invalid_discriminant(format!(
                "discriminant {discriminant} out of range for {} cases",
                payloads.len()
            )));
        }

        let payload = match payloads[discriminant as usize] {
            Some(payload_ty) => {
                let payload_layout = abi(payload_ty)?;
                let at = u64::from(offset) + u64::from(layout::payload_offset(&payloads)?);
                memory.validate(at, u64::from(payload_layout.size))?;
                let at = cursor_to_offset(at)?;
                Some(Box::new(self.load(memory, options, payload_ty, at, depth + 1)?))
            },
            None => None,
        };

        Ok(match ty {
            ValType::Variant(_) => ComponentValue::Variant(discriminant, payload),
            ValType::Option(_) => ComponentValue::Option(payload),
            _ => {
                if discriminant == 0 {
                    ComponentValue::Result(Ok(payload))
                } else {
                    ComponentValue::Result(Err(payload))
                }
            },
        })
    }

    /// Read and decode a string of `units` code units at `offset`.
    pub(crate) fn load_string<M: GuestMemory>(
        &self,
        memory: &M,
        options: &ResolvedOptions,
        offset: u32,
        units: u32,
    ) -> Result<String> {
        options.require_memory()?;

        let encoding = options.string_encoding;
        if encoding == StringEncoding::Latin1Utf16 {
            // The top length bit would discriminate latin1 from UTF-16;
            // refuse rather than misinterpret.
            return Err(Error::unsupported(
                "latin1+utf16 string encoding is not supported",
            ));
        }

        let byte_len = u64::from(units) * u64::from(string_encoding::code_unit_size(encoding));
        memory.validate(u64::from(offset), byte_len)?;
        let byte_len = u32::try_from(byte_len)
            .map_err(|_| Error::out_of_bounds("string length exceeds the 32-bit address space"))?;
        let bytes = memory.read_bytes(offset, byte_len)?;
        string_encoding::decode_string(&bytes, encoding)
    }

    /// Read `len` elements laid out with per-element alignment at `offset`.
    pub(crate) fn load_list<M: GuestMemory>(
        &self,
        memory: &M,
        options: &ResolvedOptions,
        elem: &ValType,
        offset: u32,
        len: u32,
        depth: usize,
    ) -> Result<ComponentValue> {
        options.require_memory()?;
        if depth > MAX_TYPE_DEPTH {
            return Err(Error::bad_type("value tree exceeds maximum nesting depth"));
        }

        let elem_layout = abi(elem)?;
        let mut values = Vec::new();
        let mut cursor = u64::from(offset);

        for _ in 0..len {
            cursor = align_up(cursor, elem_layout.alignment);
            memory.validate(cursor, u64::from(elem_layout.size))?;
            let at = cursor_to_offset(cursor)?;
            values.push(self.load(memory, options, elem, at, depth + 1)?);
            cursor += u64::from(elem_layout.size);
        }

        Ok(ComponentValue::List(values))
    }
}

fn lift_primitive_operand(operand: &CoreValue, ty: &ValType) -> Result<ComponentValue> {
    let value = match ty {
        ValType::Bool => ComponentValue::Bool(want_i32(operand)? != 0),
        // Narrow integers take the low bits of the i32 operand
        ValType::S8 => ComponentValue::S8(want_i32(operand)? as i8),
        ValType::U8 => ComponentValue::U8(want_i32(operand)? as u8),
        ValType::S16 => ComponentValue::S16(want_i32(operand)? as i16),
        ValType::U16 => ComponentValue::U16(want_i32(operand)? as u16),
        ValType::S32 => ComponentValue::S32(want_i32(operand)?),
        ValType::U32 => ComponentValue::U32(want_i32(operand)? as u32),
        ValType::S64 => ComponentValue::S64(want_i64(operand)?),
        ValType::U64 => ComponentValue::U64(want_i64(operand)? as u64),
        ValType::F32 => ComponentValue::F32(want_f32(operand)?),
        ValType::F64 => ComponentValue::F64(want_f64(operand)?),
        ValType::Char => {
            let code = want_i32(operand)? as u32;
            let ch = char::from_u32(code).ok_or_else(|| {
                Error::type_mismatch(format!("0x{code:X} is not a unicode scalar value"))
            })?;
            ComponentValue::Char(ch)
        },
        _ => return Err(Error::bad_type(format!("{} is not a primitive", ty.kind_name()))),
    };
    Ok(value)
}

fn want_i32(operand: &CoreValue) -> Result<i32> {
    operand
        .as_i32()
        .ok_or_else(|| Error::type_mismatch("expected an i32 operand"))
}

fn want_i64(operand: &CoreValue) -> Result<i64> {
    operand
        .as_i64()
        .ok_or_else(|| Error::type_mismatch("expected an i64 operand"))
}

fn want_f32(operand: &CoreValue) -> Result<f32> {
    operand
        .as_f32()
        .ok_or_else(|| Error::type_mismatch("expected an f32 operand"))
}

fn want_f64(operand: &CoreValue) -> Result<f64> {
    operand
        .as_f64()
        .ok_or_else(|| Error::type_mismatch("expected an f64 operand"))
}

fn want_u32(operand: &CoreValue) -> Result<u32> {
    want_i32(operand).map(|v| v as u32)
}

fn cursor_to_offset(cursor: u64) -> Result<u32> {
    u32::try_from(cursor)
        .map_err(|_| Error::out_of_bounds("cursor exceeds the 32-bit address space"))
}
