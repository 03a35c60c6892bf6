// CABI - cabi-types
// Module: Component value types
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The closed sum of component-level value types.

use crate::core_value::CoreType;
use crate::prelude::*;

/// Component model value types
///
/// The type tree is acyclic by construction (recursive type definitions
/// require explicit indirection at a higher layer, which this engine does
/// not model), so recursion over a `ValType` terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValType {
    /// Boolean type
    Bool,
    /// Signed 8-bit integer
    S8,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    S16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    S32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    S64,
    /// Unsigned 64-bit integer
    U64,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// Unicode scalar value, carried as u32
    Char,
    /// String
    String,
    /// Variable-length homogeneous sequence
    List(Box<ValType>),
    /// Record with named fields; labels are unique within the record
    Record(Vec<(String, ValType)>),
    /// Positional fields
    Tuple(Vec<ValType>),
    /// Discriminated union; the case index is the discriminant
    Variant(Vec<(String, Option<ValType>)>),
    /// Discriminant-only variant
    Enum(Vec<String>),
    /// Bitset over positional labels
    Flags(Vec<String>),
    /// Two-case variant over none/some
    Option(Box<ValType>),
    /// Two-case variant over ok/err
    Result(Option<Box<ValType>>, Option<Box<ValType>>),
    /// Owned resource handle into the resource table
    Own(u32),
    /// Borrowed resource handle
    Borrow(u32),
    /// Stream type (declared but not implemented by this engine)
    Stream(Option<Box<ValType>>),
    /// Future type (declared but not implemented by this engine)
    Future(Option<Box<ValType>>),
    /// Error context type (declared but not implemented by this engine)
    ErrorContext,
}

impl ValType {
    /// The core operand signature of this type at the call boundary.
    ///
    /// Primitives flatten to a single operand of the corresponding core
    /// type; strings and lists to an (offset, length) pair; every other
    /// composite to a single i32 (a struct offset, or the discriminant for
    /// enums, or the handle for resources).
    pub fn flat_types(&self) -> Result<Vec<CoreType>> {
        let types = match self {
            Self::Bool
            | Self::S8
            | Self::U8
            | Self::S16
            | Self::U16
            | Self::S32
            | Self::U32
            | Self::Char => vec![CoreType::I32],
            Self::S64 | Self::U64 => vec![CoreType::I64],
            Self::F32 => vec![CoreType::F32],
            Self::F64 => vec![CoreType::F64],
            Self::String | Self::List(_) => vec![CoreType::I32, CoreType::I32],
            Self::Record(_)
            | Self::Tuple(_)
            | Self::Variant(_)
            | Self::Option(_)
            | Self::Result(..)
            | Self::Flags(_) => vec![CoreType::I32],
            Self::Enum(_) => vec![CoreType::I32],
            Self::Own(_) | Self::Borrow(_) => vec![CoreType::I32],
            Self::Stream(_) | Self::Future(_) | Self::ErrorContext => {
                return Err(Error::bad_type(format!(
                    "{} has no canonical flattening in this engine",
                    self.kind_name()
                )));
            },
        };
        Ok(types)
    }

    /// The payload types of the cases of a variant-shaped type, in case
    /// order. Returns `None` for non-variant shapes.
    ///
    /// Options are the two-case variant `{none, some(inner)}` and results
    /// the two-case variant `{ok, err}`, so both expose exactly two cases.
    pub fn case_payloads(&self) -> Option<Vec<Option<&ValType>>> {
        match self {
            Self::Variant(cases) => Some(cases.iter().map(|(_, p)| p.as_ref()).collect()),
            Self::Option(inner) => Some(vec![None, Some(inner.as_ref())]),
            Self::Result(ok, err) => {
                Some(vec![ok.as_deref(), err.as_deref()])
            },
            _ => None,
        }
    }

    /// Short name of the type shape, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::S8 => "s8",
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::U16 => "u16",
            Self::S32 => "s32",
            Self::U32 => "u32",
            Self::S64 => "s64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::String => "string",
            Self::List(_) => "list",
            Self::Record(_) => "record",
            Self::Tuple(_) => "tuple",
            Self::Variant(_) => "variant",
            Self::Enum(_) => "enum",
            Self::Flags(_) => "flags",
            Self::Option(_) => "option",
            Self::Result(..) => "result",
            Self::Own(_) => "own",
            Self::Borrow(_) => "borrow",
            Self::Stream(_) => "stream",
            Self::Future(_) => "future",
            Self::ErrorContext => "error-context",
        }
    }
}
