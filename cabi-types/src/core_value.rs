// CABI - cabi-types
// Module: Core operand model
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Core WebAssembly operand types and values.
//!
//! These are the primitive values that cross the core module call boundary.
//! Component-level values are flattened into sequences of these operands by
//! the lift/lower core.

use core::fmt;

/// Core operand type at the call boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreType {
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}

impl fmt::Display for CoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

/// Core operand value at the call boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoreValue {
    /// 32-bit integer operand
    I32(i32),
    /// 64-bit integer operand
    I64(i64),
    /// 32-bit float operand
    F32(f32),
    /// 64-bit float operand
    F64(f64),
}

impl CoreValue {
    /// The core type of this operand
    pub fn core_type(&self) -> CoreType {
        match self {
            Self::I32(_) => CoreType::I32,
            Self::I64(_) => CoreType::I64,
            Self::F32(_) => CoreType::F32,
            Self::F64(_) => CoreType::F64,
        }
    }

    /// The i32 payload, if this is an i32 operand
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// The i64 payload, if this is an i64 operand
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// The f32 payload, if this is an f32 operand
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// The f64 payload, if this is an f64 operand
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// The i32 payload reinterpreted as an unsigned offset or length
    pub fn as_u32(&self) -> Option<u32> {
        self.as_i32().map(|v| v as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_type_of_value() {
        assert_eq!(CoreValue::I32(-1).core_type(), CoreType::I32);
        assert_eq!(CoreValue::I64(0).core_type(), CoreType::I64);
        assert_eq!(CoreValue::F32(1.5).core_type(), CoreType::F32);
        assert_eq!(CoreValue::F64(2.5).core_type(), CoreType::F64);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(CoreValue::I32(-1).as_i32(), Some(-1));
        assert_eq!(CoreValue::I32(-1).as_u32(), Some(u32::MAX));
        assert_eq!(CoreValue::I32(-1).as_i64(), None);
        assert_eq!(CoreValue::F64(2.5).as_f64(), Some(2.5));
    }
}
