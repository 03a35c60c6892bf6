// CABI - cabi-types
// Module: Component value types and ABI layout
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

//! Value type model for the canonical ABI engine.
//!
//! This crate defines the closed sum of component-level value types
//! ([`ValType`]), the host-side value tree ([`ComponentValue`]), the core
//! operand model ([`CoreType`]/[`CoreValue`]) and the size/alignment
//! calculator ([`layout::abi`]) that fixes the flat memory layout every
//! lift and lower operation must agree on.
//!
//! Types are acyclic, so recursion over a type tree always terminates; a
//! soft depth guard ([`layout::MAX_TYPE_DEPTH`]) turns pathological nesting
//! into an error instead of a stack overflow.

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod component_value;
pub mod core_value;
pub mod layout;
pub mod prelude;
pub mod val_type;

pub use component_value::{ComponentValue, FlagsValue};
pub use core_value::{CoreType, CoreValue};
pub use layout::{abi, align_up, MemoryLayout, DISCRIMINANT_SIZE, MAX_TYPE_DEPTH};
pub use val_type::ValType;
