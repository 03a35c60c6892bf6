// CABI - cabi-engine
// Module: Canonical ABI engine
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![deny(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

//! Canonical ABI engine for the WebAssembly Component Model.
//!
//! This crate translates values between a guest's core representation
//! (integers, floats, linear-memory offsets) and host-side component
//! values:
//!
//! - **Lift**: core operands plus a target [`ValType`](cabi_types::ValType)
//!   produce a host [`ComponentValue`](cabi_types::ComponentValue) tree.
//! - **Lower**: a host value tree is written as a flat layout into guest
//!   linear memory, yielding the core operands for the call boundary.
//!
//! Per-call behavior (which memory, which reallocator, which string
//! encoding) is configured through resolved canonical options; resource
//! handles live in a separate table with explicit lifecycle operations.
//!
//! ```
//! use cabi_engine::{
//!     BumpAllocator, CanonicalAbi, LinearMemory, ResolvedOptions,
//! };
//! use cabi_types::{ComponentValue, CoreType, ValType};
//!
//! let mut abi = CanonicalAbi::new().with_host_allocator(Box::new(BumpAllocator::new(16)));
//! let mut memory = LinearMemory::new(4096);
//! let options = ResolvedOptions::for_memory(0);
//!
//! let (operands, _telemetry) = abi
//!     .lower(
//!         &ComponentValue::String("hello".to_string()),
//!         &ValType::String,
//!         &[CoreType::I32, CoreType::I32],
//!         &options,
//!         &mut memory,
//!     )
//!     .unwrap();
//! let value = abi
//!     .lift(&operands, &[CoreType::I32, CoreType::I32], &ValType::String, &options, &memory)
//!     .unwrap();
//! assert_eq!(value, ComponentValue::String("hello".to_string()));
//! ```

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod canonical_abi;
pub mod memory;
pub mod prelude;
pub mod resources;
pub mod string_encoding;

pub use canonical_abi::{
    resolve_options, CanonicalAbi, CanonicalMetrics, CanonicalOpt, ResolvedOptions, Telemetry,
};
pub use memory::{BumpAllocator, GuestMemory, GuestRealloc, LinearMemory};
pub use resources::{DestructorContext, InstanceId, ResourceTable};
#[cfg(feature = "std")]
pub use resources::SharedResourceTable;
pub use string_encoding::StringEncoding;
