// CABI - cabi-engine
// Module: Prelude
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Prelude module for cabi-engine
//!
//! Provides a unified set of imports for both std and no_std environments
//! so individual modules do not need per-environment gates.

#[cfg(not(feature = "std"))]
pub use alloc::{
    boxed::Box,
    collections::BTreeMap as HashMap,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
#[cfg(feature = "std")]
pub use std::{
    boxed::Box,
    collections::HashMap,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};

pub use cabi_error::{codes, Error, ErrorCategory, Result};
pub use cabi_types::{
    abi, align_up, ComponentValue, CoreType, CoreValue, FlagsValue, MemoryLayout, ValType,
    DISCRIMINANT_SIZE, MAX_TYPE_DEPTH,
};
