// CABI - cabi-types
// Module: Prelude
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Prelude module for cabi-types
//!
//! Provides a unified set of imports for both std and no_std environments
//! so individual modules do not need per-environment gates.

#[cfg(not(feature = "std"))]
pub use alloc::{
    boxed::Box,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
#[cfg(feature = "std")]
pub use std::{
    boxed::Box,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};

pub use cabi_error::{codes, Error, ErrorCategory, Result};
