// CABI - cabi-error
// Module: Canonical ABI error codes
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Error codes for the canonical ABI engine.

/// Core operand width or kind inconsistent with the value type
pub const TYPE_MISMATCH: u16 = 1000;
/// Invalid or unimplemented value type
pub const BAD_TYPE: u16 = 1001;
/// Conflicting or missing canonical options
pub const BAD_OPTIONS: u16 = 1002;
/// Guest memory access would exceed the current linear memory size
pub const OUT_OF_BOUNDS: u16 = 1003;
/// Guest allocator returned null, or no allocator is configured
pub const ALLOC_FAILED: u16 = 1004;
/// Re-entrant guest call raised a trap
pub const GUEST_TRAP: u16 = 1005;
/// Variant, option, result or enum discriminant outside the valid range
pub const INVALID_DISCRIMINANT: u16 = 1006;
/// Byte sequence is not valid UTF-8
pub const INVALID_UTF8: u16 = 1007;
/// Code unit sequence is not valid UTF-16
pub const INVALID_UTF16: u16 = 1008;
/// Resource table has no free slot
pub const TABLE_FULL: u16 = 1009;
/// Handle is zero, out of range, or inactive
pub const INVALID_HANDLE: u16 = 1010;
/// Partial guest allocation could not be freed (diagnostic)
pub const GUEST_LEAK: u16 = 1011;
/// Requested behavior is not supported by this engine
pub const UNSUPPORTED: u16 = 1012;
