// CABI - cabi-error
// Module: Canonical ABI error handling
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

//! Error handling for the canonical ABI engine.
//!
//! Every fallible operation in the engine returns [`Error`], a categorized
//! error carrying a stable `u16` code from the [`codes`] module and a
//! human-readable message. Factory constructors exist for each error kind
//! so call sites stay short:
//!
//! ```
//! use cabi_error::{codes, Error};
//!
//! let err = Error::out_of_bounds("read of 8 bytes at offset 65532");
//! assert_eq!(err.code, codes::OUT_OF_BOUNDS);
//! assert!(err.is_memory_error());
//! ```

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod codes;
pub mod errors;

pub use errors::{Error, ErrorCategory};

/// A specialized `Result` type for canonical ABI operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let handle_err = Error::invalid_handle("handle 0 is reserved");
        assert!(handle_err.is_resource_error());
        assert!(!handle_err.is_memory_error());

        let bounds_err = Error::out_of_bounds("read past end of linear memory");
        assert!(bounds_err.is_memory_error());
        assert!(!bounds_err.is_resource_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::type_mismatch("x").code, codes::TYPE_MISMATCH);
        assert_eq!(Error::bad_type("x").code, codes::BAD_TYPE);
        assert_eq!(Error::bad_options("x").code, codes::BAD_OPTIONS);
        assert_eq!(Error::alloc_failed("x").code, codes::ALLOC_FAILED);
        assert_eq!(Error::guest_trap("x").code, codes::GUEST_TRAP);
        assert_eq!(Error::invalid_discriminant("x").code, codes::INVALID_DISCRIMINANT);
        assert_eq!(Error::invalid_utf8("x").code, codes::INVALID_UTF8);
        assert_eq!(Error::invalid_utf16("x").code, codes::INVALID_UTF16);
        assert_eq!(Error::table_full("x").code, codes::TABLE_FULL);
        assert_eq!(Error::guest_leak("x").code, codes::GUEST_LEAK);
        assert_eq!(Error::unsupported("x").code, codes::UNSUPPORTED);
    }

    #[test]
    fn test_display() {
        let err = Error::guest_trap("unreachable executed");
        let rendered = alloc::format!("{err}");
        assert!(rendered.contains("unreachable executed"));
    }
}
