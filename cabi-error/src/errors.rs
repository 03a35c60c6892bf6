// CABI - cabi-error
// Module: Canonical ABI error type
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The main [`Error`] type and its category taxonomy.

use alloc::string::String;
use core::fmt;

use crate::codes;

/// Error categories for canonical ABI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Type model errors (mismatched operands, unimplemented types)
    Type = 1,
    /// Guest linear memory errors
    Memory = 2,
    /// String encoding and transcoding errors
    Encoding = 3,
    /// Validation errors (discriminants, flag padding)
    Validation = 4,
    /// Resource table errors
    Resource = 5,
    /// Canonical option errors
    Options = 6,
    /// Errors raised by re-entry into the guest
    Guest = 7,
}

/// Canonical ABI error type
///
/// Carries a category, a stable `u16` code from [`codes`], and a message
/// describing the concrete failure. Codes are the stable matching surface;
/// messages are for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// Error category
    pub category: ErrorCategory,
    /// Error code
    pub code: u16,
    /// Error message
    pub message: String,
}

impl Error {
    /// Create a new error
    pub fn new<S: Into<String>>(category: ErrorCategory, code: u16, message: S) -> Self {
        Self { category, code, message: message.into() }
    }

    /// Creates a `TypeMismatch` error
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Type, codes::TYPE_MISMATCH, message)
    }

    /// Creates a `BadType` error
    pub fn bad_type(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Type, codes::BAD_TYPE, message)
    }

    /// Creates a `BadOptions` error
    pub fn bad_options(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Options, codes::BAD_OPTIONS, message)
    }

    /// Creates an `OutOfBounds` error
    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Memory, codes::OUT_OF_BOUNDS, message)
    }

    /// Creates an `AllocFailed` error
    pub fn alloc_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Memory, codes::ALLOC_FAILED, message)
    }

    /// Creates a `GuestTrap` error carrying the guest's message
    pub fn guest_trap(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Guest, codes::GUEST_TRAP, message)
    }

    /// Creates an `InvalidDiscriminant` error
    pub fn invalid_discriminant(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, codes::INVALID_DISCRIMINANT, message)
    }

    /// Creates an `InvalidUtf8` error
    pub fn invalid_utf8(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Encoding, codes::INVALID_UTF8, message)
    }

    /// Creates an `InvalidUtf16` error
    pub fn invalid_utf16(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Encoding, codes::INVALID_UTF16, message)
    }

    /// Creates a `TableFull` error
    pub fn table_full(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Resource, codes::TABLE_FULL, message)
    }

    /// Creates an `InvalidHandle` error
    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Resource, codes::INVALID_HANDLE, message)
    }

    /// Creates a `GuestLeak` diagnostic
    pub fn guest_leak(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Guest, codes::GUEST_LEAK, message)
    }

    /// Creates an `Unsupported` error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Options, codes::UNSUPPORTED, message)
    }

    /// Check if this is a type error
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        self.category == ErrorCategory::Type
    }

    /// Check if this is a memory error
    #[must_use]
    pub fn is_memory_error(&self) -> bool {
        self.category == ErrorCategory::Memory
    }

    /// Check if this is an encoding error
    #[must_use]
    pub fn is_encoding_error(&self) -> bool {
        self.category == ErrorCategory::Encoding
    }

    /// Check if this is a validation error
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        self.category == ErrorCategory::Validation
    }

    /// Check if this is a resource error
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        self.category == ErrorCategory::Resource
    }

    /// Check if this is an options error
    #[must_use]
    pub fn is_options_error(&self) -> bool {
        self.category == ErrorCategory::Options
    }

    /// Check if this is a guest error
    #[must_use]
    pub fn is_guest_error(&self) -> bool {
        self.category == ErrorCategory::Guest
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{}] {}", self.category, self.code, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
