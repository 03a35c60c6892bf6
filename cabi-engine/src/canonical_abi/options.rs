// CABI - cabi-engine
// Module: Canonical options resolver
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Per-call canonical option resolution.
//!
//! A canonical function declares a list of options; the engine compresses
//! them into a [`ResolvedOptions`] value that is passed by reference
//! through the lift/lower recursion. Duplicate option kinds are rejected.

use crate::prelude::*;
use crate::string_encoding::StringEncoding;

/// A single declared canonical option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalOpt {
    /// Memory index to use for offset-bearing types
    Memory(u32),
    /// Function index of the guest's realloc export
    Realloc(u32),
    /// Function index of the guest's post-return export
    PostReturn(u32),
    /// Wire string encoding
    StringEncoding(StringEncoding),
}

/// Resolved per-call configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOptions {
    /// Memory index, if any offset-bearing type is involved
    pub memory: Option<u32>,
    /// Realloc function index; presence routes allocation to the guest
    pub realloc: Option<u32>,
    /// Post-return function index, invoked by the embedder after lift
    pub post_return: Option<u32>,
    /// Wire string encoding, UTF-8 unless declared otherwise
    pub string_encoding: StringEncoding,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolvedOptions {
    /// Options with nothing bound and UTF-8 strings
    pub fn new() -> Self {
        Self {
            memory: None,
            realloc: None,
            post_return: None,
            string_encoding: StringEncoding::Utf8,
        }
    }

    /// Options bound to the given memory index
    pub fn for_memory(index: u32) -> Self {
        Self {
            memory: Some(index),
            ..Self::new()
        }
    }

    /// Bind a realloc function index
    pub fn with_realloc(mut self, index: u32) -> Self {
        self.realloc = Some(index);
        self
    }

    /// Bind a post-return function index
    pub fn with_post_return(mut self, index: u32) -> Self {
        self.post_return = Some(index);
        self
    }

    /// Select the wire string encoding
    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }

    /// The memory index required by offset-bearing types.
    ///
    /// Fails when no memory option is bound, and for any index other than
    /// 0 (the only memory this engine models).
    pub fn require_memory(&self) -> Result<u32> {
        let index = self
            .memory
            .ok_or_else(|| Error::bad_options("operation requires a memory option"))?;
        if index != 0 {
            return Err(Error::unsupported(format!(
                "memory index {index} is not supported, only memory 0"
            )));
        }
        Ok(index)
    }
}

/// Compress a declared option list into a [`ResolvedOptions`].
///
/// Each option kind may appear at most once; the string encoding defaults
/// to UTF-8.
pub fn resolve_options(declared: &[CanonicalOpt]) -> Result<ResolvedOptions> {
    let mut resolved = ResolvedOptions::new();
    let mut encoding_seen = false;

    for opt in declared {
        match *opt {
            CanonicalOpt::Memory(index) => {
                if resolved.memory.replace(index).is_some() {
                    return Err(Error::bad_options("duplicate memory option"));
                }
            },
            CanonicalOpt::Realloc(index) => {
                if resolved.realloc.replace(index).is_some() {
                    return Err(Error::bad_options("duplicate realloc option"));
                }
            },
            CanonicalOpt::PostReturn(index) => {
                if resolved.post_return.replace(index).is_some() {
                    return Err(Error::bad_options("duplicate post-return option"));
                }
            },
            CanonicalOpt::StringEncoding(encoding) => {
                if encoding_seen {
                    return Err(Error::bad_options("duplicate string-encoding option"));
                }
                encoding_seen = true;
                resolved.string_encoding = encoding;
            },
        }
    }

    Ok(resolved)
}
