// CABI - cabi-engine
// Module: Canonical ABI core
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The lift/lower core of the canonical ABI.
//!
//! [`CanonicalAbi`] owns the allocator hooks and operation counters; the
//! per-type translation algorithms live in the [`lift`] and [`lower`]
//! modules and are driven entirely by [`ValType`](cabi_types::ValType).

pub mod lift;
pub mod lower;
pub mod options;

pub use options::{resolve_options, CanonicalOpt, ResolvedOptions};

use core::fmt;

use crate::memory::{GuestMemory, GuestRealloc};
use crate::prelude::*;

/// Running counters over the lifetime of an engine instance
#[derive(Debug, Default, Clone)]
pub struct CanonicalMetrics {
    /// Number of lift operations performed
    pub lifts: u64,
    /// Number of lower operations performed
    pub lowers: u64,
    /// Total bytes allocated in guest memory by lower operations
    pub bytes_lowered: u64,
    /// Guest allocations abandoned after a partial lower failure
    pub leaked_allocations: u64,
}

/// Per-operation report returned by a successful lower
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Telemetry {
    /// Guest allocations performed
    pub allocations: u32,
    /// Total bytes allocated in guest memory
    pub bytes_allocated: u64,
    /// Allocations that could not be freed after a nested failure
    pub leaked_allocations: u32,
}

/// Canonical ABI engine.
///
/// Holds the guest's realloc export (used when canonical options bind a
/// reallocator) and an optional runtime-provided fallback allocator, plus
/// operation metrics. All translation state is per-call; the engine itself
/// is cheap and reusable.
pub struct CanonicalAbi {
    guest_realloc: Option<Box<dyn GuestRealloc>>,
    host_allocator: Option<Box<dyn GuestRealloc>>,
    metrics: CanonicalMetrics,
}

impl fmt::Debug for CanonicalAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalAbi")
            .field("guest_realloc", &self.guest_realloc.is_some())
            .field("host_allocator", &self.host_allocator.is_some())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl Default for CanonicalAbi {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalAbi {
    /// Create a new engine with no allocators registered
    pub fn new() -> Self {
        Self {
            guest_realloc: None,
            host_allocator: None,
            metrics: CanonicalMetrics::default(),
        }
    }

    /// Register the guest's realloc export.
    ///
    /// Used whenever resolved options carry a realloc binding.
    pub fn with_guest_realloc(mut self, realloc: Box<dyn GuestRealloc>) -> Self {
        self.guest_realloc = Some(realloc);
        self
    }

    /// Register the runtime-provided fallback allocator.
    ///
    /// Used when options carry no realloc binding.
    pub fn with_host_allocator(mut self, allocator: Box<dyn GuestRealloc>) -> Self {
        self.host_allocator = Some(allocator);
        self
    }

    /// Operation counters accumulated so far
    pub fn metrics(&self) -> &CanonicalMetrics {
        &self.metrics
    }

    pub(crate) fn bump_lifts(&mut self) {
        self.metrics.lifts += 1;
    }

    pub(crate) fn bump_lowers(&mut self, telemetry: &Telemetry) {
        self.metrics.lowers += 1;
        self.metrics.bytes_lowered += telemetry.bytes_allocated;
    }

    /// Allocate `size` bytes in guest memory with the given alignment.
    ///
    /// Dispatches to the guest realloc when the options bind one, otherwise
    /// to the fallback allocator. Zero-size requests succeed with offset 0
    /// without consulting any allocator. A null return from the allocator
    /// for a nonzero request is an allocation failure; an `Err` from the
    /// allocator is a guest trap and propagates unchanged.
    pub(crate) fn allocate<M: GuestMemory>(
        &mut self,
        options: &ResolvedOptions,
        memory: &mut M,
        align: u32,
        size: u32,
        telemetry: &mut Telemetry,
    ) -> Result<u32> {
        if size == 0 {
            return Ok(0);
        }
        let allocator = self.select_allocator(options)?;
        let ptr = allocator.realloc(memory, 0, 0, align, size)?;
        if ptr == 0 {
            return Err(Error::alloc_failed(format!(
                "guest allocator returned null for a {size}-byte request"
            )));
        }
        // The allocator may have grown or relocated memory; the region it
        // handed back must be addressable now.
        memory.validate(u64::from(ptr), u64::from(size))?;
        telemetry.allocations += 1;
        telemetry.bytes_allocated += u64::from(size);
        Ok(ptr)
    }

    /// Free a partially written guest allocation, or record the leak.
    ///
    /// Called on the failure path of lower. The primary error is reported
    /// by the caller; this only produces the non-fatal diagnostic.
    pub(crate) fn release_or_leak<M: GuestMemory>(
        &mut self,
        options: &ResolvedOptions,
        memory: &mut M,
        ptr: u32,
        size: u32,
        align: u32,
        telemetry: &mut Telemetry,
    ) {
        if ptr == 0 || size == 0 {
            return;
        }
        if let Ok(allocator) = self.select_allocator(options) {
            match allocator.realloc(memory, ptr, size, align, 0) {
                Ok(_) => return,
                Err(trap) => log::warn!(
                    "guest realloc trapped while freeing {size} bytes at offset {ptr}: {trap}"
                ),
            }
        }
        let diagnostic =
            Error::guest_leak(format!("leaked {size} bytes at guest offset {ptr}"));
        log::warn!("lower failed partway: {diagnostic}");
        telemetry.leaked_allocations += 1;
        self.metrics.leaked_allocations += 1;
    }

    fn select_allocator(&mut self, options: &ResolvedOptions) -> Result<&mut (dyn GuestRealloc + '_)> {
        if options.realloc.is_some() {
            self.guest_realloc
                .as_deref_mut()
                .map(|r| r as &mut dyn GuestRealloc)
                .ok_or_else(|| {
                    Error::bad_options("options bind a realloc but no guest realloc is registered")
                })
        } else {
            self.host_allocator
                .as_deref_mut()
                .map(|r| r as &mut dyn GuestRealloc)
                .ok_or_else(|| Error::alloc_failed("no allocator configured"))
        }
    }
}

/// Check a caller-provided flat signature against the one the type demands
pub(crate) fn check_flat_signature(expected: &[CoreType], provided: &[CoreType]) -> Result<()> {
    if provided != expected {
        return Err(Error::type_mismatch(format!(
            "flat signature mismatch: expected {expected:?}, got {provided:?}"
        )));
    }
    Ok(())
}

/// Check operand values against the (already validated) operand types
pub(crate) fn check_operands(operands: &[CoreValue], op_types: &[CoreType]) -> Result<()> {
    if operands.len() != op_types.len() {
        return Err(Error::type_mismatch(format!(
            "expected {} operands, got {}",
            op_types.len(),
            operands.len()
        )));
    }
    for (operand, ty) in operands.iter().zip(op_types.iter()) {
        if operand.core_type() != *ty {
            return Err(Error::type_mismatch(format!(
                "operand has core type {}, expected {ty}",
                operand.core_type()
            )));
        }
    }
    Ok(())
}
