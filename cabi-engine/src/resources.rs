// CABI - cabi-engine
// Module: Resource table
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Resource handle table.
//!
//! Handles are nonzero u32 indices into a slot table; handle 0 is reserved
//! as the invalid handle. Each owning instance keeps an intrusive list of
//! its live handles so teardown can drop them in LIFO order. Destructors
//! run through a caller-provided [`DestructorContext`]; a destructor trap
//! is caught and discarded and the slot is freed regardless.

use crate::prelude::*;

/// Identifier of a component instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u32);

/// Execution-context hook used when dropping resources.
///
/// `invoke_destructor` re-enters the guest; an `Err` return models a trap
/// and is swallowed by the table. Destructors only run when the current
/// instance is the handle's owner; cross-instance destructor invocation is
/// not supported and is skipped with a warning.
pub trait DestructorContext {
    /// The instance the current execution context targets
    fn current_instance(&self) -> InstanceId;

    /// Call the guest destructor function with the handle
    fn invoke_destructor(&mut self, func_index: u32, handle: u32) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Slot {
    active: bool,
    type_index: u32,
    owner: InstanceId,
    destructor: Option<u32>,
    host_data: u64,
    // intrusive per-owner list; 0 is the list terminator, which is why
    // slot 0 can never hold a handle
    prev: u32,
    next: u32,
}

impl Slot {
    fn vacant() -> Self {
        Self {
            active: false,
            type_index: 0,
            owner: InstanceId(0),
            destructor: None,
            host_data: 0,
            prev: 0,
            next: 0,
        }
    }
}

/// Table of resource handles
#[derive(Debug, Clone)]
pub struct ResourceTable {
    // slot 0 is a permanently reserved sentinel
    slots: Vec<Slot>,
    capacity: usize,
    cursor: u32,
    heads: HashMap<InstanceId, u32>,
    live: usize,
}

impl ResourceTable {
    /// Default number of usable slots
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a table with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a table with room for `capacity` live handles
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::vacant()],
            capacity: capacity.max(1),
            cursor: 1,
            heads: HashMap::new(),
            live: 0,
        }
    }

    /// Number of currently active handles
    pub fn live_handles(&self) -> usize {
        self.live
    }

    /// Allocate a handle for a new resource.
    ///
    /// Scans for a free slot from a rotating cursor so repeated new/drop
    /// cycles do not rescan the table front every time. Never returns 0 and
    /// never a handle that is currently active.
    pub fn new_resource(
        &mut self,
        type_index: u32,
        owner: InstanceId,
        destructor: Option<u32>,
    ) -> Result<u32> {
        let handle = self.find_free_slot()?;
        let head = self.heads.get(&owner).copied().unwrap_or(0);

        {
            let slot = &mut self.slots[handle as usize];
            slot.active = true;
            slot.type_index = type_index;
            slot.owner = owner;
            slot.destructor = destructor;
            slot.host_data = 0;
            slot.prev = 0;
            slot.next = head;
        }
        if head != 0 {
            self.slots[head as usize].prev = handle;
        }
        self.heads.insert(owner, handle);

        self.cursor = handle.wrapping_add(1);
        self.live += 1;
        Ok(handle)
    }

    /// The representation value of a handle; identity today
    pub fn rep(&self, handle: u32) -> Result<u32> {
        self.check_active(handle)?;
        Ok(handle)
    }

    /// The type index the handle was created with
    pub fn type_index(&self, handle: u32) -> Result<u32> {
        let index = self.check_active(handle)?;
        Ok(self.slots[index].type_index)
    }

    /// Opaque host data attached to the handle
    pub fn host_data(&self, handle: u32) -> Result<u64> {
        let index = self.check_active(handle)?;
        Ok(self.slots[index].host_data)
    }

    /// Attach opaque host data to the handle
    pub fn set_host_data(&mut self, handle: u32, data: u64) -> Result<()> {
        let index = self.check_active(handle)?;
        self.slots[index].host_data = data;
        Ok(())
    }

    /// Whether the handle refers to an active slot
    pub fn is_active(&self, handle: u32) -> bool {
        self.check_active(handle).is_ok()
    }

    /// Drop a handle, running its destructor through `ctx`.
    ///
    /// The slot is freed before the destructor runs, so re-entrant table
    /// access from the destructor observes the handle as gone. A destructor
    /// trap is logged and discarded.
    pub fn drop_resource(&mut self, handle: u32, ctx: &mut dyn DestructorContext) -> Result<()> {
        let (destructor, owner) = self.begin_drop(handle)?;
        run_destructor(destructor, owner, handle, ctx);
        Ok(())
    }

    /// Validate and free a handle, returning its destructor binding.
    ///
    /// Split out so embedders holding the table behind a lock can release
    /// the lock before invoking the destructor.
    pub fn begin_drop(&mut self, handle: u32) -> Result<(Option<u32>, InstanceId)> {
        let index = self.check_active(handle)?;

        let (owner, destructor, prev, next) = {
            let slot = &self.slots[index];
            (slot.owner, slot.destructor, slot.prev, slot.next)
        };

        // unlink from the owner's live list
        if prev != 0 {
            self.slots[prev as usize].next = next;
        } else if next != 0 {
            self.heads.insert(owner, next);
        } else {
            self.heads.remove(&owner);
        }
        if next != 0 {
            self.slots[next as usize].prev = prev;
        }

        let slot = &mut self.slots[index];
        slot.active = false;
        slot.destructor = None;
        slot.prev = 0;
        slot.next = 0;
        self.live -= 1;

        Ok((destructor, owner))
    }

    /// Drop all live handles of an instance in LIFO order.
    ///
    /// Returns the number of handles dropped.
    pub fn teardown_instance(&mut self, owner: InstanceId, ctx: &mut dyn DestructorContext) -> usize {
        let mut dropped = 0;
        while let Some(&head) = self.heads.get(&owner) {
            // the head is always the most recently created live handle
            if self.drop_resource(head, ctx).is_err() {
                break;
            }
            dropped += 1;
        }
        dropped
    }

    fn check_active(&self, handle: u32) -> Result<usize> {
        if handle == 0 {
            return Err(Error::invalid_handle("handle 0 is reserved"));
        }
        let index = handle as usize;
        match self.slots.get(index) {
            Some(slot) if slot.active => Ok(index),
            Some(_) => Err(Error::invalid_handle(format!("handle {handle} is not active"))),
            None => Err(Error::invalid_handle(format!("handle {handle} is out of range"))),
        }
    }

    fn find_free_slot(&mut self) -> Result<u32> {
        let usable = self.slots.len() - 1;
        if usable > 0 {
            let start = self.cursor.max(1) as usize;
            for i in 0..usable {
                let index = 1 + (start - 1 + i) % usable;
                if !self.slots[index].active {
                    return Ok(index as u32);
                }
            }
        }
        if usable < self.capacity {
            self.slots.push(Slot::vacant());
            return Ok((self.slots.len() - 1) as u32);
        }
        Err(Error::table_full(format!(
            "no free slot among {} entries",
            self.capacity
        )))
    }
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

fn run_destructor(
    destructor: Option<u32>,
    owner: InstanceId,
    handle: u32,
    ctx: &mut dyn DestructorContext,
) {
    let Some(func_index) = destructor else {
        return;
    };
    let current = ctx.current_instance();
    if current != owner {
        log::warn!(
            "skipping destructor for handle {handle}: owned by instance {}, current instance {}",
            owner.0,
            current.0
        );
        return;
    }
    if let Err(trap) = ctx.invoke_destructor(func_index, handle) {
        log::warn!("destructor for handle {handle} trapped: {trap}");
    }
}

/// Mutex-guarded resource table for multi-threaded embeddings.
///
/// The lock is held only for the table operation itself; destructors run
/// after the lock is released, so re-entry into the guest never happens
/// under the table lock.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct SharedResourceTable {
    inner: std::sync::Mutex<ResourceTable>,
}

#[cfg(feature = "std")]
impl SharedResourceTable {
    /// Create a shared table with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(ResourceTable::DEFAULT_CAPACITY)
    }

    /// Create a shared table with room for `capacity` live handles
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: std::sync::Mutex::new(ResourceTable::with_capacity(capacity)),
        }
    }

    /// Allocate a handle for a new resource
    pub fn new_resource(
        &self,
        type_index: u32,
        owner: InstanceId,
        destructor: Option<u32>,
    ) -> Result<u32> {
        self.lock().new_resource(type_index, owner, destructor)
    }

    /// The representation value of a handle
    pub fn rep(&self, handle: u32) -> Result<u32> {
        self.lock().rep(handle)
    }

    /// Drop a handle; the destructor runs outside the table lock
    pub fn drop_resource(&self, handle: u32, ctx: &mut dyn DestructorContext) -> Result<()> {
        let (destructor, owner) = self.lock().begin_drop(handle)?;
        run_destructor(destructor, owner, handle, ctx);
        Ok(())
    }

    /// Number of currently active handles
    pub fn live_handles(&self) -> usize {
        self.lock().live_handles()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResourceTable> {
        // a poisoned table is still structurally sound; recover the guard
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(feature = "std")]
impl Default for SharedResourceTable {
    fn default() -> Self {
        Self::new()
    }
}
