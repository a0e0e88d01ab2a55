// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: User buffer validation and copy-in/copy-out across the trust boundary
//! OWNERS: @kernel-mm-team
//! PUBLIC API: UserMemory, UserSpace, UserAddr, Access, Fault, validate_readable/writable
//! DEPENDS_ON: bitflags, alloc::collections::BTreeMap
//! INVARIANTS: A range is checked before any byte of it is touched; no references to user
//!             memory escape a copy; zero-length ranges are always valid

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::cmp;
use core::fmt;

use msgbox_abi::MsgboxError;

/// Size of a demand-paged backing page.
pub const PAGE_SIZE: usize = 4096;
/// First address above the user half of an Sv39 address space.
pub const USER_VADDR_LIMIT: usize = 0x0000_0040_0000_0000;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    /// Permissions a caller holds on a mapped range.
    pub struct Access: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// Virtual address in a caller's address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserAddr(usize);

impl UserAddr {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub fn offset(self, bytes: usize) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

impl fmt::Display for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Reason a user range could not be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Range wraps or leaves the user half of the address space.
    OutOfRange,
    /// Part of the range is not mapped.
    Unmapped,
    /// The range is mapped without the requested permission.
    Permission,
}

impl From<Fault> for MsgboxError {
    fn from(_: Fault) -> Self {
        MsgboxError::AccessDenied
    }
}

/// A caller's protection domain as seen from the kernel.
///
/// Implementations must not touch memory when they return an error.
pub trait UserMemory {
    /// Checks that `len` bytes at `addr` are mapped with `access`.
    fn check(&self, addr: UserAddr, len: usize, access: Access) -> Result<(), Fault>;

    /// Copies `dst.len()` bytes from user memory at `addr`.
    fn copy_from_user(&self, dst: &mut [u8], addr: UserAddr) -> Result<(), Fault>;

    /// Copies `src` into user memory at `addr`.
    fn copy_to_user(&mut self, addr: UserAddr, src: &[u8]) -> Result<(), Fault>;
}

/// Rejects ranges that wrap or reach past [`USER_VADDR_LIMIT`].
pub fn ensure_user_slice(addr: UserAddr, len: usize) -> Result<(), Fault> {
    if len == 0 {
        return Ok(());
    }
    if addr.raw() >= USER_VADDR_LIMIT {
        return Err(Fault::OutOfRange);
    }
    let last = addr.raw().checked_add(len - 1).ok_or(Fault::OutOfRange)?;
    if last >= USER_VADDR_LIMIT {
        return Err(Fault::OutOfRange);
    }
    Ok(())
}

/// Verifies the caller may read `len` bytes at `addr`.
pub fn validate_readable(
    memory: &dyn UserMemory,
    addr: UserAddr,
    len: usize,
) -> Result<(), MsgboxError> {
    memory.check(addr, len, Access::READ).map_err(MsgboxError::from)
}

/// Verifies the caller may write `len` bytes at `addr`.
pub fn validate_writable(
    memory: &dyn UserMemory,
    addr: UserAddr,
    len: usize,
) -> Result<(), MsgboxError> {
    memory.check(addr, len, Access::WRITE).map_err(MsgboxError::from)
}

/// Error returned when changing the layout of a [`UserSpace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// Zero-length mappings are not allowed.
    Empty,
    /// Range leaves the user half of the address space.
    OutOfRange,
    /// Range overlaps an existing mapping.
    Overlap,
    /// No mapping starts at the given address.
    NotMapped,
}

struct Region {
    len: usize,
    access: Access,
    pages: BTreeMap<usize, Box<[u8]>>,
}

impl Region {
    fn read(&self, offset: usize, dst: &mut [u8]) {
        let mut done = 0;
        while done < dst.len() {
            let at = offset + done;
            let in_page = at % PAGE_SIZE;
            let n = cmp::min(PAGE_SIZE - in_page, dst.len() - done);
            match self.pages.get(&(at / PAGE_SIZE)) {
                Some(page) => dst[done..done + n].copy_from_slice(&page[in_page..in_page + n]),
                None => dst[done..done + n].fill(0),
            }
            done += n;
        }
    }

    fn write(&mut self, offset: usize, src: &[u8]) {
        let mut done = 0;
        while done < src.len() {
            let at = offset + done;
            let in_page = at % PAGE_SIZE;
            let n = cmp::min(PAGE_SIZE - in_page, src.len() - done);
            let page = self
                .pages
                .entry(at / PAGE_SIZE)
                .or_insert_with(|| vec![0u8; PAGE_SIZE].into_boxed_slice());
            page[in_page..in_page + n].copy_from_slice(&src[done..done + n]);
            done += n;
        }
    }
}

/// Host-side address space of one simulated process.
///
/// Regions are backed lazily: a page is materialised on its first write and unwritten
/// pages read as zero, so large reservations cost nothing until used.
#[derive(Default)]
pub struct UserSpace {
    regions: BTreeMap<usize, Region>,
}

impl UserSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `len` bytes at `base` with `access`.
    pub fn map(&mut self, base: UserAddr, len: usize, access: Access) -> Result<(), MapError> {
        if len == 0 {
            return Err(MapError::Empty);
        }
        ensure_user_slice(base, len).map_err(|_| MapError::OutOfRange)?;
        let end = base.raw() + len;
        if let Some((&prev, region)) = self.regions.range(..end).next_back() {
            if prev + region.len > base.raw() {
                return Err(MapError::Overlap);
            }
        }
        self.regions.insert(base.raw(), Region { len, access, pages: BTreeMap::new() });
        Ok(())
    }

    /// Removes the mapping that starts at `base`, discarding its contents.
    pub fn unmap(&mut self, base: UserAddr) -> Result<(), MapError> {
        self.regions.remove(&base.raw()).map(|_| ()).ok_or(MapError::NotMapped)
    }

    /// Changes the permissions of the mapping that starts at `base`.
    pub fn protect(&mut self, base: UserAddr, access: Access) -> Result<(), MapError> {
        let region = self.regions.get_mut(&base.raw()).ok_or(MapError::NotMapped)?;
        region.access = access;
        Ok(())
    }

    /// Writes through the owner's own view of its memory (mapping required, permissions not).
    pub fn write_bytes(&mut self, addr: UserAddr, src: &[u8]) -> Result<(), Fault> {
        self.check(addr, src.len(), Access::empty())?;
        self.write_unchecked(addr, src)
    }

    /// Reads through the owner's own view of its memory (mapping required, permissions not).
    pub fn read_bytes(&self, addr: UserAddr, len: usize) -> Result<Vec<u8>, Fault> {
        self.check(addr, len, Access::empty())?;
        let mut out = vec![0u8; len];
        self.read_unchecked(&mut out, addr)?;
        Ok(out)
    }

    /// Number of backing pages materialised so far.
    pub fn resident_pages(&self) -> usize {
        self.regions.values().map(|region| region.pages.len()).sum()
    }

    fn region_at(&self, at: usize) -> Option<(usize, &Region)> {
        self.regions
            .range(..=at)
            .next_back()
            .filter(|(base, region)| at < **base + region.len)
            .map(|(base, region)| (*base, region))
    }

    fn read_unchecked(&self, dst: &mut [u8], addr: UserAddr) -> Result<(), Fault> {
        let mut done = 0;
        while done < dst.len() {
            let at = addr.raw() + done;
            let (base, region) = self.region_at(at).ok_or(Fault::Unmapped)?;
            let offset = at - base;
            let n = cmp::min(dst.len() - done, region.len - offset);
            region.read(offset, &mut dst[done..done + n]);
            done += n;
        }
        Ok(())
    }

    fn write_unchecked(&mut self, addr: UserAddr, src: &[u8]) -> Result<(), Fault> {
        let mut done = 0;
        while done < src.len() {
            let at = addr.raw() + done;
            let base = self.region_at(at).map(|(base, _)| base).ok_or(Fault::Unmapped)?;
            let region = self.regions.get_mut(&base).ok_or(Fault::Unmapped)?;
            let offset = at - base;
            let n = cmp::min(src.len() - done, region.len - offset);
            region.write(offset, &src[done..done + n]);
            done += n;
        }
        Ok(())
    }
}

impl UserMemory for UserSpace {
    fn check(&self, addr: UserAddr, len: usize, access: Access) -> Result<(), Fault> {
        ensure_user_slice(addr, len)?;
        let mut done = 0;
        while done < len {
            let at = addr.raw() + done;
            let (base, region) = self.region_at(at).ok_or(Fault::Unmapped)?;
            if !region.access.contains(access) {
                return Err(Fault::Permission);
            }
            done += cmp::min(len - done, region.len - (at - base));
        }
        Ok(())
    }

    fn copy_from_user(&self, dst: &mut [u8], addr: UserAddr) -> Result<(), Fault> {
        self.check(addr, dst.len(), Access::READ)?;
        self.read_unchecked(dst, addr)
    }

    fn copy_to_user(&mut self, addr: UserAddr, src: &[u8]) -> Result<(), Fault> {
        self.check(addr, src.len(), Access::WRITE)?;
        self.write_unchecked(addr, src)
    }
}
