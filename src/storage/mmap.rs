//! # Mapped Region Provider
//!
//! `MappedRegion` creates the file the PCP MMV PMDA will sample, sizes it
//! exactly, and maps it read-write and shared. Everything platform-specific
//! is delegated to `memmap2`, which covers mmap/munmap/msync on unix and
//! CreateFileMapping/MapViewOfFile on Windows.
//!
//! The region is fixed-size for its whole lifetime; an MMV file is never
//! grown or remapped after start. That invariant is what makes the base
//! pointer captured at map time usable for live value-cell stores while the
//! serializer's exclusive `&mut` phase is long over.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;

use memmap2::MmapMut;

use crate::error::{MmvError, Result};

#[derive(Debug)]
pub struct MappedRegion {
    // Held for the mapping's lifetime; never accessed through `&self` after
    // creation. The base pointer below aliases its memory.
    _mmap: MmapMut,
    base: *mut u8,
    len: usize,
    path: PathBuf,
}

// SAFETY: the raw base pointer makes MappedRegion !Send + !Sync by default.
// Sharing is sound because:
// 1. The mapping is created once and never remapped or resized, so `base`
//    is valid for `len` bytes until drop.
// 2. `bytes_mut` requires `&mut self`, so the exclusive serialization phase
//    cannot overlap shared access.
// 3. All `&self` mutation goes through `atomic_u64` (aligned atomic stores)
//    or `store_bytes`/`zero` on string slots, whose callers serialize per
//    slot with the owning metric's lock.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Creates `path` (replacing any stale file from a previous run), sizes
    /// it to exactly `len` bytes, and maps it shared read-write. The file is
    /// created mode 0644 so the PMDA can read it.
    pub fn create(path: &Path, len: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options.open(path)?;

        file.set_len(len as u64)?;

        // SAFETY: map_mut is unsafe because the file could be modified
        // externally. This is sound here because:
        // 1. The file was just created with create_new, so no other writer
        //    holds it; the PMDA maps it read-only.
        // 2. The mapping's lifetime is tied to this MappedRegion.
        let mut mmap = unsafe {
            MmapMut::map_mut(&file)
                .map_err(|e| MmvError::Platform(format!("mmap of '{}': {e}", path.display())))?
        };

        let base = mmap.as_mut_ptr();

        Ok(Self {
            _mmap: mmap,
            base,
            len,
            path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole region, exclusively borrowed for the serialization phase.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: `&mut self` guarantees no concurrent access through the
        // shared accessors below; base/len describe the live mapping.
        unsafe { std::slice::from_raw_parts_mut(self.base, self.len) }
    }

    /// An atomic view of the 8-byte word at `offset`. Used for value
    /// payloads and the generation words, all 8-aligned by layout.
    pub fn atomic_u64(&self, offset: usize) -> &AtomicU64 {
        assert!(offset + 8 <= self.len, "atomic word at {offset} escapes region");
        assert!(offset % 8 == 0, "atomic word at {offset} is misaligned");

        // SAFETY: the word is in bounds and 8-aligned (mmap bases are page
        // aligned), and AtomicU64 permits shared mutation from any thread
        // or process mapping the same file.
        unsafe { &*(self.base.add(offset) as *const AtomicU64) }
    }

    /// Copies `bytes` into the region at `offset`.
    ///
    /// The caller must hold whatever lock owns that span; string slots are
    /// owned by exactly one metric cell.
    pub fn store_bytes(&self, offset: usize, bytes: &[u8]) {
        assert!(
            offset.checked_add(bytes.len()).map_or(false, |end| end <= self.len),
            "store of {} bytes at {offset} escapes region",
            bytes.len()
        );

        // SAFETY: in bounds per the assert; the owning lock rules out
        // overlapping in-process writers. External readers may observe a
        // torn write, which the MMV generation protocol tolerates.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.add(offset), bytes.len());
        }
    }

    /// Zero-fills `len` bytes at `offset` under the same contract as
    /// [`store_bytes`].
    pub fn zero(&self, offset: usize, len: usize) {
        assert!(
            offset.checked_add(len).map_or(false, |end| end <= self.len),
            "zero of {len} bytes at {offset} escapes region"
        );

        // SAFETY: see store_bytes.
        unsafe {
            std::ptr::write_bytes(self.base.add(offset), 0, len);
        }
    }

    /// Flushes the mapping so the on-disk file matches memory.
    pub fn flush(&self) -> Result<()> {
        self._mmap
            .flush()
            .map_err(|e| MmvError::Platform(format!("msync of '{}': {e}", self.path.display())))
    }

    /// Removes the backing file. The mapping itself stays valid until this
    /// region is dropped; on unix the unlinked file lives on until the last
    /// mapping goes away.
    pub fn remove_file(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(MmvError::Io)
    }
}
