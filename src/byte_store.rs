//! `ByteStore` — the resizable byte sequence backing a single regular
//! file's content.
//!
//! Guarded by its own `RwLock`, independent of the filesystem-wide
//! lock: byte I/O never blocks directory lookups or other files'
//! I/O, and vice versa. Blocks are returned to the owning [`Disk`]
//! when the store is dropped, which happens when the last strong
//! reference to the owning `File` goes away.

use std::sync::{Arc, RwLock};

use crate::disk::Disk;
use crate::error::Result;

struct State {
    blocks: Vec<u64>,
    size: u64,
}

/// A growable, sparse-writable byte sequence, block-backed by a shared [`Disk`].
pub struct ByteStore {
    disk: Arc<Disk>,
    state: RwLock<State>,
}

impl ByteStore {
    pub fn new(disk: Arc<Disk>) -> Self {
        ByteStore { disk, state: RwLock::new(State { blocks: Vec::new(), size: 0 }) }
    }

    pub fn size(&self) -> u64 {
        self.state.read().unwrap().size
    }

    fn block_size(&self) -> u64 {
        self.disk.block_size() as u64
    }

    /// Ensure `state.blocks` has enough blocks to cover byte offset
    /// `up_to` (exclusive), allocating zeroed blocks as needed.
    fn grow_blocks(&self, state: &mut State, up_to: u64) -> Result<()> {
        let block_size = self.block_size();
        let needed = up_to.div_ceil(block_size) as usize;
        if needed > state.blocks.len() {
            let additional = self.disk.alloc_n(needed - state.blocks.len())?;
            state.blocks.extend(additional);
        }
        Ok(())
    }

    /// Read up to `buf.len()` bytes starting at `position`.
    ///
    /// Returns `None` at or past end-of-store (nothing to read), or
    /// `Some(count)` with the number of bytes actually copied.
    pub fn read(&self, position: u64, buf: &mut [u8]) -> Option<usize> {
        let state = self.state.read().unwrap();
        if position >= state.size || buf.is_empty() {
            return if position >= state.size { None } else { Some(0) };
        }
        let available = (state.size - position) as usize;
        let to_read = buf.len().min(available);
        let block_size = self.block_size();
        let mut read = 0;
        while read < to_read {
            let abs = position + read as u64;
            let block_index = (abs / block_size) as usize;
            let block_offset = (abs % block_size) as usize;
            let chunk = ((block_size as usize) - block_offset).min(to_read - read);
            self.disk.get_slice(state.blocks[block_index], block_offset, &mut buf[read..read + chunk]);
            read += chunk;
        }
        Some(read)
    }

    /// Read the full store into a freshly allocated `Vec`.
    pub fn read_all(&self) -> Vec<u8> {
        let state = self.state.read().unwrap();
        let mut out = vec![0u8; state.size as usize];
        drop(state);
        self.read(0, &mut out);
        out
    }

    /// Write `data` at `position` while already holding `state`'s write
    /// lock, growing the store (zero-filling any gap) if
    /// `position + data.len()` exceeds the current size. Shared by
    /// `write` and `append` so append's read-size-then-write happens
    /// under one held lock instead of two.
    fn write_locked(&self, state: &mut State, position: u64, data: &[u8]) -> Result<usize> {
        let end = position + data.len() as u64;
        self.grow_blocks(state, end)?;
        let block_size = self.block_size();
        let mut written = 0;
        while written < data.len() {
            let abs = position + written as u64;
            let block_index = (abs / block_size) as usize;
            let block_offset = (abs % block_size) as usize;
            let chunk = ((block_size as usize) - block_offset).min(data.len() - written);
            self.disk.put_slice(state.blocks[block_index], block_offset, &data[written..written + chunk]);
            written += chunk;
        }
        if end > state.size {
            state.size = end;
        }
        Ok(written)
    }

    /// Write `data` at `position`, growing the store (zero-filling any
    /// gap) if `position + data.len()` exceeds the current size.
    pub fn write(&self, position: u64, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.write().unwrap();
        self.write_locked(&mut state, position, data)
    }

    /// Write `data` at the current end of the store, growing it. Takes
    /// the write lock once and reads the end-of-store position from
    /// inside that same guard, so two concurrent appends can't both
    /// read the same size before either has written.
    pub fn append(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.write().unwrap();
        let position = state.size;
        self.write_locked(&mut state, position, data)
    }

    /// Grow or shrink the store to exactly `new_size`, freeing any
    /// blocks no longer covered, or sparse-zero-extending otherwise.
    pub fn truncate(&self, new_size: u64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if new_size < state.size {
            let block_size = self.block_size();
            let keep = new_size.div_ceil(block_size) as usize;
            if keep < state.blocks.len() {
                let freed: Vec<u64> = state.blocks.split_off(keep);
                self.disk.free_all(&freed);
            }
            // Zero the tail of the last retained block beyond `new_size`.
            if let Some(&last) = state.blocks.last() {
                let used_in_last = (new_size % block_size) as usize;
                if used_in_last > 0 {
                    self.disk.zero(last, used_in_last, block_size as usize - used_in_last);
                }
            }
            state.size = new_size;
        } else if new_size > state.size {
            self.grow_blocks(&mut state, new_size)?;
            state.size = new_size;
        }
        Ok(())
    }

    /// Copy `count` bytes starting at `position` in `self` to `dest`
    /// starting at `dest_position`, growing `dest` as needed.
    pub fn transfer_to(&self, position: u64, count: u64, dest: &ByteStore, dest_position: u64) -> Result<u64> {
        let mut buf = vec![0u8; count as usize];
        let read = self.read(position, &mut buf).unwrap_or(0);
        buf.truncate(read);
        dest.write(dest_position, &buf)?;
        Ok(read as u64)
    }

    /// Replace this store's entire content with a duplicate of `other`'s,
    /// used for filesystem-level file copies. Existing blocks are freed first.
    pub fn copy_from(&self, other: &ByteStore) -> Result<()> {
        let data = other.read_all();
        self.truncate(0)?;
        self.write(0, &data)?;
        Ok(())
    }
}

impl Drop for ByteStore {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        self.disk.free_all(&state.blocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    fn store() -> ByteStore {
        let mut config = Configuration::unix();
        config.block_size = 4;
        config.max_size = 4 * 64;
        ByteStore::new(Arc::new(Disk::new(&config)))
    }

    #[test]
    fn write_then_read_round_trips() {
        let s = store();
        s.write(0, b"hello world").unwrap();
        assert_eq!(s.size(), 11);
        let mut buf = [0u8; 11];
        assert_eq!(s.read(0, &mut buf), Some(11));
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn sparse_write_zero_fills_gap() {
        let s = store();
        s.write(6, b"end").unwrap();
        assert_eq!(s.size(), 9);
        let mut buf = [0u8; 9];
        s.read(0, &mut buf);
        assert_eq!(&buf, b"\0\0\0\0\0\0end");
    }

    #[test]
    fn read_past_end_returns_none() {
        let s = store();
        s.write(0, b"hi").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(s.read(2, &mut buf), None);
    }

    #[test]
    fn truncate_down_then_up_rezeroes() {
        let s = store();
        s.write(0, b"abcdefgh").unwrap();
        s.truncate(2).unwrap();
        s.truncate(5).unwrap();
        let mut buf = [0u8; 5];
        s.read(0, &mut buf);
        assert_eq!(&buf, b"ab\0\0\0");
    }

    #[test]
    fn transfer_to_copies_a_range() {
        let s = store();
        let d = store();
        s.write(0, b"0123456789").unwrap();
        let copied = s.transfer_to(2, 4, &d, 0).unwrap();
        assert_eq!(copied, 4);
        let mut buf = [0u8; 4];
        d.read(0, &mut buf);
        assert_eq!(&buf, b"2345");
    }
}
