//! Segmented memory mapping.
//!
//! Rather than mapping a whole MVID file, which may exceed the
//! per-process mapping budget on small devices, each frame's block is
//! mapped on its own just before it is decoded and unmapped
//! afterwards.  Segments requesting the same page range share one OS
//! mapping, and all segments share the file descriptor.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr;
use std::rc::{Rc,Weak};
use std::slice;
use std::sync::atomic::{AtomicUsize,Ordering};
use libc::{c_void,off_t};

use ::{MvError,MvResult};

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// A file opened for segmented mapping.
///
/// Cloning is cheap; clones share the file descriptor.
#[derive(Clone)]
pub struct SegmentedMapping {
    backing: Rc<Backing>,
}

/// A byte range of a file, mapped on demand.
///
/// The segment keeps the file descriptor alive, even if the
/// `SegmentedMapping` it came from is dropped.
pub struct MappedSegment {
    backing: Rc<Backing>,
    offset: u64,
    len: usize,
    mapped: bool,
    region: Option<Rc<Region>>,
}

/// Shared file descriptor, plus the live OS mappings made from it.
struct Backing {
    file: File,
    file_len: u64,
    regions: RefCell<HashMap<RegionKey, Weak<Region>>>,
}

/// Page-aligned (start, length) of an OS mapping.
type RegionKey = (u64, usize);

/// One OS mapping.  Unmapped when the last segment using it lets go.
struct Region {
    backing: Rc<Backing>,
    key: RegionKey,
    ptr: *mut c_void,
}

/*--------------------------------------------------------------*/

/// The OS virtual memory page size, queried once at runtime.
pub fn page_size() -> usize {
    let size = PAGE_SIZE.load(Ordering::Relaxed);
    if size != 0 {
        return size;
    }

    let size = match unsafe{ libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 4096,
    };

    PAGE_SIZE.store(size, Ordering::Relaxed);
    size
}

/// Round down to a multiple of the page size.
pub fn page_round_down(offset: u64) -> u64 {
    offset - offset % page_size() as u64
}

/// Round up to a multiple of the page size.
pub fn page_round_up(offset: u64) -> u64 {
    let page = page_size() as u64;
    match offset % page {
        0 => offset,
        r => offset + (page - r),
    }
}

/*--------------------------------------------------------------*/

impl SegmentedMapping {
    /// Open a file for segmented mapping.
    pub fn open(filename: &Path)
            -> MvResult<Self> {
        let file = File::open(filename)?;
        SegmentedMapping::from_file(file)
    }

    /// Take ownership of an open file.
    pub fn from_file(file: File)
            -> MvResult<Self> {
        let file_len = file.metadata()?.len();

        Ok(SegmentedMapping {
            backing: Rc::new(Backing {
                file: file,
                file_len: file_len,
                regions: RefCell::new(HashMap::new()),
            }),
        })
    }

    /// Length of the file when it was opened.
    pub fn file_len(&self) -> u64 {
        self.backing.file_len
    }

    /// Number of OS mappings currently alive.
    pub fn mapped_regions(&self) -> usize {
        self.backing.regions.borrow().values()
            .filter(|w| w.upgrade().is_some())
            .count()
    }

    /// Map the byte range [offset, offset + len).
    ///
    /// The mapping itself starts on a page boundary, but the segment
    /// only exposes the requested range.
    pub fn map(&self, offset: u64, len: usize)
            -> MvResult<MappedSegment> {
        let mut seg = self.segment(offset, len)?;
        seg.map()?;
        Ok(seg)
    }

    /// Create a segment for the byte range without mapping it yet.
    pub fn segment(&self, offset: u64, len: usize)
            -> MvResult<MappedSegment> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.backing.file_len => (),
            _ => return Err(MvError::OutOfRange(offset, len)),
        }

        Ok(MappedSegment {
            backing: self.backing.clone(),
            offset: offset,
            len: len,
            mapped: false,
            region: None,
        })
    }
}

impl MappedSegment {
    /// File offset of the first byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Map the segment, if not already mapped.
    pub fn map(&mut self)
            -> MvResult<()> {
        if self.mapped {
            return Ok(());
        }

        if self.len > 0 {
            self.region = Some(map_region(&self.backing, self.offset, self.len)?);
        }
        self.mapped = true;
        Ok(())
    }

    /// Release this segment's hold on its mapping.
    ///
    /// Calling this more than once is harmless.  Other segments
    /// sharing the same mapping are unaffected.
    pub fn unmap(&mut self) {
        self.region = None;
        self.mapped = false;
    }

    /// The mapped bytes, or None if the segment is not mapped.
    pub fn as_slice(&self) -> Option<&[u8]> {
        if !self.mapped {
            return None;
        }

        match self.region {
            Some(ref region) => {
                let delta = (self.offset - region.key.0) as usize;
                let ptr = unsafe{ (region.ptr as *const u8).offset(delta as isize) };
                Some(unsafe{ slice::from_raw_parts(ptr, self.len) })
            },
            None => Some(&[]),
        }
    }
}

/*--------------------------------------------------------------*/

/// Find or create the OS mapping covering [offset, offset + len).
fn map_region(backing: &Rc<Backing>, offset: u64, len: usize)
        -> MvResult<Rc<Region>> {
    let end = offset + len as u64;
    let start = page_round_down(offset);
    let map_len = (page_round_up(end) - start) as usize;
    let key = (start, map_len);

    let existing = backing.regions.borrow().get(&key).and_then(|w| w.upgrade());
    if let Some(region) = existing {
        trace!("reusing mapping {}+{}", start, map_len);
        return Ok(region);
    }

    if start > off_t::max_value() as u64 {
        return Err(MvError::OutOfRange(offset, len));
    }

    let ptr = unsafe{
        libc::mmap(ptr::null_mut(), map_len,
                libc::PROT_READ, libc::MAP_PRIVATE,
                backing.file.as_raw_fd(), start as off_t)
    };
    if ptr == libc::MAP_FAILED {
        return Err(MvError::Io(io::Error::last_os_error()));
    }

    trace!("mapped {}+{}", start, map_len);

    let region = Rc::new(Region {
        backing: backing.clone(),
        key: key,
        ptr: ptr,
    });
    backing.regions.borrow_mut().insert(key, Rc::downgrade(&region));
    Ok(region)
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe{ libc::munmap(self.ptr, self.key.1) };
        self.backing.regions.borrow_mut().remove(&self.key);
        trace!("unmapped {}+{}", self.key.0, self.key.1);
    }
}
