//! Page-aligned pixel buffers.

use std::alloc::{self,Layout};
use std::fmt;
use std::ptr;
use std::slice;
use simd_adler32::Adler32;

use ::{MvError,MvResult};
use ::mapping::page_size;

/// Pixel depth of an MVID file.
///
/// 16 bpp pixels are stored in 16-bit words.  24 and 32 bpp pixels
/// are both stored in 32-bit words; for 24 bpp the top byte is unused
/// but is preserved by the codec.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub enum Depth {
    Bpp16,
    Bpp24,
    Bpp32,
}

/// Raw decoded pixels for one frame.
///
/// The storage always starts on an OS page boundary, so it can be
/// handed to zero-copy display paths.  A new buffer is zero-filled.
pub struct PixelBuffer {
    w: usize,
    h: usize,
    depth: Depth,
    ptr: *mut u8,
    layout: Layout,
}

impl Depth {
    /// Depth for a bits-per-pixel value from a file header.
    pub fn from_bpp(bpp: u16) -> Option<Depth> {
        match bpp {
            16 => Some(Depth::Bpp16),
            24 => Some(Depth::Bpp24),
            32 => Some(Depth::Bpp32),
            _ => None,
        }
    }

    /// Bits per pixel, as recorded in the file header.
    pub fn bpp(self) -> u16 {
        match self {
            Depth::Bpp16 => 16,
            Depth::Bpp24 => 24,
            Depth::Bpp32 => 32,
        }
    }

    /// Bytes used to store one pixel in memory.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Depth::Bpp16 => 2,
            Depth::Bpp24 | Depth::Bpp32 => 4,
        }
    }

    /// Size in bytes of a w x h frame, or None on overflow.
    pub fn frame_size(self, w: usize, h: usize) -> Option<usize> {
        w.checked_mul(h).and_then(|n| n.checked_mul(self.bytes_per_pixel()))
    }
}

impl PixelBuffer {
    /// Allocate a zero-filled, page-aligned buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use maxvid::{Depth,PixelBuffer};
    ///
    /// let buf = PixelBuffer::new(320, 200, Depth::Bpp16).unwrap();
    /// assert_eq!(buf.as_bytes().len(), 320 * 200 * 2);
    /// ```
    pub fn new(w: usize, h: usize, depth: Depth)
            -> MvResult<Self> {
        let size = match depth.frame_size(w, h) {
            Some(size) if size > 0 => size,
            _ => return Err(MvError::WrongResolution(w, h)),
        };

        let layout = match Layout::from_size_align(size, page_size()) {
            Ok(layout) => layout,
            Err(_) => return Err(MvError::WrongResolution(w, h)),
        };

        let ptr = unsafe{ alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(MvError::WrongResolution(w, h));
        }

        Ok(PixelBuffer {
            w: w,
            h: h,
            depth: depth,
            ptr: ptr,
            layout: layout,
        })
    }

    /// Allocate a 16 bpp buffer holding a copy of the given pixels.
    pub fn from_u16(w: usize, h: usize, pixels: &[u16])
            -> MvResult<Self> {
        let mut buf = PixelBuffer::new(w, h, Depth::Bpp16)?;
        if pixels.len() != w * h {
            return Err(MvError::WrongBufferSize);
        }
        buf.as_u16_mut().copy_from_slice(pixels);
        Ok(buf)
    }

    /// Allocate a 24 or 32 bpp buffer holding a copy of the given pixels.
    pub fn from_u32(w: usize, h: usize, depth: Depth, pixels: &[u32])
            -> MvResult<Self> {
        if depth == Depth::Bpp16 {
            return Err(MvError::BadDepth(depth.bpp()));
        }
        let mut buf = PixelBuffer::new(w, h, depth)?;
        if pixels.len() != w * h {
            return Err(MvError::WrongBufferSize);
        }
        buf.as_u32_mut().copy_from_slice(pixels);
        Ok(buf)
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Number of pixels, width x height.
    pub fn num_pixels(&self) -> usize {
        self.w * self.h
    }

    /// True if the other buffer has the same width, height and depth.
    pub fn same_geometry(&self, other: &PixelBuffer) -> bool {
        self.w == other.w && self.h == other.h && self.depth == other.depth
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe{ slice::from_raw_parts(self.ptr, self.layout.size()) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe{ slice::from_raw_parts_mut(self.ptr, self.layout.size()) }
    }

    /// View as 16-bit pixels.  Panics unless the depth is 16 bpp.
    pub fn as_u16(&self) -> &[u16] {
        assert_eq!(self.depth, Depth::Bpp16);
        // Page alignment satisfies u16 alignment.
        unsafe{ slice::from_raw_parts(self.ptr as *const u16, self.num_pixels()) }
    }

    /// Mutable view as 16-bit pixels.  Panics unless the depth is 16 bpp.
    pub fn as_u16_mut(&mut self) -> &mut [u16] {
        assert_eq!(self.depth, Depth::Bpp16);
        unsafe{ slice::from_raw_parts_mut(self.ptr as *mut u16, self.num_pixels()) }
    }

    /// View as 32-bit pixels.  Panics if the depth is 16 bpp.
    pub fn as_u32(&self) -> &[u32] {
        assert!(self.depth != Depth::Bpp16);
        unsafe{ slice::from_raw_parts(self.ptr as *const u32, self.num_pixels()) }
    }

    /// Mutable view as 32-bit pixels.  Panics if the depth is 16 bpp.
    pub fn as_u32_mut(&mut self) -> &mut [u32] {
        assert!(self.depth != Depth::Bpp16);
        unsafe{ slice::from_raw_parts_mut(self.ptr as *mut u32, self.num_pixels()) }
    }

    /// Overwrite this buffer with the contents of another of the same
    /// geometry.
    pub fn copy_from(&mut self, other: &PixelBuffer)
            -> MvResult<()> {
        if !self.same_geometry(other) {
            return Err(MvError::WrongBufferSize);
        }
        self.as_bytes_mut().copy_from_slice(other.as_bytes());
        Ok(())
    }

    /// Adler-32 of the raw pixel bytes.
    pub fn adler32(&self) -> u32 {
        adler32(self.as_bytes())
    }
}

// The buffer uniquely owns its allocation, like a Vec<u8>.
unsafe impl Send for PixelBuffer {}
unsafe impl Sync for PixelBuffer {}

impl Clone for PixelBuffer {
    fn clone(&self) -> Self {
        let ptr = unsafe{ alloc::alloc(self.layout) };
        if ptr.is_null() {
            alloc::handle_alloc_error(self.layout);
        }
        unsafe{ ptr::copy_nonoverlapping(self.ptr, ptr, self.layout.size()) };

        PixelBuffer {
            w: self.w,
            h: self.h,
            depth: self.depth,
            ptr: ptr,
            layout: self.layout,
        }
    }
}

impl PartialEq for PixelBuffer {
    fn eq(&self, other: &PixelBuffer) -> bool {
        self.same_geometry(other) && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for PixelBuffer {}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PixelBuffer({}x{}, {} bpp)", self.w, self.h, self.depth.bpp())
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        unsafe{ alloc::dealloc(self.ptr, self.layout) };
    }
}

/// Adler-32 checksum, as recorded in the frame table.
pub fn adler32(buf: &[u8]) -> u32 {
    let mut hasher = Adler32::new();
    hasher.write(buf);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use ::mapping::page_size;
    use super::*;

    #[test]
    fn test_page_aligned() {
        let buf = PixelBuffer::new(3, 3, Depth::Bpp24).expect("buf");
        assert_eq!(buf.as_bytes().as_ptr() as usize % page_size(), 0);
        assert_eq!(buf.as_bytes().len(), 36);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_size() {
        assert!(PixelBuffer::new(0, 10, Depth::Bpp16).is_err());
    }

    #[test]
    fn test_allocation_failure() {
        // 2^50 bytes: larger than any user address space.
        match PixelBuffer::new(1 << 24, 1 << 24, Depth::Bpp32) {
            Err(MvError::WrongResolution(w, h)) => assert_eq!((w, h), (1 << 24, 1 << 24)),
            r => panic!("expected WrongResolution, got {:?}", r),
        }
    }

    #[test]
    fn test_clone_eq() {
        let a = PixelBuffer::from_u16(2, 1, &[0x1234, 0x5678]).expect("buf");
        let mut b = a.clone();
        assert_eq!(a, b);
        b.as_u16_mut()[1] = 0;
        assert!(a != b);
    }

    #[test]
    fn test_adler32() {
        // Known value for "Wikipedia".
        assert_eq!(adler32(b"Wikipedia"), 0x11E60398);
        assert_eq!(adler32(&[]), 1);
    }
}
