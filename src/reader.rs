//! MVID file reader.

use std::fs::File;
use std::path::{Path,PathBuf};

use ::{Depth,MvError,MvResult,PixelBuffer};
use ::codec::{decode_frame,validate_stream};
use ::header::*;
use ::mapping::SegmentedMapping;

/// MVID animation, with a File handle.
///
/// Opens and holds onto the file handle until it is dropped.  Frame
/// data is memory mapped one frame at a time, and decoded into a
/// single page-aligned pixel buffer that is reused from frame to
/// frame.
pub struct MvidFile {
    hdr: MvidHeader,
    frames: Vec<FrameEntry>,
    mapping: SegmentedMapping,

    // The frame held in `pixels`, if any.
    current: Option<usize>,
    pixels: PixelBuffer,
    verify_checksums: bool,

    filename: PathBuf,
}

/// Record containing playback information.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub struct MvidPlaybackResult {
    /// The frame now in the pixel buffer.
    pub frame: usize,
    /// False if the frame was a nop frame.
    pub changed: bool,
    pub looped: bool,
    pub ended: bool,
}

impl MvidFile {
    /// Open an MVID file.
    ///
    /// Checks the header and frame table.  Frame data is not read
    /// until the frame is requested.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    ///
    /// maxvid::MvidFile::open(Path::new("ex.mvid"));
    /// ```
    pub fn open(filename: &Path)
            -> MvResult<Self> {
        if !filename.exists() {
            return Err(MvError::NoFile);
        } else if !filename.is_file() {
            return Err(MvError::NotARegularFile);
        }

        let mut file = File::open(filename)?;

        let hdr = read_mvid_header(&mut file)?;
        if hdr.data_offset() > file.metadata()?.len() {
            return Err(MvError::BadFrameTable(hdr.frame_count as usize));
        }

        let frames = read_frame_table(&mut file, &hdr)?;
        let pixels = PixelBuffer::new(hdr.w as usize, hdr.h as usize, hdr.depth)?;
        let mapping = SegmentedMapping::from_file(file)?;

        debug!("{}: {}x{} {} bpp, {} frames, version {}",
                filename.to_string_lossy(), hdr.w, hdr.h, hdr.depth.bpp(),
                hdr.frame_count, hdr.version);

        Ok(MvidFile {
            hdr: hdr,
            frames: frames,
            mapping: mapping,
            current: None,
            pixels: pixels,
            verify_checksums: true,
            filename: filename.to_path_buf(),
        })
    }

    /// Get the frame count, including nop frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn width(&self) -> u32 {
        self.hdr.w
    }

    pub fn height(&self) -> u32 {
        self.hdr.h
    }

    pub fn depth(&self) -> Depth {
        self.hdr.depth
    }

    pub fn version(&self) -> u16 {
        self.hdr.version
    }

    /// Nominal seconds each frame is displayed.
    pub fn frame_duration(&self) -> f64 {
        self.hdr.frame_duration
    }

    pub fn is_all_keyframes(&self) -> bool {
        self.hdr.is_all_keyframes()
    }

    pub fn has_delta_frames(&self) -> bool {
        self.hdr.has_delta_frames()
    }

    pub fn is_page_aligned(&self) -> bool {
        self.hdr.is_page_aligned()
    }

    /// Get a frame table entry.
    pub fn frame_entry(&self, index: usize) -> Option<&FrameEntry> {
        self.frames.get(index)
    }

    /// Seconds to display the given frame.
    pub fn frame_display_duration(&self, index: usize) -> Option<f64> {
        self.frames.get(index)
            .map(|f| self.hdr.frame_duration * f.duration as f64)
    }

    /// The frame currently held in the pixel buffer.
    pub fn current_frame(&self) -> Option<usize> {
        self.current
    }

    /// The pixel buffer.
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Enable or disable checking decoded frames against their
    /// recorded checksums.  Enabled by default.
    pub fn set_verify_checksums(&mut self, verify: bool) {
        self.verify_checksums = verify;
    }

    /// Reset to before the first frame.
    pub fn rewind(&mut self) {
        self.current = None;
    }

    /// Decode a frame.
    ///
    /// A keyframe can always be decoded.  A delta or nop frame can only
    /// be decoded directly after the frame before it; use
    /// `seek_frame` to get to any frame.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    ///
    /// if let Ok(ref mut mvid) = maxvid::MvidFile::open(Path::new("ex.mvid")) {
    ///     for i in 0..mvid.frame_count() {
    ///         let pixels = mvid.frame(i);
    ///     }
    /// }
    /// ```
    pub fn frame(&mut self, index: usize)
            -> MvResult<&PixelBuffer> {
        if index >= self.frames.len() {
            return Err(MvError::NoSuchFrame(index));
        }
        if self.current == Some(index) {
            return Ok(&self.pixels);
        }

        let kind = self.frames[index].kind;
        if kind != FrameKind::Keyframe
                && (index == 0 || self.current != Some(index - 1)) {
            return Err(MvError::NotDecoded(index));
        }

        if kind != FrameKind::Nop {
            if let Err(e) = self.decode(index) {
                warn!("{}: frame {} - {}", self.filename.to_string_lossy(), index, e);
                return Err(e);
            }
        }

        self.current = Some(index);
        Ok(&self.pixels)
    }

    /// Decode any frame, starting from the most recent keyframe
    /// unless the current frame is already on the way.
    pub fn seek_frame(&mut self, index: usize)
            -> MvResult<&PixelBuffer> {
        if index >= self.frames.len() {
            return Err(MvError::NoSuchFrame(index));
        }

        let key = (0..(index + 1)).rev()
            .find(|&i| self.frames[i].kind == FrameKind::Keyframe)
            .unwrap_or(0);

        let start = match self.current {
            Some(cur) if key <= cur && cur <= index => cur + 1,
            _ => key,
        };

        for i in start..(index + 1) {
            self.frame(i)?;
        }

        self.frame(index)
    }

    /// Decode the next frame.
    ///
    /// The animation will loop when it reaches the last frame.
    ///
    /// Returns a record indicating what was processed.
    pub fn read_next_frame(&mut self)
            -> MvResult<MvidPlaybackResult> {
        let count = self.frames.len();
        let (next, looped) = match self.current {
            None => (0, false),
            Some(cur) if cur + 1 >= count => (0, true),
            Some(cur) => (cur + 1, false),
        };

        let changed = looped || self.frames[next].kind != FrameKind::Nop;
        self.frame(next)?;

        Ok(MvidPlaybackResult {
            frame: next,
            changed: changed,
            looped: looped,
            ended: next + 1 >= count,
        })
    }

    /// Map and decode a keyframe or delta frame into the pixel buffer.
    fn decode(&mut self, index: usize)
            -> MvResult<()> {
        let entry = self.frames[index];
        debug_assert!(entry.kind == FrameKind::Keyframe
                || (index > 0 && self.current == Some(index - 1)));

        if entry.end() > self.mapping.file_len() {
            return Err(MvError::Truncated);
        }

        let seg = self.mapping.map(entry.offset, entry.length as usize)?;
        let src = match seg.as_slice() {
            Some(src) => src,
            None => return Err(MvError::Truncated),
        };

        // Check the whole stream first, so a bad frame leaves the
        // previous frame intact.
        validate_stream(self.hdr.depth, src, self.hdr.num_pixels())?;

        if let Err(e) = decode_frame(self.hdr.depth, src, &mut self.pixels) {
            self.current = None;
            return Err(e);
        }

        if let (true, Some(expected)) = (self.verify_checksums, entry.checksum) {
            let actual = self.pixels.adler32();
            if actual != expected {
                self.current = None;
                return Err(MvError::ChecksumMismatch(index, expected, actual));
            }
        }

        Ok(())
    }
}
