//! MVID file writer.

use std::fs::File;
use std::io::{self,Seek,SeekFrom,Write};
use std::path::{Path,PathBuf};

use ::{Depth,MvError,MvResult,PixelBuffer};
use ::codec::encode_frame;
use ::header::*;
use ::mapping::{page_round_up,page_size};

/// MVID animation writer, with a File handle.
///
/// Opens and holds onto the file handle until it is closed.
pub struct MvidFileWriter {
    hdr: MvidHeader,
    frames: Vec<FrameEntry>,
    data_end: u64,
    checksums: bool,

    // Copy of the last frame written, for delta encoding.
    prev: Option<PixelBuffer>,
    encode_buf: Vec<u8>,

    filename: PathBuf,
    file: Option<File>,
}

impl MvidFileWriter {
    /// Open a file for writing an MVID animation.
    ///
    /// Space is reserved for `frame_count` frame table entries.  By
    /// default the frame data is page-aligned (version 3) and each
    /// frame carries a checksum.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use maxvid::Depth;
    ///
    /// const SCREEN_W: u32 = 320;
    /// const SCREEN_H: u32 = 200;
    /// const FRAMES: u32 = 30;
    ///
    /// maxvid::MvidFileWriter::create(Path::new("ex.mvid"),
    ///         SCREEN_W, SCREEN_H, Depth::Bpp16, FRAMES, 1.0 / 15.0);
    /// ```
    pub fn create(filename: &Path, w: u32, h: u32, depth: Depth,
            frame_count: u32, frame_duration: f64)
            -> MvResult<Self> {
        if w == 0 || h == 0 || depth.frame_size(w as usize, h as usize).is_none() {
            return Err(MvError::WrongResolution(w as usize, h as usize));
        }
        if !(frame_duration > 0.0) || !frame_duration.is_finite() {
            return Err(MvError::BadFrameDuration);
        }
        if frame_count == 0 {
            return Err(MvError::NoFrames);
        }

        let mut hdr = MvidHeader::new(w, h, depth, frame_duration);
        hdr.page_size = page_size() as u32;
        hdr.table_size = frame_count;

        let mut file = File::create(filename)?;

        // Reserve space for header and frame table.
        let data_offset = hdr.data_offset();
        file.set_len(data_offset)?;
        file.seek(SeekFrom::Start(data_offset))?;

        Ok(MvidFileWriter {
            hdr: hdr,
            frames: Vec::with_capacity(frame_count as usize),
            data_end: data_offset,
            checksums: true,
            prev: None,
            encode_buf: Vec::new(),
            filename: filename.to_path_buf(),
            file: Some(file),
        })
    }

    /// Choose between page-aligned (version 3) and contiguous
    /// (version 2) frame data.  Must be set before the first frame.
    pub fn set_page_aligned(&mut self, page_aligned: bool)
            -> MvResult<()> {
        if !self.frames.is_empty() {
            return Err(MvError::WriterStarted);
        }

        if page_aligned {
            self.hdr.version = MVID_VERSION_3;
            self.hdr.page_size = page_size() as u32;
        } else {
            self.hdr.version = MVID_VERSION_2;
            self.hdr.page_size = 0;
        }
        Ok(())
    }

    /// Enable or disable per-frame checksums.  Must be set before the
    /// first frame.
    pub fn set_checksums(&mut self, checksums: bool)
            -> MvResult<()> {
        if !self.frames.is_empty() {
            return Err(MvError::WriterStarted);
        }

        self.checksums = checksums;
        Ok(())
    }

    /// Number of frames written so far, including nop frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Nominal seconds each frame is displayed.
    pub fn frame_duration(&self) -> f64 {
        self.hdr.frame_duration
    }

    /// Write a keyframe.
    ///
    /// The checksum, if enabled, is computed over the given pixels.
    pub fn write_keyframe(&mut self, pixels: &PixelBuffer)
            -> MvResult<()> {
        self.check_frame(pixels)?;

        let checksum = if self.checksums { Some(pixels.adler32()) } else { None };

        self.encode_buf.clear();
        encode_frame(self.hdr.depth, None, pixels, &mut self.encode_buf)?;

        self.append_frame(FrameKind::Keyframe, checksum)?;
        self.remember(pixels)
    }

    /// Write a delta frame against the previously written frame.
    ///
    /// If checksums are enabled, `checksum` is recorded for the frame,
    /// or if None, computed over the given pixels.  A frame identical
    /// to the previous one is written as a nop frame.
    pub fn write_deltaframe(&mut self, pixels: &PixelBuffer, checksum: Option<u32>)
            -> MvResult<()> {
        self.check_frame(pixels)?;

        let unchanged = match self.prev {
            Some(ref prev) => prev == pixels,
            None => return Err(MvError::NoPreviousFrame),
        };

        if unchanged {
            debug!("frame {} unchanged, writing nop frame", self.frames.len());
            return self.write_nop_frame();
        }

        let checksum = if self.checksums {
            Some(checksum.unwrap_or_else(|| pixels.adler32()))
        } else {
            None
        };

        self.encode_buf.clear();
        encode_frame(self.hdr.depth, self.prev.as_ref(), pixels, &mut self.encode_buf)?;

        self.append_frame(FrameKind::Delta, checksum)?;
        self.remember(pixels)
    }

    /// Write the next frame, choosing how to store it.
    ///
    /// The first frame is always a keyframe.  After that, a frame is
    /// stored as a delta frame unless a keyframe would be no larger,
    /// or as a nop frame if nothing changed.
    pub fn write_frame(&mut self, pixels: &PixelBuffer)
            -> MvResult<FrameKind> {
        self.check_frame(pixels)?;

        let kind = match self.prev {
            None => FrameKind::Keyframe,
            Some(ref prev) if prev == pixels => FrameKind::Nop,
            Some(ref prev) => {
                let depth = self.hdr.depth;
                let delta_size = encode_frame(depth, Some(prev), pixels, &mut io::sink())?;
                let key_size = encode_frame(depth, None, pixels, &mut io::sink())?;
                if key_size <= delta_size { FrameKind::Keyframe } else { FrameKind::Delta }
            },
        };

        match kind {
            FrameKind::Keyframe => self.write_keyframe(pixels)?,
            FrameKind::Delta => self.write_deltaframe(pixels, None)?,
            FrameKind::Nop => self.write_nop_frame()?,
        }

        Ok(kind)
    }

    /// Write a nop frame, which repeats the previous frame.
    pub fn write_nop_frame(&mut self)
            -> MvResult<()> {
        if self.prev.is_none() {
            return Err(MvError::NoPreviousFrame);
        }
        if self.frames.len() >= self.hdr.table_size as usize {
            return Err(MvError::ExceededLimit);
        }

        self.frames.push(FrameEntry::nop(self.data_end));
        Ok(())
    }

    /// Display the last frame written for `multiplier` nominal frame
    /// durations.  Files that must play back on readers that ignore
    /// the multiplier should use nop frames instead.
    pub fn set_last_frame_duration(&mut self, multiplier: u32)
            -> MvResult<()> {
        if multiplier == 0 {
            return Err(MvError::BadFrameDuration);
        }

        match self.frames.last_mut() {
            Some(entry) => {
                entry.duration = multiplier;
                Ok(())
            },
            None => Err(MvError::NoPreviousFrame),
        }
    }

    /// Number of nop frames needed after a frame displayed for
    /// `current_duration`, to fit a stream of `frame_duration` frames.
    ///
    /// The frame itself accounts for one nominal duration.
    ///
    /// # Examples
    ///
    /// ```
    /// use maxvid::MvidFileWriter;
    ///
    /// assert_eq!(MvidFileWriter::count_trailing_nop_frames(0.3, 0.1), 2);
    /// assert_eq!(MvidFileWriter::count_trailing_nop_frames(0.1, 0.1), 0);
    /// ```
    pub fn count_trailing_nop_frames(current_duration: f64, frame_duration: f64)
            -> usize {
        if !(frame_duration > 0.0) || !(current_duration > 0.0) {
            return 0;
        }

        let n = (current_duration / frame_duration).round();
        if n.is_finite() && n > 1.0 {
            n as usize - 1
        } else {
            0
        }
    }

    /// Write the nop frames needed after a frame displayed for
    /// `current_duration`.
    ///
    /// Returns the number of nop frames written.
    pub fn write_trailing_nop_frames(&mut self, current_duration: f64)
            -> MvResult<usize> {
        let n = MvidFileWriter::count_trailing_nop_frames(
                current_duration, self.hdr.frame_duration);

        for _ in 0..n {
            self.write_nop_frame()?;
        }
        Ok(n)
    }

    /// Close the MVID file.
    ///
    /// You must close the MVID writer after you have supplied all the
    /// frames, to write out the header and frame table.
    ///
    /// The MVID writer is not usable after being closed.
    pub fn close(mut self)
            -> MvResult<()> {
        if let Some(mut file) = self.file.take() {
            if self.frames.is_empty() {
                return Err(MvError::NoFrames);
            }

            self.rewrite_header(&mut file)?;
            file.flush()?;
            Ok(())
        } else {
            Err(MvError::NoFile)
        }
    }

    /// Write the final frame count, flags and frame table over the
    /// space reserved at the start of the file.
    fn rewrite_header(&mut self, file: &mut File)
            -> MvResult<()> {
        let has_deltas = self.frames.iter().any(|f| f.kind == FrameKind::Delta);

        self.hdr.frame_count = self.frames.len() as u32;
        self.hdr.flags = MVID_FLAG_FINISHED
            | if has_deltas { MVID_FLAG_DELTAS } else { MVID_FLAG_ALL_KEYFRAMES };

        let mut buf = Vec::with_capacity(SIZE_OF_MVID_HEADER
                + self.frames.len() * SIZE_OF_FRAME_ENTRY);
        write_mvid_header(&self.hdr, &mut buf)?;
        write_frame_table(&self.frames, &mut buf)?;

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;

        debug!("{}: {} frames, {} bytes of frame data",
                self.filename.to_string_lossy(),
                self.frames.len(), self.data_end - self.hdr.data_offset());
        Ok(())
    }

    /// Check a frame's geometry, and that there is room in the table.
    fn check_frame(&self, pixels: &PixelBuffer)
            -> MvResult<()> {
        if pixels.width() != self.hdr.w as usize
                || pixels.height() != self.hdr.h as usize
                || pixels.depth() != self.hdr.depth {
            return Err(MvError::WrongBufferSize);
        }
        if self.frames.len() >= self.hdr.table_size as usize {
            return Err(MvError::ExceededLimit);
        }
        Ok(())
    }

    /// Append the encoded frame in `encode_buf` to the file.
    fn append_frame(&mut self, kind: FrameKind, checksum: Option<u32>)
            -> MvResult<()> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(MvError::NoFile),
        };

        if self.encode_buf.len() > ::std::u32::MAX as usize {
            return Err(MvError::ExceededLimit);
        }

        let offset = if self.hdr.is_page_aligned() {
            page_round_up(self.data_end)
        } else {
            self.data_end
        };

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&self.encode_buf)?;

        trace!("frame {}: {:?} at {}, {} bytes",
                self.frames.len(), kind, offset, self.encode_buf.len());

        self.data_end = offset + self.encode_buf.len() as u64;
        self.frames.push(FrameEntry {
            kind: kind,
            offset: offset,
            length: self.encode_buf.len() as u32,
            checksum: checksum,
            duration: 1,
        });
        Ok(())
    }

    /// Keep a copy of the frame just written.
    fn remember(&mut self, pixels: &PixelBuffer)
            -> MvResult<()> {
        match self.prev {
            Some(ref mut prev) => return prev.copy_from(pixels),
            None => (),
        }

        self.prev = Some(pixels.clone());
        Ok(())
    }
}

impl Drop for MvidFileWriter {
    /// A method called when the value goes out of scope.
    fn drop(&mut self) {
        if self.file.is_some() {
            warn!("{} was not closed, may be corrupt.",
                    self.filename.to_string_lossy());
        }
    }
}
