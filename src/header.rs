//! MVID header and frame table.

use std::io::{Cursor,Read,Write};
use byteorder::LittleEndian as LE;
use byteorder::{ReadBytesExt,WriteBytesExt};

use ::{Depth,MvError,MvResult};

/// Magic for an MVID file, "MVID".
///
/// An MVID file begins with a 64-byte header, followed by the frame
/// table, followed by the instruction stream of each frame.  All
/// lengths and offsets are in bytes, and all values are
/// little-endian.
///
///   Offset | Length |    Name    | Description
///   ------:| ------:|:----------:| -----------------------------------
///        0 |      4 |    magic   | File format identifier.  Always "MVID".
///        4 |      2 |   version  | 2 for contiguous frame data, 3 for page-aligned frame data.
///        6 |      2 |    depth   | Bits per pixel: 16, 24 or 32.
///        8 |      4 |    width   | Frame width in pixels.
///       12 |      4 |   height   | Frame height in pixels.
///       16 |      4 |   frames   | Number of frames, including nop frames.
///       20 |      4 |    flags   | See MVID_FLAG_*.
///       24 |      8 |  duration  | Nominal seconds each frame is displayed, as an f64.
///       32 |      4 |  page size | Page size frame data was aligned to, or 0 for version 2.
///       36 |      4 | table size | Number of frame table entries reserved on disk.
///       40 |     24 |  reserved  | Unused space, set to zeroes.
pub const MVID_MAGIC: u32 = 0x4449564D;

/// Version with frame data packed back to back.
pub const MVID_VERSION_2: u16 = 2;

/// Version with each frame's data starting on a page boundary.
pub const MVID_VERSION_3: u16 = 3;

/// Every frame is a keyframe or a nop frame.
pub const MVID_FLAG_ALL_KEYFRAMES: u32 = 0x1;

/// At least one frame is a delta frame.
pub const MVID_FLAG_DELTAS: u32 = 0x2;

/// Set once the frame table has been written and the header updated.
/// This indicates that the file was properly finished and closed.
pub const MVID_FLAG_FINISHED: u32 = 0x4;

/// Size of an MVID file header on disk.
pub const SIZE_OF_MVID_HEADER: usize = 64;

/// Size of a frame table entry on disk.
///
/// The frame table immediately follows the header.  Each entry is
/// formatted as follows:
///
///   Offset | Length |   Name   | Description
///   ------:| ------:|:--------:| -----------------------------------
///        0 |      8 |  offset  | Offset from the beginning of the file to the frame's instruction stream.
///        8 |      4 |  length  | Length of the instruction stream.  0 for a nop frame.
///       12 |      4 | checksum | Adler-32 of the decoded frame, if flagged.
///       16 |      1 |   kind   | 0 keyframe, 1 delta frame, 2 nop frame.
///       17 |      1 |   flags  | Bit 0 set if the checksum is present.
///       18 |      2 | reserved | Unused word, set to 0.
///       20 |      4 | duration | Number of nominal frame durations to display the frame for.
pub const SIZE_OF_FRAME_ENTRY: usize = 24;

const FRAME_FLAG_CHECKSUM: u8 = 0x1;

/// MVID header.
#[derive(Clone,Debug,PartialEq)]
pub struct MvidHeader {
    pub version: u16,
    pub depth: Depth,
    pub w: u32,
    pub h: u32,
    pub frame_count: u32,
    pub flags: u32,
    pub frame_duration: f64,
    pub page_size: u32,
    pub table_size: u32,
}

/// How a frame is stored.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub enum FrameKind {
    /// Decodes on its own.
    Keyframe,
    /// Decodes on top of the previous frame.
    Delta,
    /// No data; the previous frame is shown again.
    Nop,
}

/// Frame table entry.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub struct FrameEntry {
    pub kind: FrameKind,
    pub offset: u64,
    pub length: u32,
    pub checksum: Option<u32>,
    pub duration: u32,
}

/*--------------------------------------------------------------*/

impl MvidHeader {
    /// A header for a new, empty file.
    pub fn new(w: u32, h: u32, depth: Depth, frame_duration: f64)
            -> Self {
        MvidHeader {
            version: MVID_VERSION_3,
            depth: depth,
            w: w,
            h: h,
            frame_count: 0,
            flags: 0,
            frame_duration: frame_duration,
            page_size: 0,
            table_size: 0,
        }
    }

    pub fn is_page_aligned(&self) -> bool {
        self.version == MVID_VERSION_3
    }

    pub fn is_all_keyframes(&self) -> bool {
        self.flags & MVID_FLAG_ALL_KEYFRAMES != 0
    }

    pub fn has_delta_frames(&self) -> bool {
        self.flags & MVID_FLAG_DELTAS != 0
    }

    pub fn is_finished(&self) -> bool {
        self.flags & MVID_FLAG_FINISHED != 0
    }

    /// Number of pixels in each frame.
    pub fn num_pixels(&self) -> usize {
        self.w as usize * self.h as usize
    }

    /// Size in bytes of a decoded frame.
    pub fn frame_size(&self) -> Option<usize> {
        self.depth.frame_size(self.w as usize, self.h as usize)
    }

    /// Offset of the first byte after the reserved frame table.
    pub fn data_offset(&self) -> u64 {
        SIZE_OF_MVID_HEADER as u64
            + self.table_size as u64 * SIZE_OF_FRAME_ENTRY as u64
    }
}

impl FrameEntry {
    /// A nop frame entry, placed at the given offset.
    pub fn nop(offset: u64) -> Self {
        FrameEntry {
            kind: FrameKind::Nop,
            offset: offset,
            length: 0,
            checksum: None,
            duration: 1,
        }
    }

    /// Offset of the first byte after the frame's data.
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

impl FrameKind {
    fn from_u8(kind: u8) -> Option<FrameKind> {
        match kind {
            0 => Some(FrameKind::Keyframe),
            1 => Some(FrameKind::Delta),
            2 => Some(FrameKind::Nop),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            FrameKind::Keyframe => 0,
            FrameKind::Delta => 1,
            FrameKind::Nop => 2,
        }
    }
}

/*--------------------------------------------------------------*/

/// Read and validate the MVID header.
pub fn read_mvid_header<R: Read>(r: &mut R)
        -> MvResult<MvidHeader> {
    let mut buf = [0; SIZE_OF_MVID_HEADER];
    r.read_exact(&mut buf)?;

    let mut r = Cursor::new(&buf[..]);
    let magic = r.read_u32::<LE>()?;
    let version = r.read_u16::<LE>()?;
    let bpp = r.read_u16::<LE>()?;
    let w = r.read_u32::<LE>()?;
    let h = r.read_u32::<LE>()?;
    let frame_count = r.read_u32::<LE>()?;
    let flags = r.read_u32::<LE>()?;
    let frame_duration = r.read_f64::<LE>()?;
    let page_size = r.read_u32::<LE>()?;
    let table_size = r.read_u32::<LE>()?;

    if magic != MVID_MAGIC {
        return Err(MvError::BadMagic);
    }
    if version != MVID_VERSION_2 && version != MVID_VERSION_3 {
        return Err(MvError::BadVersion(version));
    }

    let depth = match Depth::from_bpp(bpp) {
        Some(depth) => depth,
        None => return Err(MvError::BadDepth(bpp)),
    };

    if w == 0 || h == 0 || depth.frame_size(w as usize, h as usize).is_none() {
        return Err(MvError::WrongResolution(w as usize, h as usize));
    }
    if !(frame_duration > 0.0) || !frame_duration.is_finite() {
        return Err(MvError::BadFrameDuration);
    }
    if flags & MVID_FLAG_FINISHED == 0 {
        return Err(MvError::Unfinished);
    }
    if frame_count == 0 || frame_count > table_size {
        return Err(MvError::BadFrameTable(frame_count as usize));
    }
    if version == MVID_VERSION_3 && !page_size.is_power_of_two() {
        return Err(MvError::BadFrameTable(0));
    }

    Ok(MvidHeader {
        version: version,
        depth: depth,
        w: w,
        h: h,
        frame_count: frame_count,
        flags: flags,
        frame_duration: frame_duration,
        page_size: page_size,
        table_size: table_size,
    })
}

/// Write the MVID header.
pub fn write_mvid_header<W: Write>(hdr: &MvidHeader, w: &mut W)
        -> MvResult<()> {
    w.write_u32::<LE>(MVID_MAGIC)?;
    w.write_u16::<LE>(hdr.version)?;
    w.write_u16::<LE>(hdr.depth.bpp())?;
    w.write_u32::<LE>(hdr.w)?;
    w.write_u32::<LE>(hdr.h)?;
    w.write_u32::<LE>(hdr.frame_count)?;
    w.write_u32::<LE>(hdr.flags)?;
    w.write_f64::<LE>(hdr.frame_duration)?;
    w.write_u32::<LE>(hdr.page_size)?;
    w.write_u32::<LE>(hdr.table_size)?;
    w.write_all(&[0; 24])?; // reserved
    Ok(())
}

/// Read and validate the frame table that follows the header.
pub fn read_frame_table<R: Read>(r: &mut R, hdr: &MvidHeader)
        -> MvResult<Vec<FrameEntry>> {
    let mut frames = Vec::new();
    let mut next_offset = hdr.data_offset();

    for frame_num in 0..(hdr.frame_count as usize) {
        let mut buf = [0; SIZE_OF_FRAME_ENTRY];
        r.read_exact(&mut buf)?;

        let mut r = Cursor::new(&buf[..]);
        let offset = r.read_u64::<LE>()?;
        let length = r.read_u32::<LE>()?;
        let checksum = r.read_u32::<LE>()?;
        let kind = r.read_u8()?;
        let flags = r.read_u8()?;
        let _reserved = r.read_u16::<LE>()?;
        let duration = r.read_u32::<LE>()?;

        let kind = match FrameKind::from_u8(kind) {
            Some(kind) => kind,
            None => return Err(MvError::BadFrameTable(frame_num)),
        };

        let entry = FrameEntry {
            kind: kind,
            offset: offset,
            length: length,
            checksum: if flags & FRAME_FLAG_CHECKSUM != 0 { Some(checksum) } else { None },
            duration: duration,
        };

        if !check_frame_entry(hdr, frame_num, &entry, next_offset) {
            return Err(MvError::BadFrameTable(frame_num));
        }

        if kind != FrameKind::Nop {
            next_offset = entry.end();
        }

        frames.push(entry);
    }

    Ok(frames)
}

/// Write the frame table.
pub fn write_frame_table<W: Write>(frames: &[FrameEntry], w: &mut W)
        -> MvResult<()> {
    for entry in frames.iter() {
        let flags = if entry.checksum.is_some() { FRAME_FLAG_CHECKSUM } else { 0 };

        w.write_u64::<LE>(entry.offset)?;
        w.write_u32::<LE>(entry.length)?;
        w.write_u32::<LE>(entry.checksum.unwrap_or(0))?;
        w.write_u8(entry.kind.to_u8())?;
        w.write_u8(flags)?;
        w.write_u16::<LE>(0)?; // reserved
        w.write_u32::<LE>(entry.duration)?;
    }
    Ok(())
}

/// Check a frame table entry against the header and the end of the
/// previous frame's data.
fn check_frame_entry(hdr: &MvidHeader, frame_num: usize, entry: &FrameEntry,
        min_offset: u64)
        -> bool {
    if entry.duration == 0 {
        return false;
    }

    match entry.kind {
        FrameKind::Nop => frame_num > 0 && entry.length == 0,
        FrameKind::Keyframe | FrameKind::Delta => {
            if frame_num == 0 && entry.kind != FrameKind::Keyframe {
                return false;
            }
            if entry.length == 0 || entry.length as usize % 4 != 0 {
                return false;
            }
            if entry.offset < min_offset || entry.offset.checked_add(entry.length as u64).is_none() {
                return false;
            }
            if hdr.is_page_aligned() && entry.offset % hdr.page_size as u64 != 0 {
                return false;
            }
            true
        },
    }
}
