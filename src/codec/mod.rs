//! maxvid encoding and decoding subroutines.
//!
//! A frame is stored as a stream of little-endian 32-bit words
//! holding instructions that skip, duplicate or copy pixels, starting
//! at the top-left pixel and moving left-to-right, top-to-bottom.
//! Two word layouts exist: one for 16 bpp pixels (see `codec16`) and
//! one for 24 and 32 bpp pixels (see `codec32`).
//!
//! Every stream ends with a Done instruction followed by one zero
//! padding word, and the instructions must cover exactly
//! width x height pixels.

macro_rules! module {
    ($e:ident) => {
        pub use self::$e::*;
        mod $e;
    };
}

use std::io::Write;
use byteorder::{ByteOrder,LittleEndian as LE};

use ::{Depth,MvError,MvResult,PixelBuffer};

module!(codec16);
module!(codec32);

/// Opcode: advance without writing.
pub const MV_SKIP: u32 = 0;

/// Opcode: write one pixel value `count` times.
pub const MV_DUP: u32 = 1;

/// Opcode: write `count` literal pixels.
pub const MV_COPY: u32 = 2;

/// Opcode: end of stream.
pub const MV_DONE: u32 = 3;

/// Size of a code word on disk.
pub const SIZE_OF_WORD: usize = 4;

/// A parsed instruction.
///
/// In the 24/32 bpp layout Dup and Copy carry a fused `skip_after`
/// count of pixels to advance once the instruction is done; it is
/// always 0 for 16 bpp.  A 24/32 bpp Skip's own skip-after is folded
/// into its count.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub enum Instruction<'a> {
    Skip(usize),
    Dup {
        count: usize,
        pixel: u32,
        skip_after: usize,
    },
    Copy {
        count: usize,
        skip_after: usize,
        // Little-endian pixels, 2 or 4 bytes each.
        payload: &'a [u8],
    },
    Done,
}

/// Per-stream counts gathered while walking an instruction stream.
#[derive(Clone,Copy,Debug,Default,Eq,PartialEq)]
pub struct StreamStats {
    pub skips: usize,
    pub dups: usize,
    pub copies: usize,
    /// Pixels advanced over without writing, including skip-after.
    pub skipped: usize,
    /// Pixels written by Dup and Copy.
    pub written: usize,
}

/// An iterator over the instructions of a stream.
///
/// Yields each instruction up to and including Done, or stops after
/// the first error.
pub struct Instructions<'a> {
    depth: Depth,
    src: &'a [u8],
    pos: usize,
    finished: bool,
}

/*--------------------------------------------------------------*/

/// Pixel storage types the codec works on.
trait Pixel: Copy + Eq {
    /// Bytes per pixel in a Copy payload.
    const SIZE: usize;

    fn from_word(w: u32) -> Self;

    fn read_le(buf: &[u8]) -> Self;
}

impl Pixel for u16 {
    const SIZE: usize = 2;

    fn from_word(w: u32) -> Self {
        w as u16
    }

    fn read_le(buf: &[u8]) -> Self {
        LE::read_u16(buf)
    }
}

impl Pixel for u32 {
    const SIZE: usize = 4;

    fn from_word(w: u32) -> Self {
        w
    }

    fn read_le(buf: &[u8]) -> Self {
        LE::read_u32(buf)
    }
}

/// Result of a GroupByRuns operation: a grouping type, start index,
/// and length.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
enum Group {
    /// Pixels unchanged from the previous frame.
    Same(usize, usize),
    /// Changed pixels that all share one value.
    Diff(usize, usize),
}

/// An iterator that groups the two buffers into runs.  A run is a
/// length of the buffer where the corresponding elements of the
/// "old" and "new" buffers are the same, or a stretch of changed
/// elements of the "new" buffer that all have the same value.
///
/// Without an "old" buffer every element counts as changed.
struct GroupByRuns<'a, P: 'a> {
    old: Option<&'a [P]>,
    new: &'a [P],
    idx: usize,
}

/// An encoder packet, before it is laid out in words.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
enum Packet {
    Skip(usize),
    /// Start index and length.
    Dup(usize, usize),
    /// Start index and length.
    Copy(usize, usize),
}

/*--------------------------------------------------------------*/

/// Decode a frame's instruction stream into the buffer.
///
/// For a delta frame the buffer must hold the previous frame; skipped
/// pixels are left as they are.
pub fn decode_frame(depth: Depth, src: &[u8], dst: &mut PixelBuffer)
        -> MvResult<StreamStats> {
    if dst.depth() != depth {
        return Err(MvError::WrongBufferSize);
    }

    match depth {
        Depth::Bpp16 => decode_mv16(src, dst.as_u16_mut()),
        Depth::Bpp24 | Depth::Bpp32 => decode_mv32(src, dst.as_u32_mut()),
    }
}

/// Check an instruction stream without decoding it.
///
/// Performs every check the decoder does, so a stream that passes
/// will decode without error into a buffer of `num_pixels` pixels.
pub fn validate_stream(depth: Depth, src: &[u8], num_pixels: usize)
        -> MvResult<StreamStats> {
    walk(depth, src, num_pixels, |_, _| ())
}

/// Encode a frame, writing the instruction stream to `w`.
///
/// With no previous frame this is a keyframe and every pixel is
/// written.  Otherwise pixels equal to the previous frame are
/// skipped.
///
/// Returns the number of bytes written.
pub fn encode_frame<W: Write>(
        depth: Depth, prev: Option<&PixelBuffer>, next: &PixelBuffer, w: &mut W)
        -> MvResult<usize> {
    if next.depth() != depth {
        return Err(MvError::WrongBufferSize);
    }
    if let Some(prev) = prev {
        if !prev.same_geometry(next) {
            return Err(MvError::WrongBufferSize);
        }
    }

    match depth {
        Depth::Bpp16 => encode_mv16(prev.map(|p| p.as_u16()), next.as_u16(), w),
        Depth::Bpp24 | Depth::Bpp32 => encode_mv32(prev.map(|p| p.as_u32()), next.as_u32(), w),
    }
}

/// Iterate over the instructions of a stream.
pub fn instructions(depth: Depth, src: &[u8])
        -> MvResult<Instructions> {
    if src.len() % SIZE_OF_WORD != 0 {
        return Err(MvError::Truncated);
    }

    Ok(Instructions {
        depth: depth,
        src: src,
        pos: 0,
        finished: false,
    })
}

/*--------------------------------------------------------------*/

impl<'a> Instruction<'a> {
    /// Number of pixels this instruction moves past.
    pub fn advance(&self) -> usize {
        match *self {
            Instruction::Skip(n) => n,
            Instruction::Dup { count, skip_after, .. } => count + skip_after,
            Instruction::Copy { count, skip_after, .. } => count + skip_after,
            Instruction::Done => 0,
        }
    }
}

impl StreamStats {
    /// Number of instructions, not counting Done.
    pub fn instructions(&self) -> usize {
        self.skips + self.dups + self.copies
    }
}

impl<'a> Instructions<'a> {
    /// Word offset of the next instruction.
    pub fn word_offset(&self) -> usize {
        self.pos / SIZE_OF_WORD
    }

    /// Check the padding word that follows Done.
    pub fn finish(&mut self)
            -> MvResult<()> {
        match next_word(self.src, &mut self.pos)? {
            0 => Ok(()),
            _ => Err(MvError::BadPadding),
        }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = MvResult<Instruction<'a>>;

    /// Advances the iterator and returns the next value.
    fn next(&mut self) -> Option<MvResult<Instruction<'a>>> {
        if self.finished {
            return None;
        }

        let res = match self.depth {
            Depth::Bpp16 => read_mv16(self.src, &mut self.pos),
            Depth::Bpp24 | Depth::Bpp32 => read_mv32(self.src, &mut self.pos),
        };

        match res {
            Ok(Instruction::Done) | Err(_) => self.finished = true,
            Ok(_) => (),
        }

        Some(res)
    }
}

impl<'a, P: Pixel> GroupByRuns<'a, P> {
    /// Create a new GroupByRuns iterator.
    fn new(old: Option<&'a [P]>, new: &'a [P]) -> Self {
        if let Some(old) = old {
            assert_eq!(old.len(), new.len());
        }

        GroupByRuns {
            old: old,
            new: new,
            idx: 0,
        }
    }

    fn unchanged(&self, i: usize) -> bool {
        match self.old {
            Some(old) => old[i] == self.new[i],
            None => false,
        }
    }
}

impl<'a, P: Pixel> Iterator for GroupByRuns<'a, P> {
    type Item = Group;

    /// Advances the iterator and returns the next value.
    fn next(&mut self) -> Option<Group> {
        let len = self.new.len();
        let start = self.idx;
        let mut i = self.idx;

        if i >= len {
            return None;
        } else if self.unchanged(i) {
            while (i < len) && self.unchanged(i) {
                i = i + 1;
            }

            self.idx = i;
            return Some(Group::Same(start, i - start));
        } else {
            let c = self.new[start];
            while (i < len) && !self.unchanged(i) && (self.new[i] == c) {
                i = i + 1;
            }

            self.idx = i;
            return Some(Group::Diff(start, i - start));
        }
    }
}

/*--------------------------------------------------------------*/

/// Read the next little-endian word.
fn next_word(src: &[u8], pos: &mut usize)
        -> MvResult<u32> {
    if *pos + SIZE_OF_WORD > src.len() {
        return Err(MvError::Truncated);
    }

    let w = LE::read_u32(&src[*pos..]);
    *pos = *pos + SIZE_OF_WORD;
    Ok(w)
}

/// Check that a run of `n` pixels starting at `idx` fits in the frame.
fn check_run(idx: usize, n: usize, num_pixels: usize, word_offset: usize)
        -> MvResult<usize> {
    match idx.checked_add(n) {
        Some(end) if end <= num_pixels => Ok(end),
        _ => Err(MvError::Overrun(word_offset)),
    }
}

/// Walk a stream, checking bounds and calling `apply` with each Dup
/// or Copy instruction and the pixel index it starts at.
fn walk<'a, F>(depth: Depth, src: &'a [u8], num_pixels: usize, mut apply: F)
        -> MvResult<StreamStats>
        where F: FnMut(&Instruction<'a>, usize) {
    let mut iter = instructions(depth, src)?;
    let mut stats = StreamStats::default();
    let mut idx = 0;

    loop {
        let at = iter.word_offset();
        let ins = match iter.next() {
            Some(res) => res?,
            None => return Err(MvError::Truncated),
        };

        match ins {
            Instruction::Done => break,
            Instruction::Skip(n) => {
                idx = check_run(idx, n, num_pixels, at)?;
                stats.skips = stats.skips + 1;
                stats.skipped = stats.skipped + n;
            },
            Instruction::Dup { count, skip_after, .. }
                    | Instruction::Copy { count, skip_after, .. } => {
                let end = check_run(idx, count + skip_after, num_pixels, at)?;
                apply(&ins, idx);

                if let Instruction::Dup { .. } = ins {
                    stats.dups = stats.dups + 1;
                } else {
                    stats.copies = stats.copies + 1;
                }
                stats.written = stats.written + count;
                stats.skipped = stats.skipped + skip_after;
                idx = end;
            },
        }
    }

    iter.finish()?;

    if idx != num_pixels {
        return Err(MvError::Underrun(num_pixels, idx));
    }

    Ok(stats)
}

/// Decode a stream into a slice of pixels.
fn decode_pixels<P: Pixel>(depth: Depth, src: &[u8], dst: &mut [P])
        -> MvResult<StreamStats> {
    let num_pixels = dst.len();
    walk(depth, src, num_pixels, |ins, idx| {
        match *ins {
            Instruction::Dup { count, pixel, .. } => {
                let c = P::from_word(pixel);
                for e in &mut dst[idx..(idx + count)] {
                    *e = c;
                }
            },
            Instruction::Copy { count, payload, .. } => {
                let pixels = payload.chunks(P::SIZE);
                for (e, s) in dst[idx..(idx + count)].iter_mut().zip(pixels) {
                    *e = P::read_le(s);
                }
            },
            Instruction::Skip(..) | Instruction::Done => (),
        }
    })
}

/// Group the frame into packets, each no longer than the given
/// limits.
///
/// Runs of two or more identical changed pixels become Dup packets;
/// lone changed pixels are gathered into Copy packets.
fn plan_packets<P: Pixel>(
        prev: Option<&[P]>, next: &[P], max_count: usize, max_skip: usize)
        -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut copy: Option<(usize, usize)> = None;

    for g in GroupByRuns::new(prev, next) {
        match g {
            Group::Same(_, len) => {
                flush_copy(&mut copy, max_count, &mut packets);

                let mut len = len;
                while len > 0 {
                    let l = ::std::cmp::min(len, max_skip);
                    packets.push(Packet::Skip(l));
                    len = len - l;
                }
            },
            Group::Diff(idx, len) if len >= 2 => {
                flush_copy(&mut copy, max_count, &mut packets);

                let mut idx = idx;
                let mut len = len;
                while len > 0 {
                    let l = ::std::cmp::min(len, max_count);
                    packets.push(Packet::Dup(idx, l));
                    idx = idx + l;
                    len = len - l;
                }
            },
            Group::Diff(idx, _) => {
                copy = match copy {
                    Some((start, len)) => Some((start, len + 1)),
                    None => Some((idx, 1)),
                };
            },
        }
    }

    flush_copy(&mut copy, max_count, &mut packets);
    packets
}

fn flush_copy(copy: &mut Option<(usize, usize)>, max_count: usize,
        packets: &mut Vec<Packet>) {
    if let Some((mut idx, mut len)) = copy.take() {
        while len > 0 {
            let l = ::std::cmp::min(len, max_count);
            packets.push(Packet::Copy(idx, l));
            idx = idx + l;
            len = len - l;
        }
    }
}

#[cfg(test)]
mod tests {
    use ::{Depth,MvError,PixelBuffer};
    use super::*;
    use super::{Group,GroupByRuns,Packet,plan_packets};

    /// Deterministic test pattern with runs and noise.
    fn pattern(n: usize, seed: u32) -> Vec<u32> {
        let mut x = seed;
        (0..n).map(|i| {
            x = x.wrapping_mul(1103515245).wrapping_add(12345);
            if (i / 7) % 3 == 0 { 0xFF00FF } else { (x >> 8) & 0xFFFFFF }
        }).collect()
    }

    fn buffer(w: usize, h: usize, depth: Depth, seed: u32) -> PixelBuffer {
        let pixels = pattern(w * h, seed);
        match depth {
            Depth::Bpp16 => {
                let p: Vec<u16> = pixels.iter().map(|&x| x as u16).collect();
                PixelBuffer::from_u16(w, h, &p).expect("buf")
            },
            _ => PixelBuffer::from_u32(w, h, depth, &pixels).expect("buf"),
        }
    }

    fn encode(depth: Depth, prev: Option<&PixelBuffer>, next: &PixelBuffer) -> Vec<u8> {
        let mut enc = Vec::new();
        let size = encode_frame(depth, prev, next, &mut enc).expect("encode");
        assert_eq!(size, enc.len());
        enc
    }

    #[test]
    fn test_group_by_runs() {
        let xs = [ 1u16, 2, 3, 4, 5, 6, 7, 8, 9 ];
        let ys = [ 2u16, 1, 3, 4, 5, 0, 0, 0, 9 ];
        let expected = [
            Group::Diff(0, 1), Group::Diff(1, 1), Group::Same(2, 3),
            Group::Diff(5, 3), Group::Same(8, 1) ];

        let gs: Vec<Group> = GroupByRuns::new(Some(&xs[..]), &ys).collect();
        assert_eq!(&gs[..], expected);
    }

    #[test]
    fn test_group_by_runs_keyframe() {
        let ys = [ 7u32, 7, 3, 3, 3, 1 ];
        let expected = [ Group::Diff(0, 2), Group::Diff(2, 3), Group::Diff(5, 1) ];

        let gs: Vec<Group> = GroupByRuns::new(None, &ys).collect();
        assert_eq!(&gs[..], expected);
    }

    #[test]
    fn test_plan_packets() {
        let xs = [ 0u16, 0, 0, 0, 0, 0, 0, 0, 0, 0 ];
        let ys = [ 0u16, 0, 1, 2, 3, 5, 5, 5, 0, 0 ];
        let expected = [
            Packet::Skip(2), Packet::Copy(2, 3), Packet::Dup(5, 3), Packet::Skip(2) ];

        let ps = plan_packets(Some(&xs[..]), &ys, 100, 100);
        assert_eq!(&ps[..], expected);
    }

    #[test]
    fn test_plan_packets_split() {
        let ys = [ 4u16; 10 ];
        let ps = plan_packets(None, &ys, 4, 4);
        assert_eq!(&ps[..], [ Packet::Dup(0, 4), Packet::Dup(4, 4), Packet::Dup(8, 2) ]);

        let ys = [ 1u16, 2, 3, 4, 5, 6 ];
        let ps = plan_packets(None, &ys, 4, 4);
        assert_eq!(&ps[..], [ Packet::Copy(0, 4), Packet::Copy(4, 2) ]);
    }

    #[test]
    fn test_keyframe_round_trip() {
        for &depth in &[ Depth::Bpp16, Depth::Bpp24, Depth::Bpp32 ] {
            let next = buffer(37, 23, depth, 1);
            let enc = encode(depth, None, &next);

            let mut dst = PixelBuffer::new(37, 23, depth).expect("dst");
            let stats = decode_frame(depth, &enc, &mut dst).expect("decode");
            assert_eq!(dst, next);
            assert_eq!(stats.skips, 0);
            assert_eq!(stats.written, 37 * 23);
        }
    }

    #[test]
    fn test_delta_round_trip() {
        for &depth in &[ Depth::Bpp16, Depth::Bpp24, Depth::Bpp32 ] {
            let prev = buffer(40, 30, depth, 2);
            let mut next = prev.clone();
            {
                let bytes = next.as_bytes_mut();
                for i in (0..bytes.len()).filter(|i| i % 37 < 5 || (i / 400) == 2) {
                    bytes[i] = bytes[i].wrapping_add(1);
                }
            }

            let enc = encode(depth, Some(&prev), &next);
            let mut dst = prev.clone();
            decode_frame(depth, &enc, &mut dst).expect("decode");
            assert_eq!(dst, next);
        }
    }

    #[test]
    fn test_delta_smaller_than_keyframe() {
        let prev = buffer(64, 64, Depth::Bpp32, 3);
        let mut next = prev.clone();
        next.as_u32_mut()[100] = 0x123456;

        let key = encode(Depth::Bpp32, None, &next);
        let delta = encode(Depth::Bpp32, Some(&prev), &next);
        assert!(delta.len() < key.len());
    }

    #[test]
    fn test_instruction_count_invariant() {
        for &depth in &[ Depth::Bpp16, Depth::Bpp32 ] {
            let prev = buffer(50, 20, depth, 4);
            let next = buffer(50, 20, depth, 5);
            let enc = encode(depth, Some(&prev), &next);

            let mut total = 0;
            let mut dones = 0;
            for ins in instructions(depth, &enc).expect("stream") {
                let ins = ins.expect("instruction");
                if ins == Instruction::Done {
                    dones = dones + 1;
                }
                total = total + ins.advance();
            }
            assert_eq!(total, 50 * 20);
            assert_eq!(dones, 1);

            let stats = validate_stream(depth, &enc, 50 * 20).expect("valid");
            assert_eq!(stats.skipped + stats.written, 50 * 20);
        }
    }

    #[test]
    fn test_unchanged_delta_is_all_skip() {
        let prev = buffer(8, 8, Depth::Bpp16, 6);
        let enc = encode(Depth::Bpp16, Some(&prev), &prev);
        let stats = validate_stream(Depth::Bpp16, &enc, 64).expect("valid");
        assert_eq!(stats.instructions(), 1);
        assert_eq!(stats.skipped, 64);
    }

    #[test]
    fn test_16bpp_boundary() {
        let n = 1 << 14;
        let next = PixelBuffer::from_u16(128, 128, &vec![0xBEEF; n]).expect("buf");
        assert_eq!(next.num_pixels(), n);

        let enc = encode(Depth::Bpp16, None, &next);
        let stats = validate_stream(Depth::Bpp16, &enc, n).expect("valid");
        assert!(stats.instructions() > 1);
        assert_eq!(stats.dups, 2);

        let mut dst = PixelBuffer::new(128, 128, Depth::Bpp16).expect("dst");
        decode_frame(Depth::Bpp16, &enc, &mut dst).expect("decode");
        assert_eq!(dst, next);
    }

    #[test]
    fn test_32bpp_boundary() {
        let n = 1 << 22;
        let next = PixelBuffer::from_u32(2048, 2048, Depth::Bpp32, &vec![0xFF336699; n])
            .expect("buf");

        let enc = encode(Depth::Bpp32, None, &next);
        let stats = validate_stream(Depth::Bpp32, &enc, n).expect("valid");
        assert!(stats.instructions() > 1);

        let mut dst = PixelBuffer::new(2048, 2048, Depth::Bpp32).expect("dst");
        decode_frame(Depth::Bpp32, &enc, &mut dst).expect("decode");
        assert_eq!(dst, next);
    }

    #[test]
    fn test_decode_errors() {
        let mut dst = PixelBuffer::new(2, 2, Depth::Bpp16).expect("dst");

        // Dup 3 then Done: one pixel short.
        let underrun = [
            0x00, 0x11, 0x03, 0x40,
            0x00, 0x00, 0x00, 0xC0,
            0x00, 0x00, 0x00, 0x00 ];
        match decode_frame(Depth::Bpp16, &underrun, &mut dst) {
            Err(MvError::Underrun(4, 3)) => (),
            r => panic!("expected Underrun, got {:?}", r),
        }

        // Skip 5 in a 4 pixel frame.
        let overrun = [
            0x05, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0xC0,
            0x00, 0x00, 0x00, 0x00 ];
        match decode_frame(Depth::Bpp16, &overrun, &mut dst) {
            Err(MvError::Overrun(0)) => (),
            r => panic!("expected Overrun, got {:?}", r),
        }

        // Dup 0.
        let zero = [
            0x00, 0x11, 0x00, 0x40,
            0x00, 0x00, 0x00, 0xC0,
            0x00, 0x00, 0x00, 0x00 ];
        match decode_frame(Depth::Bpp16, &zero, &mut dst) {
            Err(MvError::ZeroCount(0)) => (),
            r => panic!("expected ZeroCount, got {:?}", r),
        }

        // Skip 4, Done, but no padding word.
        let truncated = [
            0x04, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0xC0 ];
        match decode_frame(Depth::Bpp16, &truncated, &mut dst) {
            Err(MvError::Truncated) => (),
            r => panic!("expected Truncated, got {:?}", r),
        }
        match decode_frame(Depth::Bpp16, &truncated[..7], &mut dst) {
            Err(MvError::Truncated) => (),
            r => panic!("expected Truncated, got {:?}", r),
        }

        // Done with stray count bits.
        let bad_done = [
            0x04, 0x00, 0x00, 0x00,
            0x05, 0x00, 0x00, 0xC0,
            0x00, 0x00, 0x00, 0x00 ];
        match decode_frame(Depth::Bpp16, &bad_done, &mut dst) {
            Err(MvError::BadInstruction(1)) => (),
            r => panic!("expected BadInstruction, got {:?}", r),
        }

        // Copy 4 with a pixel in the code word.
        let bad_copy = [
            0x11, 0x11, 0x04, 0x80,
            0x11, 0x11, 0x22, 0x22,
            0x33, 0x33, 0x44, 0x44,
            0x00, 0x00, 0x00, 0xC0,
            0x00, 0x00, 0x00, 0x00 ];
        match decode_frame(Depth::Bpp16, &bad_copy, &mut dst) {
            Err(MvError::BadInstruction(0)) => (),
            r => panic!("expected BadInstruction, got {:?}", r),
        }

        let bad_padding = [
            0x04, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0xC0,
            0x01, 0x00, 0x00, 0x00 ];
        match decode_frame(Depth::Bpp16, &bad_padding, &mut dst) {
            Err(MvError::BadPadding) => (),
            r => panic!("expected BadPadding, got {:?}", r),
        }
    }

    #[test]
    fn test_decode_errors_32bpp() {
        let mut dst = PixelBuffer::new(2, 2, Depth::Bpp32).expect("dst");

        // Done with count 7 and skip-after 3.
        let bad_done = [
            0x00, 0x10, 0x00, 0x00,
            0x03, 0x1F, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00 ];
        match decode_frame(Depth::Bpp32, &bad_done, &mut dst) {
            Err(ref e @ MvError::BadInstruction(1)) => assert_eq!(e.kind(), ::ErrorKind::Decode),
            r => panic!("expected BadInstruction, got {:?}", r),
        }
        assert!(validate_stream(Depth::Bpp32, &bad_done, 4).is_err());

        let good = [
            0x00, 0x10, 0x00, 0x00,
            0x00, 0x03, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00 ];
        validate_stream(Depth::Bpp32, &good, 4).expect("valid");
    }

    #[test]
    fn test_wrong_depth() {
        let next = buffer(4, 4, Depth::Bpp16, 7);
        let mut enc = Vec::new();
        assert!(encode_frame(Depth::Bpp32, None, &next, &mut enc).is_err());

        let mut dst = PixelBuffer::new(4, 4, Depth::Bpp24).expect("dst");
        assert!(decode_frame(Depth::Bpp16, &[], &mut dst).is_err());
    }
}
