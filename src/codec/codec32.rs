//! Codec for 24 and 32 bpp frames.

use std::io::Write;
use std::iter::Peekable;
use byteorder::LittleEndian as LE;
use byteorder::WriteBytesExt;

use ::{Depth,MvError,MvResult};
use super::{Instruction,Packet,StreamStats,MV_COPY,MV_DONE,MV_DUP,MV_SKIP,SIZE_OF_WORD};
use super::{decode_pixels,next_word,plan_packets};

/// Largest Dup, Copy or Skip count in a 24/32 bpp stream (22 bits).
///
/// Each instruction starts with a code word:
///
///   Bits  | Description
///   -----:| -----------------------------------------
///   31-10 | count
///   9-8   | opcode: 0 Skip, 1 Dup, 2 Copy, 3 Done
///   7-0   | skip-after
///
/// Dup and Copy are followed by one pixel word.  A Dup writes that
/// pixel `count` times.  A Copy writes it, then `count - 1` further
/// pixel words follow.  Once the instruction is done, the decoder
/// advances a further skip-after pixels; this saves a separate Skip
/// after most runs.  Done has a count of 0.
pub const MV32_MAX_COUNT: usize = 0x3F_FFFF;

/// Largest skip-after value.
pub const MV32_MAX_SKIP_AFTER: usize = 0xFF;

/// Decode a 24/32 bpp instruction stream.
pub fn decode_mv32(src: &[u8], dst: &mut [u32])
        -> MvResult<StreamStats> {
    decode_pixels(Depth::Bpp32, src, dst)
}

/// Encode a 24/32 bpp frame.
///
/// Returns the number of bytes written.
pub fn encode_mv32<W: Write>(
        prev: Option<&[u32]>, next: &[u32], w: &mut W)
        -> MvResult<usize> {
    let packets = plan_packets(prev, next, MV32_MAX_COUNT, MV32_MAX_COUNT);
    let mut iter = packets.into_iter().peekable();
    let mut words = 0;

    while let Some(p) = iter.next() {
        match p {
            Packet::Skip(n) => {
                w.write_u32::<LE>(code32(MV_SKIP, n, 0))?;
                words = words + 1;
            },
            Packet::Dup(idx, n) => {
                let skip_after = take_skip_after(&mut iter);
                w.write_u32::<LE>(code32(MV_DUP, n, skip_after))?;
                w.write_u32::<LE>(next[idx])?;
                words = words + 2;
            },
            Packet::Copy(idx, n) => {
                let skip_after = take_skip_after(&mut iter);
                w.write_u32::<LE>(code32(MV_COPY, n, skip_after))?;
                for &c in &next[idx..(idx + n)] {
                    w.write_u32::<LE>(c)?;
                }
                words = words + 1 + n;
            },
        }
    }

    w.write_u32::<LE>(MV_DONE << 8)?;
    w.write_u32::<LE>(0)?;
    words = words + 2;

    Ok(words * SIZE_OF_WORD)
}

/// Read the 24/32 bpp instruction at `pos`, moving `pos` past it.
pub fn read_mv32<'a>(src: &'a [u8], pos: &mut usize)
        -> MvResult<Instruction<'a>> {
    let at = *pos;
    let code = next_word(src, pos)?;
    let n = (code >> 10) as usize;
    let skip_after = (code as usize) & MV32_MAX_SKIP_AFTER;

    match (code >> 8) & 0x3 {
        MV_SKIP => {
            if n + skip_after == 0 {
                return Err(MvError::ZeroCount(at / SIZE_OF_WORD));
            }
            Ok(Instruction::Skip(n + skip_after))
        },
        MV_DUP => {
            if n == 0 {
                return Err(MvError::ZeroCount(at / SIZE_OF_WORD));
            }
            let pixel = next_word(src, pos)?;
            Ok(Instruction::Dup {
                count: n,
                pixel: pixel,
                skip_after: skip_after,
            })
        },
        MV_COPY => {
            if n == 0 {
                return Err(MvError::ZeroCount(at / SIZE_OF_WORD));
            }

            let size = n * SIZE_OF_WORD;
            if *pos + size > src.len() {
                return Err(MvError::Truncated);
            }
            let payload = &src[*pos..(*pos + size)];
            *pos = *pos + size;

            Ok(Instruction::Copy {
                count: n,
                skip_after: skip_after,
                payload: payload,
            })
        },
        _ => {
            if n != 0 || skip_after != 0 {
                return Err(MvError::BadInstruction(at / SIZE_OF_WORD));
            }
            Ok(Instruction::Done)
        },
    }
}

/// If the next packet is a short skip, consume it so it can be fused
/// into the current instruction.
fn take_skip_after<I>(iter: &mut Peekable<I>)
        -> usize
        where I: Iterator<Item=Packet> {
    let n = match iter.peek() {
        Some(&Packet::Skip(n)) if n <= MV32_MAX_SKIP_AFTER => n,
        _ => return 0,
    };

    iter.next();
    n
}

fn code32(op: u32, n: usize, skip_after: usize)
        -> u32 {
    debug_assert!(n <= MV32_MAX_COUNT && skip_after <= MV32_MAX_SKIP_AFTER);
    ((n as u32) << 10) | (op << 8) | skip_after as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mv32() {
        let src = [
            0x00, 0x08, 0x00, 0x00,     // skip 2
            0x01, 0x0D, 0x00, 0x00,     // dup 3, skip-after 1
            0x33, 0x22, 0x11, 0xFF,
            0x00, 0x0A, 0x00, 0x00,     // copy 2
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x03, 0x00, 0x00,     // done
            0x00, 0x00, 0x00, 0x00 ];

        let expected: [u32; 8] = [
            0x55, 0x55,
            0xFF112233, 0xFF112233, 0xFF112233,
            0x55,
            0x01, 0x02 ];

        let mut buf = [0x55u32; 8];
        let stats = decode_mv32(&src, &mut buf).expect("decode");
        assert_eq!(buf, expected);
        assert_eq!(stats.skips, 1);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.written, 5);
    }

    #[test]
    fn test_encode_mv32_fuses_skip() {
        let prev: [u32; 8] = [ 0, 0, 0, 0, 0, 0, 0, 0 ];
        let next: [u32; 8] = [ 0, 0, 9, 9, 9, 0, 1, 2 ];
        let expected = [
            0x00, 0x08, 0x00, 0x00,     // skip 2
            0x01, 0x0D, 0x00, 0x00,     // dup 3, skip-after 1
            0x09, 0x00, 0x00, 0x00,
            0x00, 0x0A, 0x00, 0x00,     // copy 2
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x03, 0x00, 0x00,     // done
            0x00, 0x00, 0x00, 0x00 ];

        let mut enc = Vec::new();
        let size = encode_mv32(Some(&prev[..]), &next, &mut enc).expect("encode");
        assert_eq!(size, expected.len());
        assert_eq!(&enc[..], &expected[..]);

        let mut buf = prev;
        decode_mv32(&enc, &mut buf).expect("decode");
        assert_eq!(buf, next);
    }

    #[test]
    fn test_long_skip_not_fused() {
        let prev = vec![7u32; 300];
        let mut next = prev.clone();
        next[0] = 8;

        let mut enc = Vec::new();
        encode_mv32(Some(&prev[..]), &next, &mut enc).expect("encode");

        let mut buf = prev.clone();
        let stats = decode_mv32(&enc, &mut buf).expect("decode");
        assert_eq!(buf, next);
        assert_eq!(stats.copies, 1);
        assert_eq!(stats.skips, 1);
        assert_eq!(stats.skipped, 299);
    }

    #[test]
    fn test_skip_after_overrun() {
        let src = [
            0x01, 0x05, 0x00, 0x00,     // dup 1, skip-after 1
            0x09, 0x00, 0x00, 0x00,
            0x00, 0x03, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00 ];

        let mut buf = [0u32; 1];
        match decode_mv32(&src, &mut buf) {
            Err(MvError::Overrun(0)) => (),
            r => panic!("expected Overrun, got {:?}", r),
        }
    }
}
