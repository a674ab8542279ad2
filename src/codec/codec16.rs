//! Codec for 16 bpp frames.

use std::io::Write;
use byteorder::LittleEndian as LE;
use byteorder::WriteBytesExt;

use ::{Depth,MvError,MvResult};
use super::{Instruction,Packet,StreamStats,MV_COPY,MV_DONE,MV_DUP,MV_SKIP,SIZE_OF_WORD};
use super::{decode_pixels,next_word,plan_packets};

/// Largest Dup or Copy count in a 16 bpp stream (14 bits).
///
/// Each instruction starts with one 32-bit code word.  The top two
/// bits hold the opcode:
///
///   Bits  | Skip  | Dup   | Copy  | Done
///   -----:|:-----:|:-----:|:-----:|:-----:
///   31-30 |   0   |   1   |   2   |   3
///   29-16 | count | count | count |   0
///   15-0  | count | pixel | pixel |   0
///
/// A Skip advances by its 30-bit count without writing.  A Dup
/// writes its pixel `count` times.  A Copy of one pixel carries the
/// pixel in its code word.  A Copy of more than one pixel leaves the
/// low half of the code word zero and is followed by ceil(count/2)
/// words, each holding two pixels with the first in the low half.
/// The high half of the last word is unused when the count is odd.
pub const MV16_MAX_COUNT: usize = 0x3FFF;

/// Largest Skip count in a 16 bpp stream (30 bits).
pub const MV16_MAX_SKIP: usize = 0x3FFF_FFFF;

/// Decode a 16 bpp instruction stream.
pub fn decode_mv16(src: &[u8], dst: &mut [u16])
        -> MvResult<StreamStats> {
    decode_pixels(Depth::Bpp16, src, dst)
}

/// Encode a 16 bpp frame.
///
/// Returns the number of bytes written.
pub fn encode_mv16<W: Write>(
        prev: Option<&[u16]>, next: &[u16], w: &mut W)
        -> MvResult<usize> {
    let packets = plan_packets(prev, next, MV16_MAX_COUNT, MV16_MAX_SKIP);
    let mut words = 0;

    for p in packets {
        match p {
            Packet::Skip(n) => {
                w.write_u32::<LE>((MV_SKIP << 30) | n as u32)?;
                words = words + 1;
            },
            Packet::Dup(idx, n) => {
                w.write_u32::<LE>(code16(MV_DUP, n, next[idx]))?;
                words = words + 1;
            },
            Packet::Copy(idx, 1) => {
                w.write_u32::<LE>(code16(MV_COPY, 1, next[idx]))?;
                words = words + 1;
            },
            Packet::Copy(idx, n) => {
                w.write_u32::<LE>(code16(MV_COPY, n, 0))?;
                for pair in next[idx..(idx + n)].chunks(2) {
                    let lo = pair[0] as u32;
                    let hi = if pair.len() > 1 { pair[1] as u32 } else { 0 };
                    w.write_u32::<LE>((hi << 16) | lo)?;
                }
                words = words + 1 + (n + 1) / 2;
            },
        }
    }

    w.write_u32::<LE>(MV_DONE << 30)?;
    w.write_u32::<LE>(0)?;
    words = words + 2;

    Ok(words * SIZE_OF_WORD)
}

/// Read the 16 bpp instruction at `pos`, moving `pos` past it.
pub fn read_mv16<'a>(src: &'a [u8], pos: &mut usize)
        -> MvResult<Instruction<'a>> {
    let at = *pos;
    let code = next_word(src, pos)?;

    match code >> 30 {
        MV_SKIP => {
            let n = (code as usize) & MV16_MAX_SKIP;
            if n == 0 {
                return Err(MvError::ZeroCount(at / SIZE_OF_WORD));
            }
            Ok(Instruction::Skip(n))
        },
        MV_DUP => {
            let n = ((code >> 16) as usize) & MV16_MAX_COUNT;
            if n == 0 {
                return Err(MvError::ZeroCount(at / SIZE_OF_WORD));
            }
            Ok(Instruction::Dup {
                count: n,
                pixel: code & 0xFFFF,
                skip_after: 0,
            })
        },
        MV_COPY => {
            let n = ((code >> 16) as usize) & MV16_MAX_COUNT;
            if n == 0 {
                return Err(MvError::ZeroCount(at / SIZE_OF_WORD));
            }

            if n > 1 && code & 0xFFFF != 0 {
                return Err(MvError::BadInstruction(at / SIZE_OF_WORD));
            }

            let payload = if n == 1 {
                // The low half of the little-endian code word.
                &src[at..(at + 2)]
            } else {
                let size = (n + 1) / 2 * SIZE_OF_WORD;
                if *pos + size > src.len() {
                    return Err(MvError::Truncated);
                }
                let payload = &src[*pos..(*pos + 2 * n)];
                *pos = *pos + size;
                payload
            };

            Ok(Instruction::Copy {
                count: n,
                skip_after: 0,
                payload: payload,
            })
        },
        _ => {
            if code & 0x3FFF_FFFF != 0 {
                return Err(MvError::BadInstruction(at / SIZE_OF_WORD));
            }
            Ok(Instruction::Done)
        },
    }
}

fn code16(op: u32, n: usize, pixel: u16)
        -> u32 {
    debug_assert!(0 < n && n <= MV16_MAX_COUNT);
    (op << 30) | ((n as u32) << 16) | pixel as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mv16() {
        let src = [
            0x02, 0x00, 0x00, 0x00,     // skip 2
            0xCD, 0xAB, 0x03, 0x40,     // dup 3, 0xABCD
            0x34, 0x12, 0x01, 0x80,     // copy 1, 0x1234
            0x00, 0x00, 0x03, 0x80,     // copy 3
            0x11, 0x11, 0x22, 0x22,
            0x33, 0x33, 0xFF, 0xFF,     // high half ignored
            0x00, 0x00, 0x00, 0xC0,     // done
            0x00, 0x00, 0x00, 0x00 ];

        let expected: [u16; 9] = [
            0x5555, 0x5555,
            0xABCD, 0xABCD, 0xABCD,
            0x1234,
            0x1111, 0x2222, 0x3333 ];

        let mut buf = [0x5555u16; 9];
        let stats = decode_mv16(&src, &mut buf).expect("decode");
        assert_eq!(buf, expected);
        assert_eq!(stats.skips, 1);
        assert_eq!(stats.dups, 1);
        assert_eq!(stats.copies, 2);
        assert_eq!(stats.written, 7);
    }

    #[test]
    fn test_encode_mv16_keyframe() {
        let next: [u16; 4] = [ 0x0000, 0x1111, 0x2222, 0x3333 ];
        let expected = [
            0x00, 0x00, 0x04, 0x80,     // copy 4
            0x00, 0x00, 0x11, 0x11,
            0x22, 0x22, 0x33, 0x33,
            0x00, 0x00, 0x00, 0xC0,     // done
            0x00, 0x00, 0x00, 0x00 ];

        let mut enc = Vec::new();
        let size = encode_mv16(None, &next, &mut enc).expect("encode");
        assert_eq!(size, expected.len());
        assert_eq!(&enc[..], &expected[..]);
    }

    #[test]
    fn test_encode_mv16_delta() {
        let prev: [u16; 6] = [ 0x0000, 0x1111, 0x2222, 0x3333, 0x0000, 0x0000 ];
        let next: [u16; 6] = [ 0x4444, 0x1111, 0x2222, 0x3333, 0x7777, 0x7777 ];
        let expected = [
            0x44, 0x44, 0x01, 0x80,     // copy 1, 0x4444
            0x03, 0x00, 0x00, 0x00,     // skip 3
            0x77, 0x77, 0x02, 0x40,     // dup 2, 0x7777
            0x00, 0x00, 0x00, 0xC0,     // done
            0x00, 0x00, 0x00, 0x00 ];

        let mut enc = Vec::new();
        encode_mv16(Some(&prev[..]), &next, &mut enc).expect("encode");
        assert_eq!(&enc[..], &expected[..]);

        let mut buf = prev;
        decode_mv16(&enc, &mut buf).expect("decode");
        assert_eq!(buf, next);
    }

    #[test]
    fn test_truncated_copy_payload() {
        let src = [
            0x00, 0x00, 0x04, 0x80,     // copy 4, needs two more words
            0x11, 0x11, 0x22, 0x22 ];

        let mut buf = [0u16; 4];
        match decode_mv16(&src, &mut buf) {
            Err(MvError::Truncated) => (),
            r => panic!("expected Truncated, got {:?}", r),
        }
    }
}
