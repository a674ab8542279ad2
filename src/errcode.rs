//! MVID error codes.

use std::io;

pub type MvResult<T> = Result<T, MvError>;

/// Broad classification of an `MvError`.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub enum ErrorKind {
    /// The file is not a well-formed MVID container.
    Format,
    /// A frame's instruction stream or checksum is bad.
    Decode,
    /// A frame could not be written.
    Encode,
    /// Opening, mapping or reading the file failed.
    Io,
    /// A frame was requested out of order.
    Sequencing,
}

quick_error! {
    #[derive(Debug)]
    pub enum MvError {
        NoFile {
            display("File not found")
        }
        NotARegularFile {
            display("Not a regular file")
        }
        BadMagic {
            display("Bad magic")
        }
        BadVersion(version: u16) {
            display("Unsupported version {}", version)
        }
        BadDepth(bpp: u16) {
            display("Unsupported depth {} bpp", bpp)
        }
        WrongResolution(w: usize, h: usize) {
            display("Wrong resolution {}x{}", w, h)
        }
        BadFrameDuration {
            display("Bad frame duration")
        }
        Unfinished {
            display("File was not closed properly")
        }
        BadFrameTable(frame: usize) {
            display("Bad frame table entry {}", frame)
        }

        ZeroCount(pos: usize) {
            display("Zero count at word offset {}", pos)
        }
        Overrun(pos: usize) {
            display("Instruction at word offset {} runs past the end of the frame", pos)
        }
        Underrun(expected: usize, actual: usize) {
            display("Frame ended after {} of {} pixels", actual, expected)
        }
        Truncated {
            display("Truncated frame data")
        }
        BadInstruction(pos: usize) {
            display("Malformed instruction at word offset {}", pos)
        }
        BadPadding {
            display("Missing zero padding after end of frame")
        }
        ChecksumMismatch(frame: usize, expected: u32, actual: u32) {
            display("Frame {} checksum mismatch - expected {:08x}, got {:08x}",
                    frame, expected, actual)
        }

        NoPreviousFrame {
            display("No previous frame")
        }
        WrongBufferSize {
            display("Pixel buffer does not match the file")
        }
        ExceededLimit {
            display("Exceeded limit")
        }
        NoFrames {
            display("No frames written")
        }
        WriterStarted {
            display("Frames have already been written")
        }

        OutOfRange(offset: u64, len: usize) {
            display("Range {}+{} lies outside the file", offset, len)
        }
        Io(err: io::Error) {
            from()
            display("IO error: {}", err)
            cause(err)
        }

        NotDecoded(frame: usize) {
            display("Frame {} requested before its predecessor was decoded", frame)
        }
        NoSuchFrame(frame: usize) {
            display("No frame {}", frame)
        }
    }
}

impl MvError {
    /// Which part of the error taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use self::MvError::*;
        match *self {
            BadMagic | BadVersion(..) | BadDepth(..) | WrongResolution(..)
                | BadFrameDuration | Unfinished | BadFrameTable(..)
                => ErrorKind::Format,

            ZeroCount(..) | Overrun(..) | Underrun(..) | Truncated
                | BadInstruction(..) | BadPadding | ChecksumMismatch(..)
                => ErrorKind::Decode,

            NoPreviousFrame | WrongBufferSize | ExceededLimit | NoFrames
                | WriterStarted
                => ErrorKind::Encode,

            NoFile | NotARegularFile | OutOfRange(..) | Io(..)
                => ErrorKind::Io,

            NotDecoded(..) | NoSuchFrame(..)
                => ErrorKind::Sequencing,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use super::{ErrorKind,MvError};

    #[test]
    fn test_error_kind() {
        assert_eq!(MvError::BadMagic.kind(), ErrorKind::Format);
        assert_eq!(MvError::Underrun(4, 3).kind(), ErrorKind::Decode);
        assert_eq!(MvError::NoPreviousFrame.kind(), ErrorKind::Encode);
        assert_eq!(MvError::NotDecoded(2).kind(), ErrorKind::Sequencing);

        let err: MvError = io::Error::new(io::ErrorKind::Other, "x").into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_display() {
        let err = MvError::ChecksumMismatch(3, 0x1234, 0xABCD);
        assert_eq!(format!("{}", err),
                "Frame 3 checksum mismatch - expected 00001234, got 0000abcd");
    }
}
