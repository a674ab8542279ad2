//! This crate provides routines for encoding and decoding maxvid
//! animations: run-length coded 16, 24 and 32 bpp frames, stored in
//! MVID files that are decoded straight out of memory mapped pages.

extern crate byteorder;
extern crate libc;
#[macro_use]
extern crate log;
#[macro_use]
extern crate quick_error;
extern crate simd_adler32;

#[cfg(test)]
extern crate tempfile;

pub use errcode::ErrorKind;
pub use errcode::MvError;
pub use errcode::MvResult;
pub use header::{FrameEntry,FrameKind,MvidHeader};
pub use mapping::{MappedSegment,SegmentedMapping,page_size};
pub use pixels::{Depth,PixelBuffer};
pub use reader::{MvidFile,MvidPlaybackResult};
pub use writer::MvidFileWriter;

pub mod codec;
pub mod errcode;
pub mod header;
pub mod mapping;
pub mod pixels;
pub mod reader;
pub mod writer;
