//! Decompression engine adapter.
//!
//! Building an index needs an inflater that can stop at DEFLATE block
//! boundaries and report how many bits of the last input byte it left
//! unused; resuming needs bit priming and a preset dictionary on a raw
//! (headerless) stream. [`Inflate`] names those primitives and
//! [`ZlibInflater`] provides them on top of zlib through `libz-sys`.

use libz_sys as zlib;
use std::alloc::{self, Layout};
use std::ffi::{CStr, c_int, c_uint, c_void};
use std::{mem, ptr};

use crate::error::{Error, Result};

/// Decoder status after a block-boundary stop, taken from zlib's `data_type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockState {
    /// Stopped right after a block ended, or right after the stream header.
    pub at_boundary: bool,
    /// The block being decoded (or just finished) is the last one.
    pub final_block: bool,
    /// Bits of the last consumed input byte that are not yet used (0-7).
    pub unused_bits: u8,
}

impl BlockState {
    fn from_data_type(data_type: c_int) -> Self {
        Self {
            at_boundary: data_type & 0x80 != 0,
            final_block: data_type & 0x40 != 0,
            unused_bits: (data_type & 0x07) as u8,
        }
    }
}

/// Outcome of a single inflate call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub consumed: usize,
    pub produced: usize,
    pub stream_end: bool,
    pub block: BlockState,
}

/// Streaming inflater used by the index builder and the extractor.
pub trait Inflate: Sized {
    /// Start a stream that detects zlib or gzip framing from its header.
    fn streaming() -> Result<Self>;

    /// Start a raw DEFLATE stream with no framing.
    fn raw() -> Result<Self>;

    /// Inflate `input` into `output`, returning early at the next block boundary.
    fn inflate_to_block_boundary(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress>;

    /// Inflate `input` into `output` until either runs out.
    fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress>;

    /// Insert the low `bits` bits of `value` ahead of the next input byte.
    fn prime(&mut self, bits: u8, value: u8) -> Result<()>;

    /// Seed the history window so back-references into it resolve.
    fn set_dictionary(&mut self, window: &[u8]) -> Result<()>;
}

/// zlib stream with windowBits 15 and automatic zlib/gzip header detection.
const AUTO_HEADER_WINDOW_BITS: c_int = 15 + 32;
/// zlib stream with windowBits 15 and no header.
const RAW_WINDOW_BITS: c_int = -15;

/// [`Inflate`] implementation backed by zlib.
pub struct ZlibInflater {
    // Boxed: zlib keeps a pointer back to the stream in its internal state.
    stream: Box<zlib::z_stream>,
}

// SAFETY: the stream's pointers only refer to zlib's own allocations while no
// call is in progress; input and output pointers are cleared after each call.
unsafe impl Send for ZlibInflater {}

impl ZlibInflater {
    fn init(window_bits: c_int) -> Result<Self> {
        let mut stream = Box::new(zlib::z_stream {
            next_in: ptr::null_mut(),
            avail_in: 0,
            total_in: 0,
            next_out: ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: ptr::null_mut(),
            state: ptr::null_mut(),
            zalloc,
            zfree,
            opaque: ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
        });

        let ret = unsafe {
            zlib::inflateInit2_(
                &mut *stream,
                window_bits,
                zlib::zlibVersion(),
                mem::size_of::<zlib::z_stream>() as c_int,
            )
        };
        if ret != zlib::Z_OK {
            return Err(codec_error(&stream, ret));
        }
        Ok(Self { stream })
    }

    fn run(&mut self, input: &[u8], output: &mut [u8], flush: c_int) -> Result<Progress> {
        let avail_in = c_uint::try_from(input.len()).unwrap_or(c_uint::MAX);
        let avail_out = c_uint::try_from(output.len()).unwrap_or(c_uint::MAX);

        self.stream.next_in = input.as_ptr() as *mut u8;
        self.stream.avail_in = avail_in;
        self.stream.next_out = output.as_mut_ptr();
        self.stream.avail_out = avail_out;

        let ret = unsafe { zlib::inflate(&mut *self.stream, flush) };

        let progress = Progress {
            consumed: (avail_in - self.stream.avail_in) as usize,
            produced: (avail_out - self.stream.avail_out) as usize,
            stream_end: ret == zlib::Z_STREAM_END,
            block: BlockState::from_data_type(self.stream.data_type),
        };

        self.stream.next_in = ptr::null_mut();
        self.stream.avail_in = 0;
        self.stream.next_out = ptr::null_mut();
        self.stream.avail_out = 0;

        match ret {
            zlib::Z_OK | zlib::Z_STREAM_END => Ok(progress),
            // No progress was possible; only fatal if there was room to make some.
            zlib::Z_BUF_ERROR if input.is_empty() || output.is_empty() => Ok(progress),
            _ => Err(codec_error(&self.stream, ret)),
        }
    }
}

impl Inflate for ZlibInflater {
    fn streaming() -> Result<Self> {
        Self::init(AUTO_HEADER_WINDOW_BITS)
    }

    fn raw() -> Result<Self> {
        Self::init(RAW_WINDOW_BITS)
    }

    fn inflate_to_block_boundary(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress> {
        self.run(input, output, zlib::Z_BLOCK)
    }

    fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress> {
        self.run(input, output, zlib::Z_NO_FLUSH)
    }

    fn prime(&mut self, bits: u8, value: u8) -> Result<()> {
        let ret =
            unsafe { zlib::inflatePrime(&mut *self.stream, c_int::from(bits), c_int::from(value)) };
        if ret != zlib::Z_OK {
            return Err(codec_error(&self.stream, ret));
        }
        Ok(())
    }

    fn set_dictionary(&mut self, window: &[u8]) -> Result<()> {
        let len = c_uint::try_from(window.len())
            .map_err(|_| Error::InvalidArgument(format!("dictionary too large: {}", window.len())))?;
        let ret = unsafe { zlib::inflateSetDictionary(&mut *self.stream, window.as_ptr(), len) };
        if ret != zlib::Z_OK {
            return Err(codec_error(&self.stream, ret));
        }
        Ok(())
    }
}

impl Drop for ZlibInflater {
    fn drop(&mut self) {
        unsafe {
            zlib::inflateEnd(&mut *self.stream);
        }
    }
}

fn codec_error(stream: &zlib::z_stream, code: c_int) -> Error {
    let message = if stream.msg.is_null() {
        match code {
            zlib::Z_NEED_DICT => "stream requires a preset dictionary",
            zlib::Z_DATA_ERROR => "invalid compressed data",
            zlib::Z_MEM_ERROR => "out of memory",
            zlib::Z_VERSION_ERROR => "incompatible zlib version",
            zlib::Z_BUF_ERROR => "no progress possible",
            _ => "invalid stream state",
        }
        .to_string()
    } else {
        unsafe { CStr::from_ptr(stream.msg) }
            .to_string_lossy()
            .into_owned()
    };
    Error::Codec { code, message }
}

// zlib allocation callbacks on top of the Rust allocator. The block size is
// stored in a header word in front of the returned pointer so `zfree` can
// rebuild the layout.

const ALIGN: usize = mem::align_of::<usize>();

extern "C" fn zalloc(_opaque: *mut c_void, items: c_uint, size: c_uint) -> *mut c_void {
    let size = match (items as usize)
        .checked_mul(size as usize)
        .and_then(|n| n.checked_add(mem::size_of::<usize>()))
    {
        Some(n) => n,
        None => return ptr::null_mut(),
    };
    let Ok(layout) = Layout::from_size_align(size, ALIGN) else {
        return ptr::null_mut();
    };

    unsafe {
        let ptr = alloc::alloc(layout) as *mut usize;
        if ptr.is_null() {
            return ptr::null_mut();
        }
        *ptr = size;
        ptr.add(1) as *mut c_void
    }
}

extern "C" fn zfree(_opaque: *mut c_void, address: *mut c_void) {
    if address.is_null() {
        return;
    }
    unsafe {
        let ptr = (address as *mut usize).sub(1);
        let size = *ptr;
        alloc::dealloc(ptr as *mut u8, Layout::from_size_align_unchecked(size, ALIGN));
    }
}
