//! Decompressed reads from arbitrary offsets using a checkpoint index.
//!
//! Both access styles share one primitive, [`Resumed`]: seek the source to
//! the covering checkpoint, prime the leftover bits, install the window as
//! preset dictionary and inflate forward to the requested offset.
//!
//! - [`Session`] keeps that state between calls for sequential reading.
//! - [`RandomAccess`] redoes it on every [`read_at`](RandomAccess::read_at).

use std::io::{self, ErrorKind, Read, SeekFrom};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::{fmt, mem};
use tracing::debug;

use super::builder::CHUNK_SIZE;
use super::inflate::{Inflate, ZlibInflater};
use super::structures::Index;
use super::window::WINDOW_SIZE;
use crate::error::{Error, Result};
use crate::io::ByteSource;

/// Raw inflate state resumed from a checkpoint.
struct Resumed<E> {
    inflater: E,
    input: Vec<u8>,
    start: usize,
    end: usize,
    pos: u64,
    finished: bool,
}

impl<E: Inflate> Resumed<E> {
    /// Position a fresh raw inflater at decompressed `offset`.
    ///
    /// The buffer in `pool` is reused as the compressed read buffer. It is
    /// only taken on success and is left in place if resuming fails.
    fn resume<S>(source: &mut S, index: &Index, offset: u64, pool: &mut Vec<u8>) -> Result<Self>
    where
        S: ByteSource + ?Sized,
    {
        if offset > index.decompressed_size() {
            return Err(Error::InvalidArgument(format!(
                "offset {} is past the end of the data ({} bytes)",
                offset,
                index.decompressed_size()
            )));
        }

        let here = index.locate(offset);
        debug!(
            offset,
            checkpoint = here.decompressed_pos,
            compressed = here.compressed_pos,
            bits = here.bit_remainder,
            "resuming"
        );

        let mut inflater = E::raw()?;
        source.seek_to(here.resume_offset())?;
        if here.bit_remainder > 0 {
            let mut byte = [0u8; 1];
            if read_some(source, &mut byte)? == 0 {
                return Err(Error::TruncatedSource("missing partial byte at checkpoint"));
            }
            inflater.prime(here.bit_remainder, byte[0] >> (8 - here.bit_remainder))?;
        }
        inflater.set_dictionary(&here.window[..])?;

        let mut input = mem::take(pool);
        input.resize(CHUNK_SIZE, 0);
        let mut resumed = Self {
            inflater,
            input,
            start: 0,
            end: 0,
            pos: here.decompressed_pos,
            finished: false,
        };
        if let Err(e) = resumed.discard(source, offset - here.decompressed_pos) {
            *pool = resumed.into_input();
            return Err(e);
        }
        Ok(resumed)
    }

    /// Inflate and drop `n` bytes.
    fn discard<S>(&mut self, source: &mut S, mut n: u64) -> Result<()>
    where
        S: ByteSource + ?Sized,
    {
        if n == 0 {
            return Ok(());
        }
        let mut scratch = vec![0u8; n.min(WINDOW_SIZE as u64) as usize];
        while n > 0 {
            let want = n.min(scratch.len() as u64) as usize;
            let got = self.read(source, &mut scratch[..want])?;
            if got == 0 {
                return Err(Error::TruncatedSource("data ended before the seek target"));
            }
            n -= got as u64;
        }
        Ok(())
    }

    /// Read decompressed bytes, blocking until at least one is available.
    ///
    /// Returns 0 only at the end of the compressed stream.
    fn read<S>(&mut self, source: &mut S, buf: &mut [u8]) -> Result<usize>
    where
        S: ByteSource + ?Sized,
    {
        if buf.is_empty() || self.finished {
            return Ok(0);
        }

        loop {
            let mut source_done = false;
            if self.start == self.end {
                let n = read_some(source, &mut self.input)?;
                self.start = 0;
                self.end = n;
                source_done = n == 0;
            }

            // Even without new input the engine may still hold buffered bits.
            let step = self
                .inflater
                .inflate(&self.input[self.start..self.end], buf)?;
            self.start += step.consumed;
            self.pos += step.produced as u64;

            if step.stream_end {
                self.finished = true;
                return Ok(step.produced);
            }
            if step.produced > 0 {
                return Ok(step.produced);
            }
            if source_done {
                return Err(Error::TruncatedSource("stream ended inside a block"));
            }
        }
    }

    fn into_input(self) -> Vec<u8> {
        self.input
    }
}

fn read_some<S: ByteSource + ?Sized>(source: &mut S, buf: &mut [u8]) -> Result<usize> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

enum State<S, E> {
    Unbound,
    Bound { source: S },
    Positioned { source: S, stream: Resumed<E> },
    Closed,
}

/// A seekable decompressed view over one byte source.
///
/// Lifecycle: created unbound, [`bind`](Session::bind) attaches a source,
/// [`seek`](Session::seek) positions it, then [`read`](Session::read) streams
/// from there until [`close`](Session::close). Calling an operation in the
/// wrong state fails with [`Error::ProtocolMisuse`]. A failed seek leaves the
/// session bound but unpositioned.
///
/// A session is not meant for concurrent use; give each thread its own
/// session and source, or wrap one in a mutex.
pub struct Session<S, E = ZlibInflater> {
    index: Arc<Index>,
    state: State<S, E>,
}

impl<S: ByteSource> Session<S> {
    /// Create an unbound session using the zlib engine.
    pub fn new(index: Arc<Index>) -> Self {
        Self::with_engine(index)
    }

    /// Create a session already bound to `source`.
    pub fn open(index: Arc<Index>, source: S) -> Self {
        Self {
            index,
            state: State::Bound { source },
        }
    }

    /// Bind to `source` and seek to `offset`.
    pub fn open_at(index: Arc<Index>, source: S, offset: u64) -> Result<Self> {
        let mut session = Self::open(index, source);
        session.seek(offset)?;
        Ok(session)
    }
}

impl<S: ByteSource, E: Inflate> Session<S, E> {
    /// Create an unbound session using the inflate engine `E`.
    pub fn with_engine(index: Arc<Index>) -> Self {
        Self {
            index,
            state: State::Unbound,
        }
    }

    /// Attach the compressed byte source. Allowed once.
    pub fn bind(&mut self, source: S) -> Result<()> {
        match self.state {
            State::Unbound => {
                self.state = State::Bound { source };
                Ok(())
            }
            State::Closed => Err(Error::ProtocolMisuse("session is closed")),
            _ => Err(Error::ProtocolMisuse("session is already bound")),
        }
    }

    /// Position the session at decompressed `offset`.
    ///
    /// Resumes from the nearest checkpoint at or before `offset`, replacing
    /// any previous inflate state.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        let (mut source, mut input) = match mem::replace(&mut self.state, State::Closed) {
            State::Bound { source } => (source, Vec::new()),
            State::Positioned { source, stream } => (source, stream.into_input()),
            State::Unbound => {
                self.state = State::Unbound;
                return Err(Error::ProtocolMisuse("seek before bind"));
            }
            State::Closed => return Err(Error::ProtocolMisuse("session is closed")),
        };

        match Resumed::resume(&mut source, &self.index, offset, &mut input) {
            Ok(stream) => {
                self.state = State::Positioned { source, stream };
                Ok(())
            }
            Err(e) => {
                self.state = State::Bound { source };
                Err(e)
            }
        }
    }

    /// Read decompressed bytes at the current position.
    ///
    /// Blocks until at least one byte is available; returns 0 only at the end
    /// of the data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (source, stream) = self.positioned()?;
        stream.read(source, buf)
    }

    /// Advance by up to `n` bytes without returning them.
    ///
    /// Returns the number of bytes skipped, which is less than `n` only at the
    /// end of the data.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        let size = self.index.decompressed_size();
        let (source, stream) = self.positioned()?;
        let n = n.min(size.saturating_sub(stream.pos));
        stream.discard(source, n)?;
        Ok(n)
    }

    /// Current decompressed position, once the session has been positioned.
    pub fn position(&self) -> Option<u64> {
        match &self.state {
            State::Positioned { stream, .. } => Some(stream.pos),
            _ => None,
        }
    }

    /// Bytes left between the current position and the end of the data.
    pub fn remaining(&self) -> Option<u64> {
        self.position()
            .map(|pos| self.index.decompressed_size().saturating_sub(pos))
    }

    /// Total decompressed size.
    pub fn len(&self) -> u64 {
        self.index.decompressed_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Release the inflate state and hand back the byte source.
    pub fn close(&mut self) -> Result<S> {
        match mem::replace(&mut self.state, State::Closed) {
            State::Bound { source } | State::Positioned { source, .. } => Ok(source),
            State::Unbound => {
                self.state = State::Unbound;
                Err(Error::ProtocolMisuse("close before bind"))
            }
            State::Closed => Err(Error::ProtocolMisuse("session is already closed")),
        }
    }

    fn positioned(&mut self) -> Result<(&mut S, &mut Resumed<E>)> {
        match &mut self.state {
            State::Positioned { source, stream } => Ok((source, stream)),
            State::Unbound => Err(Error::ProtocolMisuse("read before bind")),
            State::Bound { .. } => Err(Error::ProtocolMisuse("read before seek")),
            State::Closed => Err(Error::ProtocolMisuse("session is closed")),
        }
    }
}

impl<S: ByteSource, E: Inflate> Read for Session<S, E> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Session::read(self, buf).map_err(io::Error::from)
    }
}

impl<S: ByteSource, E: Inflate> io::Seek for Session<S, E> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.len().checked_add_signed(d),
            SeekFrom::Current(d) => {
                let current = self.position().ok_or_else(|| {
                    io::Error::from(Error::ProtocolMisuse("relative seek before positioning"))
                })?;
                current.checked_add_signed(d)
            }
        };
        let target = target.ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidInput, "seek to a negative or overflowing position")
        })?;

        Session::seek(self, target)?;
        Ok(target)
    }
}

impl<S, E> fmt::Debug for Session<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Unbound => "unbound",
            State::Bound { .. } => "bound",
            State::Positioned { .. } => "positioned",
            State::Closed => "closed",
        };
        f.debug_struct("Session")
            .field("state", &state)
            .field("checkpoints", &self.index.len())
            .field("decompressed_size", &self.index.decompressed_size())
            .finish()
    }
}

/// Stateless random reads: every call resumes from a checkpoint.
///
/// Calls are serialized by an internal lock that guards the shared
/// compressed-input buffer, so one `RandomAccess` can be shared between
/// threads, each passing its own source.
pub struct RandomAccess<E = ZlibInflater> {
    index: Arc<Index>,
    input: Mutex<Vec<u8>>,
    engine: PhantomData<fn() -> E>,
}

impl RandomAccess {
    pub fn new(index: Arc<Index>) -> Self {
        Self::with_engine(index)
    }
}

impl<E: Inflate> RandomAccess<E> {
    pub fn with_engine(index: Arc<Index>) -> Self {
        Self {
            index,
            input: Mutex::new(Vec::new()),
            engine: PhantomData,
        }
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Total decompressed size.
    pub fn decompressed_size(&self) -> u64 {
        self.index.decompressed_size()
    }

    /// Read up to `buf.len()` decompressed bytes starting at `offset`.
    ///
    /// Fills `buf` completely unless the data ends first; returns 0 when
    /// `offset` is exactly the decompressed size.
    pub fn read_at<S>(&self, source: &mut S, offset: u64, buf: &mut [u8]) -> Result<usize>
    where
        S: ByteSource + ?Sized,
    {
        let mut input = self.input.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut stream = Resumed::<E>::resume(source, &self.index, offset, &mut *input)?;
        let mut filled = 0;
        let result = loop {
            if filled == buf.len() {
                break Ok(filled);
            }
            match stream.read(source, &mut buf[filled..]) {
                Ok(0) => break Ok(filled),
                Ok(n) => filled += n,
                Err(e) => break Err(e),
            }
        };

        *input = stream.into_input();
        result
    }
}
