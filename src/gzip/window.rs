//! Rolling record of the most recent decompressed bytes.

/// Maximum DEFLATE back-reference distance, and so the dictionary size a
/// checkpoint has to carry.
pub const WINDOW_SIZE: usize = 32768;

/// Circular accumulation buffer for the last [`WINDOW_SIZE`] bytes of output.
///
/// The decompressor writes straight into [`spare`](Window::spare); once the
/// buffer is full it wraps and overwrites from the front. Because of that the
/// buffer holds the newest bytes at `[..filled]` and the remainder of the
/// previous wrap at `[filled..]`.
pub(crate) struct Window {
    buf: Box<[u8; WINDOW_SIZE]>,
    filled: usize,
}

impl Window {
    pub fn new() -> Self {
        Self {
            buf: Box::new([0u8; WINDOW_SIZE]),
            filled: 0,
        }
    }

    /// Free space left in the current wrap, starting a new wrap if the buffer is full.
    pub fn spare(&mut self) -> &mut [u8] {
        if self.filled == WINDOW_SIZE {
            self.filled = 0;
        }
        &mut self.buf[self.filled..]
    }

    /// Mark `n` bytes of the last [`spare`](Window::spare) slice as written.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.filled + n <= WINDOW_SIZE);
        self.filled += n;
    }

    /// Linearize the buffer so the most recent byte comes last.
    ///
    /// Until the first wrap the head of the result is zero filler.
    pub fn unroll(&self) -> Box<[u8; WINDOW_SIZE]> {
        let older = WINDOW_SIZE - self.filled;
        let mut out = Box::new([0u8; WINDOW_SIZE]);
        out[..older].copy_from_slice(&self.buf[self.filled..]);
        out[older..].copy_from_slice(&self.buf[..self.filled]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(window: &mut Window, data: &[u8]) {
        let mut data = data;
        while !data.is_empty() {
            let spare = window.spare();
            let n = spare.len().min(data.len());
            spare[..n].copy_from_slice(&data[..n]);
            window.commit(n);
            data = &data[n..];
        }
    }

    #[test]
    fn partial_window_is_zero_padded_at_the_head() {
        let mut window = Window::new();
        write(&mut window, b"abc");

        let out = window.unroll();
        assert!(out[..WINDOW_SIZE - 3].iter().all(|&b| b == 0));
        assert_eq!(&out[WINDOW_SIZE - 3..], b"abc");
    }

    #[test]
    fn exactly_full_window_is_unchanged() {
        let data: Vec<u8> = (0..WINDOW_SIZE).map(|i| (i % 251) as u8).collect();
        let mut window = Window::new();
        write(&mut window, &data);

        assert_eq!(&window.unroll()[..], &data[..]);
    }

    #[test]
    fn wrapped_window_keeps_last_bytes_in_order() {
        let data: Vec<u8> = (0..3 * WINDOW_SIZE + 1234)
            .map(|i| (i * 7 % 253) as u8)
            .collect();
        let mut window = Window::new();
        // Uneven writes so wraps land mid-chunk.
        for chunk in data.chunks(1000) {
            write(&mut window, chunk);
        }

        assert_eq!(&window.unroll()[..], &data[data.len() - WINDOW_SIZE..]);
    }
}
