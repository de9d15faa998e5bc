//! Bounds-checked binary reader and writer used by every packet type.
//!
//! Multi-byte scalars are encoded little-endian. The only exception is the
//! port of a [`NetAddress`], which is written big-endian (network order)
//! right after the raw address bytes.
//!
//! The reader supports two checking styles:
//! - check the return value of each call, or
//! - issue a batch of reads and check [`BinaryReader::underflowed`] once.
//!
//! Once a read has failed the reader stays usable; every later read simply
//! fails as well.

use crate::address::NetAddress;

/// Fixed-size value that can be read from or written to a byte stream.
pub trait Scalar: Copy + Default {
    const SIZE: usize;

    fn decode(bytes: &[u8]) -> Self;
    fn encode<R>(self, f: impl FnOnce(&[u8]) -> R) -> R;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }

                fn encode<R>(self, f: impl FnOnce(&[u8]) -> R) -> R {
                    f(&self.to_le_bytes())
                }
            }
        )*
    };
}

impl_scalar!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Sequential reader over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    offset: usize,
    underflowed: bool,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            underflowed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// True once any read or skip has run past the end of the buffer.
    pub fn underflowed(&self) -> bool {
        self.underflowed
    }

    pub fn end_of_file(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads a scalar, returning zero and setting the underflow flag if
    /// fewer than `T::SIZE` bytes remain.
    pub fn read<T: Scalar>(&mut self) -> T {
        self.try_read().unwrap_or_default()
    }

    pub fn try_read<T: Scalar>(&mut self) -> Option<T> {
        self.take(T::SIZE).map(T::decode)
    }

    /// Borrows the next `count` bytes and advances past them.
    pub fn read_bytes(&mut self, count: usize) -> Option<&'a [u8]> {
        self.take(count)
    }

    /// Copies exactly `dest.len()` bytes into `dest`.
    pub fn read_bytes_into(&mut self, dest: &mut [u8]) -> bool {
        match self.take(dest.len()) {
            Some(bytes) => {
                dest.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    pub fn skip_bytes(&mut self, count: usize) -> bool {
        self.take(count).is_some()
    }

    /// Reads a NUL-terminated string. Returns `None` when the buffer ends
    /// before a terminator is found; the cursor is left at the end.
    pub fn read_cstring(&mut self) -> Option<String> {
        let (bytes, terminated) = self.scan_string();
        terminated.then(|| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads a string terminated by NUL or by the end of the buffer.
    /// Empty after an underflow.
    pub fn read_string(&mut self) -> String {
        let (bytes, _) = self.scan_string();
        String::from_utf8_lossy(bytes).into_owned()
    }

    /// Skips a NUL-terminated string, succeeding only if the terminator exists.
    pub fn skip_string(&mut self) -> bool {
        let (_, terminated) = self.scan_string();
        terminated
    }

    fn scan_string(&mut self) -> (&'a [u8], bool) {
        if self.underflowed {
            return (&[], false);
        }
        let rest = &self.data[self.offset..];
        match rest.iter().position(|&b| b == 0) {
            Some(nul) => {
                self.offset += nul + 1;
                (&rest[..nul], true)
            }
            None => {
                self.offset = self.data.len();
                (rest, false)
            }
        }
    }

    fn take(&mut self, count: usize) -> Option<&'a [u8]> {
        if self.underflowed || count > self.remaining() {
            self.underflowed = true;
            return None;
        }
        let bytes = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Some(bytes)
    }
}

/// Destination for a [`BinaryWriter`].
///
/// Implementations must apply a write completely or not at all.
pub trait ByteSink {
    fn fits(&self, count: usize) -> bool;
    fn put(&mut self, bytes: &[u8]) -> bool;
    fn put_repeated(&mut self, value: u8, count: usize) -> bool;
    fn written(&self) -> &[u8];
}

impl ByteSink for Vec<u8> {
    fn fits(&self, _count: usize) -> bool {
        true
    }

    fn put(&mut self, bytes: &[u8]) -> bool {
        self.extend_from_slice(bytes);
        true
    }

    fn put_repeated(&mut self, value: u8, count: usize) -> bool {
        self.resize(self.len() + count, value);
        true
    }

    fn written(&self) -> &[u8] {
        self
    }
}

/// Caller-supplied buffer with a hard capacity.
#[derive(Debug)]
pub struct FixedBuffer<'a> {
    buffer: &'a mut [u8],
    length: usize,
}

impl<'a> FixedBuffer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, length: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl ByteSink for FixedBuffer<'_> {
    fn fits(&self, count: usize) -> bool {
        count <= self.buffer.len() - self.length
    }

    fn put(&mut self, bytes: &[u8]) -> bool {
        if !self.fits(bytes.len()) {
            return false;
        }
        self.buffer[self.length..self.length + bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();
        true
    }

    fn put_repeated(&mut self, value: u8, count: usize) -> bool {
        if !self.fits(count) {
            return false;
        }
        self.buffer[self.length..self.length + count].fill(value);
        self.length += count;
        true
    }

    fn written(&self) -> &[u8] {
        &self.buffer[..self.length]
    }
}

/// Append-only writer over a growable or fixed-size sink.
#[derive(Debug)]
pub struct BinaryWriter<S> {
    sink: S,
}

impl BinaryWriter<Vec<u8>> {
    pub fn growable() -> Self {
        Self { sink: Vec::new() }
    }
}

impl<S: ByteSink> BinaryWriter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn len(&self) -> usize {
        self.sink.written().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.sink.written()
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    pub fn write<T: Scalar>(&mut self, value: T) -> bool {
        value.encode(|bytes| self.sink.put(bytes))
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        self.sink.put(bytes)
    }

    pub fn write_byte_repeated(&mut self, value: u8, count: usize) -> bool {
        self.sink.put_repeated(value, count)
    }

    pub fn write_cstring(&mut self, text: &str, include_nul: bool) -> bool {
        let total = text.len() + usize::from(include_nul);
        if !self.sink.fits(total) {
            return false;
        }
        self.sink.put(text.as_bytes()) && (!include_nul || self.sink.put(&[0]))
    }

    /// Raw 4 or 16 address bytes followed by the port in network byte order.
    pub fn write_net_address(&mut self, address: &NetAddress) -> bool {
        let span = address.address_span();
        if !self.sink.fits(span.len() + 2) {
            return false;
        }
        self.sink.put(span) && self.sink.put(&address.port().to_be_bytes())
    }
}
