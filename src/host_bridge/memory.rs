use std::ops::Range;

use crate::host_bridge::error::BridgeError;

/// Read-only window onto guest linear memory.
///
/// A view borrows the guest, so it cannot outlive the next guest call. Any call that might grow
/// guest memory needs `&mut` on the guest, which ends the borrow; the capacity is re-read from
/// the fresh slice every time a view is created.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    bytes: &'a [u8],
}

/// Read/write window onto guest linear memory.
#[derive(Debug)]
pub struct MemoryViewMut<'a> {
    bytes: &'a mut [u8],
}

pub(crate) fn checked_range(
    offset: usize,
    len: usize,
    capacity: usize,
) -> Result<Range<usize>, BridgeError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(offset..end),
        _ => Err(BridgeError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}

impl<'a> MemoryView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn read_byte(&self, offset: usize) -> Result<u8, BridgeError> {
        let range = checked_range(offset, 1, self.capacity())?;
        Ok(self.bytes[range.start])
    }

    pub fn read_range(&self, offset: usize, len: usize) -> Result<&'a [u8], BridgeError> {
        let range = checked_range(offset, len, self.capacity())?;
        Ok(&self.bytes[range])
    }

    /// Decodes guest bytes as UTF-8, replacing every invalid byte with U+FFFD.
    pub fn read_text(&self, offset: usize, len: usize) -> Result<String, BridgeError> {
        Ok(decode_text_lossy(self.read_range(offset, len)?))
    }
}

impl<'a> MemoryViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_view(&self) -> MemoryView<'_> {
        MemoryView::new(self.bytes)
    }

    pub fn read_byte(&self, offset: usize) -> Result<u8, BridgeError> {
        self.as_view().read_byte(offset)
    }

    pub fn read_range(&self, offset: usize, len: usize) -> Result<&[u8], BridgeError> {
        let range = checked_range(offset, len, self.capacity())?;
        Ok(&self.bytes[range])
    }

    pub fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), BridgeError> {
        let range = checked_range(offset, 1, self.capacity())?;
        self.bytes[range.start] = value;
        Ok(())
    }

    /// Copies `data` to `offset`. Nothing is written unless the whole range fits.
    pub fn write_range(&mut self, offset: usize, data: &[u8]) -> Result<(), BridgeError> {
        let range = checked_range(offset, data.len(), self.capacity())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}

pub fn decode_text_lossy(mut bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());

    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                text.push_str(valid);
                return text;
            }
            Err(error) => {
                let (valid, rest) = bytes.split_at(error.valid_up_to());
                text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let invalid = error.error_len().unwrap_or(rest.len());
                text.extend(std::iter::repeat(char::REPLACEMENT_CHARACTER).take(invalid));
                bytes = &rest[invalid..];
            }
        }
    }
}
