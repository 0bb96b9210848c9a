use std::mem::size_of;
use crate::encoding::parseerror::ParseError;

/// Cursor over a borrowed byte slice. Every read is little-endian and fixed width, matching what
/// [`tools`](super::tools) writes.
#[derive(Debug, Clone)]
pub(crate) struct BufParser<'a>(pub(crate) &'a [u8]);

impl<'a> BufParser<'a> {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn expect_empty(&self) -> Result<(), ParseError> {
        if self.is_empty() { Ok(()) } else { Err(ParseError::InvalidLength) }
    }

    pub(crate) fn next_n_bytes(&mut self, num_bytes: usize) -> Result<&'a [u8], ParseError> {
        if num_bytes > self.0.len() { return Err(ParseError::UnexpectedEOF); }

        let (data, remainder) = self.0.split_at(num_bytes);
        self.0 = remainder;
        Ok(data)
    }

    pub(crate) fn next_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let bytes = self.next_n_bytes(N)?;
        // Length is checked by next_n_bytes.
        bytes.try_into().map_err(|_| ParseError::UnexpectedEOF)
    }

    pub(crate) fn next_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.next_array::<1>()?[0])
    }

    pub(crate) fn next_bool(&mut self) -> Result<bool, ParseError> {
        match self.next_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ParseError::InvalidContent),
        }
    }

    pub(crate) fn next_i16_le(&mut self) -> Result<i16, ParseError> {
        Ok(i16::from_le_bytes(self.next_array::<{ size_of::<i16>() }>()?))
    }

    pub(crate) fn next_i32_le(&mut self) -> Result<i32, ParseError> {
        Ok(i32::from_le_bytes(self.next_array::<{ size_of::<i32>() }>()?))
    }

    pub(crate) fn next_f32_le(&mut self) -> Result<f32, ParseError> {
        Ok(f32::from_le_bytes(self.next_array::<{ size_of::<f32>() }>()?))
    }

    pub(crate) fn next_f64_le(&mut self) -> Result<f64, ParseError> {
        Ok(f64::from_le_bytes(self.next_array::<{ size_of::<f64>() }>()?))
    }

    /// Reads an int32 length. Negative lengths and lengths running past the end of the buffer are
    /// rejected here so callers can slice without checking again.
    pub(crate) fn next_len(&mut self) -> Result<usize, ParseError> {
        let len = self.next_i32_le()?;
        if len < 0 { return Err(ParseError::InvalidLength); }
        let len = len as usize;
        if len > self.0.len() { return Err(ParseError::InvalidLength); }
        Ok(len)
    }

    /// Reads an int32 element count. Unlike [`next_len`](Self::next_len) this doesn't compare
    /// against the remaining bytes, since each element is at least one byte anyway.
    pub(crate) fn next_count(&mut self) -> Result<usize, ParseError> {
        let count = self.next_i32_le()?;
        if count < 0 || count as usize > self.0.len() { return Err(ParseError::InvalidLength); }
        Ok(count as usize)
    }

    pub(crate) fn next_len_prefixed(&mut self) -> Result<&'a [u8], ParseError> {
        let len = self.next_len()?;
        self.next_n_bytes(len)
    }

    // Note the result is attached to the lifetime 'a, not the lifetime of self.
    pub(crate) fn next_str(&mut self) -> Result<&'a str, ParseError> {
        let bytes = self.next_len_prefixed()?;
        std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUTF8)
    }
}
