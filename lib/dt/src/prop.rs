use alloc::{boxed::Box, vec::Vec};
use core::{fmt::Display, str};

/// A named property attached to a device tree node. Values are stored big-endian, as in a blob.
pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

impl Property {
    pub fn new(name: &str, data: &[u8]) -> Property {
        Property {
            name: Box::from(name),
            data: Box::from(data),
        }
    }

    /// Whether the property carries no value (a boolean property).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn cell(&self, index: usize) -> Result<u32, PropertyError> {
        let start = index * 4;
        let bytes = self
            .data
            .get(start..start + 4)
            .ok_or(PropertyError::InvalidPropFormat)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Property {
    pub fn value_as_u32(&self) -> Result<u32, PropertyError> {
        self.cell(0)
    }
    pub fn value_as_u64(&self) -> Result<u64, PropertyError> {
        Ok(((self.cell(0)? as u64) << 32) | self.cell(1)? as u64)
    }
    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        str::from_utf8(&self.data)
            .map(|s| s.trim_end_matches('\0'))
            .map_err(|_| PropertyError::InvalidPropFormat)
    }
    pub fn value_as_strlist(&self) -> Result<Vec<&str>, PropertyError> {
        let mut res = Vec::new();
        // a trailing NUL terminates the last entry rather than starting an empty one
        let data = self.data.strip_suffix(&[0]).unwrap_or(&self.data);
        if data.is_empty() {
            return Ok(res);
        }
        for entry in data.split(|b| *b == 0) {
            res.push(str::from_utf8(entry).map_err(|_| PropertyError::InvalidPropFormat)?);
        }
        Ok(res)
    }
    /// Interpret the value as a list of 32-bit cells. Trailing bytes that do not form a cell are rejected.
    pub fn value_as_cells(&self) -> Result<Vec<u32>, PropertyError> {
        if self.data.len() % 4 != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        (0..self.data.len() / 4).map(|i| self.cell(i)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    InvalidPropFormat,
    PropNotFound,
    DanglingHandle,
}

impl Display for PropertyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PropertyError::InvalidPropFormat => f.write_str("invalid property format"),
            PropertyError::PropNotFound => f.write_str("property not found"),
            PropertyError::DanglingHandle => f.write_str("dangling node reference"),
        }
    }
}
