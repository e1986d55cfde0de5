/// Capacity of a [`FixedText`] in bytes.
pub const FIXED_TEXT_CAPACITY: usize = 512;

/// Inline, fixed-capacity UTF-8 text.
///
/// Label and log records carry their text by value so that every record
/// has a size known from its tag alone. Text longer than
/// [`FIXED_TEXT_CAPACITY`] bytes is truncated at the last char boundary
/// that fits.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FixedText {
    len: u32,
    bytes: [u8; FIXED_TEXT_CAPACITY],
}

impl FixedText {
    /// Empty text.
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [0; FIXED_TEXT_CAPACITY],
    };

    /// Copy `text` into a new buffer, truncating if needed.
    pub fn new(text: &str) -> Self {
        let original_len = text.len();
        let (text, truncated) = Self::fit(text);
        if truncated {
            log::warn!(
                "Text of {} bytes truncated to {} bytes",
                original_len,
                text.len()
            );
        }
        let mut out = Self::EMPTY;
        out.bytes[..text.len()].copy_from_slice(text.as_bytes());
        out.len = text.len() as u32;
        out
    }

    /// The stored text.
    ///
    /// Bytes that do not form valid UTF-8 (only possible for a buffer
    /// decoded from a corrupted stream) yield the longest valid prefix.
    pub fn as_str(&self) -> &str {
        let len = (self.len as usize).min(FIXED_TEXT_CAPACITY);
        let bytes = &self.bytes[..len];
        match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(err) => {
                // valid_up_to() is always a char boundary
                std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default()
            }
        }
    }

    /// Length of the stored text in bytes.
    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    /// Whether the stored text is empty.
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    fn fit(text: &str) -> (&str, bool) {
        if text.len() <= FIXED_TEXT_CAPACITY {
            return (text, false);
        }
        let mut end = FIXED_TEXT_CAPACITY;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        (&text[..end], true)
    }
}

impl Default for FixedText {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<&str> for FixedText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl PartialEq for FixedText {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl std::fmt::Debug for FixedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl std::fmt::Display for FixedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
