/// A growable byte buffer used by the annotation scanner and the error
/// accumulator. Kept as a thin wrapper rather than using `Vec<u8>` directly
/// everywhere so byte accumulation has one obvious home.
#[derive(Debug, Default, Clone)]
pub struct GrowableBuffer {
    data: Vec<u8>,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn take_string_lossy(&mut self) -> String {
        let s = String::from_utf8_lossy(&self.data).into_owned();
        self.data.clear();
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_clears() {
        let mut buf = GrowableBuffer::new();
        buf.push(b'a');
        buf.extend(b"bc");
        assert_eq!(buf.as_bytes(), b"abc");
        let s = buf.take_string_lossy();
        assert_eq!(s, "abc");
        assert!(buf.is_empty());
    }
}
