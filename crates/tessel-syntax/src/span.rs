/// A byte range inside one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: u32,
    /// End byte offset (exclusive)
    pub end: u32,
    /// Source file the offsets refer to
    pub file_id: u16,
}

impl Span {
    /// Create a span from byte offsets.
    pub fn new(start: usize, end: usize, file_id: u16) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
            file_id,
        }
    }

    /// Span for nodes synthesized by the core or built in tests.
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(self.file_id, other.file_id, "spans from different files");
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            file_id: self.file_id,
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Check if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: Span) -> bool {
        self.file_id == other.file_id && self.start <= other.start && other.end <= self.end
    }
}
