/// Byte-offset span into source text. Start is inclusive, end is exclusive.
///
/// Every expression node carries one so rewrites and remarks can point back
/// at the source the node was built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// Zero-length span for nodes built by the optimizer itself.
    pub fn synthetic() -> Self {
        Self::default()
    }
}
