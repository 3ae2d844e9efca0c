/// Per-thread working memory for one chunk at a time.
///
/// Raw generated values and their rendered text live in separate buffers;
/// both are reserved once per worker and reused for every chunk of every
/// process that worker handles.
#[derive(Debug, Default)]
pub struct Scratch {
    pub raw: Vec<u32>,
    pub text: Vec<u8>,
}

impl Scratch {
    /// Reserve room for chunks of up to `max_units` values wrapped at
    /// `line_width`, including one line break per line and a trailing one.
    pub fn with_capacity(max_units: usize, line_width: usize) -> Self {
        Self {
            raw: Vec::with_capacity(max_units),
            text: Vec::with_capacity(max_units + max_units / line_width.max(1) + 2),
        }
    }

    /// Size the raw buffer to exactly `len` values and clear the text.
    pub fn prepare(&mut self, len: usize) -> &mut [u32] {
        self.text.clear();
        self.raw.resize(len, 0);
        &mut self.raw[..len]
    }
}
