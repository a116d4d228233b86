pub type ContentId = u64;

/// A streamable object and whatever the size probe learned about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHandle {
    pub content_id: ContentId,
    pub total_size: Option<u64>,
    pub content_type: Option<String>,
}

impl ContentHandle {
    pub fn unknown(content_id: ContentId) -> Self {
        Self {
            content_id,
            total_size: None,
            content_type: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, total_size: u64) -> Self {
        self.total_size = Some(total_size);
        self
    }
}
