use std::num::NonZeroUsize;

use shared::domain::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    pub page_size: NonZeroUsize,
}

impl ModelConfig {
    pub fn with_page_size(page_size: NonZeroUsize) -> Self {
        Self { page_size }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
