use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// A validated page selection. Construction clamps instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: u32,
    size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { number: 1, size: DEFAULT_PAGE_SIZE }
    }
}

impl PageRequest {
    /// Page numbers below 1 become 1; sizes are clamped into `1..=max_size`.
    #[must_use]
    pub fn new(number: i64, size: i64, max_size: u32) -> Self {
        let max_size = max_size.max(1);
        let number = u32::try_from(number.max(1)).unwrap_or(u32::MAX);
        let size = u32::try_from(size.clamp(1, i64::from(max_size))).unwrap_or(max_size);
        Self { number, size }
    }

    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (i64::from(self.number) - 1) * i64::from(self.size)
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedList<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl<T> PagedList<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total_count: u64, page: PageRequest) -> Self {
        let total_pages = total_count.div_ceil(u64::from(page.size()));
        Self {
            items,
            current_page: page.number(),
            page_size: page.size(),
            total_count,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}
