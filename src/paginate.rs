/// GridSync Pagination
///
/// Slices the sorted set into pages. The requested page is clamped into
/// `[1, total_pages]` on every call, so upstream filter changes that shrink
/// the set can never leave the session pointing past the end.

use crate::record::Record;

/// Requested page position. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    pub page: usize,
    pub page_size: usize,
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        PaginationState {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Changing the page size resets to page 1.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        PaginationState::new(20)
    }
}

/// One rendered page plus the resolved position it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_records: usize,
}

pub struct Paginator;

impl Paginator {
    /// `total_pages = max(1, ceil(n / page_size))`; the requested page is
    /// clamped into `[1, total_pages]` before slicing.
    pub fn slice<'a>(records: &[&'a Record], page: usize, page_size: usize) -> Page<&'a Record> {
        let page_size = page_size.max(1);
        let total_records = records.len();
        let total_pages = Self::total_pages(total_records, page_size);
        let page = page.clamp(1, total_pages);

        let start = (page - 1) * page_size;
        let data: Vec<&Record> = records
            .iter()
            .skip(start)
            .take(page_size)
            .copied()
            .collect();

        Page {
            data,
            page,
            page_size,
            total_pages,
            total_records,
        }
    }

    pub fn total_pages(total_records: usize, page_size: usize) -> usize {
        let page_size = page_size.max(1);
        (total_records.div_ceil(page_size)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn numbered(n: usize) -> Vec<Record> {
        (1..=n)
            .map(|i| Record::new(format!("P{}", i)).with_field("n", format!("{}", i)))
            .collect()
    }

    fn ids(records: &[&Record]) -> Vec<String> {
        records.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn test_basic_slicing() {
        let records = numbered(45);
        let refs: Vec<&Record> = records.iter().collect();

        let page = Paginator::slice(&refs, 2, 20);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_records, 45);
        assert_eq!(page.data.len(), 20);
        assert_eq!(page.data[0].id(), "P21");

        let last = Paginator::slice(&refs, 3, 20);
        assert_eq!(last.data.len(), 5);
    }

    #[test]
    fn test_page_clamps_high() {
        let records = numbered(45);
        let refs: Vec<&Record> = records.iter().collect();

        let page = Paginator::slice(&refs, 9999, 20);
        assert_eq!(page.page, 3);
        assert_eq!(page.data[0].id(), "P41");
    }

    #[test]
    fn test_page_clamps_low_and_zero_size() {
        let records = numbered(5);
        let refs: Vec<&Record> = records.iter().collect();

        let page = Paginator::slice(&refs, 0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_pages, 5);
    }

    #[test]
    fn test_empty_set_has_one_page() {
        let refs: Vec<&Record> = Vec::new();
        let page = Paginator::slice(&refs, 3, 20);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.data.is_empty());
    }

    #[test]
    fn test_pages_reconstruct_input_exactly() {
        let records = numbered(53);
        let refs: Vec<&Record> = records.iter().collect();
        let total = Paginator::total_pages(refs.len(), 10);

        let mut reassembled = Vec::new();
        for p in 1..=total {
            let page = Paginator::slice(&refs, p, 10);
            assert!(page.data.len() <= 10);
            reassembled.extend(ids(&page.data));
        }

        assert_eq!(reassembled, ids(&refs));
    }

    #[test]
    fn test_page_size_change_resets_page() {
        let mut state = PaginationState::new(20);
        state.set_page(4);
        assert_eq!(state.page, 4);

        state.set_page_size(50);
        assert_eq!(state.page, 1);
        assert_eq!(state.page_size, 50);
    }
}
