// ============================================================================
// Pagination Engine
// ============================================================================
//
// Pure page-window arithmetic. Positive pages count from the front of the
// result set, negative pages count from its end:
//
//   N = 10, S = 3          [0 1 2 | 3 4 5 | 6 7 8 | 9]
//   page  1 -> skip 0, limit 3
//   page -1 -> skip 7, limit 3
//   page -4 -> skip 0, limit 1   (short leading page of the reversed walk)
//
// ============================================================================

use crate::core::{ManipError, Result};

/// Slice of a result set to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Unpaginated, fetch everything.
    All,
    Range { skip: usize, limit: usize },
    /// The requested page lies outside the result set; do not query.
    Empty,
}

/// Whether computing the window for this request needs the total count.
pub fn requires_total(page: i64, page_size: i64) -> bool {
    page < 0 && page_size > 0
}

/// Computes the window for `page` of `page_size` over `total` results.
///
/// `total` is only read for reverse pages, see [`requires_total`].
pub fn compute_window(total: usize, page: i64, page_size: i64) -> Result<Window> {
    if page == 0 || (page < 0 && page_size <= 0) {
        return Ok(Window::All);
    }

    if page_size <= 0 {
        return Err(ManipError::CannotBuildQuery(format!(
            "invalid pagination: page {} requires a positive page size, got {}",
            page, page_size
        )));
    }

    let size = page_size as i128;

    if page > 0 {
        // A skip past usize::MAX is past any result set.
        let Ok(skip) = usize::try_from((page as i128 - 1) * size) else {
            return Ok(Window::Empty);
        };
        return Ok(Window::Range {
            skip,
            limit: to_usize(size)?,
        });
    }

    let n = total as i128;
    let page = -(page as i128);
    let skip = n - page * size;

    if skip >= 0 {
        return Ok(Window::Range {
            skip: to_usize(skip)?,
            limit: to_usize(size)?,
        });
    }

    let balance = n % size;
    let mut max_page = n / size;
    if balance != 0 {
        max_page += 1;
    }

    if page > max_page || balance == 0 {
        return Ok(Window::Empty);
    }

    Ok(Window::Range {
        skip: 0,
        limit: to_usize(balance)?,
    })
}

fn to_usize(value: i128) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        ManipError::CannotBuildQuery(format!("pagination window out of range: {}", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(skip: usize, limit: usize) -> Window {
        Window::Range { skip, limit }
    }

    #[test]
    fn test_forward_pages() {
        assert_eq!(compute_window(10, 1, 3).unwrap(), range(0, 3));
        assert_eq!(compute_window(10, 2, 3).unwrap(), range(3, 3));
        assert_eq!(compute_window(10, 4, 3).unwrap(), range(9, 3));
    }

    #[test]
    fn test_forward_page_beyond_addressable_range() {
        assert_eq!(compute_window(10, i64::MAX, 10).unwrap(), Window::Empty);
        assert_eq!(compute_window(0, i64::MAX, i64::MAX).unwrap(), Window::Empty);
    }

    #[test]
    fn test_reverse_pages() {
        assert_eq!(compute_window(10, -1, 3).unwrap(), range(7, 3));
        assert_eq!(compute_window(10, -3, 3).unwrap(), range(1, 3));
        assert_eq!(compute_window(10, -4, 3).unwrap(), range(0, 1));
        assert_eq!(compute_window(10, -5, 3).unwrap(), Window::Empty);
    }

    #[test]
    fn test_reverse_exact_multiple() {
        assert_eq!(compute_window(9, -3, 3).unwrap(), range(0, 3));
        assert_eq!(compute_window(9, -4, 3).unwrap(), Window::Empty);
    }

    #[test]
    fn test_reverse_on_empty_set() {
        assert_eq!(compute_window(0, -1, 5).unwrap(), Window::Empty);
    }

    #[test]
    fn test_unpaginated() {
        assert_eq!(compute_window(0, 0, 0).unwrap(), Window::All);
        assert_eq!(compute_window(100, 0, 10).unwrap(), Window::All);
        assert_eq!(compute_window(100, -2, 0).unwrap(), Window::All);
        assert_eq!(compute_window(100, -2, -1).unwrap(), Window::All);
    }

    #[test]
    fn test_zero_page_size_is_guarded() {
        assert!(matches!(
            compute_window(10, 1, 0),
            Err(ManipError::CannotBuildQuery(_))
        ));
        assert!(matches!(
            compute_window(10, 3, -5),
            Err(ManipError::CannotBuildQuery(_))
        ));
    }

    #[test]
    fn test_requires_total() {
        assert!(requires_total(-1, 10));
        assert!(!requires_total(1, 10));
        assert!(!requires_total(-1, 0));
        assert!(!requires_total(0, 10));
    }
}
