/// Pagination tests
///
/// Exhaustive checks of the page window arithmetic over small result sets.
/// Run with: cargo test --test pagination_tests

use manipulate::pagination::{Window, compute_window, requires_total};

fn indices(window: Window, total: usize) -> Vec<usize> {
    match window {
        Window::All => (0..total).collect(),
        Window::Range { skip, limit } => (skip..skip + limit).filter(|i| *i < total).collect(),
        Window::Empty => Vec::new(),
    }
}

fn max_page(total: usize, size: usize) -> usize {
    total.div_ceil(size)
}

#[test]
fn test_reverse_pages_partition_the_result_set() {
    for total in 0..40usize {
        for size in 1..8usize {
            let mut seen = Vec::new();
            for page in 1..=max_page(total, size) {
                let window = compute_window(total, -(page as i64), size as i64).unwrap();
                let mut slice = indices(window, total);
                assert!(!slice.is_empty(), "N={} S={} P=-{}", total, size, page);
                slice.extend(seen);
                seen = slice;
            }
            assert_eq!(seen, (0..total).collect::<Vec<_>>(), "N={} S={}", total, size);
        }
    }
}

#[test]
fn test_forward_and_reverse_last_pages_agree() {
    for total in 1..40usize {
        for size in 1..8usize {
            let pages = max_page(total, size);
            let forward_first = compute_window(total, 1, size as i64).unwrap();
            let reverse_last = compute_window(total, -(pages as i64), size as i64).unwrap();

            let first = indices(forward_first, total);
            let last = indices(reverse_last, total);
            assert_eq!(first.first(), Some(&0));
            assert_eq!(last.first(), Some(&0));
        }
    }
}

#[test]
fn test_windows_never_exceed_the_result_set() {
    for total in 0..30usize {
        for size in 1..6i64 {
            for page in -12..=12i64 {
                match compute_window(total, page, size).unwrap() {
                    Window::Range { skip, limit } if page < 0 => {
                        assert!(skip + limit <= total, "N={} S={} P={}", total, size, page);
                        assert!(limit > 0);
                    }
                    Window::Range { limit, .. } => assert_eq!(limit as i64, size),
                    Window::All => assert_eq!(page, 0),
                    Window::Empty => {
                        assert!(page < 0);
                        assert!(-page as usize > max_page(total, size as usize));
                    }
                }
            }
        }
    }
}

#[test]
fn test_documented_windows() {
    assert_eq!(
        compute_window(10, -1, 3).unwrap(),
        Window::Range { skip: 7, limit: 3 }
    );
    assert_eq!(
        compute_window(10, -4, 3).unwrap(),
        Window::Range { skip: 0, limit: 1 }
    );
    assert_eq!(
        compute_window(9, -3, 3).unwrap(),
        Window::Range { skip: 0, limit: 3 }
    );
    assert_eq!(compute_window(10, -5, 3).unwrap(), Window::Empty);
}

#[test]
fn test_total_only_needed_for_reverse_pages() {
    assert!(requires_total(-1, 10));
    assert!(!requires_total(1, 10));
    assert!(!requires_total(0, 10));
    assert!(!requires_total(-1, 0));
    assert_eq!(compute_window(0, -1, 0).unwrap(), Window::All);
}
