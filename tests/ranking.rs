use bitshard::{BitmapHandle, Calculation, Command, Error, FillArgs, Fragment, MemoryStorage, Pair};

fn pair(id: u64, count: u64) -> Pair {
    Pair { id, count }
}

/// Row `id` gets bits `0..count`.
fn seeded(rows: &[(u64, u64)]) -> Fragment<MemoryStorage> {
    let mut f = Fragment::new(MemoryStorage::new());
    for &(id, count) in rows {
        for pos in 0..count {
            f.set_bit(id, pos, 0).unwrap();
        }
    }
    f
}

#[test]
fn top_n_breaks_ties_by_ascending_id() {
    let mut f = seeded(&[(30, 1), (20, 5), (10, 5)]);
    let all = f.mask(0, 100);
    let got = f.top_n(all, 2, &[10, 20, 30]).unwrap();
    assert_eq!(got, vec![pair(10, 5), pair(20, 5)]);
}

#[test]
fn top_n_counts_intersection_with_filter() {
    let mut f = seeded(&[(1, 10), (2, 4), (3, 2)]);
    let filter = f.mask(3, 6);
    let got = f.top_n(filter, 10, &[1, 2, 3]).unwrap();
    assert_eq!(got, vec![pair(1, 3), pair(2, 1)]);
}

#[test]
fn top_n_without_categories_ranks_every_row() {
    let mut f = seeded(&[(4, 2), (8, 7), (6, 3)]);
    let all = f.mask(0, 100);
    let got = f.top_n(all, 10, &[]).unwrap();
    assert_eq!(got, vec![pair(8, 7), pair(6, 3), pair(4, 2)]);
}

#[test]
fn top_n_drops_zero_counts_and_unknown_rows() {
    let mut f = seeded(&[(1, 3)]);
    let none = f.mask(50, 60);
    assert!(f.top_n(none, 5, &[1, 2]).unwrap().is_empty());
    let all = f.mask(0, 60);
    assert_eq!(f.top_n(all, 5, &[1, 2, 1]).unwrap(), vec![pair(1, 3)]);
}

#[test]
fn top_n_with_zero_limit_is_empty() {
    let mut f = seeded(&[(1, 3)]);
    let all = f.mask(0, 10);
    assert!(f.top_n(all, 0, &[]).unwrap().is_empty());
}

#[test]
fn top_n_missing_filter_handle_is_an_error() {
    let mut f = seeded(&[(1, 3)]);
    let res = f.execute(Command::TopN {
        handle: BitmapHandle::from(77),
        n: 3,
        categories: vec![1],
    });
    assert_eq!(
        res,
        Calculation::Error(Error::HandleNotFound(BitmapHandle::from(77)))
    );
}

#[test]
fn top_n_all_ranks_raw_cardinality() {
    let mut f = seeded(&[(1, 2), (2, 9), (3, 4), (4, 4)]);
    let got = f.execute(Command::TopNAll {
        n: 3,
        categories: vec![],
    });
    assert_eq!(
        got.pairs().unwrap(),
        &[pair(2, 9), pair(3, 4), pair(4, 4)][..]
    );
}

#[test]
fn top_fill_reports_raw_counts_in_candidate_order() {
    let mut f = seeded(&[(1, 2), (2, 9), (3, 4)]);
    let got = f
        .top_fill(&FillArgs {
            handle: None,
            rows: vec![3, 99, 1, 2],
        })
        .unwrap();
    assert_eq!(got, vec![pair(3, 4), pair(1, 2), pair(2, 9)]);
}

#[test]
fn top_fill_intersects_with_filter_and_skips_zeroes() {
    let mut f = seeded(&[(1, 2), (2, 9), (3, 4)]);
    let filter = f.mask(3, 100);
    let got = f
        .top_fill(&FillArgs {
            handle: Some(filter),
            rows: vec![1, 2, 3],
        })
        .unwrap();
    assert_eq!(got, vec![pair(2, 6), pair(3, 1)]);
}

#[test]
fn top_fill_allocates_no_handles() {
    let mut f = seeded(&[(1, 2), (2, 3)]);
    let before = f.handle_count();
    f.execute(Command::TopFill {
        args: FillArgs {
            handle: None,
            rows: vec![1, 2],
        },
    });
    assert_eq!(f.handle_count(), before);
}

#[test]
fn top_fill_with_zero_handle_reports_raw_counts() {
    let mut f = seeded(&[(1, 2)]);
    let got = f.execute(Command::TopFill {
        args: FillArgs {
            handle: Some(BitmapHandle::from(0)),
            rows: vec![1],
        },
    });
    assert_eq!(got, Calculation::Pairs(vec![pair(1, 2)]));
}

#[test]
fn top_fill_missing_filter_handle_is_an_error() {
    let mut f = seeded(&[(1, 2)]);
    let res = f.execute(Command::TopFill {
        args: FillArgs {
            handle: Some(BitmapHandle::from(77)),
            rows: vec![1],
        },
    });
    assert_eq!(
        res,
        Calculation::Error(Error::HandleNotFound(BitmapHandle::from(77)))
    );
}
