use std::time::{Duration, UNIX_EPOCH};

use bitshard::codec;
use bitshard::{
    Bitmap, BitmapHandle, Calculation, Command, Error, Fragment, MemoryStorage, Status,
};

fn fragment() -> Fragment<MemoryStorage> {
    Fragment::new(MemoryStorage::new())
}

#[test]
fn every_command_reports_its_query_type() {
    let cases = [
        (Command::Get { row_id: 1 }, "Get"),
        (Command::Empty, "Empty"),
        (Command::Clear, "Clear"),
        (Command::Stats, "Stats"),
        (Command::Mask { start: 0, end: 1 }, "Mask"),
        (Command::LoadRequest { row_id: 1 }, "LoadRequest"),
        (
            Command::TopNAll {
                n: 1,
                categories: vec![],
            },
            "TopNAll",
        ),
    ];
    for (cmd, name) in cases {
        assert_eq!(cmd.query_type(), name);
    }
    assert!(Command::Clear.is_mutation());
    assert!(!Command::Stats.is_mutation());
}

#[test]
fn export_then_import_round_trips() {
    let mut f = fragment();
    let original: Bitmap = [0u64, 17, 65_536, 1 << 40].into_iter().collect();
    let h = f.alloc_handle(original.clone());

    let bytes = match f.execute(Command::GetBytes { handle: h }) {
        Calculation::Bytes(b) => b,
        other => panic!("unexpected {:?}", other),
    };
    let imported = f
        .execute(Command::FromBytes { frame: bytes })
        .handle()
        .unwrap();
    assert_ne!(imported, h);
    assert_eq!(f.bitmap(imported), Some(&original));
}

#[test]
fn export_of_missing_handle_is_an_empty_bitmap() {
    let mut f = fragment();
    let bytes = match f.execute(Command::GetBytes {
        handle: BitmapHandle::from(42),
    }) {
        Calculation::Bytes(b) => b,
        other => panic!("unexpected {:?}", other),
    };
    assert!(codec::decode(&bytes).unwrap().is_empty());
}

#[test]
fn corrupted_import_allocates_nothing() {
    let mut f = fragment();
    f.execute(Command::Empty);
    let before = f.handle_count();

    let res = f.execute(Command::FromBytes {
        frame: b"definitely not a bitmap".to_vec(),
    });
    assert!(matches!(res, Calculation::Error(Error::Decode(_))));
    assert_eq!(f.handle_count(), before);
}

#[test]
fn loader_stores_decoded_rows() {
    let mut f = fragment();
    let bm: Bitmap = [3u64, 4, 5].into_iter().collect();
    let text = codec::encode_base64(&bm, 3).unwrap();
    let res = f.execute(Command::Loader {
        row_id: 9,
        compressed: text,
        filter: 0,
    });
    assert_eq!(res, Calculation::Status(Status::Ok));
    assert_eq!(f.get(9).unwrap(), bm);
}

#[test]
fn loader_skips_undecodable_input_without_touching_storage() {
    let mut f = fragment();
    f.set_bit(9, 1, 0).unwrap();
    let res = f.execute(Command::Loader {
        row_id: 9,
        compressed: "!!! not base64 !!!".into(),
        filter: 0,
    });
    assert_eq!(res, Calculation::Status(Status::NotApplied));
    assert_eq!(f.get(9).unwrap().iter().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn get_list_returns_one_handle_per_row() {
    let mut f = fragment();
    f.set_bit(1, 10, 0).unwrap();
    f.set_bit(2, 20, 0).unwrap();
    let handles = match f.execute(Command::GetList {
        row_ids: vec![2, 1, 3],
    }) {
        Calculation::Handles(h) => h,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(handles.len(), 3);
    let counts: Vec<u64> = handles
        .iter()
        .map(|h| f.bitmap(*h).unwrap().count())
        .collect();
    assert_eq!(counts, vec![1, 1, 0]);
    assert!(f.bitmap(handles[0]).unwrap().contains(20));
}

#[test]
fn clear_and_stats_reflect_storage() {
    let mut f = fragment();
    f.execute(Command::SetBit {
        row_id: 1,
        pos: 1,
        filter: 0,
    });
    f.execute(Command::SetBit {
        row_id: 2,
        pos: 1,
        filter: 0,
    });
    f.execute(Command::SetBit {
        row_id: 2,
        pos: 2,
        filter: 0,
    });
    match f.execute(Command::Stats) {
        Calculation::Stats(s) => {
            assert_eq!(s.rows, 2);
            assert_eq!(s.bits, 3);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(f.execute(Command::Clear), Calculation::Status(Status::Ok));
    match f.execute(Command::Stats) {
        Calculation::Stats(s) => assert_eq!((s.rows, s.bits), (0, 0)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn clear_bit_command_reports_change() {
    let mut f = fragment();
    f.set_bit(3, 8, 0).unwrap();
    assert_eq!(
        f.execute(Command::ClearBit { row_id: 3, pos: 8 }),
        Calculation::Changed(true)
    );
    assert_eq!(
        f.execute(Command::ClearBit { row_id: 3, pos: 8 }),
        Calculation::Changed(false)
    );
}

#[test]
fn load_request_allocates_no_handle() {
    let mut f = fragment();
    f.set_bit(1, 1, 0).unwrap();
    assert_eq!(
        f.execute(Command::LoadRequest { row_id: 1 }),
        Calculation::Status(Status::Ok)
    );
    assert_eq!(f.handle_count(), 0);
}

#[test]
fn range_selects_bits_by_time_bucket() {
    let mut f = fragment();
    let t = |secs: u64| UNIX_EPOCH + Duration::from_secs(secs);
    f.set_bit(1, 100, 1_000).unwrap();
    f.set_bit(1, 200, 2_000).unwrap();
    f.set_bit(1, 300, 3_000).unwrap();
    let h = f
        .execute(Command::Range {
            row_id: 1,
            start: t(1_500),
            end: t(3_000),
        })
        .handle()
        .unwrap();
    assert_eq!(f.bitmap(h).unwrap().iter().collect::<Vec<_>>(), vec![200]);
}

#[test]
fn timed_loader_runs_merge_into_the_row() {
    let mut f = fragment();
    let t = |secs: u64| UNIX_EPOCH + Duration::from_secs(secs);
    f.set_bit(4, 5, 1_000).unwrap();
    for (bits, filter) in [(vec![7u64, 8], 2_000u64), (vec![9], 3_000)] {
        let bm: Bitmap = bits.into_iter().collect();
        let res = f.execute(Command::Loader {
            row_id: 4,
            compressed: codec::encode_base64(&bm, 3).unwrap(),
            filter,
        });
        assert_eq!(res, Calculation::Status(Status::Ok));
    }
    assert_eq!(f.get(4).unwrap().iter().collect::<Vec<_>>(), vec![5, 7, 8, 9]);

    let h = f
        .execute(Command::Range {
            row_id: 4,
            start: t(1_500),
            end: t(3_000),
        })
        .handle()
        .unwrap();
    assert_eq!(f.bitmap(h).unwrap().iter().collect::<Vec<_>>(), vec![7, 8]);
}
