#![no_main]
use libfuzzer_sys::fuzz_target;
use ndarray::Array2;
use sctrace_core::{MultipleContainer, Selection, TraceBatchContainer, TraceContainer};

// Layout: byte 0 = member count, then one length byte per member, then
// selection bytes (kind, a, b, ...).
fuzz_target!(|data: &[u8]| {
    let Some((&n, rest)) = data.split_first() else {
        return;
    };
    let n = usize::from(n % 6) + 1;
    if rest.len() < n {
        return;
    }
    let (lens, sel) = rest.split_at(n);

    let mut subs: Vec<TraceBatchContainer<u16, u8>> = lens
        .iter()
        .enumerate()
        .map(|(c, &len)| {
            let len = usize::from(len % 16);
            let l = Array2::from_shape_fn((len, 3), |(t, s)| (c * 1000 + t * 3 + s) as u16);
            let v = Array2::from_shape_fn((len, 1), |(t, _)| t as u8);
            TraceBatchContainer::new(l.into_dyn(), v.into_dyn()).unwrap()
        })
        .collect();
    let m = MultipleContainer::new(subs.iter_mut().collect()).unwrap();
    let total = m.len();

    let selection = match sel {
        [0, a, ..] => Selection::Index(usize::from(*a)),
        [1, a, b, ..] => Selection::Range {
            start: Some(usize::from(*a)),
            stop: Some(usize::from(*b)),
            step: None,
        },
        [2, a, b, step, ..] => Selection::stepped(usize::from(*a), usize::from(*b), usize::from(*step)),
        [3, list @ ..] => Selection::Indices(list.iter().map(|&i| usize::from(i)).collect()),
        _ => Selection::all(),
    };

    // Every accepted selection must agree with point reads; rejections are fine.
    if let Ok(batch) = m.select(&selection) {
        let start = match selection.resolve(total) {
            Ok(sctrace_core::Resolved::Single(i)) => i,
            Ok(sctrace_core::Resolved::Span(r)) => r.start,
            Err(_) => unreachable!("select succeeded"),
        };
        for (j, trace) in batch.traces().enumerate() {
            assert_eq!(trace, m.get(start + j).unwrap());
        }
    }
});
