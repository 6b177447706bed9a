mod common;
use common::*;

use bingoscan::ProgressListener;

#[test]
fn failing_item_is_skipped_and_batch_continues() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let first = save_ticket(dir.path(), "first.png", &two_column_ticket());
    let missing = dir.path().join("missing.png");
    let last = save_ticket(dir.path(), "last.png", &ticket_with_marks(&[]));
    let (mut session, _log) = scripted_session("953");

    let mut progress = Vec::new();
    let mut record = |index: usize, total: usize, label: &str| -> anyhow::Result<()> {
        progress.push((index, total, label.to_string()));
        Ok(())
    };
    let listener: &mut dyn ProgressListener = &mut record;
    let grids = session.scan_batch(&[first, missing, last], 3, 9, Some(listener));

    assert_eq!(grids.len(), 2);
    assert_eq!(grids[0].filled(), 6);
    assert_eq!(grids[1].filled(), 0);
    assert_eq!(
        progress,
        vec![
            (1, 3, "first.png".to_string()),
            (2, 3, "missing.png".to_string()),
            (3, 3, "last.png".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn listener_errors_do_not_abort_the_batch() {
    let tickets = vec![
        InMemoryTicket {
            label: "a".to_string(),
            image: two_column_ticket(),
        },
        InMemoryTicket {
            label: "b".to_string(),
            image: two_column_ticket(),
        },
    ];
    let (mut session, _log) = scripted_session("953");

    let mut calls = 0;
    let mut failing = |_: usize, _: usize, _: &str| -> anyhow::Result<()> {
        calls += 1;
        anyhow::bail!("display went away")
    };
    let listener: &mut dyn ProgressListener = &mut failing;
    let grids = session.scan_batch(&tickets, 3, 9, Some(listener));

    assert_eq!(grids.len(), 2);
    assert_eq!(calls, 2);
}

#[test]
fn scan_errors_are_skipped_without_listener() {
    let tickets = vec![
        InMemoryTicket {
            label: "empty".to_string(),
            image: empty_image(),
        },
        InMemoryTicket {
            label: "ok".to_string(),
            image: ticket_with_marks(&[(0, 8)]),
        },
    ];
    let (mut session, _log) = scripted_session("88");

    let grids = session.scan_batch(&tickets, 3, 9, None);

    assert_eq!(grids.len(), 1);
    assert_eq!(grids[0].get(0, 8), Some(88));
}
