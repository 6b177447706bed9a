mod common;
use common::*;

#[test]
fn marked_cells_are_read_and_reconciled_per_column() -> anyhow::Result<()> {
    let (mut session, log) = scripted_session("953");

    let grid = session.scan(two_column_ticket(), 3, 9)?;

    assert_eq!((grid.rows, grid.cols), (3, 9));
    for row in 0..3 {
        let expected = vec![Some(5), None, None, None, None, Some(53), None, None, None];
        assert_eq!(grid.cells[row], expected, "row {row}");
    }
    assert_eq!(grid.filled(), 6);

    // One call per marked cell; the first variant already reconciles
    let log = log.borrow();
    assert_eq!(log.calls.len(), 6);
    assert_eq!(
        log.calls.iter().filter(|m| **m == SegmentationMode::SingleChar).count(),
        3
    );
    Ok(())
}

#[test]
fn blank_ticket_never_calls_the_recognizer() -> anyhow::Result<()> {
    let (mut session, log) = scripted_session("42");

    let grid = session.scan(ticket_with_marks(&[]), 3, 9)?;

    assert_eq!(grid.filled(), 0);
    assert!(grid.cells.iter().flatten().all(Option::is_none));
    assert!(log.borrow().calls.is_empty());
    Ok(())
}

#[test]
fn unreadable_text_leaves_cell_unresolved() -> anyhow::Result<()> {
    // Every variant is tried and none reconciles
    let (mut session, log) = scripted_session("");

    let grid = session.scan(ticket_with_marks(&[(1, 3)]), 3, 9)?;

    assert_eq!(grid.get(1, 3), None);
    assert_eq!(log.borrow().calls.len(), 8);
    Ok(())
}

#[test]
fn bottom_row_of_3x9_tries_the_tall_crop() -> anyhow::Result<()> {
    let (mut session, log) = scripted_session("x");

    let grid = session.scan(ticket_with_marks(&[(2, 4)]), 3, 9)?;

    assert_eq!(grid.filled(), 0);
    assert_eq!(log.borrow().calls.len(), 12);
    Ok(())
}

#[test]
fn other_layouts_scan_without_footer_trim() -> anyhow::Result<()> {
    let (mut session, _log) = scripted_session("7");

    let grid = session.scan(ticket_with_marks(&[]), 5, 5)?;

    assert_eq!(grid.cells.len(), 5);
    assert!(grid.cells.iter().all(|row| row.len() == 5));
    assert_eq!(grid.filled(), 0);
    Ok(())
}

#[test]
fn zero_sized_grid_is_rejected() {
    let (mut session, log) = scripted_session("1");

    let result = session.scan(two_column_ticket(), 0, 9);

    assert!(matches!(result, Err(ScanError::InvalidGrid { rows: 0, cols: 9 })));
    assert!(log.borrow().calls.is_empty());
}

#[test]
fn zero_area_image_is_rejected() {
    let (mut session, _log) = scripted_session("1");

    let result = session.scan(empty_image(), 3, 9);

    assert!(matches!(result, Err(ScanError::EmptyImage { width: 0, height: 0 })));
}

#[test]
fn closing_terminates_the_engine_once() {
    let (session, log) = scripted_session("1");

    session.close();

    assert_eq!(log.borrow().terminations, 1);
}

#[test]
fn dropping_a_session_terminates_the_engine() {
    let (session, log) = scripted_session("1");

    drop(session);

    assert_eq!(log.borrow().terminations, 1);
}

#[test]
fn grid_display_shows_blanks_as_dots() -> anyhow::Result<()> {
    let (mut session, _log) = scripted_session("953");

    let grid = session.scan(two_column_ticket(), 3, 9)?;
    let text = grid.to_string();

    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().all(|line| line.trim_start().starts_with('5')));
    assert!(text.contains(" 53"));
    Ok(())
}

#[test]
fn grid_wider_than_the_number_ranges_is_rejected() {
    let (mut session, log) = scripted_session("1");

    let result = session.scan(ticket_with_marks(&[(0, 0)]), 1, 7000);

    assert!(matches!(result, Err(ScanError::InvalidGrid { rows: 1, cols: 7000 })));
    assert!(matches!(
        session.scan(ticket_with_marks(&[]), 1, u32::MAX),
        Err(ScanError::InvalidGrid { .. })
    ));
    assert!(log.borrow().calls.is_empty());
}

#[test]
fn finished_scan_records_every_stage() -> anyhow::Result<()> {
    let (mut session, _log) = scripted_session("953");
    assert!(session.last_stages().is_none());

    session.scan(two_column_ticket(), 3, 9)?;

    let stages = session.last_stages().expect("stages of the last scan");
    assert_eq!(stages.current(), ScanStage::Done);
    // Capturing, Normalizing, Binarizing, Segmenting, 27 cells, Done
    assert_eq!(stages.history().len(), 4 + 27 + 1);
    assert_eq!(stages.history()[0], ScanStage::Capturing);
    assert_eq!(stages.history()[4], ScanStage::Recognizing { cell: 0 });
    assert_eq!(stages.history()[30], ScanStage::Recognizing { cell: 26 });
    Ok(())
}
