//! Integration tests for the character board.
//!
//! Boards live on a 3x5 dummy deck; every written cell must be shown as
//! the key's up text, and geometry helpers must clip against the grid.

use std::sync::Arc;

use macrodeck::transport::{DummyDeck, VENDOR_ID};
use macrodeck::{DeckDevice, DeckError, MacroDeck};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn attach(pid: u16) -> (Arc<DummyDeck>, MacroDeck) {
    init_tracing();
    let dummy = Arc::new(DummyDeck::new(VENDOR_ID, pid));
    dummy.open().unwrap();
    let deck = MacroDeck::new(dummy.clone());
    (dummy, deck)
}

fn deck_3x5() -> (Arc<DummyDeck>, MacroDeck) {
    attach(0x006D)
}

fn rows(deck: &MacroDeck) -> Vec<String> {
    deck.get_board_as_strings().unwrap()
}

// ── Creation ──

#[test]
fn reads_before_creation_fail() {
    let (_dummy, deck) = deck_3x5();
    assert!(matches!(deck.get_board(), Err(DeckError::BoardNotInitialised)));
    assert!(matches!(
        deck.get_board_char(0, 0),
        Err(DeckError::BoardNotInitialised)
    ));
    assert!(matches!(
        deck.get_pressed_chars(),
        Err(DeckError::BoardNotInitialised)
    ));
    // refresh without a board is a no-op
    deck.refresh_board().unwrap();
}

#[test]
fn create_board_shows_every_key() {
    let (dummy, deck) = deck_3x5();
    deck.create_board('x').unwrap();
    assert_eq!(rows(&deck), vec!["xxxxx"; 3]);
    assert_eq!(dummy.key_write_count(), 15);
    for key in 0..15 {
        assert!(dummy.key_image(key).is_some());
        assert_eq!(dummy.key_image(key), deck.get_key_image(key, false));
    }
}

#[test]
fn create_board_from_strings_pads_and_truncates() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board_from_strings(&["ab", "abcdefgh"], '-').unwrap();
    assert_eq!(rows(&deck), vec!["ab---", "abcde", "-----"]);
    let board = deck.get_board().unwrap();
    assert_eq!((board.rows(), board.cols()), (3, 5));
}

#[test]
fn set_board_char_creates_blank_board() {
    let (_dummy, deck) = deck_3x5();
    deck.set_board_char(1, 2, 'Q').unwrap();
    assert_eq!(rows(&deck), vec!["     ", "  Q  ", "     "]);
    assert_eq!(deck.get_board_char(1, 2).unwrap(), 'Q');
}

#[test]
fn out_of_range_cells_are_rejected() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board(' ').unwrap();
    assert!(matches!(
        deck.set_board_char(3, 0, 'x'),
        Err(DeckError::InvalidPosition { row: 3, col: 0 })
    ));
    assert!(matches!(
        deck.get_board_char(0, 5),
        Err(DeckError::InvalidPosition { row: 0, col: 5 })
    ));
}

#[test]
fn clear_board_refills() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board_from_strings(&["hello"], ' ').unwrap();
    deck.clear_board('.').unwrap();
    assert_eq!(rows(&deck), vec!["....."; 3]);
}

#[test]
fn display_text_does_not_store() {
    let (dummy, deck) = deck_3x5();
    deck.display_text(&["hi"]).unwrap();
    assert!(matches!(deck.get_board(), Err(DeckError::BoardNotInitialised)));
    assert_eq!(dummy.key_write_count(), 15);
}

// ── Text ──

#[test]
fn draw_text_clips_at_edges() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board('.').unwrap();
    deck.draw_text(0, -2, "abcd").unwrap();
    deck.draw_text(1, 3, "hello").unwrap();
    deck.draw_text(5, 0, "gone").unwrap();
    assert_eq!(rows(&deck), vec!["cd...", "...he", "....."]);
}

#[test]
fn draw_multiline_text_and_overlay() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board('.').unwrap();
    deck.draw_multiline_text(1, 1, &["ab", "cd", "ef"]).unwrap();
    assert_eq!(rows(&deck), vec![".....", ".ab..", ".cd.."]);

    deck.overlay_board(&[vec!['X', 'Y'], vec!['Z']], -1, 3).unwrap();
    assert_eq!(rows(&deck), vec!["...Z.", ".ab..", ".cd.."]);
}

// ── Scrolling ──

#[test]
fn scroll_shifts_and_fills() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board_from_strings(&["abcde", "fghij", "klmno"], ' ').unwrap();

    deck.scroll_board(1, 0, '.').unwrap();
    assert_eq!(rows(&deck), vec![".abcd", ".fghi", ".klmn"]);

    deck.scroll_board(0, -1, '*').unwrap();
    assert_eq!(rows(&deck), vec![".fghi", ".klmn", "*****"]);

    deck.scroll_board(-10, 0, '_').unwrap();
    assert_eq!(rows(&deck), vec!["_____"; 3]);
}

#[test]
fn scrolled_rect_lands_one_cell_down_right() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board('A').unwrap();
    deck.draw_rect(0, 0, 2, 2, 'B').unwrap();
    deck.scroll_board(1, 1, ' ').unwrap();

    assert_eq!(deck.get_board_char(1, 1).unwrap(), 'B');
    assert_eq!(rows(&deck), vec!["     ", " BBAA", " BBAA"]);
}

#[test]
fn scroll_without_board_creates_it() {
    let (_dummy, deck) = deck_3x5();
    deck.scroll_board(2, 1, '#').unwrap();
    assert_eq!(rows(&deck), vec!["#####"; 3]);
}

// ── Shapes ──

#[test]
fn draw_rect_outlines_border() {
    let (dummy, deck) = deck_3x5();
    deck.create_board('.').unwrap();
    let writes = dummy.key_write_count();

    deck.draw_rect(0, 0, 3, 5, '#').unwrap();
    assert_eq!(rows(&deck), vec!["#####", "#...#", "#####"]);
    // each border cell is pushed once
    assert_eq!(dummy.key_write_count() - writes, 12);
}

#[test]
fn draw_rect_clips_and_degenerates() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board('.').unwrap();
    deck.draw_rect(-1, 2, 3, 10, '#').unwrap();
    assert_eq!(rows(&deck), vec!["..#..", "..###", "....."]);

    deck.clear_board('.').unwrap();
    deck.draw_rect(2, 1, 1, 3, '-').unwrap();
    assert_eq!(rows(&deck), vec![".....", ".....", ".---."]);

    deck.clear_board('.').unwrap();
    deck.draw_rect(0, 0, 0, 3, '#').unwrap();
    assert_eq!(rows(&deck), vec!["....."; 3]);
}

#[test]
fn fill_rect_fills_area() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board('.').unwrap();
    deck.fill_rect(1, 3, 5, 5, 'o').unwrap();
    assert_eq!(rows(&deck), vec![".....", "...oo", "...oo"]);
}

#[test]
fn diagonal_line_marks_longest_side() {
    let (_dummy, deck) = attach(0x006C);
    deck.create_board(' ').unwrap();
    deck.draw_line(0, 0, 3, 7, 'C').unwrap();

    let board = deck.get_board().unwrap();
    assert_eq!(board.get(3, 7).copied().unwrap(), 'C');
    let marked: Vec<(usize, usize)> = board
        .iter()
        .filter(|(_, _, ch)| **ch == 'C')
        .map(|(row, col, _)| (row, col))
        .collect();
    assert_eq!(marked.len(), 8);
    // one cell per column, rows never going back up
    assert!(marked.windows(2).all(|w| w[1].0 >= w[0].0 && w[1].1 == w[0].1 + 1));
}

#[test]
fn draw_line_includes_endpoints() {
    let (_dummy, deck) = deck_3x5();
    deck.create_board('.').unwrap();
    deck.draw_line(0, 0, 2, 4, '\\').unwrap();
    assert_eq!(rows(&deck), vec!["\\\\...", "..\\..", "...\\\\"]);

    deck.clear_board('.').unwrap();
    deck.draw_line(2, 1, 2, 1, '*').unwrap();
    assert_eq!(rows(&deck), vec![".....", ".....", ".*..."]);

    deck.clear_board('.').unwrap();
    deck.draw_line(0, 4, 2, 4, '|').unwrap();
    assert_eq!(rows(&deck), vec!["....|", "....|", "....|"]);
}

// ── Device interaction ──

#[test]
fn board_cells_become_key_text() {
    let (dummy, deck) = deck_3x5();
    deck.create_board(' ').unwrap();
    let blank = dummy.key_image(7);

    deck.set_board_char(1, 2, 'A').unwrap();
    let shown = dummy.key_image(7);
    assert_ne!(shown, blank);
    assert_eq!(shown, deck.get_key_image(7, false));
    assert!(deck.is_key_configured(7));
}

#[test]
fn refresh_board_repushes() {
    let (dummy, deck) = deck_3x5();
    deck.create_board_from_strings(&["r"], ' ').unwrap();
    dummy.reset().unwrap();
    assert!(dummy.key_image(0).is_none());

    deck.refresh_board().unwrap();
    assert_eq!(dummy.key_image(0), deck.get_key_image(0, false));
}

#[test]
fn non_visual_device_keeps_logical_board() {
    let (dummy, deck) = attach(0x0086);
    deck.create_board_from_strings(&["abc"], ' ').unwrap();
    deck.draw_text(0, 1, "Z").unwrap();
    assert_eq!(rows(&deck), vec!["aZc"]);
    assert_eq!(dummy.key_write_count(), 0);

    dummy.press_key(1, true);
    assert_eq!(deck.get_pressed_chars().unwrap(), vec!['Z']);
}
