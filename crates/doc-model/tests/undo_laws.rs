use doc_model::settings::ZoomSettings;
use doc_model::{
    EditSession, HighlightAnnotation, HighlightPatch, PageId, PageInfo, Rect, TextAnnotation,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const PAGES: u32 = 4;

#[derive(Debug, Clone)]
enum Op {
    AddText { page: u32, x: f32, y: f32 },
    AddHighlight { page: u32, width: f32 },
    MoveHighlight { index: usize, x: f32 },
    Remove { index: usize },
    Rotate { page: u32, quarters: i32 },
    Delete { page: u32 },
    Restore { page: u32 },
    MovePage { from: usize, to: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PAGES, 0.0f32..500.0, 0.0f32..700.0).prop_map(|(page, x, y)| Op::AddText { page, x, y }),
        (0..PAGES, 6.0f32..200.0).prop_map(|(page, width)| Op::AddHighlight { page, width }),
        (0usize..8, 0.0f32..500.0).prop_map(|(index, x)| Op::MoveHighlight { index, x }),
        (0usize..8).prop_map(|index| Op::Remove { index }),
        (0..PAGES, -4i32..5).prop_map(|(page, quarters)| Op::Rotate { page, quarters }),
        (0..PAGES).prop_map(|page| Op::Delete { page }),
        (0..PAGES).prop_map(|page| Op::Restore { page }),
        (0usize..PAGES as usize, 0usize..PAGES as usize).prop_map(|(from, to)| Op::MovePage { from, to }),
    ]
}

fn apply(session: &mut EditSession, op: &Op) {
    match *op {
        Op::AddText { page, x, y } => {
            session.add(TextAnnotation::new(PageId(page), x, y, "t")).expect("page is in range");
        }
        Op::AddHighlight { page, width } => {
            session
                .add(HighlightAnnotation::new(PageId(page), Rect::new(1.0, 1.0, width, 10.0)))
                .expect("page is in range");
        }
        Op::MoveHighlight { index, x } => {
            let id = session.state().annotations().highlights.get(index).map(|h| h.id);
            if let Some(id) = id {
                session.update(id, HighlightPatch { x: Some(x), ..Default::default() });
            }
        }
        Op::Remove { index } => {
            let all: Vec<_> = session.state().annotations().iter().map(|a| a.id()).collect();
            if let Some(id) = all.get(index) {
                session.remove(*id);
            }
        }
        Op::Rotate { page, quarters } => {
            session.rotate_page(PageId(page), quarters * 90).expect("page is in range");
        }
        Op::Delete { page } => {
            session.delete_page(PageId(page)).expect("page is in range");
        }
        Op::Restore { page } => {
            session.restore_page(PageId(page)).expect("page is in range");
        }
        Op::MovePage { from, to } => {
            session.move_page(from, to).expect("positions are in range");
        }
    }
}

fn new_session() -> EditSession {
    EditSession::new(vec![PageInfo::default(); PAGES as usize], ZoomSettings::default())
}

proptest! {
    #[test]
    fn every_recorded_action_is_inverted_by_undo(ops in prop::collection::vec(op(), 1..30)) {
        let mut session = new_session();
        for op in &ops {
            let before = session.state().clone();
            let depth = session.history().undo_stack().len();
            apply(&mut session, op);
            if session.history().undo_stack().len() == depth {
                prop_assert_eq!(session.state(), &before);
                continue;
            }
            let after = session.state().clone();

            session.undo();
            prop_assert_eq!(session.state(), &before);
            session.redo();
            prop_assert_eq!(session.state(), &after);
        }
    }

    #[test]
    fn undoing_everything_returns_to_the_loaded_state(ops in prop::collection::vec(op(), 1..30)) {
        let mut session = new_session();
        let initial = session.state().clone();
        for op in &ops {
            apply(&mut session, op);
        }
        while session.undo().is_some() {}
        prop_assert_eq!(session.state(), &initial);
    }

    #[test]
    fn four_quarter_turns_compose_to_identity(page in 0..PAGES) {
        let mut session = new_session();
        let start = session.layout().rotation(PageId(page));
        for _ in 0..4 {
            session.rotate_page(PageId(page), 90).expect("page is in range");
        }
        prop_assert_eq!(session.layout().rotation(PageId(page)), start);
    }
}

#[test]
fn redo_after_new_action_is_a_noop() {
    let mut session = new_session();
    session.rotate_page(PageId(0), 90).expect("page is in range");
    session.undo();
    session.delete_page(PageId(2)).expect("page is in range");

    let before = session.state().clone();
    assert!(session.redo().is_none());
    assert_eq!(session.state(), &before);
}

#[test]
fn rotation_and_text_add_are_undone_in_reverse_call_order() {
    let mut session = new_session();
    session.rotate_page(PageId(0), 90).expect("page is in range");
    session.rotate_page(PageId(0), 90).expect("page is in range");
    session.add(TextAnnotation::new(PageId(0), 10.0, 10.0, "note")).expect("page is in range");
    assert_eq!(session.layout().rotation(PageId(0)).degrees(), 180);

    // The text add was executed last, so it is undone first.
    session.undo();
    assert!(session.state().annotations().texts.is_empty());
    session.undo();
    assert_eq!(session.layout().rotation(PageId(0)).degrees(), 90);
    session.undo();
    assert_eq!(session.layout().rotation(PageId(0)).degrees(), 0);
}
