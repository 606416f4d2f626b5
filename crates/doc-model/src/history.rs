//! Invertible edit actions and the linear undo/redo executor.
//!
//! Layout and annotations are only mutated by executing an [`Action`] through
//! [`ActionExecutor`]; read access goes through [`ActionExecutor::state`].

use log::debug;
use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationId, AnnotationPatch};
use crate::geometry::Rotation;
use crate::layout::{PageId, PageLayout};
use crate::store::{AnnotationSet, EditStore};

/// Page layout and annotation store of one editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditState {
    pub(crate) layout: PageLayout,
    pub(crate) store: EditStore,
}

impl EditState {
    pub fn new(page_count: usize) -> Self {
        Self { layout: PageLayout::new(page_count), store: EditStore::default() }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn store(&self) -> &EditStore {
        &self.store
    }

    pub fn annotations(&self) -> &AnnotationSet {
        self.store.annotations()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Add { annotation: Annotation },
    Update { id: AnnotationId, previous: AnnotationPatch, current: AnnotationPatch },
    /// Carries the removed object, its z-order position and whether it was
    /// selected, so undo can put back both the object and the selection.
    Remove {
        annotation: Annotation,
        position: usize,
        #[serde(default)]
        was_selected: bool,
    },
    RotatePage { page: PageId, previous: Rotation, current: Rotation },
    DeletePage { page: PageId },
    RestorePage { page: PageId },
    ReorderPages { previous: Vec<PageId>, current: Vec<PageId> },
}

impl Action {
    pub fn description(&self) -> String {
        match self {
            Action::Add { annotation } => format!("add {:?}", annotation.kind()),
            Action::Update { current, .. } => format!("update {:?}", current.kind()),
            Action::Remove { annotation, .. } => format!("remove {:?}", annotation.kind()),
            Action::RotatePage { page, current, .. } => {
                format!("rotate page {page} to {}", current.degrees())
            }
            Action::DeletePage { page } => format!("delete page {page}"),
            Action::RestorePage { page } => format!("restore page {page}"),
            Action::ReorderPages { .. } => "reorder pages".to_owned(),
        }
    }

    /// Whether the action changes what the rasterizer draws rather than only the overlay.
    pub fn affects_pages(&self) -> bool {
        matches!(
            self,
            Action::RotatePage { .. }
                | Action::DeletePage { .. }
                | Action::RestorePage { .. }
                | Action::ReorderPages { .. }
        )
    }

    fn execute(&self, state: &mut EditState) {
        match self {
            Action::Add { annotation } => state.store.annotations_mut().push(annotation.clone()),
            Action::Update { id, current, .. } => {
                if state.store.annotations_mut().apply_patch(*id, current).is_none() {
                    debug!("update target {id} no longer exists");
                }
            }
            Action::Remove { annotation, .. } => remove(state, annotation.id()),
            Action::RotatePage { page, current, .. } => state.layout.set_rotation(*page, *current),
            Action::DeletePage { page } => state.layout.set_deleted(*page, true),
            Action::RestorePage { page } => state.layout.set_deleted(*page, false),
            Action::ReorderPages { current, .. } => state.layout.set_order(current.clone()),
        }
    }

    fn rollback(&self, state: &mut EditState) {
        match self {
            Action::Add { annotation } => remove(state, annotation.id()),
            Action::Update { id, previous, .. } => {
                if state.store.annotations_mut().apply_patch(*id, previous).is_none() {
                    debug!("update target {id} no longer exists");
                }
            }
            Action::Remove { annotation, position, was_selected } => {
                state.store.annotations_mut().insert(annotation.clone(), *position);
                if *was_selected {
                    state.store.select(Some(annotation.id()));
                }
            }
            Action::RotatePage { page, previous, .. } => state.layout.set_rotation(*page, *previous),
            Action::DeletePage { page } => state.layout.set_deleted(*page, false),
            Action::RestorePage { page } => state.layout.set_deleted(*page, true),
            Action::ReorderPages { previous, .. } => state.layout.set_order(previous.clone()),
        }
    }
}

fn remove(state: &mut EditState, id: AnnotationId) {
    if state.store.annotations_mut().remove(id).is_some() {
        state.store.clear_selection_of(id);
    }
}

/// Owns the edit state and the undo/redo stacks.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    state: EditState,
    undo_stack: Vec<Action>,
    redo_stack: Vec<Action>,
}

impl ActionExecutor {
    pub fn new(state: EditState) -> Self {
        Self { state, undo_stack: Vec::new(), redo_stack: Vec::new() }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// Selection and tool changes are navigation, not history.
    pub(crate) fn store_mut(&mut self) -> &mut EditStore {
        &mut self.state.store
    }

    /// Applies `action`, records it and discards any redo history.
    pub fn execute(&mut self, action: Action) {
        debug!("execute: {}", action.description());
        action.execute(&mut self.state);
        self.redo_stack.clear();
        self.undo_stack.push(action);
    }

    /// Reverts the most recent action. Returns it, or `None` if there was nothing to undo.
    pub fn undo(&mut self) -> Option<&Action> {
        let action = self.undo_stack.pop()?;
        debug!("undo: {}", action.description());
        action.rollback(&mut self.state);
        self.redo_stack.push(action);
        self.redo_stack.last()
    }

    pub fn redo(&mut self) -> Option<&Action> {
        let action = self.redo_stack.pop()?;
        debug!("redo: {}", action.description());
        action.execute(&mut self.state);
        self.undo_stack.push(action);
        self.undo_stack.last()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_stack(&self) -> &[Action] {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &[Action] {
        &self.redo_stack
    }
}
