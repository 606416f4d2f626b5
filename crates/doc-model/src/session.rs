//! A single editing session: page layout, annotations, history and navigation
//! for one loaded document. Created on load, dropped on teardown or reload.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationId, AnnotationPatch, AnnotationRef};
use crate::geometry::{PageSize, PageTransform, Rotation};
use crate::history::{Action, ActionExecutor, EditState};
use crate::layout::{PageId, PageLayout, PageThumbnail};
use crate::settings::ZoomSettings;
use crate::store::{EditStore, PageObjects, Tool};
use crate::ModelError;

/// Load-time facts about a page of the source document.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageInfo {
    pub size: PageSize,
    /// Rotation already stored in the source document.
    pub intrinsic_rotation: Rotation,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    pages: Vec<PageInfo>,
    executor: ActionExecutor,
    zoom_settings: ZoomSettings,
    current: Option<PageId>,
    zoom: f32,
    dirty: bool,
}

impl EditSession {
    pub fn new(pages: Vec<PageInfo>, zoom_settings: ZoomSettings) -> Self {
        let executor = ActionExecutor::new(EditState::new(pages.len()));
        let current = if pages.is_empty() { None } else { Some(PageId(0)) };
        Self {
            pages,
            executor,
            zoom: zoom_settings.clamp(zoom_settings.default),
            zoom_settings,
            current,
            dirty: false,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_info(&self, page: PageId) -> Option<&PageInfo> {
        self.pages.get(page.index())
    }

    pub fn state(&self) -> &EditState {
        self.executor.state()
    }

    pub fn layout(&self) -> &PageLayout {
        self.executor.state().layout()
    }

    pub fn store(&self) -> &EditStore {
        self.executor.state().store()
    }

    pub fn history(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn record(&mut self, action: Action) {
        self.executor.execute(action);
        self.dirty = true;
    }

    /// Adds `annotation` under a fresh id and returns that id.
    pub fn add(&mut self, annotation: impl Into<Annotation>) -> Result<AnnotationId, ModelError> {
        let mut annotation = annotation.into();
        self.layout().check(annotation.page())?;
        let id = AnnotationId::new();
        annotation.set_id(id);
        self.record(Action::Add { annotation });
        Ok(id)
    }

    /// Merges `patch` into the object with `id`. Unknown ids, mismatched kinds
    /// and empty patches change nothing and record nothing.
    pub fn update(&mut self, id: AnnotationId, patch: impl Into<AnnotationPatch>) -> bool {
        let current = patch.into();
        if current.is_empty() {
            return false;
        }
        let Some(existing) = self.store().annotations().find(id) else {
            debug!("update ignored: no annotation {id}");
            return false;
        };
        if existing.kind() != current.kind() {
            debug!("update ignored: {id} is a {:?}, patch is for {:?}", existing.kind(), current.kind());
            return false;
        }
        let previous = capture_previous(existing, &current);
        self.record(Action::Update { id, previous, current });
        true
    }

    pub fn remove(&mut self, id: AnnotationId) -> bool {
        let annotations = self.store().annotations();
        let Some(existing) = annotations.find(id) else {
            return false;
        };
        let annotation = existing.to_annotation();
        let position = position_in_kind(annotations, existing);
        let was_selected = self.store().selected_id() == Some(id);
        self.record(Action::Remove { annotation, position, was_selected });
        true
    }

    pub fn rotate_page(&mut self, page: PageId, delta: i32) -> Result<Rotation, ModelError> {
        self.layout().check(page)?;
        if self.layout().is_deleted(page) {
            warn!("rotating deleted page {page}");
        }
        let previous = self.layout().rotation(page);
        let current = previous.rotated_by(delta);
        if current != previous {
            self.record(Action::RotatePage { page, previous, current });
        }
        Ok(current)
    }

    /// Marks `page` deleted. Deleting an already deleted page records nothing.
    pub fn delete_page(&mut self, page: PageId) -> Result<bool, ModelError> {
        self.layout().check(page)?;
        if self.layout().is_deleted(page) {
            return Ok(false);
        }
        self.record(Action::DeletePage { page });
        Ok(true)
    }

    pub fn restore_page(&mut self, page: PageId) -> Result<bool, ModelError> {
        self.layout().check(page)?;
        if !self.layout().is_deleted(page) {
            return Ok(false);
        }
        self.record(Action::RestorePage { page });
        Ok(true)
    }

    pub fn reorder_pages(&mut self, order: Vec<PageId>) -> Result<bool, ModelError> {
        self.layout().validate_order(&order)?;
        let previous = self.layout().order().to_vec();
        if previous == order {
            return Ok(false);
        }
        self.record(Action::ReorderPages { previous, current: order });
        Ok(true)
    }

    /// Moves the page at display position `from` to position `to`.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<bool, ModelError> {
        let order = self.layout().moved(from, to)?;
        self.reorder_pages(order)
    }

    pub fn undo(&mut self) -> Option<&Action> {
        if !self.executor.can_undo() {
            return None;
        }
        self.dirty = true;
        self.executor.undo()
    }

    pub fn redo(&mut self) -> Option<&Action> {
        if !self.executor.can_redo() {
            return None;
        }
        self.dirty = true;
        self.executor.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.executor.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.executor.can_redo()
    }

    pub fn objects_for_page(&self, page: PageId) -> PageObjects<'_> {
        self.store().objects_for_page(page)
    }

    pub fn selected(&self) -> Option<AnnotationRef<'_>> {
        self.store().selected()
    }

    pub fn select(&mut self, id: Option<AnnotationId>) {
        self.executor.store_mut().select(id);
    }

    pub fn active_tool(&self) -> Tool {
        self.store().active_tool()
    }

    pub fn set_active_tool(&mut self, tool: Tool) {
        self.executor.store_mut().set_active_tool(tool);
    }

    pub fn thumbnails(&self) -> Vec<PageThumbnail> {
        self.layout().thumbnails()
    }

    pub fn current_page(&self) -> Option<PageId> {
        self.current
    }

    pub fn go_to_page(&mut self, page: PageId) -> Result<(), ModelError> {
        self.layout().check(page)?;
        self.current = Some(page);
        Ok(())
    }

    /// Moves to the next non-deleted page in display order.
    pub fn next_page(&mut self) -> bool {
        self.step_page(1)
    }

    pub fn previous_page(&mut self) -> bool {
        self.step_page(-1)
    }

    fn step_page(&mut self, direction: isize) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let order = self.layout().order().to_vec();
        let Some(mut position) = self.layout().position_of(current) else {
            return false;
        };
        loop {
            let Some(next) = position.checked_add_signed(direction).filter(|p| *p < order.len()) else {
                return false;
            };
            position = next;
            let page = order[position];
            if !self.layout().is_deleted(page) {
                self.current = Some(page);
                return true;
            }
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Sets the zoom clamped to the configured bounds and returns the applied value.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = self.zoom_settings.clamp(zoom);
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom + self.zoom_settings.step)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom - self.zoom_settings.step)
    }

    pub fn reset_zoom(&mut self) -> f32 {
        self.set_zoom(self.zoom_settings.default)
    }

    /// Rotation the page is displayed with: the source rotation plus edits.
    pub fn display_rotation(&self, page: PageId) -> Rotation {
        let intrinsic = self.page_info(page).map(|info| info.intrinsic_rotation).unwrap_or_default();
        intrinsic.combine(self.layout().rotation(page))
    }

    pub fn transform_for(&self, page: PageId) -> Option<PageTransform> {
        let info = self.page_info(page)?;
        Some(PageTransform::new(info.size, self.zoom, self.display_rotation(page)))
    }
}

fn capture_previous(existing: AnnotationRef<'_>, current: &AnnotationPatch) -> AnnotationPatch {
    match (existing, current) {
        (AnnotationRef::Text(a), AnnotationPatch::Text(p)) => AnnotationPatch::Text(p.capture(a)),
        (AnnotationRef::Highlight(a), AnnotationPatch::Highlight(p)) => {
            AnnotationPatch::Highlight(p.capture(a))
        }
        (AnnotationRef::Underline(a), AnnotationPatch::Underline(p)) => {
            AnnotationPatch::Underline(p.capture(a))
        }
        (AnnotationRef::Comment(a), AnnotationPatch::Comment(p)) => AnnotationPatch::Comment(p.capture(a)),
        (AnnotationRef::Image(a), AnnotationPatch::Image(p)) => AnnotationPatch::Image(p.capture(a)),
        // Kinds are checked by the caller; an identity patch keeps the action inert.
        _ => current.clone(),
    }
}

fn position_in_kind(set: &crate::store::AnnotationSet, existing: AnnotationRef<'_>) -> usize {
    let id = existing.id();
    let position = match existing {
        AnnotationRef::Text(_) => set.texts.iter().position(|a| a.id == id),
        AnnotationRef::Highlight(_) => set.highlights.iter().position(|a| a.id == id),
        AnnotationRef::Underline(_) => set.underlines.iter().position(|a| a.id == id),
        AnnotationRef::Comment(_) => set.comments.iter().position(|a| a.id == id),
        AnnotationRef::Image(_) => set.images.iter().position(|a| a.id == id),
    };
    position.unwrap_or_default()
}
