//! The authoritative collection of annotations plus selection and tool state.

use serde::{Deserialize, Serialize};

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationPatch, AnnotationRef, CommentAnnotation,
    HighlightAnnotation, ImageAnnotation, StoredAnnotation, TextAnnotation, UnderlineAnnotation,
};
use crate::layout::PageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Select,
    Page,
    Text,
    Highlight,
    Underline,
    Comment,
    Image,
}

/// One ordered collection per annotation kind. Order within a collection is z-order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub texts: Vec<TextAnnotation>,
    pub highlights: Vec<HighlightAnnotation>,
    pub underlines: Vec<UnderlineAnnotation>,
    pub comments: Vec<CommentAnnotation>,
    pub images: Vec<ImageAnnotation>,
}

/// Annotations belonging to one page, borrowed from an [`AnnotationSet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageObjects<'a> {
    pub texts: Vec<&'a TextAnnotation>,
    pub highlights: Vec<&'a HighlightAnnotation>,
    pub underlines: Vec<&'a UnderlineAnnotation>,
    pub comments: Vec<&'a CommentAnnotation>,
    pub images: Vec<&'a ImageAnnotation>,
}

impl PageObjects<'_> {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.texts.len()
            + self.highlights.len()
            + self.underlines.len()
            + self.comments.len()
            + self.images.len()
    }
}

fn on_page<T: StoredAnnotation>(items: &[T], page: PageId) -> Vec<&T> {
    items.iter().filter(|item| item.page() == page).collect()
}

impl AnnotationSet {
    pub fn len(&self) -> usize {
        self.texts.len()
            + self.highlights.len()
            + self.underlines.len()
            + self.comments.len()
            + self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn for_page(&self, page: PageId) -> PageObjects<'_> {
        PageObjects {
            texts: on_page(&self.texts, page),
            highlights: on_page(&self.highlights, page),
            underlines: on_page(&self.underlines, page),
            comments: on_page(&self.comments, page),
            images: on_page(&self.images, page),
        }
    }

    /// Every annotation, kind by kind, each kind in z-order.
    pub fn iter(&self) -> impl Iterator<Item = AnnotationRef<'_>> {
        self.texts
            .iter()
            .map(AnnotationRef::Text)
            .chain(self.highlights.iter().map(AnnotationRef::Highlight))
            .chain(self.underlines.iter().map(AnnotationRef::Underline))
            .chain(self.comments.iter().map(AnnotationRef::Comment))
            .chain(self.images.iter().map(AnnotationRef::Image))
    }

    pub fn find(&self, id: AnnotationId) -> Option<AnnotationRef<'_>> {
        self.iter().find(|annotation| annotation.id() == id)
    }

    pub fn get<T: StoredAnnotation>(&self, id: AnnotationId) -> Option<&T> {
        T::collection(self).iter().find(|item| item.id() == id)
    }

    fn position<T: StoredAnnotation>(&self, id: AnnotationId) -> Option<usize> {
        T::collection(self).iter().position(|item| item.id() == id)
    }

    pub(crate) fn push(&mut self, annotation: Annotation) {
        match annotation {
            Annotation::Text(a) => self.texts.push(a),
            Annotation::Highlight(a) => self.highlights.push(a),
            Annotation::Underline(a) => self.underlines.push(a),
            Annotation::Comment(a) => self.comments.push(a),
            Annotation::Image(a) => self.images.push(a),
        }
    }

    /// Inserts at `position`, clamped to the collection length.
    pub(crate) fn insert(&mut self, annotation: Annotation, position: usize) {
        fn insert_at<T>(items: &mut Vec<T>, item: T, position: usize) {
            let position = position.min(items.len());
            items.insert(position, item);
        }
        match annotation {
            Annotation::Text(a) => insert_at(&mut self.texts, a, position),
            Annotation::Highlight(a) => insert_at(&mut self.highlights, a, position),
            Annotation::Underline(a) => insert_at(&mut self.underlines, a, position),
            Annotation::Comment(a) => insert_at(&mut self.comments, a, position),
            Annotation::Image(a) => insert_at(&mut self.images, a, position),
        }
    }

    /// Removes the annotation, returning it with its z-order position.
    pub(crate) fn remove(&mut self, id: AnnotationId) -> Option<(Annotation, usize)> {
        fn take<T: StoredAnnotation>(set: &mut AnnotationSet, id: AnnotationId) -> Option<(Annotation, usize)> {
            let position = set.position::<T>(id)?;
            Some((T::collection_mut(set).remove(position).into(), position))
        }
        let kind = self.find(id)?.kind();
        match kind {
            AnnotationKind::Text => take::<TextAnnotation>(self, id),
            AnnotationKind::Highlight => take::<HighlightAnnotation>(self, id),
            AnnotationKind::Underline => take::<UnderlineAnnotation>(self, id),
            AnnotationKind::Comment => take::<CommentAnnotation>(self, id),
            AnnotationKind::Image => take::<ImageAnnotation>(self, id),
        }
    }

    /// Applies `patch` to the object with `id` and returns the values it replaced.
    pub(crate) fn patch<T: StoredAnnotation>(&mut self, id: AnnotationId, patch: &T::Patch) -> Option<T::Patch> {
        let target = T::collection_mut(self).iter_mut().find(|item| item.id() == id)?;
        let previous = T::capture(patch, target);
        T::apply(patch, target);
        Some(previous)
    }

    pub(crate) fn apply_patch(&mut self, id: AnnotationId, patch: &AnnotationPatch) -> Option<AnnotationPatch> {
        match patch {
            AnnotationPatch::Text(p) => self.patch::<TextAnnotation>(id, p).map(AnnotationPatch::Text),
            AnnotationPatch::Highlight(p) => {
                self.patch::<HighlightAnnotation>(id, p).map(AnnotationPatch::Highlight)
            }
            AnnotationPatch::Underline(p) => {
                self.patch::<UnderlineAnnotation>(id, p).map(AnnotationPatch::Underline)
            }
            AnnotationPatch::Comment(p) => self.patch::<CommentAnnotation>(id, p).map(AnnotationPatch::Comment),
            AnnotationPatch::Image(p) => self.patch::<ImageAnnotation>(id, p).map(AnnotationPatch::Image),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditStore {
    annotations: AnnotationSet,
    selected: Option<AnnotationId>,
    active_tool: Tool,
}

impl EditStore {
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut AnnotationSet {
        &mut self.annotations
    }

    pub fn objects_for_page(&self, page: PageId) -> PageObjects<'_> {
        self.annotations.for_page(page)
    }

    pub fn selected_id(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn selected(&self) -> Option<AnnotationRef<'_>> {
        self.annotations.find(self.selected?)
    }

    /// Selects `id` if it exists; `None` clears the selection.
    pub fn select(&mut self, id: Option<AnnotationId>) {
        self.selected = id.filter(|id| self.annotations.find(*id).is_some());
    }

    pub(crate) fn clear_selection_of(&mut self, id: AnnotationId) {
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    pub fn set_active_tool(&mut self, tool: Tool) {
        self.active_tool = tool;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{HighlightPatch, TextPatch};
    use crate::geometry::Rect;

    fn text(page: u32, label: &str) -> TextAnnotation {
        let mut text = TextAnnotation::new(PageId(page), 0.0, 0.0, label);
        text.id = AnnotationId::new();
        text
    }

    #[test]
    fn objects_for_page_preserve_insertion_order() {
        let mut set = AnnotationSet::default();
        let a = text(0, "a");
        let b = text(1, "b");
        let c = text(0, "c");
        for t in [&a, &b, &c] {
            set.push(t.clone().into());
        }

        let page = set.for_page(PageId(0));
        let labels: Vec<&str> = page.texts.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(labels, vec!["a", "c"]);
        assert_eq!(set.for_page(PageId(2)).len(), 0);
    }

    #[test]
    fn remove_reports_position_and_insert_restores_it() {
        let mut set = AnnotationSet::default();
        let texts = [text(0, "a"), text(0, "b"), text(0, "c")];
        for t in &texts {
            set.push(t.clone().into());
        }

        let (removed, position) = set.remove(texts[1].id).expect("text exists");
        assert_eq!(position, 1);
        assert_eq!(set.texts.len(), 2);

        set.insert(removed, position);
        assert_eq!(set.texts, texts.to_vec());
    }

    #[test]
    fn patch_returns_previous_values() {
        let mut set = AnnotationSet::default();
        let mut highlight = HighlightAnnotation::new(PageId(0), Rect::new(0.0, 0.0, 10.0, 10.0));
        highlight.id = AnnotationId::new();
        set.push(highlight.clone().into());

        let previous = set
            .patch::<HighlightAnnotation>(highlight.id, &HighlightPatch { width: Some(20.0), ..Default::default() })
            .expect("highlight exists");
        assert_eq!(previous, HighlightPatch { width: Some(10.0), ..Default::default() });
        assert_eq!(set.highlights[0].width, 20.0);
    }

    #[test]
    fn patch_of_wrong_kind_is_ignored() {
        let mut set = AnnotationSet::default();
        let mut highlight = HighlightAnnotation::new(PageId(0), Rect::new(0.0, 0.0, 10.0, 10.0));
        highlight.id = AnnotationId::new();
        set.push(highlight.clone().into());

        let patch = AnnotationPatch::Text(TextPatch { x: Some(1.0), ..Default::default() });
        assert_eq!(set.apply_patch(highlight.id, &patch), None);
        assert_eq!(set.highlights[0], highlight);
    }

    #[test]
    fn selecting_unknown_id_clears_selection() {
        let mut store = EditStore::default();
        let t = text(0, "a");
        store.annotations_mut().push(t.clone().into());

        store.select(Some(t.id));
        assert_eq!(store.selected().map(|s| s.id()), Some(t.id));

        store.select(Some(AnnotationId::new()));
        assert_eq!(store.selected_id(), None);
    }
}
