//! Pointer interactions on the current page: click-to-add, drag-to-draw,
//! selection, move-drag and resize.
//!
//! Points are in document space. Every pointer move during a move or resize
//! applies exactly one update to the session, so each intermediate position
//! is its own undo entry.

use doc_model::geometry::{
    clamp_to_page, drag_endpoint, hit_test, rect_handle_at, resize_rect, underline_handle_at,
};
use doc_model::{
    AnnotationId, AnnotationPatch, AnnotationRef, CommentPatch, Corner, EditSession, EditorSettings,
    Endpoint, HighlightAnnotation, HighlightPatch, ImagePatch, ModelError, PageId, Point, Rect,
    TextAnnotation, TextPatch, Tool, UnderlineAnnotation, UnderlinePatch,
};
use log::debug;

/// Gesture in progress between pointer down and pointer up.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Idle,
    /// Dragging out a new highlight or underline.
    Drawing { tool: Tool, page: PageId, start: Point, current: Point },
    /// Dragging an object; `grab` is the pointer position relative to its origin.
    Moving { id: AnnotationId, page: PageId, grab: Point },
    /// Dragging a corner of a highlight or image; `start` is the rect at pointer down.
    ResizingRect { id: AnnotationId, start: Rect, corner: Corner },
    /// Dragging one end of an underline; the other end stays at `fixed`.
    ResizingEndpoint { id: AnnotationId, endpoint: Endpoint, fixed: Point },
}

/// Preview of a shape being drawn, before it becomes an annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Draft {
    Highlight(Rect),
    Underline { start: Point, end: Point },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    Nothing,
    Added(AnnotationId),
    Selected(Option<AnnotationId>),
    Updated(AnnotationId),
    /// The comment tool was clicked; the caller collects the text.
    PlaceComment { page: PageId, at: Point },
    /// The image tool was clicked; the caller supplies the image.
    PlaceImage { page: PageId, at: Point },
}

#[derive(Debug, Clone)]
pub struct PointerInteraction {
    gesture: Gesture,
}

impl Default for PointerInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerInteraction {
    pub fn new() -> Self {
        Self { gesture: Gesture::Idle }
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// Abandons the current gesture. Updates already applied stay applied.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn draft(&self) -> Option<Draft> {
        match self.gesture {
            Gesture::Drawing { tool: Tool::Highlight, start, current, .. } => {
                Some(Draft::Highlight(Rect::from_corners(start, current)))
            }
            Gesture::Drawing { tool: Tool::Underline, start, current, .. } => {
                Some(Draft::Underline { start, end: current })
            }
            _ => None,
        }
    }

    pub fn pointer_down(
        &mut self,
        session: &mut EditSession,
        settings: &EditorSettings,
        page: PageId,
        point: Point,
    ) -> Result<PointerOutcome, ModelError> {
        session.layout().check(page)?;
        self.gesture = Gesture::Idle;

        match session.active_tool() {
            Tool::Select => Ok(self.begin_select(session, settings, page, point)),
            Tool::Page => Ok(PointerOutcome::Nothing),
            Tool::Text => {
                let defaults = &settings.text;
                let mut text = TextAnnotation::new(page, point.x, point.y, defaults.content.clone());
                text.font_size = defaults.font_size;
                text.color = defaults.color;
                text.font_family = defaults.font_family.clone();
                let id = session.add(text)?;
                session.select(Some(id));
                Ok(PointerOutcome::Added(id))
            }
            tool @ (Tool::Highlight | Tool::Underline) => {
                self.gesture = Gesture::Drawing { tool, page, start: point, current: point };
                Ok(PointerOutcome::Nothing)
            }
            Tool::Comment => Ok(PointerOutcome::PlaceComment { page, at: point }),
            Tool::Image => Ok(PointerOutcome::PlaceImage { page, at: point }),
        }
    }

    fn begin_select(
        &mut self,
        session: &mut EditSession,
        settings: &EditorSettings,
        page: PageId,
        point: Point,
    ) -> PointerOutcome {
        let radius = settings.interaction.handle_radius;
        if let Some(selected) = session.selected().filter(|selected| selected.page() == page) {
            let gesture = match selected {
                AnnotationRef::Highlight(h) => rect_handle_at(h.rect(), point, radius)
                    .map(|corner| Gesture::ResizingRect { id: h.id, start: h.rect(), corner }),
                AnnotationRef::Image(i) => rect_handle_at(i.rect(), point, radius)
                    .map(|corner| Gesture::ResizingRect { id: i.id, start: i.rect(), corner }),
                AnnotationRef::Underline(u) => {
                    underline_handle_at(u, point, radius).map(|endpoint| Gesture::ResizingEndpoint {
                        id: u.id,
                        endpoint,
                        fixed: match endpoint {
                            Endpoint::Start => u.end(),
                            Endpoint::End => u.start(),
                        },
                    })
                }
                AnnotationRef::Text(_) | AnnotationRef::Comment(_) => None,
            };
            if let Some(gesture) = gesture {
                debug!("resize started: {gesture:?}");
                let id = selected.id();
                self.gesture = gesture;
                return PointerOutcome::Selected(Some(id));
            }
        }

        let hit = {
            let objects = session.objects_for_page(page);
            hit_test(point, &objects).map(|hit| (hit.id(), hit.origin()))
        };
        match hit {
            Some((id, origin)) => {
                session.select(Some(id));
                let grab = Point::new(point.x - origin.x, point.y - origin.y);
                self.gesture = Gesture::Moving { id, page, grab };
                PointerOutcome::Selected(Some(id))
            }
            None => {
                session.select(None);
                PointerOutcome::Selected(None)
            }
        }
    }

    /// Applies the pointer position to the gesture in progress.
    pub fn pointer_move(&mut self, session: &mut EditSession, point: Point) -> PointerOutcome {
        let outcome = match self.gesture.clone() {
            Gesture::Idle => return PointerOutcome::Nothing,
            Gesture::Drawing { tool, page, start, .. } => {
                self.gesture = Gesture::Drawing { tool, page, start, current: point };
                return PointerOutcome::Nothing;
            }
            Gesture::Moving { id, page, grab } => move_object(session, id, page, grab, point),
            Gesture::ResizingRect { id, start, corner } => {
                let rect = resize_rect(start, corner, point);
                resize_object(session, id, rect)
            }
            Gesture::ResizingEndpoint { id, endpoint, fixed } => {
                let moved = drag_endpoint(fixed, point);
                let (x, y) = (Some(moved.x), Some(moved.y));
                let patch = match endpoint {
                    Endpoint::Start => UnderlinePatch { x1: x, y1: y, ..Default::default() },
                    Endpoint::End => UnderlinePatch { x2: x, y2: y, ..Default::default() },
                };
                apply(session, id, patch.into())
            }
        };

        // The object disappeared under the pointer, e.g. through undo.
        let gone = self.target_id().is_some_and(|id| session.store().annotations().find(id).is_none());
        if gone {
            debug!("gesture target is gone, ending gesture");
            self.gesture = Gesture::Idle;
        }
        outcome
    }

    pub fn pointer_up(
        &mut self,
        session: &mut EditSession,
        settings: &EditorSettings,
        point: Point,
    ) -> Result<PointerOutcome, ModelError> {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let Gesture::Drawing { tool, page, start, .. } = gesture else {
            return Ok(PointerOutcome::Nothing);
        };

        let min = settings.interaction.min_draw_extent;
        match tool {
            Tool::Highlight => {
                let rect = Rect::from_corners(start, point);
                if rect.width <= min || rect.height <= min {
                    debug!("highlight of {}x{} is too small", rect.width, rect.height);
                    return Ok(PointerOutcome::Nothing);
                }
                let mut highlight = HighlightAnnotation::new(page, rect);
                highlight.color = settings.highlight.color;
                highlight.opacity = settings.highlight.opacity;
                Ok(PointerOutcome::Added(session.add(highlight)?))
            }
            Tool::Underline => {
                if start.distance_to(point) <= min {
                    debug!("underline of length {} is too short", start.distance_to(point));
                    return Ok(PointerOutcome::Nothing);
                }
                let defaults = &settings.underline;
                let mut underline = UnderlineAnnotation::new(page, start, point, defaults.color);
                underline.thickness = defaults.thickness;
                underline.line_style = defaults.line_style;
                underline.line_cap = defaults.line_cap;
                Ok(PointerOutcome::Added(session.add(underline)?))
            }
            _ => Ok(PointerOutcome::Nothing),
        }
    }

    fn target_id(&self) -> Option<AnnotationId> {
        match self.gesture {
            Gesture::Moving { id, .. }
            | Gesture::ResizingRect { id, .. }
            | Gesture::ResizingEndpoint { id, .. } => Some(id),
            Gesture::Idle | Gesture::Drawing { .. } => None,
        }
    }
}

fn apply(session: &mut EditSession, id: AnnotationId, patch: AnnotationPatch) -> PointerOutcome {
    if session.update(id, patch) {
        PointerOutcome::Updated(id)
    } else {
        PointerOutcome::Nothing
    }
}

fn move_object(
    session: &mut EditSession,
    id: AnnotationId,
    page: PageId,
    grab: Point,
    pointer: Point,
) -> PointerOutcome {
    let Some(size) = session.page_info(page).map(|info| info.size) else {
        return PointerOutcome::Nothing;
    };
    let origin = clamp_to_page(Point::new(pointer.x - grab.x, pointer.y - grab.y), size);
    let Some(object) = session.store().annotations().find(id) else {
        return PointerOutcome::Nothing;
    };
    if object.origin() == origin {
        return PointerOutcome::Nothing;
    }

    let (x, y) = (Some(origin.x), Some(origin.y));
    let patch: AnnotationPatch = match object {
        AnnotationRef::Text(_) => TextPatch { x, y, ..Default::default() }.into(),
        AnnotationRef::Highlight(_) => HighlightPatch { x, y, ..Default::default() }.into(),
        AnnotationRef::Comment(_) => CommentPatch { x, y, ..Default::default() }.into(),
        AnnotationRef::Image(_) => ImagePatch { x, y, ..Default::default() }.into(),
        AnnotationRef::Underline(u) => {
            let (dx, dy) = (u.x2 - u.x1, u.y2 - u.y1);
            UnderlinePatch {
                x1: x,
                y1: y,
                x2: Some(origin.x + dx),
                y2: Some(origin.y + dy),
                ..Default::default()
            }
            .into()
        }
    };
    apply(session, id, patch)
}

fn resize_object(session: &mut EditSession, id: AnnotationId, rect: Rect) -> PointerOutcome {
    let (x, y, width, height) = (Some(rect.x), Some(rect.y), Some(rect.width), Some(rect.height));
    let patch: AnnotationPatch = match session.store().annotations().find(id) {
        Some(AnnotationRef::Highlight(current)) if current.rect() != rect => {
            HighlightPatch { x, y, width, height, ..Default::default() }.into()
        }
        Some(AnnotationRef::Image(current)) if current.rect() != rect => {
            ImagePatch { x, y, width, height }.into()
        }
        _ => return PointerOutcome::Nothing,
    };
    apply(session, id, patch)
}
