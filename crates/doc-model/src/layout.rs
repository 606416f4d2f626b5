//! Page identity and layout: display order, deletions and per-page rotation,
//! all keyed by the original page index assigned at load.

use serde::{Deserialize, Serialize};

use crate::geometry::Rotation;
use crate::ModelError;

/// Original, load-time index of a page. Never renumbered during a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PageId(pub u32);

impl PageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row of the page thumbnail strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageThumbnail {
    pub position: usize,
    pub page: PageId,
    pub rotation: Rotation,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    order: Vec<PageId>,
    deleted: Vec<bool>,
    rotations: Vec<Rotation>,
}

impl PageLayout {
    pub fn new(page_count: usize) -> Self {
        Self {
            order: (0..page_count as u32).map(PageId).collect(),
            deleted: vec![false; page_count],
            rotations: vec![Rotation::NONE; page_count],
        }
    }

    pub fn page_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn check(&self, page: PageId) -> Result<(), ModelError> {
        if page.index() < self.page_count() {
            Ok(())
        } else {
            Err(ModelError::InvalidPage { page: page.0, page_count: self.page_count() })
        }
    }

    pub fn order(&self) -> &[PageId] {
        &self.order
    }

    pub fn rotation(&self, page: PageId) -> Rotation {
        self.rotations.get(page.index()).copied().unwrap_or_default()
    }

    pub fn is_deleted(&self, page: PageId) -> bool {
        self.deleted.get(page.index()).copied().unwrap_or(false)
    }

    pub fn deleted_pages(&self) -> impl Iterator<Item = PageId> + '_ {
        self.deleted.iter().enumerate().filter(|(_, deleted)| **deleted).map(|(i, _)| PageId(i as u32))
    }

    /// Display order without deleted pages, the order pages are written on commit.
    pub fn active_pages(&self) -> Vec<PageId> {
        self.order.iter().copied().filter(|page| !self.is_deleted(*page)).collect()
    }

    pub fn position_of(&self, page: PageId) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == page)
    }

    pub fn thumbnails(&self) -> Vec<PageThumbnail> {
        self.order
            .iter()
            .enumerate()
            .map(|(position, page)| PageThumbnail {
                position,
                page: *page,
                rotation: self.rotation(*page),
                deleted: self.is_deleted(*page),
            })
            .collect()
    }

    pub(crate) fn set_rotation(&mut self, page: PageId, rotation: Rotation) {
        if let Some(slot) = self.rotations.get_mut(page.index()) {
            *slot = rotation;
        }
    }

    pub(crate) fn set_deleted(&mut self, page: PageId, deleted: bool) {
        if let Some(slot) = self.deleted.get_mut(page.index()) {
            *slot = deleted;
        }
    }

    pub(crate) fn set_order(&mut self, order: Vec<PageId>) {
        self.order = order;
    }

    /// Validates that `order` is a permutation of every original index.
    pub fn validate_order(&self, order: &[PageId]) -> Result<(), ModelError> {
        if order.len() != self.page_count() {
            return Err(ModelError::InvalidPageOrder {
                reason: format!("expected {} pages, got {}", self.page_count(), order.len()),
            });
        }
        let mut seen = vec![false; self.page_count()];
        for page in order {
            match seen.get_mut(page.index()) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(ModelError::InvalidPageOrder {
                        reason: format!("page {page} appears more than once"),
                    })
                }
                None => {
                    return Err(ModelError::InvalidPageOrder {
                        reason: format!("page {page} is out of range"),
                    })
                }
            }
        }
        Ok(())
    }

    /// Order produced by dragging the page at display position `from` to `to`.
    pub fn moved(&self, from: usize, to: usize) -> Result<Vec<PageId>, ModelError> {
        let len = self.order.len();
        if from >= len || to >= len {
            return Err(ModelError::InvalidPageOrder {
                reason: format!("cannot move position {from} to {to} in a {len}-page layout"),
            });
        }
        let mut order = self.order.clone();
        let page = order.remove(from);
        order.insert(to, page);
        Ok(order)
    }
}
