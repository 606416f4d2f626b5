//! The editor facade: one open document, its edit session and the page display.
//!
//! Loading replaces the session only once the new document has been parsed,
//! so a failed load leaves whatever was open untouched. Saving commits the
//! session into a new document, writes it, then reloads from the written bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use doc_model::geometry::screen_to_document;
use doc_model::{
    Annotation, AnnotationId, AnnotationPatch, CommentAnnotation, DisplayRect, EditSession,
    EditorSettings, PageId, PageInfo, Point, Rotation, Tool,
};
use log::{debug, info, warn};
use pdf_engine::{
    merge_documents, split_document, LoadOptions, LopdfBackend, PdfDocument, PdfEngineError,
    SplitRange,
};
use storage::FileStore;
use viewer_core::{RenderController, RenderState, RenderTarget};

use crate::commit::commit;
use crate::images::prepare_image;
use crate::interaction::{PointerInteraction, PointerOutcome};
use crate::render::EngineRasterizer;
use crate::{EditorError, EditorResult};

/// File name offered by the save dialog for an edited document.
pub const DEFAULT_SAVE_NAME: &str = "edited.pdf";
/// File name offered by the save dialog for merged documents.
pub const DEFAULT_MERGE_NAME: &str = "merged.pdf";

#[derive(Debug)]
struct OpenDocument {
    path: Option<PathBuf>,
    source: PdfDocument,
    session: EditSession,
    render: RenderController,
}

#[derive(Debug)]
pub struct Editor<S> {
    files: S,
    settings: EditorSettings,
    document: Option<OpenDocument>,
    pointer: PointerInteraction,
}

impl<S: FileStore> Editor<S> {
    pub fn new(files: S, mut settings: EditorSettings) -> Self {
        settings.repair();
        Self { files, settings, document: None, pointer: PointerInteraction::new() }
    }

    pub fn files(&self) -> &S {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut S {
        &mut self.files
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Replaces the settings. Zoom bounds and the default tool apply to the
    /// next loaded document.
    pub fn set_settings(&mut self, mut settings: EditorSettings) {
        let repaired = settings.repair();
        if !repaired.is_empty() {
            warn!("ignoring invalid settings: {}", repaired.join(", "));
        }
        self.settings = settings;
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.document.as_ref().and_then(|doc| doc.path.as_deref())
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.document.as_ref().map(|doc| &doc.session)
    }

    pub fn render(&self) -> Option<&RenderController> {
        self.document.as_ref().map(|doc| &doc.render)
    }

    pub fn pointer(&self) -> &PointerInteraction {
        &self.pointer
    }

    pub fn is_dirty(&self) -> bool {
        self.document.as_ref().is_some_and(|doc| doc.session.is_dirty())
    }

    // ---- Lifecycle ----

    /// Asks for a file and opens it. Returns `false` when the dialog was cancelled.
    pub fn open(&mut self) -> EditorResult<bool> {
        let Some(path) = self.files.open_file()? else {
            return Ok(false);
        };
        self.open_path(&path)?;
        Ok(true)
    }

    pub fn open_path(&mut self, path: &Path) -> EditorResult<()> {
        let bytes = self.files.read(path)?;
        self.load_bytes(&bytes, Some(path.to_path_buf()))
    }

    /// Parses `bytes` and replaces the open document with it.
    pub fn load_bytes(&mut self, bytes: &[u8], path: Option<PathBuf>) -> EditorResult<()> {
        let (source, pages, rasterizer) = match parse(bytes) {
            Ok(parsed) => parsed,
            Err(source) => return Err(EditorError::Load { path, source }),
        };

        self.close();
        match &path {
            Some(path) => info!("opened {} ({} pages)", path.display(), pages.len()),
            None => info!("opened document ({} pages)", pages.len()),
        }
        let mut session = EditSession::new(pages, self.settings.zoom);
        session.set_active_tool(self.settings.default_tool);
        self.document = Some(OpenDocument {
            path,
            source,
            session,
            render: RenderController::new(Arc::new(rasterizer)),
        });
        self.sync_render();
        Ok(())
    }

    /// Tears the session down: the in-flight render is cancelled and awaited.
    pub fn close(&mut self) {
        self.pointer.cancel();
        if let Some(mut doc) = self.document.take() {
            doc.render.reset();
            debug!("closed document");
        }
    }

    // ---- Editing ----

    fn document(&self) -> EditorResult<&OpenDocument> {
        self.document.as_ref().ok_or(EditorError::NoDocument)
    }

    /// Runs `f` against the session, then brings the page display in line.
    fn edit<T>(&mut self, f: impl FnOnce(&mut EditSession) -> T) -> EditorResult<T> {
        let doc = self.document.as_mut().ok_or(EditorError::NoDocument)?;
        let result = f(&mut doc.session);
        self.sync_render();
        Ok(result)
    }

    pub fn add_annotation(&mut self, annotation: impl Into<Annotation>) -> EditorResult<AnnotationId> {
        Ok(self.edit(|session| session.add(annotation))??)
    }

    pub fn update_annotation(
        &mut self,
        id: AnnotationId,
        patch: impl Into<AnnotationPatch>,
    ) -> EditorResult<bool> {
        self.edit(|session| session.update(id, patch))
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> EditorResult<bool> {
        self.edit(|session| session.remove(id))
    }

    pub fn remove_selected(&mut self) -> EditorResult<bool> {
        self.edit(|session| {
            let Some(id) = session.selected().map(|selected| selected.id()) else {
                return false;
            };
            session.remove(id)
        })
    }

    /// Adds a comment unless `text` is blank.
    pub fn add_comment(
        &mut self,
        page: PageId,
        at: Point,
        text: &str,
    ) -> EditorResult<Option<AnnotationId>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let comment = CommentAnnotation::new(page, at.x, at.y, text);
        self.add_annotation(comment).map(Some)
    }

    pub fn insert_image(&mut self, page: PageId, at: Point, bytes: &[u8]) -> EditorResult<AnnotationId> {
        let prepared = prepare_image(bytes, &self.settings.images)?;
        self.add_annotation(prepared.into_annotation(page, at))
    }

    /// Asks for an image file and inserts it. Returns `None` when cancelled.
    pub fn insert_image_from_dialog(
        &mut self,
        page: PageId,
        at: Point,
    ) -> EditorResult<Option<AnnotationId>> {
        self.document()?;
        let Some(path) = self.files.open_file()? else {
            return Ok(None);
        };
        let bytes = self.files.read(&path)?;
        self.insert_image(page, at, &bytes).map(Some)
    }

    pub fn rotate_page(&mut self, page: PageId, delta: i32) -> EditorResult<Rotation> {
        Ok(self.edit(|session| session.rotate_page(page, delta))??)
    }

    pub fn rotate_current_page(&mut self, delta: i32) -> EditorResult<Rotation> {
        let page = self.current_page()?;
        self.rotate_page(page, delta)
    }

    pub fn delete_page(&mut self, page: PageId) -> EditorResult<bool> {
        Ok(self.edit(|session| session.delete_page(page))??)
    }

    pub fn restore_page(&mut self, page: PageId) -> EditorResult<bool> {
        Ok(self.edit(|session| session.restore_page(page))??)
    }

    pub fn reorder_pages(&mut self, order: Vec<PageId>) -> EditorResult<bool> {
        Ok(self.edit(|session| session.reorder_pages(order))??)
    }

    pub fn move_page(&mut self, from: usize, to: usize) -> EditorResult<bool> {
        Ok(self.edit(|session| session.move_page(from, to))??)
    }

    pub fn undo(&mut self) -> EditorResult<bool> {
        self.edit(|session| session.undo().is_some())
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        self.edit(|session| session.redo().is_some())
    }

    // ---- Navigation ----

    pub fn current_page(&self) -> EditorResult<PageId> {
        self.document()?.session.current_page().ok_or(EditorError::NoDocument)
    }

    pub fn go_to_page(&mut self, page: PageId) -> EditorResult<()> {
        Ok(self.edit(|session| session.go_to_page(page))??)
    }

    pub fn next_page(&mut self) -> EditorResult<bool> {
        self.edit(EditSession::next_page)
    }

    pub fn previous_page(&mut self) -> EditorResult<bool> {
        self.edit(EditSession::previous_page)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> EditorResult<f32> {
        self.edit(|session| session.set_zoom(zoom))
    }

    pub fn zoom_in(&mut self) -> EditorResult<f32> {
        self.edit(EditSession::zoom_in)
    }

    pub fn zoom_out(&mut self) -> EditorResult<f32> {
        self.edit(EditSession::zoom_out)
    }

    pub fn reset_zoom(&mut self) -> EditorResult<f32> {
        self.edit(EditSession::reset_zoom)
    }

    pub fn set_active_tool(&mut self, tool: Tool) -> EditorResult<()> {
        self.pointer.cancel();
        self.edit(|session| session.set_active_tool(tool))
    }

    pub fn select(&mut self, id: Option<AnnotationId>) -> EditorResult<()> {
        self.edit(|session| session.select(id))
    }

    // ---- Pointer ----

    /// Converts a screen position over the displayed page into document space.
    /// `None` while the page bitmap size is still unknown.
    pub fn document_point(&self, pointer: Point, displayed: DisplayRect) -> Option<Point> {
        let doc = self.document.as_ref()?;
        let page = doc.session.current_page()?;
        let transform = doc.session.transform_for(page)?;
        screen_to_document(pointer, displayed, doc.render.display_size(), &transform)
    }

    /// Pointer press on the current page, in document space.
    pub fn pointer_down(&mut self, point: Point) -> EditorResult<PointerOutcome> {
        let doc = self.document.as_mut().ok_or(EditorError::NoDocument)?;
        let Some(page) = doc.session.current_page() else {
            return Ok(PointerOutcome::Nothing);
        };
        if doc.session.layout().is_deleted(page) {
            return Ok(PointerOutcome::Nothing);
        }
        Ok(self.pointer.pointer_down(&mut doc.session, &self.settings, page, point)?)
    }

    pub fn pointer_move(&mut self, point: Point) -> EditorResult<PointerOutcome> {
        let doc = self.document.as_mut().ok_or(EditorError::NoDocument)?;
        Ok(self.pointer.pointer_move(&mut doc.session, point))
    }

    pub fn pointer_up(&mut self, point: Point) -> EditorResult<PointerOutcome> {
        let doc = self.document.as_mut().ok_or(EditorError::NoDocument)?;
        Ok(self.pointer.pointer_up(&mut doc.session, &self.settings, point)?)
    }

    // ---- Rendering ----

    /// What the display should show: the current page unless it is deleted.
    fn desired_target(session: &EditSession) -> Option<RenderTarget> {
        let page = session.current_page().filter(|page| !session.layout().is_deleted(*page))?;
        Some(RenderTarget {
            page_number: page.0 + 1,
            scale: session.zoom(),
            rotation: session.display_rotation(page),
        })
    }

    fn sync_render(&mut self) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        let current = doc.render.target();
        match Self::desired_target(&doc.session) {
            Some(target) if current != Some(target) => {
                doc.render.request(target);
            }
            None if current.is_some() => {
                debug!("current page is not displayable, clearing the page display");
                doc.render.reset();
            }
            _ => {}
        }
    }

    /// Renders the current page again even if nothing changed, e.g. after a failure.
    pub fn refresh_render(&mut self) -> EditorResult<()> {
        let doc = self.document.as_mut().ok_or(EditorError::NoDocument)?;
        if let Some(target) = Self::desired_target(&doc.session) {
            doc.render.request(target);
        }
        Ok(())
    }

    /// Applies finished render work. Returns whether the display changed.
    pub fn pump_render(&mut self) -> bool {
        self.document.as_mut().is_some_and(|doc| doc.render.pump())
    }

    pub fn wait_render(&mut self, timeout: Duration) -> Option<RenderState> {
        self.document.as_mut().map(|doc| doc.render.wait(timeout).clone())
    }

    // ---- Saving ----

    /// Commits the session into output document bytes without writing them.
    pub fn export(&self) -> EditorResult<Vec<u8>> {
        let doc = self.document()?;
        let mut backend = LopdfBackend::new(&doc.source);
        Ok(commit(&mut backend, doc.session.state())?)
    }

    /// Saves to the path the document was opened from or last saved to.
    pub fn save(&mut self) -> EditorResult<PathBuf> {
        let path = self.document()?.path.clone().ok_or(EditorError::NoFilePath)?;
        self.save_to(path)
    }

    /// Asks for a path and saves there. Returns `None` when the dialog was cancelled.
    pub fn save_as(&mut self) -> EditorResult<Option<PathBuf>> {
        self.document()?;
        let Some(path) = self.files.save_as(DEFAULT_SAVE_NAME)? else {
            return Ok(None);
        };
        self.save_to(path).map(Some)
    }

    fn save_to(&mut self, path: PathBuf) -> EditorResult<PathBuf> {
        let bytes = self.export()?;
        self.files.write(&path, &bytes)?;

        let (zoom, position) = match self.session() {
            Some(session) => (session.zoom(), display_position(session)),
            None => (self.settings.zoom.default, None),
        };
        self.load_bytes(&bytes, Some(path.clone()))?;
        if let Some(doc) = self.document.as_mut() {
            doc.session.set_zoom(zoom);
            if let Some(position) = position.filter(|p| *p < doc.session.page_count()) {
                doc.session.go_to_page(PageId(position as u32))?;
            }
        }
        self.sync_render();
        info!("saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    // ---- Merge and split ----

    /// Asks for input files, merges them in the chosen order and asks where
    /// to save the result. Returns `None` when either dialog was cancelled.
    pub fn merge_files(&mut self) -> EditorResult<Option<PathBuf>> {
        let paths = self.files.open_multiple()?;
        if paths.is_empty() {
            return Ok(None);
        }
        let inputs = paths.iter().map(|path| self.files.read(path)).collect::<Result<Vec<_>, _>>()?;
        let merged = merge_documents(&inputs)?;

        let Some(path) = self.files.save_as(DEFAULT_MERGE_NAME)? else {
            return Ok(None);
        };
        self.files.write(&path, &merged)?;
        info!("merged {} files into {}", paths.len(), path.display());
        Ok(Some(path))
    }

    /// Asks for a source file, lets `choose_ranges` pick ranges given its page
    /// count, asks for an output folder and writes one file per range there.
    /// Cancelling any step, or choosing no ranges, writes nothing.
    pub fn split_file(
        &mut self,
        choose_ranges: impl FnOnce(usize) -> Vec<SplitRange>,
    ) -> EditorResult<Vec<PathBuf>> {
        let Some(source) = self.files.open_file()? else {
            return Ok(Vec::new());
        };
        let bytes = self.files.read(&source)?;
        let page_count = PdfDocument::load(&bytes, LoadOptions::default())
            .map_err(|err| EditorError::Load { path: Some(source.clone()), source: err })?
            .page_count();

        let ranges = choose_ranges(page_count);
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        let Some(folder) = self.files.select_folder()? else {
            return Ok(Vec::new());
        };

        let outputs = split_document(&bytes, &ranges)?;
        let mut written = Vec::with_capacity(outputs.len());
        for output in outputs {
            let path = folder.join(&output.filename);
            self.files.write(&path, &output.bytes)?;
            written.push(path);
        }
        info!("split {} into {} files", source.display(), written.len());
        Ok(written)
    }
}

/// Documents are opened the way they are committed: encryption declared in the
/// trailer is tolerated, and only unreadable files fail.
fn parse(bytes: &[u8]) -> Result<(PdfDocument, Vec<PageInfo>, EngineRasterizer), PdfEngineError> {
    let source = PdfDocument::load(bytes, LoadOptions { ignore_encryption: true })?;
    let mut pages = Vec::with_capacity(source.page_count());
    for page in 0..source.page_count() {
        let size = source.page_size(page)?;
        let rotation = source.rotation(page)?;
        pages.push(PageInfo {
            size,
            intrinsic_rotation: Rotation::from_degrees(rotation as i32),
        });
    }
    let rasterizer = EngineRasterizer::from_document(&source)?;
    #[cfg(feature = "pdfium")]
    let rasterizer = rasterizer.with_system_pdfium(bytes, &source);
    Ok((source, pages, rasterizer))
}

/// Position of the current page among the pages that survive a commit.
fn display_position(session: &EditSession) -> Option<usize> {
    let current = session.current_page()?;
    session.layout().active_pages().iter().position(|page| *page == current)
}
