//! Open, save, merge, split and insert workflows against a temporary directory.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use doc_model::{HighlightAnnotation, PageId, Point, Rect, TextAnnotation, Tool};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use pdf_editor_core::{Editor, EditorError, PointerOutcome, DEFAULT_MERGE_NAME, DEFAULT_SAVE_NAME};
use pdf_engine::{
    build_blank_pdf, describe, LoadOptions, MergeError, PageSize, PdfDocument, SplitError, SplitRange,
    TextParams,
};
use pretty_assertions::assert_eq;
use storage::{EditorSettings, FileStore, LocalFileStore, ScriptedDialogs};
use tempfile::TempDir;

type TestEditor = Editor<LocalFileStore<ScriptedDialogs>>;

fn editor() -> TestEditor {
    Editor::new(LocalFileStore::new(ScriptedDialogs::new()), EditorSettings::default())
}

fn write_pdf(dir: &TempDir, name: &str, sizes: &[PageSize]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, build_blank_pdf(sizes).expect("build should succeed")).expect("write fixture");
    path
}

fn widths(path: &Path) -> Vec<f32> {
    let bytes = std::fs::read(path).expect("output should exist");
    describe(&bytes).expect("output should parse").into_iter().map(|page| page.size.width_pt).collect()
}

fn operators(bytes: &[u8], page: usize) -> Vec<String> {
    PdfDocument::load(bytes, LoadOptions::default())
        .expect("output should parse")
        .page_operations(page)
        .expect("page should exist")
        .into_iter()
        .map(|op| op.operator)
        .collect()
}

fn opened(dir: &TempDir, sizes: &[PageSize]) -> (TestEditor, PathBuf) {
    let path = write_pdf(dir, "input.pdf", sizes);
    let mut editor = editor();
    editor.files_mut().dialogs_mut().push_file(Some(path.clone()));
    assert!(editor.open().expect("open should succeed"));
    (editor, path)
}

#[test]
fn cancelled_open_leaves_the_editor_empty() {
    let mut editor = editor();
    editor.files_mut().dialogs_mut().push_file(None);

    assert!(!editor.open().expect("cancel is not an error"));
    assert!(!editor.is_open());
}

#[test]
fn open_adopts_the_path_and_starts_clean() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (editor, path) = opened(&dir, &[PageSize::LETTER; 2]);

    assert_eq!(editor.path(), Some(path.as_path()));
    assert!(!editor.is_dirty());
    assert_eq!(editor.session().map(|s| s.page_count()), Some(2));
    assert_eq!(editor.current_page().expect("open"), PageId(0));
}

#[test]
fn save_flattens_edits_into_the_same_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut editor, path) = opened(&dir, &[PageSize::LETTER; 2]);
    editor
        .add_annotation(HighlightAnnotation::new(PageId(1), Rect::new(10.0, 10.0, 50.0, 50.0)))
        .expect("page 1 exists");
    editor.delete_page(PageId(0)).expect("page 0 exists");
    assert!(editor.is_dirty());

    let saved = editor.save().expect("save should succeed");

    assert_eq!(saved, path);
    assert_eq!(widths(&path), vec![612.0]);
    assert!(!editor.is_dirty());
    let session = editor.session().expect("reloaded");
    assert_eq!(session.page_count(), 1);
    assert!(session.store().annotations().is_empty());
    assert!(!session.history().can_undo());
}

#[test]
fn save_keeps_zoom_and_position() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut editor, _) = opened(&dir, &[PageSize::LETTER; 3]);
    editor.go_to_page(PageId(2)).expect("page 2 exists");
    editor.zoom_in().expect("open");
    editor.delete_page(PageId(0)).expect("page 0 exists");

    editor.save().expect("save should succeed");

    let session = editor.session().expect("reloaded");
    assert_eq!(session.page_count(), 2);
    assert_eq!(session.current_page(), Some(PageId(1)));
    assert_eq!(session.zoom(), 1.25);
}

#[test]
fn save_as_uses_the_default_name_and_adopts_the_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut editor, original) = opened(&dir, &[PageSize::LETTER]);
    let target = dir.path().join("copy.pdf");
    editor.add_annotation(TextAnnotation::new(PageId(0), 5.0, 5.0, "hello")).expect("page 0");
    editor.files_mut().dialogs_mut().push_save_path(Some(target.clone()));

    let saved = editor.save_as().expect("save as should succeed");

    assert_eq!(saved, Some(target.clone()));
    assert_eq!(editor.files().dialogs().save_requests(), [DEFAULT_SAVE_NAME.to_owned()]);
    assert_eq!(editor.path(), Some(target.as_path()));
    let output = std::fs::read(&target).expect("saved");
    assert_eq!(operators(&output, 0).iter().filter(|op| *op == "Tj").count(), 2);
    let untouched = std::fs::read(&original).expect("original");
    assert_eq!(operators(&untouched, 0).iter().filter(|op| *op == "Tj").count(), 1);
}

#[test]
fn cancelled_save_as_changes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut editor, path) = opened(&dir, &[PageSize::LETTER]);
    editor.rotate_page(PageId(0), 90).expect("page 0");
    editor.files_mut().dialogs_mut().push_save_path(None);

    assert_eq!(editor.save_as().expect("cancel is not an error"), None);
    assert!(editor.is_dirty());
    assert_eq!(editor.path(), Some(path.as_path()));
}

#[test]
fn documents_without_a_path_need_save_as() {
    let mut editor = editor();
    let bytes = build_blank_pdf(&[PageSize::LETTER]).expect("build");
    editor.load_bytes(&bytes, None).expect("load");

    assert!(matches!(editor.save(), Err(EditorError::NoFilePath)));
}

#[test]
fn failed_write_keeps_the_edits() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut editor, _) = opened(&dir, &[PageSize::LETTER]);
    editor.add_annotation(TextAnnotation::new(PageId(0), 5.0, 5.0, "unsaved")).expect("page 0");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("write blocker");
    editor.files_mut().dialogs_mut().push_save_path(Some(blocker.join("out.pdf")));

    let err = editor.save_as().expect_err("parent is a file");

    assert!(matches!(err, EditorError::Storage(_)), "unexpected {err}");
    assert!(editor.is_dirty());
    assert_eq!(editor.session().map(|s| s.store().annotations().len()), Some(1));
}

#[test]
fn failed_load_keeps_the_open_document() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut editor, path) = opened(&dir, &[PageSize::LETTER]);
    editor.add_annotation(TextAnnotation::new(PageId(0), 5.0, 5.0, "keep")).expect("page 0");
    let broken = dir.path().join("broken.pdf");
    std::fs::write(&broken, b"%PDF-1.7 garbage").expect("write broken");

    let err = editor.open_path(&broken).expect_err("not a pdf");

    assert!(matches!(&err, EditorError::Load { path: Some(p), .. } if *p == broken), "unexpected {err}");
    assert!(err.to_string().contains("broken.pdf"));
    assert_eq!(editor.path(), Some(path.as_path()));
    assert!(editor.is_dirty());
}

#[test]
fn documents_mentioning_encrypt_open_and_split() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut document = PdfDocument::create();
    for text in ["See /Encrypt docs", "/EncryptMetadata false"] {
        let page = document.add_blank_page(PageSize::LETTER);
        document.draw_text(page, &TextParams::new(text, 72.0, 700.0, 12.0)).expect("page exists");
    }
    let path = dir.path().join("manual.pdf");
    std::fs::write(&path, document.save().expect("save")).expect("write fixture");
    let folder = dir.path().join("parts");
    let mut editor = editor();
    editor.files_mut().dialogs_mut().push_file(Some(path.clone())).push_file(Some(path));
    editor.files_mut().dialogs_mut().push_folder(Some(folder.clone()));

    assert!(editor.open().expect("plain document opens"));
    assert_eq!(editor.session().map(|s| s.page_count()), Some(2));

    let written = editor
        .split_file(|_| vec![SplitRange::new(2, 2, "second.pdf")])
        .expect("split should succeed");
    assert_eq!(written, vec![folder.join("second.pdf")]);
}

#[test]
fn merge_writes_inputs_in_the_chosen_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    let first = write_pdf(&dir, "one.pdf", &[PageSize::new(100.0, 100.0)]);
    let second = write_pdf(&dir, "two.pdf", &[PageSize::new(200.0, 100.0), PageSize::new(300.0, 100.0)]);
    let output = dir.path().join("merged-out.pdf");
    let mut editor = editor();
    editor
        .files_mut()
        .dialogs_mut()
        .push_files(vec![second, first])
        .push_save_path(Some(output.clone()));

    let merged = editor.merge_files().expect("merge should succeed");

    assert_eq!(merged, Some(output.clone()));
    assert_eq!(editor.files().dialogs().save_requests(), [DEFAULT_MERGE_NAME.to_owned()]);
    assert_eq!(widths(&output), vec![200.0, 300.0, 100.0]);
}

#[test]
fn merge_with_a_malformed_input_writes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let good = write_pdf(&dir, "good.pdf", &[PageSize::LETTER]);
    let bad = dir.path().join("bad.pdf");
    std::fs::write(&bad, b"definitely not a pdf").expect("write bad");
    let output = dir.path().join("merged-out.pdf");
    let mut editor = editor();
    editor.files_mut().dialogs_mut().push_files(vec![good, bad]).push_save_path(Some(output.clone()));

    let err = editor.merge_files().expect_err("second file is malformed");

    assert!(matches!(err, EditorError::Merge(MergeError::Malformed { file: 2 })), "unexpected {err}");
    assert!(!output.exists());
    assert!(editor.files().dialogs().save_requests().is_empty());
}

#[test]
fn cancelled_merge_selection_does_nothing() {
    let mut editor = editor();
    assert_eq!(editor.merge_files().expect("cancel is not an error"), None);
}

#[test]
fn split_writes_one_file_per_range() {
    let dir = tempfile::tempdir().expect("temp dir");
    let sizes: Vec<PageSize> = (1..=4).map(|n| PageSize::new(100.0 * n as f32, 100.0)).collect();
    let source = write_pdf(&dir, "source.pdf", &sizes);
    let folder = dir.path().join("parts");
    let mut editor = editor();
    editor.files_mut().dialogs_mut().push_file(Some(source)).push_folder(Some(folder.clone()));

    let mut seen = None;
    let written = editor
        .split_file(|page_count| {
            seen = Some(page_count);
            vec![SplitRange::new(1, 1, "first.pdf"), SplitRange::new(2, 4, "rest.pdf")]
        })
        .expect("split should succeed");

    assert_eq!(seen, Some(4));
    assert_eq!(written, vec![folder.join("first.pdf"), folder.join("rest.pdf")]);
    assert_eq!(widths(&written[0]), vec![100.0]);
    assert_eq!(widths(&written[1]), vec![200.0, 300.0, 400.0]);
}

#[test]
fn split_with_an_invalid_range_writes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let source = write_pdf(&dir, "source.pdf", &[PageSize::LETTER; 2]);
    let folder = dir.path().join("parts");
    let mut editor = editor();
    editor.files_mut().dialogs_mut().push_file(Some(source)).push_folder(Some(folder.clone()));

    let err = editor
        .split_file(|_| vec![SplitRange::new(1, 1, "ok.pdf"), SplitRange::new(2, 3, "bad.pdf")])
        .expect_err("range exceeds the page count");

    assert!(matches!(err, EditorError::Split(SplitError::InvalidRange { .. })), "unexpected {err}");
    assert!(!folder.join("ok.pdf").exists());
}

#[test]
fn choosing_no_ranges_cancels_the_split() {
    let dir = tempfile::tempdir().expect("temp dir");
    let source = write_pdf(&dir, "source.pdf", &[PageSize::LETTER]);
    let folder = dir.path().join("parts");
    let mut editor = editor();
    editor.files_mut().dialogs_mut().push_file(Some(source)).push_folder(Some(folder.clone()));

    assert!(editor.split_file(|_| Vec::new()).expect("cancel is not an error").is_empty());
    assert!(!folder.exists());
}

#[test]
fn inserted_image_is_drawn_on_export() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut editor, _) = opened(&dir, &[PageSize::LETTER]);
    let image_path = dir.path().join("stamp.png");
    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 20, Rgba([0, 128, 255, 255])))
        .write_to(&mut encoded, ImageFormat::Png)
        .expect("encode png");
    editor.files().write(&image_path, encoded.get_ref()).expect("write image");
    editor.files_mut().dialogs_mut().push_file(Some(image_path));

    let id = editor
        .insert_image_from_dialog(PageId(0), Point::new(30.0, 40.0))
        .expect("insert should succeed");

    assert!(id.is_some());
    let output = editor.export().expect("commit should succeed");
    assert!(operators(&output, 0).iter().any(|op| op == "Do"));
}

#[test]
fn pointer_drawn_highlight_is_committed() {
    let mut editor = editor();
    editor.load_bytes(&build_blank_pdf(&[PageSize::LETTER]).expect("build"), None).expect("load");
    editor.set_active_tool(Tool::Highlight).expect("open");

    editor.pointer_down(Point::new(60.0, 60.0)).expect("open");
    editor.pointer_move(Point::new(30.0, 30.0)).expect("open");
    let outcome = editor.pointer_up(Point::new(10.0, 10.0)).expect("open");

    assert!(matches!(outcome, PointerOutcome::Added(_)), "unexpected {outcome:?}");
    let output = editor.export().expect("commit should succeed");
    let document = PdfDocument::load(&output, LoadOptions::default()).expect("parse");
    let rects: Vec<Vec<f32>> = document
        .page_operations(0)
        .expect("page 0")
        .into_iter()
        .filter(|op| op.operator == "re")
        .map(|op| op.operands.iter().filter_map(|o| o.as_float().ok()).collect())
        .collect();
    assert_eq!(rects, vec![vec![10.0, 732.0, 50.0, 50.0]]);
}
