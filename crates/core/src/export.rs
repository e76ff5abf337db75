//! Export projector.
//!
//! Takes the original, unannotated document plus the in-memory annotation
//! snapshot and produces a new PDF: every original page kept intact, overlay
//! marks appended to each annotated page's content, and one summary page at
//! the end. This is the only place page-unit geometry crosses into PDF-point
//! space.
//!
//! All-or-nothing: any failure aborts with no output bytes, so a corrupt
//! file can never be produced.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use lopdf::{Stream, StringFormat};
use tracing::{debug, info};

use crate::annotation::{Annotation, AnnotationKind, AnnotationSet};
use crate::geometry::{PdfPoint, PdfProjection, PdfRect, ReferenceSize};

pub const SUMMARY_TITLE: &str = "Library Study Notes";

const SUMMARY_WIDTH: f32 = 595.28;
const SUMMARY_HEIGHT: f32 = 841.89;
const MARGIN_X: f32 = 50.0;
const ENTRY_START_Y: f32 = SUMMARY_HEIGHT - 100.0;
const ENTRY_STEP: f32 = 20.0;
const BOTTOM_MARGIN: f32 = 50.0;
const EXCERPT_LIMIT: usize = 80;

/// ExtGState resource names registered on annotated pages.
const HIGHLIGHT_STATE: &str = "GSmkHl";
const STROKE_STATE: &str = "GSmkDw";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("source document could not be processed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("reference page size is empty; the document was never measured")]
    EmptyReferenceSize,
}

/// Burn the annotation set into a copy of the source document and append the
/// summary page.
///
/// `reference_size` is the page size in page units at zoom 1.0, captured
/// when the book was imported. Annotations targeting pages beyond the
/// document's page count are skipped without aborting.
pub fn export_annotated(
    source: &[u8],
    annotations: &AnnotationSet,
    reference_size: ReferenceSize,
) -> Result<Vec<u8>, ExportError> {
    if reference_size.is_empty() {
        return Err(ExportError::EmptyReferenceSize);
    }

    let mut doc = Document::load_mem(source)?;
    let pages = doc.get_pages();
    info!(
        annotations = annotations.len(),
        pages = pages.len(),
        "exporting annotated document"
    );

    // Collect overlay operations per page, preserving annotation order
    // within each page.
    let mut overlays: BTreeMap<ObjectId, Vec<Operation>> = BTreeMap::new();
    for annotation in annotations.iter() {
        let Some(&page_id) = pages.get(&annotation.page) else {
            debug!(
                page = annotation.page,
                "annotation targets a page beyond the document, skipping overlay"
            );
            continue;
        };
        let (pdf_width, pdf_height) = page_extent(&doc, page_id);
        let projection = PdfProjection::new(reference_size, pdf_width, pdf_height);

        let mut ops = Vec::new();
        if let Some(rect) = annotation.rect {
            ops.extend(highlight_ops(projection.project_rect(rect)));
        }
        if let Some(path) = &annotation.path {
            if path.len() >= 2 {
                let projected: Vec<PdfPoint> =
                    path.iter().map(|point| projection.project_point(*point)).collect();
                ops.extend(stroke_ops(&projected));
            }
        }
        if !ops.is_empty() {
            overlays.entry(page_id).or_default().extend(ops);
        }
    }

    for (page_id, operations) in overlays {
        install_overlay_states(&mut doc, page_id)?;
        let encoded = Content { operations }.encode()?;
        doc.add_page_contents(page_id, encoded)?;
    }

    append_summary_page(&mut doc, annotations)?;

    let mut output = Vec::new();
    doc.save_to(&mut output).map_err(lopdf::Error::from)?;
    Ok(output)
}

/// Page extent from the MediaBox, walking up the page tree when the entry
/// is inherited. US Letter fallback for pages that carry none. The walk is
/// bounded so a malformed parent cycle cannot hang the export.
fn page_extent(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let mut current = page_id;
    for _ in 0..32 {
        let Ok(dict) = doc.get_dictionary(current) else { break };
        if let Ok(media_box) = dict.get(b"MediaBox").and_then(Object::as_array) {
            if media_box.len() == 4 {
                let edge = |index: usize| media_box[index].as_float().unwrap_or(0.0);
                return ((edge(2) - edge(0)).abs(), (edge(3) - edge(1)).abs());
            }
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    (612.0, 792.0)
}

/// The dictionary that actually carries the page's Resources entry.
/// Resources is inheritable, so it may live on an ancestor Pages node;
/// installing the overlay states there keeps the existing fonts visible to
/// the original content.
fn resources_owner(doc: &Document, page_id: ObjectId) -> ObjectId {
    let mut current = page_id;
    for _ in 0..32 {
        let Ok(dict) = doc.get_dictionary(current) else { break };
        if dict.has(b"Resources") {
            return current;
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    page_id
}

/// Semi-transparent yellow fill over the projected selection rectangle.
fn highlight_ops(rect: PdfRect) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![HIGHLIGHT_STATE.into()]),
        Operation::new("rg", vec![Object::Real(1.0), Object::Real(1.0), Object::Real(0.0)]),
        Operation::new(
            "re",
            vec![
                Object::Real(rect.x),
                Object::Real(rect.y),
                Object::Real(rect.width),
                Object::Real(rect.height),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// The freehand path stroked segment by segment with round caps and joins.
fn stroke_ops(points: &[PdfPoint]) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![STROKE_STATE.into()]),
        Operation::new("RG", vec![Object::Real(0.9), Object::Real(0.2), Object::Real(0.2)]),
        Operation::new("w", vec![Object::Real(2.0)]),
        Operation::new("J", vec![1.into()]),
        Operation::new("j", vec![1.into()]),
    ];
    for segment in points.windows(2) {
        ops.push(Operation::new(
            "m",
            vec![Object::Real(segment[0].x), Object::Real(segment[0].y)],
        ));
        ops.push(Operation::new(
            "l",
            vec![Object::Real(segment[1].x), Object::Real(segment[1].y)],
        ));
        ops.push(Operation::new("S", vec![]));
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Register the overlay transparency levels as ExtGState resources for the
/// page, following the Resources entry through a reference if needed.
fn install_overlay_states(doc: &mut Document, page_id: ObjectId) -> Result<(), lopdf::Error> {
    let owner = resources_owner(doc, page_id);
    let mut resources = {
        let dict = doc.get_object_mut(owner)?.as_dict_mut()?;
        dict.remove(b"Resources")
            .unwrap_or_else(|| Object::Dictionary(Dictionary::new()))
    };
    match &mut resources {
        Object::Reference(id) => {
            let shared = doc.get_object_mut(*id)?.as_dict_mut()?;
            add_overlay_states(shared);
        }
        Object::Dictionary(local) => add_overlay_states(local),
        _ => {}
    }
    let dict = doc.get_object_mut(owner)?.as_dict_mut()?;
    dict.set("Resources", resources);
    Ok(())
}

fn add_overlay_states(resources: &mut Dictionary) {
    if !resources.has(b"ExtGState") {
        resources.set("ExtGState", Dictionary::new());
    }
    if let Ok(Object::Dictionary(states)) = resources.get_mut(b"ExtGState") {
        states.set(
            HIGHLIGHT_STATE,
            dictionary! { "Type" => "ExtGState", "ca" => Object::Real(0.3), "CA" => Object::Real(0.3) },
        );
        states.set(
            STROKE_STATE,
            dictionary! { "Type" => "ExtGState", "ca" => Object::Real(0.8), "CA" => Object::Real(0.8) },
        );
    }
}

/// A4 page listing each annotation's page number and a short excerpt, in
/// insertion order. Entries past the bottom margin are omitted.
fn append_summary_page(doc: &mut Document, annotations: &AnnotationSet) -> Result<(), lopdf::Error> {
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => bold_id, "F2" => regular_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 24.into()]),
        Operation::new(
            "Td",
            vec![Object::Real(MARGIN_X), Object::Real(SUMMARY_HEIGHT - 50.0)],
        ),
        Operation::new("Tj", vec![Object::string_literal(SUMMARY_TITLE)]),
        Operation::new("ET", vec![]),
    ];

    let mut y = ENTRY_START_Y;
    for (index, annotation) in annotations.iter().enumerate() {
        let Some(entry) = summary_entry(index, annotation) else { continue };
        if y < BOTTOM_MARGIN {
            debug!("summary page is full, omitting remaining entries");
            break;
        }
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F2".into(), 10.into()]),
            Operation::new("Td", vec![Object::Real(MARGIN_X), Object::Real(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(entry.into_bytes(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
        y -= ENTRY_STEP;
    }

    let content_id = doc.add_object(Stream::new(dictionary! {}, Content { operations }.encode()?));
    let pages_id = doc.catalog()?.get(b"Pages").and_then(Object::as_reference)?;
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(SUMMARY_WIDTH),
            Object::Real(SUMMARY_HEIGHT),
        ],
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;
    pages.get_mut(b"Kids")?.as_array_mut()?.push(page_id.into());
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", count + 1);
    Ok(())
}

/// One itemized line, or `None` for annotations with neither text nor a
/// sketch. The ordinal is the 1-based position in the full list.
fn summary_entry(index: usize, annotation: &Annotation) -> Option<String> {
    let content = match &annotation.text {
        Some(text) => text.chars().take(EXCERPT_LIMIT).collect(),
        None if annotation.kind == AnnotationKind::Draw => "Drawing / Sketch".to_owned(),
        None => return None,
    };
    Some(format!("{}. [Page {}] {}", index + 1, annotation.page, content))
}
