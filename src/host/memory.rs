// illustrator-relay/src/host/memory.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! In-process document model implementing [`Host`].

use std::f64::consts::PI;
use std::fmt::Write as _;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::color::RgbColor;
use crate::error::{RelayError, Result as RelayResult};
use crate::protocol::{DocumentInfo, DocumentSummary};

use super::{
    CreatedDocument, DocumentOptions, ExportOptions, Host, PaintStyle, Shape, TextFrameSpec,
};

/// Fonts the memory host knows by PostScript name.
const AVAILABLE_FONTS: &[&str] = &[
    "ArialMT",
    "Arial-BoldMT",
    "Courier",
    "Helvetica",
    "MyriadPro-Regular",
    "TimesNewRomanPSMT",
];

const DEFAULT_FONT: &str = "MyriadPro-Regular";
const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Largest star the memory host will draw.
pub const MAX_STAR_POINTS: u32 = 1000;
/// SVG export writes at most this many decimals per coordinate.
pub const MAX_COORDINATE_PRECISION: u32 = 7;

#[derive(Debug, Clone)]
enum ItemKind {
    Path(Vec<[f64; 2]>),
    Shape(Shape),
    Text {
        frame: TextFrameSpec,
        font: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct PageItem {
    id: String,
    kind: ItemKind,
    style: PaintStyle,
}

#[derive(Debug)]
struct Document {
    id: String,
    name: String,
    width: f64,
    height: f64,
    color_space: String,
    artboards: usize,
    layers: usize,
    items: Vec<PageItem>,
    selection: Vec<String>,
}

impl Document {
    fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            artboards: self.artboards,
            layers: self.layers,
        }
    }

    fn push(&mut self, kind: ItemKind, style: PaintStyle) -> String {
        let id = Uuid::new_v4().to_string();
        self.items.push(PageItem { id: id.clone(), kind, style });
        id
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: Vec<Document>,
    active: Option<usize>,
    next_id: u64,
}

impl MemoryState {
    fn active_mut(&mut self) -> RelayResult<&mut Document> {
        self.active
            .and_then(|idx| self.documents.get_mut(idx))
            .ok_or_else(|| RelayError::HostApi("No active document".to_string()))
    }

    fn active(&self) -> Option<&Document> {
        self.active.and_then(|idx| self.documents.get(idx))
    }
}

/// A document host that keeps everything in memory and exports to SVG.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: RwLock<MemoryState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of page items in the active document, 0 when none is open.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.active().map_or(0, |doc| doc.items.len())
    }

    /// Font applied to a text frame of the active document, if any.
    pub async fn text_font(&self, text_id: &str) -> Option<String> {
        let state = self.state.read().await;
        state.active()?.items.iter().find(|item| item.id == text_id).and_then(|item| {
            match &item.kind {
                ItemKind::Text { font, .. } => font.clone(),
                _ => None,
            }
        })
    }

    /// Closes the active document. The most recently opened remaining
    /// document, if any, becomes active.
    pub async fn close_active_document(&self) {
        let mut state = self.state.write().await;
        if let Some(idx) = state.active.take() {
            state.documents.remove(idx);
            state.active = state.documents.len().checked_sub(1);
        }
    }

    /// Replaces the selection of the active document.
    pub async fn select(&self, ids: &[&str]) -> RelayResult<()> {
        let mut state = self.state.write().await;
        let doc = state.active_mut()?;
        doc.selection = ids
            .iter()
            .filter(|id| doc.items.iter().any(|item| item.id == **id))
            .map(|id| id.to_string())
            .collect();
        Ok(())
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn active_document(&self) -> Option<DocumentSummary> {
        self.state.read().await.active().map(Document::summary)
    }

    async fn create_document(&self, options: DocumentOptions) -> RelayResult<CreatedDocument> {
        if !(options.width > 0.0 && options.height > 0.0) {
            return Err(RelayError::HostApi(format!(
                "Invalid document size {}x{}",
                options.width, options.height
            )));
        }

        let mut state = self.state.write().await;
        state.next_id += 1;
        let doc = Document {
            id: state.next_id.to_string(),
            name: options.title,
            width: options.width,
            height: options.height,
            color_space: options.color_space,
            artboards: 1,
            layers: 1,
            items: Vec::new(),
            selection: Vec::new(),
        };
        let created = CreatedDocument {
            id: doc.id.clone(),
            name: doc.name.clone(),
        };

        state.documents.push(doc);
        state.active = Some(state.documents.len() - 1);
        tracing::debug!("Created document {} ({})", created.name, created.id);

        Ok(created)
    }

    async fn add_path(&self, points: &[[f64; 2]], style: &PaintStyle) -> RelayResult<String> {
        let mut state = self.state.write().await;
        let doc = state.active_mut()?;
        Ok(doc.push(ItemKind::Path(points.to_vec()), *style))
    }

    async fn add_shape(&self, shape: &Shape, style: &PaintStyle) -> RelayResult<String> {
        if let Shape::Star { points, .. } = shape {
            if *points < 2 {
                return Err(RelayError::HostApi(format!(
                    "A star needs at least 2 points, got {}",
                    points
                )));
            }
            if *points > MAX_STAR_POINTS {
                return Err(RelayError::HostApi(format!(
                    "A star has at most {} points, got {}",
                    MAX_STAR_POINTS, points
                )));
            }
        }

        let mut state = self.state.write().await;
        let doc = state.active_mut()?;
        Ok(doc.push(ItemKind::Shape(shape.clone()), *style))
    }

    async fn add_text_frame(&self, frame: &TextFrameSpec) -> RelayResult<String> {
        let mut state = self.state.write().await;
        let doc = state.active_mut()?;
        let style = PaintStyle {
            fill: frame.fill,
            stroke: None,
        };
        Ok(doc.push(
            ItemKind::Text {
                frame: frame.clone(),
                font: None,
            },
            style,
        ))
    }

    async fn set_text_font(&self, text_id: &str, font: &str) -> RelayResult<()> {
        let known = AVAILABLE_FONTS
            .iter()
            .find(|name| **name == font)
            .ok_or_else(|| RelayError::FontNotFound(font.to_string()))?;

        let mut state = self.state.write().await;
        let doc = state.active_mut()?;
        let item = doc
            .items
            .iter_mut()
            .find(|item| item.id == text_id)
            .ok_or_else(|| RelayError::HostApi(format!("No page item with id {}", text_id)))?;

        match &mut item.kind {
            ItemKind::Text { font, .. } => {
                *font = Some(known.to_string());
                Ok(())
            }
            _ => Err(RelayError::HostApi(format!("{} is not a text frame", text_id))),
        }
    }

    async fn document_info(&self) -> RelayResult<DocumentInfo> {
        let state = self.state.read().await;
        let doc = state
            .active()
            .ok_or_else(|| RelayError::HostApi("No active document".to_string()))?;

        Ok(DocumentInfo {
            summary: doc.summary(),
            color_space: doc.color_space.clone(),
            selection: doc.selection.len(),
        })
    }

    async fn export_document(&self, options: &ExportOptions) -> RelayResult<()> {
        if options.coordinate_precision > MAX_COORDINATE_PRECISION {
            return Err(RelayError::HostApi(format!(
                "Coordinate precision must be at most {}, got {}",
                MAX_COORDINATE_PRECISION, options.coordinate_precision
            )));
        }

        let svg = {
            let state = self.state.read().await;
            let doc = state
                .active()
                .ok_or_else(|| RelayError::HostApi("No active document".to_string()))?;
            render_svg(doc, options.coordinate_precision)
        };

        tokio::fs::write(&options.path, svg)
            .await
            .map_err(|e| RelayError::HostApi(format!("Export to {:?} failed: {}", options.path, e)))?;

        tracing::debug!(
            "Exported document to {:?} (artboards: {:?})",
            options.path,
            options.artboard_range
        );
        Ok(())
    }
}

struct Num(f64, u32);

impl std::fmt::Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = format!("{:.*}", self.1 as usize, self.0);
        let text = if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.')
        } else {
            text.as_str()
        };
        match text {
            "-0" => f.write_str("0"),
            other => f.write_str(other),
        }
    }
}

fn paint_attrs(style: &PaintStyle, precision: u32) -> String {
    let color = |c: &RgbColor| c.to_hex().unwrap_or_else(|| "none".to_string());
    let mut attrs = format!(
        " fill=\"{}\"",
        style.fill.as_ref().map_or_else(|| "none".to_string(), color)
    );
    if let Some(stroke) = &style.stroke {
        let _ = write!(
            attrs,
            " stroke=\"{}\" stroke-width=\"{}\"",
            color(&stroke.color),
            Num(stroke.width, precision)
        );
    }
    attrs
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn star_points(cx: f64, cy: f64, radius: f64, inner: f64, points: u32) -> Vec<[f64; 2]> {
    let count = u64::from(points) * 2;
    (0..count)
        .map(|i| {
            let r = if i % 2 == 0 { radius } else { inner };
            let angle = PI * i as f64 / f64::from(points) - PI / 2.0;
            [cx + r * angle.cos(), cy + r * angle.sin()]
        })
        .collect()
}

fn render_svg(doc: &Document, precision: u32) -> String {
    let p = precision;
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = Num(doc.width, p),
        h = Num(doc.height, p)
    );
    let _ = writeln!(svg, "<title>{}</title>", escape_xml(&doc.name));

    for item in &doc.items {
        let attrs = paint_attrs(&item.style, p);
        let _ = match &item.kind {
            ItemKind::Path(points) => {
                let d: Vec<String> = points
                    .iter()
                    .enumerate()
                    .map(|(i, [x, y])| {
                        format!("{}{} {}", if i == 0 { "M" } else { "L" }, Num(*x, p), Num(*y, p))
                    })
                    .collect();
                writeln!(svg, "<path id=\"{}\" d=\"{}\"{}/>", item.id, d.join(" "), attrs)
            }
            ItemKind::Shape(Shape::Rectangle { top, left, width, height }) => writeln!(
                svg,
                "<rect id=\"{}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"{}/>",
                item.id,
                Num(*left, p),
                Num(*top, p),
                Num(*width, p),
                Num(*height, p),
                attrs
            ),
            ItemKind::Shape(Shape::Ellipse { top, left, width, height }) => writeln!(
                svg,
                "<ellipse id=\"{}\" cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\"{}/>",
                item.id,
                Num(left + width / 2.0, p),
                Num(top + height / 2.0, p),
                Num(width / 2.0, p),
                Num(height / 2.0, p),
                attrs
            ),
            ItemKind::Shape(Shape::Star { center_x, center_y, radius, inner_radius, points }) => {
                let pts: Vec<String> = star_points(*center_x, *center_y, *radius, *inner_radius, *points)
                    .iter()
                    .map(|[x, y]| format!("{},{}", Num(*x, p), Num(*y, p)))
                    .collect();
                writeln!(svg, "<polygon id=\"{}\" points=\"{}\"{}/>", item.id, pts.join(" "), attrs)
            }
            ItemKind::Text { frame, font } => writeln!(
                svg,
                "<text id=\"{}\" x=\"{}\" y=\"{}\" font-family=\"{}\" font-size=\"{}\"{}>{}</text>",
                item.id,
                Num(frame.position[0], p),
                Num(frame.position[1], p),
                escape_xml(font.as_deref().unwrap_or(DEFAULT_FONT)),
                Num(frame.font_size.unwrap_or(DEFAULT_FONT_SIZE), p),
                attrs,
                escape_xml(&frame.contents)
            ),
        };
    }

    svg.push_str("</svg>\n");
    svg
}
