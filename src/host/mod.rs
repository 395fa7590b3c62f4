// illustrator-relay/src/host/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The host document API the command handlers drive.
//!
//! The relay never talks to a document model directly; it goes through
//! [`Host`]. [`memory::MemoryHost`] is the in-process implementation used by
//! the binary and the tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::color::RgbColor;
use crate::error::Result as RelayResult;
use crate::protocol::{DocumentInfo, DocumentSummary};

pub mod memory;

pub use memory::MemoryHost;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOptions {
    pub color_space: String,
    pub width: f64,
    pub height: f64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedDocument {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: RgbColor,
    pub width: f64,
}

/// Fill and stroke applied to a new page item. `None` leaves it unpainted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaintStyle {
    pub fill: Option<RgbColor>,
    pub stroke: Option<Stroke>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rectangle {
        top: f64,
        left: f64,
        width: f64,
        height: f64,
    },
    Ellipse {
        top: f64,
        left: f64,
        width: f64,
        height: f64,
    },
    Star {
        center_x: f64,
        center_y: f64,
        radius: f64,
        inner_radius: f64,
        points: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextFrameSpec {
    pub contents: String,
    pub position: [f64; 2],
    pub font_size: Option<f64>,
    pub fill: Option<RgbColor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub artboard_range: String,
    pub coordinate_precision: u32,
    pub path: PathBuf,
}

/// Document operations the relay needs from the host application.
///
/// Every method that touches a document acts on the active one and fails
/// with [`crate::error::RelayError::HostApi`] when there is none.
#[async_trait]
pub trait Host: Send + Sync {
    /// Summary of the active document, or `None` when nothing is open.
    async fn active_document(&self) -> Option<DocumentSummary>;

    /// Creates a document and makes it active.
    async fn create_document(&self, options: DocumentOptions) -> RelayResult<CreatedDocument>;

    /// Adds a path through `points`; returns the new item's id.
    async fn add_path(&self, points: &[[f64; 2]], style: &PaintStyle) -> RelayResult<String>;

    /// Adds a primitive shape; returns the new item's id.
    async fn add_shape(&self, shape: &Shape, style: &PaintStyle) -> RelayResult<String>;

    /// Adds a text frame; returns the new item's id.
    async fn add_text_frame(&self, frame: &TextFrameSpec) -> RelayResult<String>;

    /// Looks `font` up by name and applies it to the text frame `text_id`.
    /// An unknown font fails with `FontNotFound`.
    async fn set_text_font(&self, text_id: &str, font: &str) -> RelayResult<()>;

    async fn document_info(&self) -> RelayResult<DocumentInfo>;

    /// Exports the active document as web optimized SVG.
    async fn export_document(&self, options: &ExportOptions) -> RelayResult<()>;

    /// The host's code evaluation capability, if it has one.
    fn script_evaluator(&self) -> Option<Arc<dyn UnsafeScriptEvaluator>> {
        None
    }
}

/// Arbitrary code evaluation in the host context.
///
/// UNSAFE: whoever can reach the proxy can run any code the host can. Only
/// installed when the configuration sets `unsafe_eval = true`.
#[async_trait]
pub trait UnsafeScriptEvaluator: Send + Sync {
    /// Evaluates `code` and returns its value. `Value::Null` means "no value".
    async fn evaluate(&self, code: &str) -> RelayResult<Value>;
}
