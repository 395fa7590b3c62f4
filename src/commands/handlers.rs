// illustrator-relay/src/commands/handlers.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! One handler per action. Each decodes its own parameters, substitutes
//! defaults for missing fields and calls into the [`Host`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};

use crate::color;
use crate::error::{RelayError, Result as RelayResult};
use crate::host::{
    DocumentOptions, ExportOptions, Host, PaintStyle, Shape, Stroke, TextFrameSpec,
    UnsafeScriptEvaluator,
};

use super::{Action, CommandHandler};

fn decode<T: DeserializeOwned>(action: Action, params: Map<String, Value>) -> RelayResult<T> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| RelayError::invalid_params(action.name(), e))
}

/// Host scripts treat `0` the same as "not given"; so do we.
fn given(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// Accepts a JSON number or a numeric string. `null`, `false` and `""` read as absent.
fn loose_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got {:?}", s))),
        Some(other) => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

/// Truncates towards zero; out-of-range values saturate.
fn whole(value: f64) -> u32 {
    value.trunc() as u32
}

/// `false`, `null`, `0` and `""` mean "no paint".
fn paint(value: &Option<Value>) -> Option<&Value> {
    match value.as_ref()? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64().map_or(false, |n| n == 0.0 || n.is_nan()),
        _ => false,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaintParams {
    #[serde(default)]
    fill: Option<Value>,
    #[serde(default)]
    stroke: Option<Value>,
    #[serde(default, deserialize_with = "loose_number")]
    stroke_width: Option<f64>,
}

impl PaintParams {
    fn style(&self) -> PaintStyle {
        PaintStyle {
            fill: paint(&self.fill).map(color::resolve),
            stroke: paint(&self.stroke).map(|spec| Stroke {
                color: color::resolve(spec),
                width: given(self.stroke_width).unwrap_or(1.0),
            }),
        }
    }
}

/// `executeScript`: hands `code` to the unsafe evaluator, if one is installed.
pub struct ExecuteScript {
    pub evaluator: Option<Arc<dyn UnsafeScriptEvaluator>>,
}

#[derive(Deserialize)]
struct ExecuteScriptParams {
    code: String,
}

#[async_trait]
impl CommandHandler for ExecuteScript {
    async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value> {
        let params: ExecuteScriptParams = decode(Action::ExecuteScript, params)?;

        let evaluator = self.evaluator.as_ref().ok_or_else(|| {
            RelayError::HostApi("Script execution failed: unsafe script evaluation is disabled".to_string())
        })?;

        let result = evaluator
            .evaluate(&params.code)
            .await
            .map_err(|e| RelayError::HostApi(format!("Script execution failed: {}", e)))?;

        let result = if is_falsy(&result) {
            Value::String("Script executed successfully".to_string())
        } else {
            result
        };
        Ok(json!({ "result": result }))
    }
}

pub struct CreateDocument {
    pub host: Arc<dyn Host>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentParams {
    #[serde(default)]
    color_space: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    width: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    height: Option<f64>,
    #[serde(default)]
    title: Option<String>,
}

#[async_trait]
impl CommandHandler for CreateDocument {
    async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value> {
        let params: CreateDocumentParams = decode(Action::CreateDocument, params)?;

        let options = DocumentOptions {
            color_space: params.color_space.filter(|s| !s.is_empty()).unwrap_or_else(|| "RGB".to_string()),
            width: given(params.width).unwrap_or(800.0),
            height: given(params.height).unwrap_or(600.0),
            title: params.title.filter(|s| !s.is_empty()).unwrap_or_else(|| "Untitled".to_string()),
        };

        let doc = self.host.create_document(options).await?;
        Ok(json!({ "documentId": doc.id, "name": doc.name }))
    }
}

pub struct CreatePath {
    pub host: Arc<dyn Host>,
}

#[derive(Deserialize)]
struct CreatePathParams {
    points: Vec<[f64; 2]>,
    #[serde(flatten)]
    paint: PaintParams,
}

#[async_trait]
impl CommandHandler for CreatePath {
    async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value> {
        let params: CreatePathParams = decode(Action::CreatePath, params)?;
        let id = self.host.add_path(&params.points, &params.paint.style()).await?;
        Ok(json!({ "pathId": id }))
    }
}

pub struct CreateShape {
    pub host: Arc<dyn Host>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateShapeParams {
    #[serde(default, rename = "type")]
    shape_type: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    top: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    left: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    width: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    height: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    center_x: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    center_y: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    radius: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    inner_radius: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    points: Option<f64>,
    #[serde(flatten)]
    paint: PaintParams,
}

impl CreateShapeParams {
    fn shape(&self) -> RelayResult<Shape> {
        let top = given(self.top).unwrap_or(0.0);
        let left = given(self.left).unwrap_or(0.0);
        let width = given(self.width).unwrap_or(100.0);
        let height = given(self.height).unwrap_or(100.0);

        match self.shape_type.as_deref() {
            Some("rectangle") => Ok(Shape::Rectangle { top, left, width, height }),
            Some("ellipse") => Ok(Shape::Ellipse { top, left, width, height }),
            Some("star") => Ok(Shape::Star {
                center_x: given(self.center_x).unwrap_or(50.0),
                center_y: given(self.center_y).unwrap_or(50.0),
                radius: given(self.radius).unwrap_or(50.0),
                inner_radius: given(self.inner_radius).unwrap_or(25.0),
                points: given(self.points).map(whole).unwrap_or(5),
            }),
            other => Err(RelayError::UnknownShapeType(
                other.unwrap_or("undefined").to_string(),
            )),
        }
    }
}

#[async_trait]
impl CommandHandler for CreateShape {
    async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value> {
        let params: CreateShapeParams = decode(Action::CreateShape, params)?;
        let shape = params.shape()?;
        let id = self.host.add_shape(&shape, &params.paint.style()).await?;
        Ok(json!({ "shapeId": id }))
    }
}

pub struct CreateText {
    pub host: Arc<dyn Host>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTextParams {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    x: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    y: Option<f64>,
    #[serde(default, deserialize_with = "loose_number")]
    font_size: Option<f64>,
    #[serde(default)]
    font: Option<String>,
    #[serde(default)]
    color: Option<Value>,
}

#[async_trait]
impl CommandHandler for CreateText {
    async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value> {
        let params: CreateTextParams = decode(Action::CreateText, params)?;

        let frame = TextFrameSpec {
            contents: params.text.filter(|t| !t.is_empty()).unwrap_or_else(|| "Sample Text".to_string()),
            position: [given(params.x).unwrap_or(100.0), given(params.y).unwrap_or(100.0)],
            font_size: given(params.font_size),
            fill: paint(&params.color).map(color::resolve),
        };
        let id = self.host.add_text_frame(&frame).await?;

        if let Some(font) = params.font.as_deref().filter(|f| !f.is_empty()) {
            if let Err(e) = self.host.set_text_font(&id, font).await {
                tracing::warn!("Font {} not found: {}", font, e);
            }
        }

        Ok(json!({ "textId": id }))
    }
}

pub struct GetDocumentInfo {
    pub host: Arc<dyn Host>,
}

#[async_trait]
impl CommandHandler for GetDocumentInfo {
    async fn handle(&self, _params: Map<String, Value>) -> RelayResult<Value> {
        let info = self.host.document_info().await?;
        Ok(serde_json::to_value(info)?)
    }
}

pub struct ExportDocument {
    pub host: Arc<dyn Host>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocumentParams {
    #[serde(default)]
    artboard_range: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    precision: Option<f64>,
    path: PathBuf,
}

#[async_trait]
impl CommandHandler for ExportDocument {
    async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value> {
        let params: ExportDocumentParams = decode(Action::ExportDocument, params)?;

        let options = ExportOptions {
            artboard_range: params.artboard_range.unwrap_or_default(),
            coordinate_precision: given(params.precision).map(whole).unwrap_or(3),
            path: params.path,
        };
        self.host.export_document(&options).await?;

        Ok(json!({ "exported": true, "path": options.path }))
    }
}
