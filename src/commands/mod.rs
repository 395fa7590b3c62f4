// illustrator-relay/src/commands/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Command dispatching for inbound command packets.
//!
//! A packet flows through three steps:
//!
//! 1. [`ensure_document_if_required`] rejects document actions when no
//!    document is open,
//! 2. [`CommandRouter::route`] resolves the action name against the
//!    [`HandlerTable`] and runs the handler,
//! 3. [`Dispatcher::handle_packet`] wraps the outcome in a
//!    [`ResponseEnvelope`] together with the current document summary.
//!
//! Nothing escapes step 3: every failure becomes a `FAILURE` envelope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{RelayError, Result as RelayResult};
use crate::host::{Host, UnsafeScriptEvaluator};
use crate::protocol::{Command, CommandPacket, ResponseEnvelope};

pub mod handlers;

/// Actions the relay knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ExecuteScript,
    CreateDocument,
    CreatePath,
    CreateShape,
    CreateText,
    GetDocumentInfo,
    ExportDocument,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ExecuteScript,
        Action::CreateDocument,
        Action::CreatePath,
        Action::CreateShape,
        Action::CreateText,
        Action::GetDocumentInfo,
        Action::ExportDocument,
    ];

    /// Wire name of the action.
    pub fn name(self) -> &'static str {
        match self {
            Action::ExecuteScript => "executeScript",
            Action::CreateDocument => "createDocument",
            Action::CreatePath => "createPath",
            Action::CreateShape => "createShape",
            Action::CreateText => "createText",
            Action::GetDocumentInfo => "getDocumentInfo",
            Action::ExportDocument => "exportDocument",
        }
    }

    /// Exact, case-sensitive lookup by wire name.
    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|action| action.name() == name)
    }
}

/// Actions that fail fast when no document is open.
pub const REQUIRES_DOCUMENT: [&str; 5] = [
    "createPath",
    "createShape",
    "createText",
    "getDocumentInfo",
    "exportDocument",
];

/// The unit of logic bound to one action.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value>;
}

/// Mapping from action to handler.
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: HashMap<Action, Arc<dyn CommandHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full set of handlers backed by `host`.
    ///
    /// `evaluator` is the unsafe script capability; without it
    /// `executeScript` is still routed but always fails.
    pub fn standard(host: Arc<dyn Host>, evaluator: Option<Arc<dyn UnsafeScriptEvaluator>>) -> Self {
        let mut table = Self::new();
        table.register(Action::ExecuteScript, Arc::new(handlers::ExecuteScript { evaluator }));
        table.register(Action::CreateDocument, Arc::new(handlers::CreateDocument { host: host.clone() }));
        table.register(Action::CreatePath, Arc::new(handlers::CreatePath { host: host.clone() }));
        table.register(Action::CreateShape, Arc::new(handlers::CreateShape { host: host.clone() }));
        table.register(Action::CreateText, Arc::new(handlers::CreateText { host: host.clone() }));
        table.register(Action::GetDocumentInfo, Arc::new(handlers::GetDocumentInfo { host: host.clone() }));
        table.register(Action::ExportDocument, Arc::new(handlers::ExportDocument { host }));
        table
    }

    /// Binds `handler` to `action`, replacing any previous binding.
    pub fn register(&mut self, action: Action, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(action, handler);
    }

    pub fn get(&self, action: Action) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(&action)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Resolves commands against a [`HandlerTable`].
#[derive(Clone)]
pub struct CommandRouter {
    table: HandlerTable,
}

impl CommandRouter {
    pub fn new(table: HandlerTable) -> Self {
        Self { table }
    }

    /// Runs the handler bound to `command.action` with the command's params
    /// (an empty mapping when absent) and returns its result unchanged.
    ///
    /// Does not check for an open document; run
    /// [`ensure_document_if_required`] first.
    pub async fn route(&self, command: &Command) -> RelayResult<Value> {
        let handler = Action::from_name(&command.action)
            .and_then(|action| self.table.get(action))
            .ok_or_else(|| RelayError::UnknownAction(command.action.clone()))?;

        handler.handle(command.params_or_empty()).await
    }
}

/// Fails with `NoActiveDocument` when `command` needs a document and the host has none open.
pub async fn ensure_document_if_required(command: &Command, host: &dyn Host) -> RelayResult<()> {
    if REQUIRES_DOCUMENT.contains(&command.action.as_str()) && host.active_document().await.is_none() {
        return Err(RelayError::NoActiveDocument(command.action.clone()));
    }
    Ok(())
}

/// Runs the per-packet pipeline and builds the reply envelope.
#[derive(Clone)]
pub struct Dispatcher {
    host: Arc<dyn Host>,
    router: CommandRouter,
}

impl Dispatcher {
    pub fn new(host: Arc<dyn Host>, router: CommandRouter) -> Self {
        Self { host, router }
    }

    /// Dispatcher over [`HandlerTable::standard`].
    pub fn standard(host: Arc<dyn Host>, evaluator: Option<Arc<dyn UnsafeScriptEvaluator>>) -> Self {
        let router = CommandRouter::new(HandlerTable::standard(host.clone(), evaluator));
        Self::new(host, router)
    }

    /// Handles one packet. Never fails: errors become a `FAILURE` envelope
    /// whose message reads `Error calling <action> : <error>`.
    pub async fn handle_packet(&self, packet: &CommandPacket) -> ResponseEnvelope {
        let command = &packet.command;
        let outcome = self.run(command).await;
        let document = self.host.active_document().await;

        match outcome {
            Ok(response) => {
                tracing::debug!("Command {} from {} succeeded", command.action, packet.sender_id);
                ResponseEnvelope::success(&packet.sender_id, response, document)
            }
            Err(e) => {
                tracing::warn!("Command {} from {} failed: {}", command.action, packet.sender_id, e);
                ResponseEnvelope::failure(
                    &packet.sender_id,
                    format!("Error calling {} : {}", command.action, e),
                    document,
                )
            }
        }
    }

    async fn run(&self, command: &Command) -> RelayResult<Value> {
        ensure_document_if_required(command, self.host.as_ref()).await?;
        self.router.route(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::host::{
        CreatedDocument, DocumentOptions, ExportOptions, MemoryHost, PaintStyle, Shape,
        TextFrameSpec,
    };
    use crate::protocol::{DocumentInfo, DocumentSummary, Status};

    /// Counts every host call and forwards to a [`MemoryHost`].
    #[derive(Default)]
    struct CountingHost {
        inner: MemoryHost,
        mutations: AtomicUsize,
    }

    impl CountingHost {
        fn mutations(&self) -> usize {
            self.mutations.load(Ordering::SeqCst)
        }

        fn bump(&self) {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Host for CountingHost {
        async fn active_document(&self) -> Option<DocumentSummary> {
            self.inner.active_document().await
        }
        async fn create_document(&self, options: DocumentOptions) -> RelayResult<CreatedDocument> {
            self.bump();
            self.inner.create_document(options).await
        }
        async fn add_path(&self, points: &[[f64; 2]], style: &PaintStyle) -> RelayResult<String> {
            self.bump();
            self.inner.add_path(points, style).await
        }
        async fn add_shape(&self, shape: &Shape, style: &PaintStyle) -> RelayResult<String> {
            self.bump();
            self.inner.add_shape(shape, style).await
        }
        async fn add_text_frame(&self, frame: &TextFrameSpec) -> RelayResult<String> {
            self.bump();
            self.inner.add_text_frame(frame).await
        }
        async fn set_text_font(&self, text_id: &str, font: &str) -> RelayResult<()> {
            self.bump();
            self.inner.set_text_font(text_id, font).await
        }
        async fn document_info(&self) -> RelayResult<DocumentInfo> {
            self.bump();
            self.inner.document_info().await
        }
        async fn export_document(&self, options: &ExportOptions) -> RelayResult<()> {
            self.bump();
            self.inner.export_document(options).await
        }
    }

    fn packet(sender: &str, action: &str, params: Value) -> CommandPacket {
        CommandPacket {
            sender_id: sender.to_string(),
            command: Command::new(action, params),
        }
    }

    #[test]
    fn test_action_lookup_is_case_sensitive() {
        assert_eq!(Action::from_name("createShape"), Some(Action::CreateShape));
        assert_eq!(Action::from_name("CreateShape"), None);
        assert_eq!(Action::from_name("createshape"), None);
        for action in Action::ALL {
            assert_eq!(Action::from_name(action.name()), Some(action));
        }
    }

    #[tokio::test]
    async fn test_unknown_action_makes_no_host_call() {
        let host = Arc::new(CountingHost::default());
        let router = CommandRouter::new(HandlerTable::standard(host.clone(), None));

        let err = router
            .route(&Command::new("deleteEverything", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::UnknownAction(ref a) if a == "deleteEverything"));
        assert_eq!(host.mutations(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_action_is_unknown() {
        let router = CommandRouter::new(HandlerTable::new());
        let err = router
            .route(&Command::new("createDocument", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownAction(_)));
    }

    #[tokio::test]
    async fn test_router_passes_empty_params_when_absent() {
        struct ParamsEcho;

        #[async_trait]
        impl CommandHandler for ParamsEcho {
            async fn handle(&self, params: Map<String, Value>) -> RelayResult<Value> {
                Ok(Value::Object(params))
            }
        }

        let mut table = HandlerTable::new();
        table.register(Action::GetDocumentInfo, Arc::new(ParamsEcho));
        let router = CommandRouter::new(table);

        let command = Command {
            action: "getDocumentInfo".to_string(),
            params: None,
        };
        assert_eq!(router.route(&command).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_checker_rejects_document_actions_without_document() {
        let host = MemoryHost::new();
        for action in REQUIRES_DOCUMENT {
            let err = ensure_document_if_required(&Command::new(action, json!({})), &host)
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::NoActiveDocument(ref a) if a == action));
        }
    }

    #[tokio::test]
    async fn test_checker_ignores_other_actions() {
        let host = MemoryHost::new();
        for action in ["createDocument", "executeScript", "nonsense"] {
            ensure_document_if_required(&Command::new(action, json!({})), &host)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_checker_runs_before_router() {
        let host = Arc::new(CountingHost::default());
        let dispatcher = Dispatcher::standard(host.clone(), None);

        let env = dispatcher
            .handle_packet(&packet("abc", "createShape", json!({"type": "rectangle"})))
            .await;

        assert_eq!(env.status, Status::Failure);
        assert_eq!(host.mutations(), 0);
    }

    #[tokio::test]
    async fn test_create_shape_end_to_end() {
        let host = Arc::new(MemoryHost::new());
        let dispatcher = Dispatcher::standard(host.clone(), None);
        dispatcher
            .handle_packet(&packet("setup", "createDocument", json!({})))
            .await;

        let env = dispatcher
            .handle_packet(&packet(
                "abc",
                "createShape",
                json!({"type": "rectangle", "width": 50, "height": 50, "fill": "#00FF00"}),
            ))
            .await;

        assert_eq!(env.sender_id, "abc");
        assert_eq!(env.status, Status::Success);
        assert!(env.message.is_none());
        assert!(env.response.as_ref().unwrap()["shapeId"].is_string());
        assert_eq!(env.document.unwrap().name, "Untitled");
    }

    #[tokio::test]
    async fn test_create_shape_without_document() {
        let dispatcher = Dispatcher::standard(Arc::new(MemoryHost::new()), None);

        let env = dispatcher
            .handle_packet(&packet(
                "abc",
                "createShape",
                json!({"type": "rectangle", "width": 50, "height": 50, "fill": "#00FF00"}),
            ))
            .await;

        assert_eq!(env.sender_id, "abc");
        assert_eq!(env.status, Status::Failure);
        assert!(env.response.is_none());
        assert!(env.document.is_none());
        let message = env.message.unwrap();
        assert!(message.starts_with("Error calling createShape : "));
        assert!(message.contains("NoActiveDocument"));
    }

    #[tokio::test]
    async fn test_failure_envelope_carries_open_document() {
        let host = Arc::new(MemoryHost::new());
        let dispatcher = Dispatcher::standard(host, None);
        dispatcher
            .handle_packet(&packet("setup", "createDocument", json!({"title": "Poster"})))
            .await;

        let env = dispatcher
            .handle_packet(&packet("abc", "createShape", json!({"type": "hexagon"})))
            .await;

        assert_eq!(env.status, Status::Failure);
        assert_eq!(
            env.message.as_deref(),
            Some("Error calling createShape : Unknown shape type: hexagon")
        );
        assert_eq!(env.document.unwrap().name, "Poster");
    }

    #[tokio::test]
    async fn test_envelope_invariant_holds_for_every_action() {
        let dispatcher = Dispatcher::standard(Arc::new(MemoryHost::new()), None);
        let mut names: Vec<&str> = Action::ALL.iter().map(|a| a.name()).collect();
        names.push("bogus");

        for name in names {
            let env = dispatcher.handle_packet(&packet("s", name, json!({}))).await;
            match env.status {
                Status::Success => assert!(env.response.is_some() && env.message.is_none()),
                Status::Failure => assert!(env.message.is_some() && env.response.is_none()),
            }
        }
    }
}
