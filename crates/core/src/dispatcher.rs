use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::handlers::{content, search, tree};
use crate::model::{Action, Request, Response};
use crate::parser::ParserDispatch;
use crate::source::Registry;
use crate::tree::cache::TreeCache;

/// The collaborators every connection's dispatcher shares, built once
/// at startup and never mutated afterward.
pub struct EngineShared {
    pub registry: Registry,
    pub dispatch: ParserDispatch,
    pub config: EngineConfig,
    pub cache: TreeCache,
}

/// Drives one connection's request lifecycle: reads one request at a
/// time, preempts whatever is currently running, and fans the new one
/// out without waiting for the old one to finish.
pub struct Dispatcher {
    shared: Arc<EngineShared>,
    out: mpsc::Sender<Response>,
    connection_token: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
    handlers: Mutex<JoinSet<()>>,
}

impl Dispatcher {
    pub fn new(shared: Arc<EngineShared>, out: mpsc::Sender<Response>) -> Self {
        Self {
            shared,
            out,
            connection_token: CancellationToken::new(),
            current: Mutex::new(None),
            handlers: Mutex::new(JoinSet::new()),
        }
    }

    /// Accepts one inbound request: cancels the previously active
    /// request's token, if any, then launches the new handler under a
    /// fresh child token. Every handler, however it ends, emits exactly
    /// one terminal marker.
    pub fn accept(&self, request: Request) {
        let token = self.connection_token.child_token();
        let prev = self.current.lock().replace(token.clone());
        if let Some(prev) = prev {
            prev.cancel();
        }

        let meta = request.meta.clone();
        let shared = self.shared.clone();
        let out = self.out.clone();
        let handler_token = token.clone();

        self.handlers.lock().spawn(async move {
            run_request(shared, request, handler_token, out.clone()).await;
            let _ = out.send(Response::terminal(meta)).await;
        });
    }

    /// Cancels the active handler and waits for every outstanding
    /// handler task to drain. The outbound channel closes once the
    /// caller drops its sender alongside this dispatcher.
    pub async fn shutdown(self) {
        self.connection_token.cancel();
        let mut handlers = self.handlers.into_inner();
        while handlers.join_next().await.is_some() {}
    }
}

async fn run_request(shared: Arc<EngineShared>, request: Request, token: CancellationToken, out: mpsc::Sender<Response>) {
    let meta = request.meta.clone();
    match meta.action {
        Action::GetFileTree => {
            tree::handle(
                meta,
                request.location(),
                request.filter_fs,
                &shared.registry,
                &shared.cache,
                &shared.config,
                &token,
                &out,
            )
            .await;
        }
        Action::GetContent => {
            content::handle(
                meta,
                request.location(),
                request.filter_fs,
                (&request.filter_time).into(),
                &shared.registry,
                &shared.dispatch,
                &shared.config,
                &token,
                &out,
            )
            .await;
        }
        Action::Search => {
            let Some(pattern) = request.regexp.clone() else { return };
            search::handle(
                meta,
                request.location(),
                pattern,
                request.filter_fs,
                (&request.filter_time).into(),
                &shared.registry,
                &shared.dispatch,
                &shared.config,
                &token,
                &out,
            )
            .await;
        }
        // Unrecognized actions produce nothing beyond the terminal
        // marker `accept` sends after this returns.
        Action::Unknown => {}
    }
}
