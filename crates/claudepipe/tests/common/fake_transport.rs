//! Scripted transport double
//!
//! Stands in for the CLI subprocess: tests script the inbound frame sequence,
//! capture every outbound write, and optionally auto-answer writes the way
//! the CLI would (e.g. the initialize handshake).

use async_trait::async_trait;
use claudepipe_transport::{Result as TransportResult, Transport, TransportError};
use serde_json::{Value, json};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as TokioMutex, mpsc};

type Responder = Box<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

pub struct FakeTransport {
    frames_tx: StdMutex<Option<mpsc::UnboundedSender<TransportResult<Value>>>>,
    frames_rx: TokioMutex<mpsc::UnboundedReceiver<TransportResult<Value>>>,
    writes: StdMutex<Vec<Value>>,
    responder: StdMutex<Option<Responder>>,
    input_closed: AtomicBool,
    closed: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            frames_tx: StdMutex::new(Some(tx)),
            frames_rx: TokioMutex::new(rx),
            writes: StdMutex::new(Vec::new()),
            responder: StdMutex::new(None),
            input_closed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// A transport that answers every outbound control request with an empty
    /// success response, covering the initialize handshake.
    pub fn auto_responding() -> Arc<Self> {
        let transport = Self::new();
        transport.set_responder(|frame| {
            if frame["type"] == "control_request" {
                vec![success_response(&frame["request_id"], json!({}))]
            } else {
                Vec::new()
            }
        });
        transport
    }

    /// Install a responder invoked on every write; the frames it returns are
    /// queued as inbound.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Some(Box::new(responder));
    }

    /// Queue one inbound frame.
    pub fn push_frame(&self, frame: Value) {
        if let Some(tx) = self.frames_tx.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(frame));
        }
    }

    /// Queue a fatal transport error as the next read result.
    pub fn push_error(&self, error: TransportError) {
        if let Some(tx) = self.frames_tx.lock().unwrap().as_ref() {
            let _ = tx.send(Err(error));
        }
    }

    /// End the inbound stream cleanly.
    pub fn end_stream(&self) {
        self.frames_tx.lock().unwrap().take();
    }

    /// Every frame written so far.
    pub fn writes(&self) -> Vec<Value> {
        self.writes.lock().unwrap().clone()
    }

    /// The control responses written so far (their `response` bodies).
    pub fn control_responses(&self) -> Vec<Value> {
        self.writes()
            .into_iter()
            .filter(|frame| frame["type"] == "control_response")
            .map(|frame| frame["response"].clone())
            .collect()
    }

    pub fn input_closed(&self) -> bool {
        self.input_closed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn write(&self, frame: &Value) -> TransportResult<()> {
        self.writes.lock().unwrap().push(frame.clone());
        let responses = match self.responder.lock().unwrap().as_ref() {
            Some(responder) => responder(frame),
            None => Vec::new(),
        };
        for response in responses {
            self.push_frame(response);
        }
        Ok(())
    }

    async fn next_frame(&self) -> TransportResult<Option<Value>> {
        match self.frames_rx.lock().await.recv().await {
            None => Ok(None),
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
        }
    }

    async fn close_input(&self) {
        self.input_closed.store(true, Ordering::SeqCst);
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.end_stream();
    }
}

/// A wire-shaped success control response for `request_id`.
pub fn success_response(request_id: &Value, response: Value) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": response,
        },
    })
}

/// A wire-shaped error control response for `request_id`.
pub fn error_response(request_id: &Value, message: &str) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "error",
            "request_id": request_id,
            "error": message,
        },
    })
}

/// A minimal valid `result` frame.
pub fn result_frame() -> Value {
    json!({
        "type": "result",
        "subtype": "success",
        "duration_ms": 100,
        "duration_api_ms": 80,
        "is_error": false,
        "num_turns": 1,
        "session_id": "s1",
    })
}
