//! Stubs shared by the unit tests.

use crate::client::RegistryApi;
use crate::docker::TransferTool;
use crate::error::{Error, Result};
use crate::secret_string::SecretString;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&str, &str, usize) -> Result<Bytes> + Send + Sync>;

/// Request interface stub. The handler receives the method, the URL and the
/// 1-based number of the call; every call is recorded as `"METHOD url"`.
pub struct StubApi {
    handler: Handler,
    calls: Mutex<Vec<String>>,
}

impl StubApi {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &str, usize) -> Result<Bytes> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with an empty JSON object
    pub fn ok() -> Self {
        Self::new(|_, _, _| Ok(Bytes::from_static(b"{}")))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(&format!("{} ", method)))
            .count()
    }

    fn call(&self, method: &str, url: &str) -> Result<Bytes> {
        let number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(format!("{} {}", method, url));
            calls.len()
        };
        (self.handler)(method, url, number)
    }
}

impl RegistryApi for StubApi {
    async fn get(&self, url: &str) -> Result<Bytes> {
        self.call("GET", url)
    }

    async fn post(&self, url: &str, _body: Option<&Value>) -> Result<Bytes> {
        self.call("POST", url)
    }

    async fn put(&self, url: &str, _body: Option<&Value>) -> Result<Bytes> {
        self.call("PUT", url)
    }

    async fn delete(&self, url: &str) -> Result<Bytes> {
        self.call("DELETE", url)
    }
}

/// Transfer tool that records each operation and fails the one named in
/// `fail_on`.
#[derive(Default)]
pub struct RecordingTool {
    fail_on: Option<&'static str>,
    ops: Mutex<Vec<String>>,
}

impl RecordingTool {
    pub fn failing_on(op: &'static str) -> Self {
        Self {
            fail_on: Some(op),
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, detail: String) -> Result<()> {
        self.ops.lock().unwrap().push(format!("{} {}", op, detail));
        if self.fail_on == Some(op) {
            return Err(Error::transport(format!("docker {}", op), "denied"));
        }
        Ok(())
    }
}

impl TransferTool for RecordingTool {
    async fn status(&self) -> Result<()> {
        self.record("status", String::new())
    }

    async fn pull(&self, reference: &str) -> Result<()> {
        self.record("pull", reference.to_string())
    }

    async fn login(&self, username: &str, _password: &SecretString, host: &str) -> Result<()> {
        self.record("login", format!("{}@{}", username, host))
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.record("tag", format!("{} {}", source, target))
    }

    async fn push(&self, reference: &str) -> Result<()> {
        self.record("push", reference.to_string())
    }
}
