//! Scripted in-process [`Fetcher`] for tests

use crate::error::{FetchError, FetchResult};
use crate::fetcher::Fetcher;
use async_trait::async_trait;
use ganadero_core::{Method, Request, Response};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this response
    Respond(Response),
    /// Fail without a response
    Fail(FetchError),
}

#[derive(Debug, Default)]
struct MockState {
    // The last reply of each script repeats forever
    routes: HashMap<(Method, String), VecDeque<Reply>>,
    offline: bool,
    delay: Option<Duration>,
    log: Vec<Request>,
}

/// Fetcher answering from per-route scripts.
///
/// Unscripted routes answer `404`. While offline every request fails with
/// [`FetchError::NetworkUnavailable`] and is still logged.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockState>>,
}

impl MockFetcher {
    /// Fetcher with no routes, online
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `response` for this route
    pub fn respond(&self, method: Method, url: impl Into<String>, response: Response) {
        self.script(method, url, vec![Reply::Respond(response)]);
    }

    /// Always fail this route
    pub fn fail(&self, method: Method, url: impl Into<String>, error: FetchError) {
        self.script(method, url, vec![Reply::Fail(error)]);
    }

    /// Answer with `replies` in order, repeating the last one
    pub fn script(&self, method: Method, url: impl Into<String>, replies: Vec<Reply>) {
        self.state.lock().routes.insert((method, url.into()), replies.into());
    }

    /// Toggle simulated loss of connectivity
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Delay every reply
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Every request seen so far, oldest first
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().log.clone()
    }

    /// How many requests hit this route
    pub fn request_count(&self, method: Method, url: &str) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    /// Forget the request log
    pub fn clear_requests(&self) {
        self.state.lock().log.clear();
    }

    fn next_reply(&self, request: &Request) -> (Reply, Option<Duration>) {
        let mut state = self.state.lock();
        state.log.push(request.clone());

        if state.offline {
            let reply = Reply::Fail(FetchError::NetworkUnavailable("simulated offline".into()));
            return (reply, state.delay);
        }

        let delay = state.delay;
        let reply = match state.routes.get_mut(&(request.method, request.url.clone())) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        (reply.unwrap_or_else(|| Reply::Respond(Response::text(404, "Not Found"))), delay)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> FetchResult<Response> {
        let (reply, delay) = self.next_reply(request);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(error) => Err(error),
        }
    }
}
