//! HTTP request bridge adapter.
//!
//! The ESP-IDF HTTP server runs its handlers on its own task.  Handlers
//! must not touch the meter or the beeper directly, so each one parses the
//! request into a [`Route`], posts it to the main loop over a bounded
//! `embassy-sync` channel, and waits for the loop's [`ApiResponse`] on a
//! second one.
//!
//! ```text
//! ┌──────────────┐  PendingRequest ┌──────────────┐
//! │  httpd task  │────────────────▶│  Main loop   │
//! │  (blocking)  │◀────────────────│ RequestQueue │
//! └──────────────┘      Reply      └──────────────┘
//! ```
//!
//! The loop answers at most a few requests per iteration; a handler that
//! is not answered within [`RESPONSE_TIMEOUT`] replies 503.  Replies carry
//! the request id, so an answer that arrives after its handler gave up is
//! dropped by the next waiter instead of being served to the wrong client.
//! The IDF server runs its handlers one at a time, so only one waiter
//! exists at any moment.

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future;
use log::{debug, warn};

use crate::api::{ApiResponse, Route};
use crate::app::ports::RequestPort;

/// Requests that may wait for the loop at once.
pub const QUEUE_DEPTH: usize = 4;
/// How long a handler waits for the loop to answer.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(2_000);

struct PendingRequest {
    id: u32,
    route: Route,
}

struct Reply {
    id: u32,
    response: ApiResponse,
}

/// Channel pair between the server task and the loop.  Lives in a
/// `static`; [`RequestBridge::split`] hands out the two ends.
pub struct RequestBridge {
    requests: Channel<CriticalSectionRawMutex, PendingRequest, QUEUE_DEPTH>,
    replies: Channel<CriticalSectionRawMutex, Reply, QUEUE_DEPTH>,
    next_id: AtomicU32,
}

impl RequestBridge {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            replies: Channel::new(),
            next_id: AtomicU32::new(0),
        }
    }

    pub fn split(&'static self) -> (RequestHandle, RequestQueue) {
        (
            RequestHandle { bridge: self },
            RequestQueue {
                bridge: self,
                current: None,
            },
        )
    }
}

impl Default for RequestBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Server side of the bridge.  Copied into every handler.
#[derive(Clone, Copy)]
pub struct RequestHandle {
    bridge: &'static RequestBridge,
}

/// Main-loop side of the bridge.
pub struct RequestQueue {
    bridge: &'static RequestBridge,
    current: Option<u32>,
}

fn unavailable() -> ApiResponse {
    ApiResponse::with_status(503, "busy")
}

impl RequestHandle {
    /// Queue `route` and block (server task only) until the loop answers
    /// or `timeout` passes.
    pub fn submit(&self, route: Route, timeout: Duration) -> ApiResponse {
        let id = self.bridge.next_id.fetch_add(1, Ordering::Relaxed);
        if self.bridge.requests.try_send(PendingRequest { id, route }).is_err() {
            warn!("HTTP: request queue full");
            return unavailable();
        }

        let answer = async {
            loop {
                let reply = self.bridge.replies.receive().await;
                if reply.id == id {
                    return Some(reply.response);
                }
                debug!("HTTP: dropped late reply #{}", reply.id);
            }
        };
        let expiry = async {
            async_io_mini::Timer::after(timeout).await;
            None
        };
        future::block_on(future::or(answer, expiry)).unwrap_or_else(|| {
            warn!("HTTP: main loop did not answer request #{} in time", id);
            unavailable()
        })
    }
}

impl RequestPort for RequestQueue {
    fn poll_request(&mut self) -> Option<Route> {
        let pending = self.bridge.requests.try_receive().ok()?;
        self.current = Some(pending.id);
        Some(pending.route)
    }

    fn respond(&mut self, response: ApiResponse) {
        let Some(id) = self.current.take() else {
            return;
        };
        if self.bridge.replies.try_send(Reply { id, response }).is_err() {
            warn!("HTTP: reply queue full, answer to #{} dropped", id);
        }
    }
}

/// Register the catch-all handlers that feed the bridge.
#[cfg(target_os = "espidf")]
pub fn register_routes(
    server: &mut esp_idf_svc::http::server::EspHttpServer<'static>,
    handle: RequestHandle,
) -> Result<(), esp_idf_svc::sys::EspError> {
    use esp_idf_svc::http::Method as HttpMethod;
    use esp_idf_svc::io::Write;

    use crate::api::Method;

    for (http_method, method) in [(HttpMethod::Get, Method::Get), (HttpMethod::Post, Method::Post)] {
        server.fn_handler::<anyhow::Error, _>("/*", http_method, move |req| {
            let route = Route::parse(method, req.uri());
            let response = handle.submit(route, RESPONSE_TIMEOUT);
            let mut headers = vec![("Content-Type", response.content_type)];
            if let Some(location) = response.location {
                headers.push(("Location", location));
            }
            let mut resp = req.into_response(response.status, None, &headers)?;
            resp.write_all(&response.body)?;
            Ok(())
        })?;
    }
    Ok(())
}
