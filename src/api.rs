//! HTTP surface of the device: JSON status endpoints plus the web UI
//! files on the data partition.
//!
//! The HTTP server itself is an adapter concern; this module only maps a
//! request line onto a [`Route`] and builds the response.
//!
//! | Method | Path           | Body                                   |
//! |--------|----------------|----------------------------------------|
//! | GET    | `/`            | 302 → `/index.html`                    |
//! | GET    | `/watts`       | `{"watts":N}`                          |
//! | GET    | `/temperature` | `{"temperature":T}`                    |
//! | GET    | `/humidity`    | `{"humidity":H}`                       |
//! | POST   | `/beeper`      | `{"success":1}` / `{"busy":1}` / `{"no count specified":1}` |
//! | GET    | `/log.csv`     | the power log, well-formed records only |
//! | GET    | anything else  | that file from the data partition      |
//!
//! A missing file or any other method/path is a 404.  JSON bodies are
//! served as `text/plain`, as the web UI expects.

use log::{debug, warn};
use serde::Serialize;
use serde_json::json;

use crate::app::ports::{AlertError, AlertPort, EnvReading, LogStorePort};
use crate::logbook::{self, LOG_FILE_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

/// A request the main loop knows how to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Watts,
    Temperature,
    Humidity,
    /// `count` is `None` when the query lacks a usable `count` argument.
    Beeper { count: Option<u8> },
    /// The power log the web chart plots.
    Log,
    /// A file on the data partition, path relative to its root.
    File { path: String },
    NotFound { method: Method, path: String },
}

impl Route {
    pub fn parse(method: Method, uri: &str) -> Self {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        match (method, path) {
            (Method::Get, "/") => Self::Root,
            (Method::Get, "/watts") => Self::Watts,
            (Method::Get, "/temperature") => Self::Temperature,
            (Method::Get, "/humidity") => Self::Humidity,
            (Method::Post, "/beeper") => Self::Beeper {
                count: query_arg(query, "count").and_then(|v| v.parse().ok()),
            },
            (Method::Get, p) if p.strip_prefix('/') == Some(LOG_FILE_NAME) => Self::Log,
            (Method::Get, p) => match file_path(p) {
                Some(path) => Self::File { path },
                None => Self::NotFound {
                    method,
                    path: p.to_owned(),
                },
            },
            _ => Self::NotFound {
                method,
                path: path.to_owned(),
            },
        }
    }
}

fn query_arg<'q>(query: &'q str, name: &str) -> Option<&'q str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Request path → file path under the partition root.  Directories map to
/// their `index.html`; paths that climb out of the root are refused.
fn file_path(path: &str) -> Option<String> {
    let rel = path.strip_prefix('/')?;
    if rel.starts_with('/') || rel.split('/').any(|seg| seg == "..") {
        return None;
    }
    if rel.is_empty() || rel.ends_with('/') {
        return Some(format!("{rel}index.html"));
    }
    Some(rel.to_owned())
}

/// MIME type by file extension.
pub fn content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map_or("", |(_, ext)| ext);
    match ext {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" => "image/jpeg",
        "ico" => "image/x-icon",
        "xml" => "text/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "text/plain",
    }
}

/// Response handed back to the HTTP adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// `Location` header for redirects.
    pub location: Option<&'static str>,
}

impl ApiResponse {
    pub fn ok(body: String) -> Self {
        Self::file(body.into_bytes(), "text/plain")
    }

    fn file(body: Vec<u8>, content_type: &'static str) -> Self {
        Self {
            status: 200,
            content_type,
            body,
            location: None,
        }
    }

    fn redirect(to: &'static str) -> Self {
        Self {
            status: 302,
            content_type: "text/plain",
            body: Vec::new(),
            location: Some(to),
        }
    }

    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
            location: None,
        }
    }

    fn not_found(method: Method, path: &str) -> Self {
        Self::with_status(404, &format!("File Not Detected\n\nURI: {path}\nMethod: {method:?}\n"))
    }
}

/// Readings the status endpoints report.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusView {
    pub watts: u32,
    pub environment: Option<EnvReading>,
}

#[derive(Serialize)]
struct Watts {
    watts: u32,
}

#[derive(Serialize)]
struct Temperature {
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Humidity {
    humidity: Option<f32>,
}

fn to_body<T: Serialize>(value: &T) -> String {
    // Plain structs of numbers cannot fail to serialise.
    serde_json::to_string(value).unwrap_or_default()
}

/// Answer `route` from the current readings and the data partition.  The
/// beeper route queues a sequence on `alert`.
pub fn handle(
    route: &Route,
    status: &StatusView,
    alert: &mut dyn AlertPort,
    store: &dyn LogStorePort,
    now_ms: u32,
) -> ApiResponse {
    debug!("HTTP: {:?}", route);
    match route {
        Route::Root => ApiResponse::redirect("/index.html"),
        Route::Watts => ApiResponse::ok(to_body(&Watts { watts: status.watts })),
        Route::Temperature => ApiResponse::ok(to_body(&Temperature {
            temperature: status.environment.map(|e| e.temperature_c),
        })),
        Route::Humidity => ApiResponse::ok(to_body(&Humidity {
            humidity: status.environment.map(|e| e.humidity_pct),
        })),
        Route::Beeper { count } => {
            if alert.is_busy() {
                return ApiResponse::ok(json!({ "busy": 1 }).to_string());
            }
            let Some(count) = count else {
                return ApiResponse::ok(json!({ "no count specified": 1 }).to_string());
            };
            match alert.request(*count, now_ms) {
                Ok(()) => ApiResponse::ok(json!({ "success": 1 }).to_string()),
                Err(AlertError::Busy) => ApiResponse::ok(json!({ "busy": 1 }).to_string()),
                Err(AlertError::InvalidCount) => {
                    ApiResponse::ok(json!({ "no count specified": 1 }).to_string())
                }
            }
        }
        Route::Log => match store.read_all() {
            // Re-emit parsed records so a line cut short by a power loss
            // never reaches the chart.
            Ok(text) => ApiResponse::ok(logbook::records(&text).map(|r| r.to_string()).collect()),
            Err(e) => {
                warn!("HTTP: log unreadable ({})", e);
                ApiResponse::not_found(Method::Get, &format!("/{LOG_FILE_NAME}"))
            }
        },
        Route::File { path } => match store.read_file(path) {
            Ok(bytes) => ApiResponse::file(bytes, content_type(path)),
            Err(_) => {
                warn!("HTTP: no file /{}", path);
                ApiResponse::not_found(Method::Get, &format!("/{path}"))
            }
        },
        Route::NotFound { method, path } => {
            warn!("HTTP: no route for {:?} {}", method, path);
            ApiResponse::not_found(*method, path)
        }
    }
}
