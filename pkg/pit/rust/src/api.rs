// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! JSON control API over HTTP/1.1.

use std::future::Future;
use std::sync::Arc;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{debug, error, info};
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::engine::{Engine, StartOutcome, preflight_ok};
use crate::error::{Error, Result};

pub type ApiBody = BoxBody<Bytes, std::io::Error>;

fn json_response(status: StatusCode, value: &impl Serialize) -> Response<ApiBody> {
    let body = serde_json::to_vec(value).unwrap_or_else(|e| {
        error!("Failed to serialize response: {e}");
        b"{\"error\":\"internal server error\"}".to_vec()
    });
    let mut response = Response::new(Full::new(Bytes::from(body)).map_err(|e| match e {}).boxed());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn ok(value: &impl Serialize) -> Response<ApiBody> {
    json_response(StatusCode::OK, value)
}

fn error_response(err: &Error) -> Response<ApiBody> {
    let status = match err {
        Error::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        Error::ProjectExists(_) | Error::DependencyNotReady { .. } => StatusCode::CONFLICT,
        Error::InvalidProject { .. } | Error::BinaryNotFound { .. } | Error::Config { .. } => {
            StatusCode::BAD_REQUEST
        }
        Error::ProcessControl { .. } | Error::Io(_) | Error::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_response(status, &json!({ "error": err.to_string() }))
}

fn bad_request(message: &str) -> Response<ApiBody> {
    json_response(StatusCode::BAD_REQUEST, &json!({ "error": message }))
}

fn reply<T: Serialize>(result: Result<T>) -> Response<ApiBody> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(&e),
    }
}

/// Percent-decoded value of `key` in a query string. Empty values count as
/// missing.
fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Decode a JSON body; an empty body decodes as `T::default()`.
async fn read_json<B, T>(body: B) -> std::result::Result<T, String>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
    T: for<'de> Deserialize<'de> + Default,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| format!("failed to read request body: {e}"))?
        .to_bytes();
    if bytes.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON body: {e}"))
}

#[derive(Debug, Default, Deserialize)]
struct NameBody {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionBody {
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateBody {
    port: Option<u16>,
    php_version: Option<String>,
}

pub async fn handle_request<B>(engine: &Engine, req: Request<B>) -> Response<ApiBody>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let query = query.as_deref();
    debug!("{method} {path}");

    match (&method, path.as_str()) {
        (&Method::GET, "/services") => ok(&engine.service_statuses().await),
        (&Method::POST, "/start") => reply(engine.start_all().await.map(|outcome| {
            json!({ "status": match outcome {
                StartOutcome::Started => "started",
                StartOutcome::AlreadyRunning => "already_running",
            }})
        })),
        (&Method::POST, "/stop") => {
            engine.stop_all().await;
            ok(&json!({ "status": "stopped" }))
        }
        (&Method::POST, "/proxy/reload") => reply(
            engine
                .reload_proxy()
                .await
                .map(|()| json!({ "status": "reloaded" })),
        ),
        (&Method::GET, "/preflight") => {
            let checks = engine.preflight_checks().await;
            ok(&json!({ "ok": preflight_ok(&checks), "checks": checks }))
        }
        (&Method::GET, "/php/current") => {
            ok(&json!({ "version": engine.current_php_version().await }))
        }
        (&Method::GET, "/php/versions") => reply(engine.list_php_versions()),
        (&Method::POST, "/php/use") => {
            let version = match query_param(query, "version") {
                Some(v) => Some(v),
                None => match read_json::<_, VersionBody>(req.into_body()).await {
                    Ok(body) => body.version,
                    Err(e) => return bad_request(&e),
                },
            };
            let Some(version) = version else {
                return bad_request("version required");
            };
            reply(
                engine
                    .set_php_version(&version)
                    .await
                    .map(|()| json!({ "version": version })),
            )
        }
        (&Method::GET, "/projects") => reply(engine.registry().list()),
        (&Method::POST, "/projects/create") => {
            let name = match read_json::<_, NameBody>(req.into_body()).await {
                Ok(body) => body.name.unwrap_or_default(),
                Err(e) => return bad_request(&e),
            };
            if name.is_empty() {
                return bad_request("name required");
            }
            reply(
                engine
                    .registry()
                    .create(&name)
                    .map(|_| json!({ "project": name, "status": "ok" })),
            )
        }
        (_, route) if route.starts_with("/project/") => {
            let Some(name) = query_param(query, "name") else {
                return bad_request("name required");
            };
            handle_project(engine, &method, route, &name, req.into_body()).await
        }
        _ => {
            info!("{method} Request to unknown endpoint: {path}");
            json_response(StatusCode::NOT_FOUND, &json!({ "error": "not found" }))
        }
    }
}

async fn handle_project<B>(
    engine: &Engine,
    method: &Method,
    route: &str,
    name: &str,
    body: B,
) -> Response<ApiBody>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    match (method, route) {
        (&Method::POST, "/project/start") => reply(
            engine
                .start_project(name)
                .await
                .map(|()| json!({ "status": "running" })),
        ),
        (&Method::POST, "/project/stop") => reply(
            engine
                .stop_project(name)
                .await
                .map(|()| json!({ "status": "stopped" })),
        ),
        (&Method::POST, "/project/restart") => reply(
            engine
                .restart_project(name)
                .await
                .map(|()| json!({ "status": "restarted" })),
        ),
        (&Method::POST, "/project/force-stop") => reply(
            engine
                .force_stop_project(name)
                .await
                .map(|()| json!({ "status": "stopped" })),
        ),
        (&Method::GET, "/project/status") => reply(engine.project_status(name).await),
        (&Method::GET, "/project/config") => reply(engine.registry().load_config(name)),
        (&Method::POST, "/project/update") => {
            let update = match read_json::<_, UpdateBody>(body).await {
                Ok(update) => update,
                Err(e) => return bad_request(&e),
            };
            reply(
                engine
                    .update_project(name, update.port, update.php_version.as_deref())
                    .await,
            )
        }
        _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "not found" })),
    }
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("api listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, _) = accept_result?;
                let io = TokioIo::new(stream);
                let engine = engine.clone();

                tokio::task::spawn(async move {
                    if let Err(err) = http1::Builder::new()
                        .serve_connection(
                            io,
                            service_fn(|req| {
                                let engine = engine.clone();
                                async move {
                                    Ok::<_, std::convert::Infallible>(
                                        handle_request(&engine, req).await,
                                    )
                                }
                            }),
                        )
                        .await
                    {
                        error!("Error serving connection: {err}");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("api shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::hosts::NoHosts;
    use crate::layout::Layout;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_engine(base: &std::path::Path) -> Engine {
        Engine::with_hosts(Layout::new(base), Box::new(NoHosts))
    }

    fn request(method: Method, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(resp: Response<ApiBody>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_project_routes() {
        let base = tempfile::tempdir().unwrap();
        let engine = test_engine(base.path());

        let resp = handle_request(&engine, request(Method::GET, "/projects", "")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!([]));

        let resp = handle_request(
            &engine,
            request(Method::POST, "/projects/create", r#"{"name":"acme"}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = handle_request(
            &engine,
            request(Method::POST, "/projects/create", r#"{"name":"acme"}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = handle_request(
            &engine,
            request(Method::GET, "/project/config?name=acme", ""),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let config = body_json(resp).await;
        assert_eq!(config["port"], 10000);
        assert_eq!(config["root"], "public");

        let resp = handle_request(
            &engine,
            request(Method::GET, "/project/status?name=ghost", ""),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let base = tempfile::tempdir().unwrap();
        let engine = test_engine(base.path());

        let resp = handle_request(&engine, request(Method::POST, "/project/start", "")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = handle_request(&engine, request(Method::POST, "/projects/create", "{")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = handle_request(&engine, request(Method::POST, "/php/use", "")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = handle_request(&engine, request(Method::POST, "/php/use?version=74", "")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = handle_request(&engine, request(Method::DELETE, "/services", "")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_php_current_uses_engine_config() {
        let base = tempfile::tempdir().unwrap();
        let engine = test_engine(base.path());

        let resp = handle_request(&engine, request(Method::GET, "/php/current", "")).await;
        assert_eq!(body_json(resp).await, json!({ "version": "83" }));

        let resp = handle_request(&engine, request(Method::GET, "/php/versions", "")).await;
        assert_eq!(body_json(resp).await, json!([]));
    }

    #[tokio::test]
    async fn test_serve_over_tcp() {
        let base = tempfile::tempdir().unwrap();
        let engine = Arc::new(test_engine(base.path()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve(engine, listener, async {
            stop_rx.await.ok();
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /projects HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains("content-type: application/json"));
        assert!(response.ends_with("[]"));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("name=acme&x=1"), "name").as_deref(), Some("acme"));
        assert_eq!(query_param(Some("x=1&name=acme"), "name").as_deref(), Some("acme"));
        assert_eq!(query_param(Some("name=my%2Dshop"), "name").as_deref(), Some("my-shop"));
        assert_eq!(query_param(Some("version=8%2E3+rc"), "version").as_deref(), Some("8.3 rc"));
        assert_eq!(query_param(Some("na%6De=acme"), "name").as_deref(), Some("acme"));
        assert_eq!(query_param(Some("name="), "name"), None);
        assert_eq!(query_param(Some("names=acme"), "name"), None);
        assert_eq!(query_param(None, "name"), None);
    }

    #[test]
    fn test_error_status_mapping() {
        let resp = error_response(&Error::ProjectNotFound("ghost".into()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = error_response(&Error::ProjectExists("acme".into()));
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = error_response(&Error::Io(std::io::Error::other("disk")));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
