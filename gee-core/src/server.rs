//! HTTP/1.1 server: tokio + hyper. Converts each hyper request into a `Request`,
//! hands it to an `Application` and writes the returned `Response` back.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request as HyperRequest, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::{GeeError, Request, Response};

/// Application protocol between the server and whatever answers requests.
/// Any transport converts HTTP into `Request`, calls `call()`, and writes the `Response` back.
#[async_trait]
pub trait Application: Send + Sync {
    async fn call(&self, req: Request) -> Response;
}

/// Accept connections on `listener` until `shutdown` resolves. One task per connection.
/// Request bodies longer than `max_body_bytes` are answered with 413.
pub async fn serve<F>(
    listener: TcpListener,
    app: Arc<dyn Application>,
    max_body_bytes: usize,
    shutdown: F,
) -> Result<(), GeeError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break Ok(());
            }
            accept_result = listener.accept() => {
                let (stream, peer) = match accept_result {
                    Ok(x) => x,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error");
                        continue;
                    }
                };
                tracing::debug!(peer = %peer, "connection accepted");
                let io = TokioIo::new(stream);
                let app = Arc::clone(&app);
                tokio::task::spawn(async move {
                    let service = service_fn(move |req: HyperRequest<hyper::body::Incoming>| {
                        let app = Arc::clone(&app);
                        async move { dispatch(app, req, max_body_bytes).await }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        tracing::warn!(error = %e, "serve_connection error");
                    }
                });
            }
        }
    }
}

/// Bind `config`, then serve until Ctrl-C. Blocks the calling thread on its own runtime.
pub fn run(
    app: Arc<dyn Application>,
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = config.addr();
    let max_body_bytes = config.max_body_bytes;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(address = %listener.local_addr()?, "listening for connections");
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        };
        serve(listener, app, max_body_bytes, shutdown).await?;
        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
    })
}

async fn dispatch(
    app: Arc<dyn Application>,
    req: HyperRequest<hyper::body::Incoming>,
    max_body_bytes: usize,
) -> Result<HyperResponse<Full<Bytes>>, Infallible> {
    let req = match from_hyper_request(req, max_body_bytes).await {
        Ok(r) => r,
        Err(e) => {
            let status = match e {
                GeeError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            tracing::debug!(error = %e, status = %status, "rejected request");
            return Ok(error_to_hyper(status, &e));
        }
    };
    let resp = app.call(req).await;
    Ok(into_hyper_response(resp))
}

async fn from_hyper_request(
    req: HyperRequest<hyper::body::Incoming>,
    max_body_bytes: usize,
) -> Result<Request, GeeError> {
    let method = req.method().as_str().to_string();
    // Route params see the decoded path; the query string stays raw for form decoding.
    let raw_path = req.uri().path();
    let path = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| GeeError::InvalidPath(raw_path.to_string()))?
        .into_owned();
    let query = req.uri().query().unwrap_or("").to_string();
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = Limited::new(req.into_body(), max_body_bytes)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                GeeError::BodyTooLarge {
                    limit: max_body_bytes,
                }
            } else {
                GeeError::Body(e.to_string())
            }
        })?
        .to_bytes()
        .to_vec();
    Ok(Request {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn into_hyper_response(resp: Response) -> HyperResponse<Full<Bytes>> {
    let status = StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut b = HyperResponse::builder().status(status);
    for (k, v) in &resp.headers {
        b = b.header(k.as_str(), v.as_str());
    }
    match b.body(Full::new(Bytes::from(resp.body))) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "invalid response head");
            let mut r = HyperResponse::new(Full::new(Bytes::from_static(b"invalid response")));
            *r.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            r
        }
    }
}

fn error_to_hyper(status: StatusCode, e: &GeeError) -> HyperResponse<Full<Bytes>> {
    let body = serde_json::json!({ "message": e.to_string() });
    let mut r = HyperResponse::new(Full::new(Bytes::from(body.to_string())));
    *r.status_mut() = status;
    r.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    r
}
