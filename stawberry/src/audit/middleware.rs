//! 監査ログミドルウェア
//!
//! 更新系リクエスト（GET/HEAD以外）のメタデータとボディを記録する。
//! リクエストボディは読み取って下流ハンドラーへ差し戻す。レスポンスボディは
//! 転送しながらコピーし（ティー）、ストリーム終了時にエントリを送信する。
//! ボディの読み取りエラーはそのまま下流・クライアントへ伝える。

use crate::audit::body::{parse_body, MAX_BODY_SIZE};
use crate::audit::types::{AuditEntry, AuthContext, JsonMap};
use crate::audit::writer::AuditLogWriter;
use crate::common::ip::resolve_client_ip;
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use futures::StreamExt;
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::{
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};
use tracing::{debug, trace};

/// 監査対象のメソッドか判定する（読み取り系は対象外）
pub fn should_audit(method: &Method) -> bool {
    method != Method::GET && method != Method::HEAD
}

fn concat_chunks(chunks: &[Bytes]) -> Bytes {
    if let [single] = chunks {
        return single.clone();
    }
    let mut buf = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
    for chunk in chunks {
        buf.extend_from_slice(chunk);
    }
    Bytes::from(buf)
}

/// リクエストボディを読み取り、記録用のバイト列と差し戻し用のボディを返す
///
/// 読み取りエラー時は、読み取り済みのチャンクに続けて同じエラーを返すボディを
/// 差し戻す（下流ハンドラーは監査ログがない場合と同じエラーを受け取る）。
async fn read_request_body(body: Body) -> (Bytes, Body) {
    let mut stream = body.into_data_stream();
    let mut chunks = Vec::new();
    while let Some(next) = stream.next().await {
        match next {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                debug!(error = %e, "Failed to read request body for audit log");
                let captured = concat_chunks(&chunks);
                let mut frames: Vec<Result<Bytes, axum::Error>> =
                    chunks.into_iter().map(Ok).collect();
                frames.push(Err(e));
                return (captured, Body::from_stream(futures::stream::iter(frames)));
            }
        }
    }
    let bytes = concat_chunks(&chunks);
    (bytes.clone(), Body::from(bytes))
}

/// レスポンスボディ以外が確定したエントリ
struct PendingEntry {
    entry: AuditEntry,
    writer: AuditLogWriter,
}

/// レスポンスボディを転送しつつ記録用にコピーするボディ
///
/// フレームとエラーは変更せずに転送する。ストリームの終了・エラー・破棄の
/// いずれか最初の時点でエントリを一度だけ送信する。
struct AuditTeeBody {
    inner: Body,
    captured: Vec<u8>,
    pending: Option<PendingEntry>,
}

impl AuditTeeBody {
    fn new(inner: Body, entry: AuditEntry, writer: AuditLogWriter) -> Self {
        Self {
            inner,
            captured: Vec::new(),
            pending: Some(PendingEntry { entry, writer }),
        }
    }

    fn capture(&mut self, data: &Bytes) {
        // 上限 + 1バイトあれば切り詰めの判定には足りる
        let room = (MAX_BODY_SIZE + 1).saturating_sub(self.captured.len());
        let take = room.min(data.len());
        self.captured.extend_from_slice(&data[..take]);
    }

    fn finish(&mut self) {
        if let Some(PendingEntry { mut entry, writer }) = self.pending.take() {
            entry.resp_body = parse_body(&self.captured, "response");
            writer.send(entry);
        }
    }
}

impl HttpBody for AuditTeeBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    self.capture(data);
                }
            }
            Poll::Ready(Some(Err(e))) => {
                debug!(error = %e, "Response body failed, logging captured prefix");
                self.finish();
            }
            Poll::Ready(None) => self.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }
}

impl Drop for AuditTeeBody {
    fn drop(&mut self) {
        // クライアント切断・未読のまま破棄された場合
        self.finish();
    }
}

/// 監査ログミドルウェア
///
/// レスポンスボディの転送完了時にエントリを組み立て、`AuditLogWriter` へ
/// ノンブロッキングで送る。監査ログの失敗がリクエスト処理に影響することはない。
pub async fn audit_middleware(
    State(writer): State<AuditLogWriter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !should_audit(request.method()) {
        return next.run(request).await;
    }

    let received_at = Utc::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client_ip = resolve_client_ip(request.headers(), peer);
    let request_auth = request.extensions().get::<AuthContext>().copied();

    let (parts, body) = request.into_parts();
    let (req_bytes, body) = read_request_body(body).await;
    let request = Request::from_parts(parts, body);

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let status_code = parts.status.as_u16();

    // レスポンス側（ハンドラーが設定）を優先し、なければリクエスト側
    let auth = parts
        .extensions
        .get::<AuthContext>()
        .copied()
        .or(request_auth)
        .unwrap_or_default();

    trace!(
        method = %method,
        path = %path,
        status = status_code,
        user_id = auth.user_id,
        role = %auth.role(),
        "audit log entry captured"
    );

    let entry = AuditEntry {
        method,
        url: path,
        resp_status: status_code,
        user_id: auth.user_id,
        ip: client_ip,
        user_role: auth.role(),
        received_at,
        req_body: parse_body(&req_bytes, "request"),
        resp_body: JsonMap::new(),
    };

    Response::from_parts(parts, Body::new(AuditTeeBody::new(body, entry, writer)))
}
