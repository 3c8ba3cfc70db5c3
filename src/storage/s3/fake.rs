//! In-process S3 endpoint for driving `S3Storage` without a real bucket.
//!
//! Speaks just enough path-style PutObject, GetObject, HeadObject,
//! DeleteObject and ListObjectsV2. Keys are not percent-decoded, so tests
//! stick to URL-safe ids.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::TcpListener;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

use super::S3Storage;
use crate::config;

pub const BUCKET: &str = "pastebox-test";

const META_PREFIX: &str = "x-amz-meta-";

struct Object {
    body: Vec<u8>,
    metadata: HashMap<String, String>,
}

struct Bucket {
    objects: BTreeMap<String, Object>,
    forbidden: HashSet<String>,
    failing_heads: HashSet<String>,
    page_size: usize,
}

type Shared = Arc<Mutex<Bucket>>;

pub struct FakeS3 {
    bucket: Shared,
    endpoint: String,
}

impl FakeS3 {
    /// Serve a fresh, empty bucket on an ephemeral port.
    pub fn start() -> Self {
        let bucket = Arc::new(Mutex::new(Bucket {
            objects: BTreeMap::new(),
            forbidden: HashSet::new(),
            failing_heads: HashSet::new(),
            page_size: 1000,
        }));

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let router = Router::new().fallback(handle).with_state(bucket.clone());
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service());
        tokio::spawn(async move { server.await.unwrap() });

        FakeS3 { bucket, endpoint }
    }

    pub fn config(&self) -> config::S3Storage {
        config::S3Storage {
            bucket: Some(BUCKET.into()),
            region: Some("us-east-1".into()),
            endpoint: Some(self.endpoint.clone()),
            access_key_id: Some("test".into()),
            secret_access_key: Some("test".into()),
            force_path_style: true,
        }
    }

    pub async fn storage(&self) -> S3Storage {
        S3Storage::new(&self.config()).await.unwrap()
    }

    /// Store an object directly, bypassing `S3Storage`.
    pub fn put_raw(&self, key: &str, body: &[u8], metadata: HashMap<String, String>) {
        self.lock().objects.insert(
            key.to_owned(),
            Object {
                body: body.to_vec(),
                metadata,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// Answer 403 for every request on `key`.
    pub fn forbid(&self, key: &str) {
        self.lock().forbidden.insert(key.to_owned());
    }

    /// Answer 500 to HeadObject on `key`.
    pub fn fail_heads(&self, key: &str) {
        self.lock().failing_heads.insert(key.to_owned());
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size;
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap()
    }
}

async fn handle(
    State(bucket): State<Shared>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches('/');
    let (name, key) = path.split_once('/').unwrap_or((path, ""));
    if name != BUCKET {
        return error(StatusCode::NOT_FOUND, "NoSuchBucket");
    }

    let mut bucket = bucket.lock().unwrap();
    if key.is_empty() {
        return match method {
            Method::GET => bucket.list(&params),
            _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        };
    }
    if bucket.forbidden.contains(key) {
        return error(StatusCode::FORBIDDEN, "AccessDenied");
    }

    match method {
        Method::PUT => {
            let object = Object {
                body: decode_body(&headers, &body),
                metadata: user_metadata(&headers),
            };
            bucket.objects.insert(key.to_owned(), object);
            (StatusCode::OK, [(header::ETAG, "\"fake\"")]).into_response()
        }
        Method::HEAD if bucket.failing_heads.contains(key) => {
            error(StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
        }
        Method::GET | Method::HEAD => match bucket.objects.get(key) {
            Some(object) => object.response(method == Method::HEAD),
            None => error(StatusCode::NOT_FOUND, "NoSuchKey"),
        },
        Method::DELETE => {
            bucket.objects.remove(key);
            StatusCode::NO_CONTENT.into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

impl Bucket {
    /// One ListObjectsV2 page. The continuation token is the last key of the
    /// previous page.
    fn list(&self, params: &HashMap<String, String>) -> Response {
        let prefix = params.get("prefix").map(String::as_str).unwrap_or("");
        let after = params.get("continuation-token");

        let mut keys = self
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| after.map_or(true, |after| key.as_str() > after.as_str()));
        let page: Vec<_> = keys.by_ref().take(self.page_size).collect();
        let truncated = keys.next().is_some();

        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <Name>{BUCKET}</Name><Prefix>{prefix}</Prefix>\
             <KeyCount>{count}</KeyCount><MaxKeys>{max}</MaxKeys>\
             <IsTruncated>{truncated}</IsTruncated>",
            count = page.len(),
            max = self.page_size,
        );
        if let (true, Some((last, _))) = (truncated, page.last()) {
            xml.push_str(&format!("<NextContinuationToken>{last}</NextContinuationToken>"));
        }
        for (key, object) in &page {
            xml.push_str(&format!(
                "<Contents><Key>{key}</Key><Size>{size}</Size>\
                 <StorageClass>STANDARD</StorageClass></Contents>",
                size = object.body.len()
            ));
        }
        xml.push_str("</ListBucketResult>");

        (StatusCode::OK, [(header::CONTENT_TYPE, "application/xml")], xml).into_response()
    }
}

impl Object {
    fn response(&self, head: bool) -> Response {
        let body = if head { Vec::new() } else { self.body.clone() };
        let mut response =
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], body).into_response();
        for (name, value) in &self.metadata {
            let name = HeaderName::from_bytes(format!("{META_PREFIX}{name}").as_bytes()).unwrap();
            response
                .headers_mut()
                .insert(name, HeaderValue::from_str(value).unwrap());
        }
        response
    }
}

fn user_metadata(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().strip_prefix(META_PREFIX)?;
            Some((name.to_owned(), value.to_str().ok()?.to_owned()))
        })
        .collect()
}

/// Undo `aws-chunked` content encoding, which the SDK uses to send trailing
/// checksums.
fn decode_body(headers: &HeaderMap, body: &[u8]) -> Vec<u8> {
    let chunked = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("aws-chunked"));
    if !chunked {
        return body.to_vec();
    }

    let mut rest = body;
    let mut decoded = Vec::new();
    while let Some(line_end) = rest.windows(2).position(|window| window == b"\r\n") {
        let size_line = std::str::from_utf8(&rest[..line_end]).unwrap();
        let size = size_line.split(';').next().unwrap().trim();
        let size = usize::from_str_radix(size, 16).unwrap();
        rest = &rest[line_end + 2..];
        if size == 0 {
            break;
        }
        decoded.extend_from_slice(&rest[..size]);
        rest = &rest[size + 2..];
    }
    decoded
}

fn error(status: StatusCode, code: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Error><Code>{code}</Code><Message>{code}</Message>\
         <RequestId>fake</RequestId></Error>"
    );
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}
