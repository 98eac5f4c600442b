use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use skyhold_order::RenderedDocument;

/// Serve a rendered document as a download.
pub fn attachment(doc: RenderedDocument) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", doc.filename);
    let mut response = doc.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(doc.content_type));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
