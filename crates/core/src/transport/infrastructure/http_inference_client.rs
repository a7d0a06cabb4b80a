use std::time::Duration;

use reqwest::blocking::Client;

use crate::classification::domain::classification_client::{ClassificationClient, LabelCatalog};
use crate::classification::domain::classification_result::ClassificationResult;
use crate::detection::domain::detection_box::DetectionBox;
use crate::detection::domain::detection_client::DetectionClient;
use crate::sampling::encoded_image::EncodedImage;
use crate::transport::transport_error::TransportError;
use crate::transport::wire::{
    parse_classes_response, parse_classify_response, parse_detect_response, ImagePayload,
};

/// Blocking JSON client for the inference backend's `/classes`, `/detect`
/// and `/classify` endpoints.
pub struct HttpInferenceClient {
    base_url: String,
    client: Client,
}

impl HttpInferenceClient {
    /// `timeout = None` waits on the backend indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: base_url.clone(),
                source: e,
            })?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> Result<(String, String), TransportError> {
        let url = self.endpoint(path);
        let response = self.client.get(&url).send();
        let body = read_body(&url, response)?;
        Ok((url, body))
    }

    fn post_image(
        &self,
        path: &str,
        image: &EncodedImage,
    ) -> Result<(String, String), TransportError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .json(&ImagePayload {
                image: image.as_base64(),
            })
            .send();
        let body = read_body(&url, response)?;
        Ok((url, body))
    }
}

fn read_body(
    url: &str,
    response: reqwest::Result<reqwest::blocking::Response>,
) -> Result<String, TransportError> {
    let request_error = |e| TransportError::Request {
        url: url.to_string(),
        source: e,
    };
    let response = response.map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().map_err(request_error)
}

impl DetectionClient for HttpInferenceClient {
    fn detect(&self, image: &EncodedImage) -> Result<Vec<DetectionBox>, TransportError> {
        let (url, body) = self.post_image("detect", image)?;
        let boxes = parse_detect_response(&url, &body)?;
        log::debug!("Detected {} boxes", boxes.len());
        Ok(boxes)
    }
}

impl ClassificationClient for HttpInferenceClient {
    fn classify(&self, image: &EncodedImage) -> Result<ClassificationResult, TransportError> {
        let (url, body) = self.post_image("classify", image)?;
        parse_classify_response(&url, &body)
    }
}

impl LabelCatalog for HttpInferenceClient {
    fn classes(&self) -> Result<Vec<String>, TransportError> {
        let (url, body) = self.get("classes")?;
        parse_classes_response(&url, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    use tiny_http::{Header, Response, Server};

    struct RecordedRequest {
        method: String,
        url: String,
        body: String,
    }

    /// Serves one canned JSON response and hands back the request it got.
    fn one_shot_server(status: u16, body: &str) -> (String, thread::JoinHandle<RecordedRequest>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let body = body.to_string();
        let handle = thread::spawn(move || {
            let mut request = server
                .recv_timeout(Duration::from_secs(10))
                .unwrap()
                .expect("no request within 10s");
            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).unwrap();
            let recorded = RecordedRequest {
                method: request.method().to_string(),
                url: request.url().to_string(),
                body: received,
            };
            let content_type: Header = "Content-Type: application/json".parse().unwrap();
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(content_type);
            request.respond(response).unwrap();
            recorded
        });
        (format!("http://127.0.0.1:{port}"), handle)
    }

    fn image() -> EncodedImage {
        EncodedImage::from_data_url("data:image/png;base64,QUJD").unwrap()
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = HttpInferenceClient::new("http://host:8000/", None).unwrap();
        assert_eq!(client.base_url(), "http://host:8000");
        assert_eq!(client.endpoint("/detect"), "http://host:8000/detect");
        assert_eq!(client.endpoint("classes"), "http://host:8000/classes");
    }

    #[test]
    fn test_detect_posts_image_and_parses_boxes() {
        let (base, server) =
            one_shot_server(200, r#"{"boxes": [{"x":10,"y":10,"w":50,"h":50,"valid":true}]}"#);
        let client = HttpInferenceClient::new(&base, Some(Duration::from_secs(10))).unwrap();

        let boxes = client.detect(&image()).unwrap();

        assert_eq!(boxes, vec![DetectionBox::new(10.0, 10.0, 50.0, 50.0).with_valid(true)]);
        let request = server.join().unwrap();
        assert_eq!((request.method.as_str(), request.url.as_str()), ("POST", "/detect"));
        assert_eq!(request.body, r#"{"image":"QUJD"}"#);
    }

    #[test]
    fn test_classes_uses_get() {
        let (base, server) = one_shot_server(200, r#"{"classes": ["3001"]}"#);
        let client = HttpInferenceClient::new(&base, Some(Duration::from_secs(10))).unwrap();

        assert_eq!(client.classes().unwrap(), vec!["3001"]);
        let request = server.join().unwrap();
        assert_eq!((request.method.as_str(), request.url.as_str()), ("GET", "/classes"));
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_non_success_status_is_status_error() {
        let (base, server) = one_shot_server(500, "{}");
        let client = HttpInferenceClient::new(&base, Some(Duration::from_secs(10))).unwrap();

        let err = client.classify(&image()).unwrap_err();

        assert!(matches!(err, TransportError::Status { status: 500, .. }));
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_backend_is_request_error() {
        // Bind then drop to get a port nothing listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client =
            HttpInferenceClient::new(&format!("http://127.0.0.1:{port}"), Some(Duration::from_secs(5)))
                .unwrap();
        assert!(matches!(
            client.detect(&image()),
            Err(TransportError::Request { .. })
        ));
    }
}
