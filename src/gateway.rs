// Remote call gateway: serializes a request, hands it to the invocation
// capability under a function name and returns the raw response bytes.
// Nothing here looks at status codes; that is the decoder's job.

use std::sync::OnceLock;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::protocol::RemoteFunction;

/// Failures that happen before a response body is available.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request value could not be encoded.
    #[error("could not encode {function} request: {reason}")]
    Serialization { function: String, reason: String },

    /// The call never completed (network, auth or service fault).
    #[error("error calling {function}: {reason}")]
    Transport { function: String, reason: String },
}

/// Opaque invocation capability: function name plus payload in, payload out.
pub trait Invoke {
    fn invoke(&self, function: &str, payload: &[u8]) -> Result<Vec<u8>, GatewayError>;
}

/// Typed front of an [`Invoke`] implementation.
pub struct Gateway<I> {
    invoker: I,
}

impl<I: Invoke> Gateway<I> {
    pub fn new(invoker: I) -> Self {
        Gateway { invoker }
    }

    /// Access the underlying invoker.
    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Serialize `request` to JSON and invoke `function` with it.
    pub fn call<R: Serialize>(
        &self,
        function: RemoteFunction,
        request: &R,
    ) -> Result<Vec<u8>, GatewayError> {
        let name = function.name();
        let payload = serde_json::to_vec(request).map_err(|e| GatewayError::Serialization {
            function: name.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(function = name, bytes = payload.len(), "invoking remote function");
        let raw = self.invoker.invoke(name, &payload)?;
        tracing::debug!(
            function = name,
            raw = %String::from_utf8_lossy(&raw),
            "raw response"
        );
        Ok(raw)
    }
}

/// Invoker that POSTs payloads to an HTTP endpoint, one URL per function.
///
/// The reqwest client is built on the first call and reused afterwards.
pub struct HttpInvoker {
    endpoint: String,
    region: String,
    client: OnceLock<Client>,
}

impl HttpInvoker {
    /// Create an invoker for the endpoint template in `config`.
    pub fn from_config(config: &Config) -> Self {
        HttpInvoker {
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
            client: OnceLock::new(),
        }
    }

    /// Resolve the URL for `function` from the endpoint template.
    pub fn function_url(&self, function: &str) -> String {
        self.endpoint
            .replace("{region}", &self.region)
            .replace("{function}", function)
    }

    fn client(&self, function: &str) -> Result<&Client, GatewayError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = Client::builder()
            .build()
            .map_err(|e| GatewayError::Transport {
                function: function.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(self.client.get_or_init(|| built))
    }
}

impl Invoke for HttpInvoker {
    fn invoke(&self, function: &str, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let transport = |e: reqwest::Error| GatewayError::Transport {
            function: function.to_string(),
            reason: e.to_string(),
        };

        let url = self.function_url(function);
        let res = self
            .client(function)?
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload.to_vec())
            .send()
            .map_err(transport)?;

        // The envelope carries its own status code; the HTTP one is only logged.
        tracing::debug!(function, http_status = %res.status(), "remote call completed");
        let bytes = res.bytes().map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use rstest::rstest;
    use serde::ser::Error as _;
    use serde::Serializer;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(String, Vec<u8>)>>,
    }

    impl Invoke for Recorder {
        fn invoke(&self, function: &str, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
            self.calls
                .borrow_mut()
                .push((function.to_string(), payload.to_vec()));
            Ok(b"{\"statusCode\":200}".to_vec())
        }
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refuses to encode"))
        }
    }

    #[rstest]
    fn call_passes_json_payload_and_returns_raw_bytes() {
        let gateway = Gateway::new(Recorder::default());
        let raw = gateway
            .call(RemoteFunction::AddPost, &serde_json::json!({"Message": "hi"}))
            .unwrap();

        assert_eq!(raw, b"{\"statusCode\":200}");
        let calls = gateway.invoker().calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "AddPost");
        assert_eq!(calls[0].1, b"{\"Message\":\"hi\"}");
    }

    #[rstest]
    fn serialization_failure_skips_the_call() {
        let gateway = Gateway::new(Recorder::default());
        let err = gateway
            .call(RemoteFunction::GetPosts, &Unencodable)
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Serialization { ref function, .. } if function == "GetPosts"
        ));
        assert!(gateway.invoker().calls.borrow().is_empty());
    }

    #[rstest]
    #[case("http://localhost:3001/{function}", "http://localhost:3001/SignInCognitoUser")]
    #[case(
        "https://api.{region}.example.com/prod/{function}",
        "https://api.eu-west-1.example.com/prod/SignInCognitoUser"
    )]
    #[case("http://static.invalid/", "http://static.invalid/")]
    fn function_url_substitutes_placeholders(#[case] endpoint: &str, #[case] expected: &str) {
        let config = Config {
            endpoint: endpoint.to_string(),
            region: "eu-west-1".to_string(),
            ..Config::default()
        };
        let invoker = HttpInvoker::from_config(&config);
        assert_eq!(invoker.function_url("SignInCognitoUser"), expected);
    }

    /// Answer `count` requests with `status` and `body`, one connection each,
    /// returning the request bodies that were received.
    fn serve(
        status: &'static str,
        body: &'static str,
        count: usize,
    ) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            for _ in 0..count {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut request = vec![0; content_length];
                reader.read_exact(&mut request).unwrap();
                received.push(String::from_utf8(request).unwrap());

                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
                stream.flush().unwrap();
            }
            received
        });
        (format!("http://{addr}/{{function}}"), handle)
    }

    #[rstest]
    fn http_error_status_passes_the_body_through_on_a_reused_client() {
        const BODY: &str =
            r#"{"statusCode":502,"body":{"result":"failure","error":{"message":"bad gateway"}}}"#;
        let (endpoint, server) = serve("502 Bad Gateway", BODY, 2);
        let invoker = HttpInvoker::from_config(&Config {
            endpoint,
            ..Config::default()
        });
        assert!(invoker.client.get().is_none());

        let first = invoker.invoke("GetPosts", b"{\"Limit\":1}").unwrap();
        let client = invoker.client.get().map(|c| c as *const Client);
        let second = invoker.invoke("DeletePost", b"{}").unwrap();

        assert_eq!(first, BODY.as_bytes());
        assert_eq!(second, BODY.as_bytes());
        assert!(client.is_some());
        assert_eq!(invoker.client.get().map(|c| c as *const Client), client);
        assert_eq!(server.join().unwrap(), vec!["{\"Limit\":1}", "{}"]);
    }
}
