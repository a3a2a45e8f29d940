//! Loading handles backed by an HTTP GET

use loadable_common::ConditionalSync;
use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::{LoadOptions, Loadable, ResourceError};

/// The only content type whose body is parsed as JSON. The comparison is
/// exact: `application/json; charset=utf-8` is treated as text.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Configuration for a [ResourceLoader]
#[derive(Clone, Debug, Default)]
pub struct ResourceConfig {
    /// Optional timeout for requests in seconds (default: none). Only
    /// honored on native targets.
    pub timeout_seconds: Option<u64>,

    /// Optional custom headers to send with each request
    pub headers: Vec<(String, String)>,
}

impl ResourceConfig {
    /// Create a configuration with no timeout and no extra headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Creates loading handles for HTTP resources.
///
/// Each handle issues a single GET. The response is interpreted as follows:
///
/// - a request that cannot be completed fails with
///   [ResourceError::Transport]
/// - a status outside of `2xx` fails with [ResourceError::Unsuccessful]
/// - a body declared as exactly [JSON_CONTENT_TYPE] is parsed as JSON
/// - any other body is handed to `T` verbatim as a string, even when it
///   looks like JSON
///
/// ```no_run
/// use loadable::{ResourceConfig, ResourceLoader};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let loader = ResourceLoader::new(
///     ResourceConfig::new().with_header("Accept", "application/json"),
/// );
///
/// let profile = loader.load::<serde_json::Value>("https://example.com/profile");
///
/// profile.settled().await;
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ResourceLoader {
    config: ResourceConfig,
    client: Client,
}

impl Default for ResourceLoader {
    fn default() -> Self {
        Self::new(ResourceConfig::default())
    }
}

impl ResourceLoader {
    /// Create a loader with the given configuration.
    ///
    /// If the HTTP client cannot be built with that configuration, the
    /// loader falls back to a client with default settings and [config]
    /// reports what that client actually does (no timeout). Use
    /// [ResourceLoader::try_new] to treat that as an error instead.
    ///
    /// [config]: ResourceLoader::config
    pub fn new(config: ResourceConfig) -> Self {
        let built = Self::build_client(&config);
        Self::from_built_client(config, built)
    }

    /// Create a loader with the given configuration, failing if the HTTP
    /// client cannot be built with it
    pub fn try_new(config: ResourceConfig) -> Result<Self, ResourceError> {
        let client = Self::build_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_client(config: &ResourceConfig) -> Result<Client, reqwest::Error> {
        let client_builder = Client::builder();

        #[cfg(not(target_arch = "wasm32"))]
        let client_builder = match config.timeout_seconds {
            Some(timeout) => client_builder.timeout(std::time::Duration::from_secs(timeout)),
            None => client_builder,
        };

        client_builder.build()
    }

    fn from_built_client(config: ResourceConfig, built: Result<Client, reqwest::Error>) -> Self {
        match built {
            Ok(client) => Self { config, client },
            Err(error) => {
                tracing::warn!(%error, "Falling back to a default HTTP client without a timeout");
                Self {
                    config: ResourceConfig {
                        timeout_seconds: None,
                        ..config
                    },
                    client: Client::new(),
                }
            }
        }
    }

    /// The configuration of the client in use. Differs from the one passed
    /// to [ResourceLoader::new] only when that one could not be applied.
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Load `url` into a handle that holds `T::default()` until the
    /// response arrives
    ///
    /// # Panics
    ///
    /// On native targets this must be called from within a Tokio runtime.
    pub fn load<T>(&self, url: impl Into<String>) -> Loadable<T>
    where
        T: DeserializeOwned + Default + ConditionalSync + 'static,
    {
        self.load_with(url, LoadOptions::default())
    }

    /// Load `url` using the given initial value and error formatter
    ///
    /// # Panics
    ///
    /// On native targets this must be called from within a Tokio runtime.
    pub fn load_with<T>(
        &self,
        url: impl Into<String>,
        options: LoadOptions<T, ResourceError>,
    ) -> Loadable<T>
    where
        T: DeserializeOwned + ConditionalSync + 'static,
    {
        let url = url.into();
        tracing::debug!(%url, "Loading resource");

        Loadable::from_future_with(retrieve(self.build_request(&url), url), options)
    }

    fn build_request(&self, url: &str) -> RequestBuilder {
        let mut builder = self.client.get(url);

        for (key, value) in &self.config.headers {
            builder = builder.header(key, value);
        }

        builder
    }
}

async fn retrieve<T>(request: RequestBuilder, url: String) -> Result<T, ResourceError>
where
    T: DeserializeOwned,
{
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        tracing::debug!(%url, status = status.as_u16(), "Resource responded unsuccessfully");
        return Err(ResourceError::unsuccessful(status));
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .is_some_and(|content_type| content_type.as_bytes() == JSON_CONTENT_TYPE.as_bytes());
    let body = response.text().await?;

    if is_json {
        Ok(serde_json::from_str(&body)?)
    } else {
        Ok(serde_json::from_value(serde_json::Value::String(body))?)
    }
}

impl<T> Loadable<T>
where
    T: DeserializeOwned + ConditionalSync + 'static,
{
    /// Load `url` with a default [ResourceLoader] into a handle that holds
    /// `T::default()` until the response arrives
    ///
    /// # Panics
    ///
    /// On native targets this must be called from within a Tokio runtime.
    pub fn from_url(url: impl Into<String>) -> Self
    where
        T: Default,
    {
        ResourceLoader::default().load(url)
    }

    /// Load `url` with a default [ResourceLoader] using the given initial
    /// value and error formatter
    ///
    /// # Panics
    ///
    /// On native targets this must be called from within a Tokio runtime.
    pub fn from_url_with(url: impl Into<String>, options: LoadOptions<T, ResourceError>) -> Self {
        ResourceLoader::default().load_with(url, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_builds_a_config() {
        let config = ResourceConfig::new()
            .with_timeout(60)
            .with_header("X-Custom", "value");

        assert_eq!(config.timeout_seconds, Some(60));
        assert_eq!(config.headers, vec![("X-Custom".to_string(), "value".to_string())]);
    }

    #[test]
    fn it_sets_no_timeout_by_default() {
        let loader = ResourceLoader::default();

        assert_eq!(loader.config().timeout_seconds, None);
        assert!(loader.config().headers.is_empty());
    }

    #[test]
    fn it_builds_a_client_with_a_timeout() {
        let loader = ResourceLoader::try_new(ResourceConfig::new().with_timeout(5)).unwrap();

        assert_eq!(loader.config().timeout_seconds, Some(5));
    }

    #[test]
    fn it_reports_the_configuration_of_a_fallback_client() {
        let config = ResourceConfig::new()
            .with_timeout(5)
            .with_header("X-Custom", "value");
        let failure = Client::new()
            .get("not a url")
            .build()
            .expect_err("a relative url cannot be requested");

        let loader = ResourceLoader::from_built_client(config, Err(failure));

        assert_eq!(loader.config().timeout_seconds, None);
        assert_eq!(
            loader.config().headers,
            vec![("X-Custom".to_string(), "value".to_string())]
        );
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod integration {
        use super::*;
        use crate::{ErrorFormatter, Phase};
        use anyhow::Result;
        use axum::{
            Router,
            body::Body,
            http::{HeaderMap, StatusCode, header},
            response::{IntoResponse, Response},
            routing::get,
        };
        use pretty_assertions::assert_eq;
        use serde::Deserialize;
        use serde_json::{Value, json};
        use tokio::net::TcpListener;

        #[derive(Debug, Default, Clone, PartialEq, Deserialize)]
        struct Profile {
            #[serde(rename = "myData")]
            my_data: String,
        }

        async fn plain_text() -> impl IntoResponse {
            ([(header::CONTENT_TYPE, "text/plain")], "success")
        }

        async fn unauthorized() -> impl IntoResponse {
            StatusCode::UNAUTHORIZED
        }

        async fn json_body() -> impl IntoResponse {
            (
                [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
                r#"{"myData":"is amazing"}"#,
            )
        }

        async fn json_shaped_text() -> impl IntoResponse {
            ([(header::CONTENT_TYPE, "text/plain")], r#"{"myData":"is amazing"}"#)
        }

        async fn json_with_charset() -> impl IntoResponse {
            (
                [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
                r#"{"myData":"is amazing"}"#,
            )
        }

        async fn untyped() -> Response {
            Response::new(Body::from("success"))
        }

        async fn broken_json() -> impl IntoResponse {
            ([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], "{not json")
        }

        async fn echo_header(headers: HeaderMap) -> impl IntoResponse {
            let value = headers
                .get("x-loadable")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();

            ([(header::CONTENT_TYPE, "text/plain")], value)
        }

        /// Create and start test server, return the URL
        async fn start_test_server() -> String {
            let app = Router::new()
                .route("/text", get(plain_text))
                .route("/unauthorized", get(unauthorized))
                .route("/json", get(json_body))
                .route("/json-shaped-text", get(json_shaped_text))
                .route("/json-with-charset", get(json_with_charset))
                .route("/untyped", get(untyped))
                .route("/broken-json", get(broken_json))
                .route("/echo-header", get(echo_header));

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            format!("http://{}", addr)
        }

        #[tokio::test]
        async fn it_loads_a_text_body_as_a_string() -> Result<()> {
            let url = start_test_server().await;

            let loadable = Loadable::<Option<String>>::from_url(format!("{url}/text"));

            assert!(loadable.states().has_only(Phase::Loading));
            assert_eq!(loadable.data(), None);

            assert_eq!(loadable.settled().await, Phase::Ready);
            assert!(loadable.states().has_only(Phase::Ready));
            assert_eq!(loadable.data(), Some(String::from("success")));
            assert_eq!(loadable.error_message(), "");

            Ok(())
        }

        #[tokio::test]
        async fn it_reports_an_unsuccessful_status() -> Result<()> {
            let url = start_test_server().await;

            let loadable = Loadable::<Option<String>>::from_url(format!("{url}/unauthorized"));

            assert!(loadable.states().has_only(Phase::Loading));

            assert_eq!(loadable.settled().await, Phase::Error);
            assert!(loadable.states().has_only(Phase::Error));
            assert_eq!(
                loadable.error_message(),
                r#"Failed to load data. {"code":401,"text":"Unauthorized"}"#
            );
            assert_eq!(loadable.data(), None);

            Ok(())
        }

        #[tokio::test]
        async fn it_parses_a_json_body() -> Result<()> {
            let url = start_test_server().await;

            let loadable = Loadable::<Value>::from_url(format!("{url}/json"));

            assert_eq!(loadable.data(), Value::Null);
            assert_eq!(loadable.settled().await, Phase::Ready);
            assert_eq!(loadable.data(), json!({ "myData": "is amazing" }));

            Ok(())
        }

        #[tokio::test]
        async fn it_parses_a_json_body_into_a_typed_value() -> Result<()> {
            let url = start_test_server().await;

            let loadable = ResourceLoader::default().load::<Profile>(format!("{url}/json"));

            loadable.settled().await;

            assert_eq!(
                loadable.data(),
                Profile {
                    my_data: String::from("is amazing")
                }
            );

            Ok(())
        }

        #[tokio::test]
        async fn it_does_not_parse_json_shaped_text() -> Result<()> {
            let url = start_test_server().await;

            let shaped = Loadable::<Value>::from_url(format!("{url}/json-shaped-text"));
            let charset = Loadable::<Value>::from_url(format!("{url}/json-with-charset"));
            let untyped = Loadable::<String>::from_url(format!("{url}/untyped"));

            assert_eq!(shaped.settled().await, Phase::Ready);
            assert_eq!(charset.settled().await, Phase::Ready);
            assert_eq!(untyped.settled().await, Phase::Ready);

            assert_eq!(
                shaped.data(),
                Value::String(String::from(r#"{"myData":"is amazing"}"#))
            );
            assert_eq!(
                charset.data(),
                Value::String(String::from(r#"{"myData":"is amazing"}"#))
            );
            assert_eq!(untyped.data(), "success");

            Ok(())
        }

        #[tokio::test]
        async fn it_reports_a_body_that_does_not_decode() -> Result<()> {
            let url = start_test_server().await;

            let malformed = Loadable::<Value>::from_url(format!("{url}/broken-json"));
            let mistyped = Loadable::<Profile>::from_url(format!("{url}/text"));

            assert_eq!(malformed.settled().await, Phase::Error);
            assert_eq!(mistyped.settled().await, Phase::Error);

            assert!(malformed.error_message().starts_with("Failed to load data. "));
            assert!(mistyped.error_message().starts_with("Failed to load data. "));
            assert_eq!(malformed.data(), Value::Null);
            assert_eq!(mistyped.data(), Profile::default());

            Ok(())
        }

        #[tokio::test]
        async fn it_reports_a_transport_failure() -> Result<()> {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            let addr = listener.local_addr()?;
            drop(listener);

            let loadable = Loadable::<String>::from_url_with(
                format!("http://{addr}/text"),
                LoadOptions::new(
                    String::from("offline"),
                    ErrorFormatter::new(|error: ResourceError| match error {
                        ResourceError::Transport(_) => String::from("transport"),
                        other => other.to_string(),
                    }),
                ),
            );

            assert_eq!(loadable.settled().await, Phase::Error);
            assert_eq!(loadable.error_message(), "transport");
            assert_eq!(loadable.data(), "offline");

            Ok(())
        }

        #[tokio::test]
        async fn it_formats_retrieval_failures_with_a_custom_formatter() -> Result<()> {
            let url = start_test_server().await;

            let options = LoadOptions::starting_with(String::from("My initial data"))
                .with_error_formatter(|error: ResourceError| match error {
                    ResourceError::Unsuccessful { code, text } => {
                        format!("Custom error: {code} {text}")
                    }
                    other => other.to_string(),
                });
            let loadable = Loadable::from_url_with(format!("{url}/unauthorized"), options);

            assert_eq!(loadable.data(), "My initial data");
            assert_eq!(loadable.settled().await, Phase::Error);
            assert_eq!(loadable.error_message(), "Custom error: 401 Unauthorized");
            assert_eq!(loadable.data(), "My initial data");

            Ok(())
        }

        #[tokio::test]
        async fn it_sends_configured_headers() -> Result<()> {
            let url = start_test_server().await;

            let loader = ResourceLoader::new(ResourceConfig::new().with_header("X-Loadable", "yes"));
            let loadable = loader.load::<String>(format!("{url}/echo-header"));

            assert_eq!(loadable.settled().await, Phase::Ready);
            assert_eq!(loadable.data(), "yes");

            Ok(())
        }
    }
}
