//! End-to-end tests of the default stack against a local mock server.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use transport::{
    DefaultHttpClient, Error, FormPart, HttpClientOptions, HttpMethod, HttpRequest, HttpTransport,
    Url,
};
use wiremock::matchers::{body_string, body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn url(server: &MockServer, p: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(p).unwrap()
}

#[tokio::test]
async fn async_request_round_trips_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/users"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"email":"a@b.c"}"#))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-request-id", "abc")
                .set_body_string(r#"{"user_id":"auth0|1"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = DefaultHttpClient::new().unwrap();
    let request = HttpRequest::new(HttpMethod::Post, url(&server, "api/v2/users"))
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"email":"a@b.c"}"#);

    let response = client.execute_async(&request).await.unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.header("X-Request-Id"), Some("abc"));
    assert_eq!(response.body(), r#"{"user_id":"auth0|1"}"#);
}

#[tokio::test]
async fn async_retries_429_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-ratelimit-limit", "10")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", epoch_secs().to_string().as_str()),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let client = DefaultHttpClient::new().unwrap();
    let request = HttpRequest::new(HttpMethod::Get, url(&server, "api/v2/roles"));
    let response = client.execute_async(&request).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn async_exhaustion_calls_server_max_retries_plus_one_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/roles"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let options = HttpClientOptions::builder().max_retries(2).build().unwrap();
    let client = DefaultHttpClient::with_options(options).unwrap();
    let request = HttpRequest::new(HttpMethod::Get, url(&server, "api/v2/roles"));

    let err = client.execute_async(&request).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { attempts: 3, .. }), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_execute_blocks_until_reset() {
    let server = MockServer::start().await;
    let reset = epoch_secs() + 3;
    Mock::given(method("GET"))
        .and(path("/api/v2/users"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("x-ratelimit-reset", reset.to_string().as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let client = Arc::new(DefaultHttpClient::new().unwrap());
    let request = HttpRequest::new(HttpMethod::Get, url(&server, "api/v2/users"));

    // the blocking client must live and die off the async worker threads
    let (status, elapsed) = tokio::task::spawn_blocking(move || {
        let started = std::time::Instant::now();
        let response = client.execute(&request).unwrap();
        let result = (response.status(), started.elapsed());
        drop(client);
        result
    })
    .await
    .unwrap();

    assert_eq!(status, 200);
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn connection_failure_is_an_io_error() {
    let client = DefaultHttpClient::new().unwrap();
    // port 9 (discard) is closed on test hosts
    let request = HttpRequest::new(
        HttpMethod::Get,
        Url::parse("http://127.0.0.1:9/api/v2/users").unwrap(),
    );
    let err = client.execute_async(&request).await.unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_read_timeout_bounds_the_whole_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let options = HttpClientOptions::builder().read_timeout(1).build().unwrap();
    let client = Arc::new(DefaultHttpClient::with_options(options).unwrap());
    let request = HttpRequest::new(HttpMethod::Get, url(&server, "api/v2/users"));

    let (result, elapsed) = tokio::task::spawn_blocking(move || {
        let started = std::time::Instant::now();
        let result = client.execute(&request);
        let elapsed = started.elapsed();
        drop(client);
        (result, elapsed)
    })
    .await
    .unwrap();

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "got {err:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn multipart_body_is_sent_as_form_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/jobs/users-imports"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"connection_id\""))
        .and(body_string_contains("name=\"users\"; filename=\"users.json\""))
        .and(body_string_contains("Content-Type: text/json"))
        .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"job_1"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = DefaultHttpClient::new().unwrap();
    let request = HttpRequest::new(HttpMethod::Post, url(&server, "api/v2/jobs/users-imports"))
        .with_header("Content-Type", "application/json")
        .with_multipart(vec![
            FormPart::text("connection_id", "con_1"),
            FormPart::file("users", "users.json", "text/json", br#"[{"email":"a@b.c"}]"#.to_vec()),
        ]);

    let response = client.execute_async(&request).await.unwrap();
    assert_eq!(response.status(), 201);
}
