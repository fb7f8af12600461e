use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SPREADSHEET_ID: &str = "sheet-123";
pub const RANGE: &str = "MASTER!D:D";
pub const TOKEN: &str = "test-token";

/// Path the Sheets client requests for [`SPREADSHEET_ID`] and [`RANGE`].
pub fn values_path() -> String {
    format!("/v4/spreadsheets/{}/values/{}", SPREADSHEET_ID, RANGE)
}

/// Creates a mock Sheets API server answering the values request with one
/// cell per entry of `cells`, in column D order.
pub async fn mock_sheets_server(cells: Vec<&str>) -> MockServer {
    let server = MockServer::start().await;

    let values: Vec<Vec<&str>> = cells.into_iter().map(|c| vec![c]).collect();
    let body = serde_json::json!({
        "range": "MASTER!D1:D1000",
        "majorDimension": "ROWS",
        "values": values,
    });

    Mock::given(method("GET"))
        .and(path(values_path()))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    server
}

/// Creates a mock server that answers the values request with raw `body`.
pub async fn mock_sheets_raw(status_code: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(values_path()))
        .respond_with(
            ResponseTemplate::new(status_code)
                .set_body_string(body)
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock server that returns the specified HTTP error status code.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code).set_body_string("error"))
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "values": [["late.com"]] }))
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}
