use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "MANGA_DOWNLOADER_REQUIRE_SOCKET_TESTS";

/// True when mock-server tests must fail instead of skipping.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn localhost_unavailable() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let caller = Location::caller();
    let reason = format!(
        "no localhost socket for the mock site in {}:{}",
        caller.file(),
        caller.line()
    );
    assert!(!socket_tests_required(), "{reason} ({REQUIRE_ENV} is set)");

    eprintln!("{reason}; skipping (set {REQUIRE_ENV}=1 to fail instead)");
    true
}

/// Starts a mock site, or returns `None` when sockets are unavailable.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if localhost_unavailable() {
        return None;
    }
    Some(MockServer::start().await)
}
