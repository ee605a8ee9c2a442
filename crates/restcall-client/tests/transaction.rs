//! Transaction behaviour over a scripted transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use restcall_client::{
    ChannelContext, Client, ConfigurationError, FaultKind, Method, ProgressHooks, Request,
    StatusCode, TextEncoding, ValidationError,
};
use restcall_test_utils::{assert_err, assert_ok, init_test_tracing, ScriptedTransport, Step};
use serde::{Deserialize, Serialize};

const BASE_URI: &str = "http://localhost:52101/Service1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contact {
    name: String,
    email: String,
    notes: String,
}

fn tom() -> Contact {
    Contact {
        name: "Tom Hanks".to_string(),
        email: "tom@example.com".to_string(),
        notes: "Café owner ☕".to_string(),
    }
}

fn client_over(transport: &Arc<ScriptedTransport>, parameters: &str) -> Client {
    init_test_tracing();
    assert_ok!(Client::with_transport(BASE_URI, parameters, transport.clone()))
}

fn get_with_retries(max_retries: u8) -> Request {
    assert_ok!(Request::builder().method(Method::Get).max_retries(max_retries).build())
}

#[test]
fn test_post_round_trip() {
    let transport = ScriptedTransport::always(Step::Echo);
    let mut client = client_over(&transport, "TestPost");

    let mut request = Request::json(Method::Post);
    assert!(request.attach_json(&tom()));

    let mut response = assert_ok!(client.send(request));
    assert!(response.is_success());
    assert!(!client.log().has_errors());
    assert_eq!(response.attempts(), 1);

    let echoed: Contact = response.try_deserialize().expect("echoed contact");
    assert_eq!(echoed, tom());
    assert_eq!(transport.calls()[0].url, "http://localhost:52101/Service1/TestPost");
    assert_eq!(transport.calls()[0].method, Method::Post);
}

#[test]
fn test_exhaustion_names_the_status() {
    for status in [StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR, StatusCode::SERVICE_UNAVAILABLE] {
        let transport = ScriptedTransport::always(Step::fail(status.as_u16()));
        let mut client = client_over(&transport, "TestGet");

        let response = assert_ok!(client.send(get_with_retries(2)));

        assert_eq!(transport.opened(), 3);
        assert_eq!(response.attempts(), 3);
        assert_eq!(response.status(), Some(status));
        assert!(response.log().has_errors());

        let fault = response.log().fault().expect("captured fault");
        assert_eq!(fault.kind(), FaultKind::Status);
        assert_eq!(fault.status(), Some(status.as_u16()));
        assert!(
            fault.message().contains(status.canonical_reason().unwrap()),
            "{} should name {status}",
            fault.message()
        );
    }
}

#[test]
fn test_success_on_retry() {
    let transport = ScriptedTransport::new([
        Step::Disconnect,
        Step::fail(503),
        Step::Timeout,
        Step::ok("fine"),
    ]);
    let mut client = client_over(&transport, "TestGet");

    let response = assert_ok!(client.send(Request::get()));

    assert!(response.is_success());
    assert_eq!(response.raw_response(), "fine");
    assert_eq!(response.attempts(), 4);
    assert!(response.log().fault().is_none());
    assert_eq!(transport.attempts(), 4);

    let log = client.log();
    assert!(!log.has_errors());
    assert_eq!(log.warning_entries().len(), 3);
    assert!(log.warnings().contains("Attempt 1 of 6 failed"));
}

#[test]
fn test_connectivity_fault_has_no_status() {
    let transport = ScriptedTransport::always(Step::Disconnect);
    let mut client = client_over(&transport, "TestGet");

    let response = assert_ok!(client.send(get_with_retries(0)));

    assert_eq!(transport.opened(), 1);
    assert_eq!(response.status(), None);
    assert_eq!(response.raw_response(), "");
    assert_eq!(response.log().fault().unwrap().kind(), FaultKind::Connect);
}

#[test]
fn test_non_200_success_is_recorded_not_retried() {
    let transport = ScriptedTransport::always(Step::status(204));
    let mut client = client_over(&transport, "TestDelete");

    let request = assert_ok!(Request::builder()
        .method(Method::Delete)
        .content_type("application/json")
        .encoding(TextEncoding::Utf8)
        .build());
    let response = assert_ok!(client.send(request));

    assert_eq!(transport.opened(), 1);
    assert_eq!(response.attempts(), 1);
    assert!(response.log().fault().is_none());
    assert_eq!(
        response.log().error_entries(),
        ["Request failed. Received HTTP 204 No Content"]
    );
}

#[test]
fn test_validation_fails_before_any_call() {
    let err = assert_err!(Request::builder().method(Method::Post).build());
    assert_eq!(err, ValidationError::MissingContentType);

    let err = assert_err!(Request::builder()
        .method(Method::Put)
        .content_type("text/plain")
        .build());
    assert_eq!(err, ValidationError::MissingEncoding);

    let err = assert_err!(Request::builder().method(Method::Get).timeout_secs(-1).build());
    assert_eq!(err, ValidationError::NegativeTimeout);
}

#[test]
fn test_blank_address_is_a_configuration_error() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "   ");

    let err = assert_err!(client.send(Request::get()));
    assert!(matches!(err, ConfigurationError::BlankUriParameters));
    assert_eq!(err.to_string(), "UriParameters is not set.");
    assert_eq!(transport.opened(), 0);

    let err = assert_err!(Client::with_transport("", "TestGet", transport.clone()));
    assert!(matches!(err, ConfigurationError::BlankBaseUri));
}

#[test]
fn test_send_current_uses_stored_request() {
    let transport = ScriptedTransport::always(Step::ok("stored"));
    let mut client = client_over(&transport, "TestGet");

    assert!(matches!(
        assert_err!(client.send_current()),
        ConfigurationError::MissingRequest
    ));

    client.set_request(get_with_retries(0));
    let response = assert_ok!(client.send_current());
    assert_eq!(response.raw_response(), "stored");
    assert_eq!(client.request().map(Request::max_retries), Some(0));
}

#[test]
fn test_header_edge_cases() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "TestGet");

    let mut request = Request::get();
    request.insert_header("", "dropped");
    request.insert_header("X-Bare", "");
    request.insert_header("X-Trace", "abc");
    request.insert_header("X-Trace", "def");

    assert_ok!(client.send(request));

    let call = &transport.calls()[0];
    assert_eq!(call.headers.len(), 2);
    assert_eq!(call.header("X-Bare"), Some(None));
    assert_eq!(call.header("X-Trace"), Some(Some("def")));
}

#[test]
fn test_body_written_only_for_body_verbs() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "Items");

    for method in [Method::Get, Method::Delete, Method::Post, Method::Put, Method::Patch] {
        let mut request = assert_ok!(Request::builder()
            .method(method)
            .content_type("text/plain")
            .encoding(TextEncoding::Utf8)
            .body("payload")
            .build());
        request.set_body("payload");
        assert_ok!(client.send(request));
    }

    let bodies: Vec<String> = transport.calls().iter().map(|c| c.body_text()).collect();
    assert_eq!(bodies, ["", "", "payload", "payload", "payload"]);
}

#[test]
fn test_blank_body_is_not_written() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "Items");

    let mut request = assert_ok!(Request::builder()
        .method(Method::Post)
        .content_type("text/plain")
        .encoding(TextEncoding::Utf8)
        .build());
    request.set_body("   ");
    assert_ok!(client.send(request));

    assert!(transport.calls()[0].body.is_empty());
}

#[test]
fn test_trailing_slash_base_uri() {
    let transport = ScriptedTransport::always(Step::ok(""));
    init_test_tracing();
    let mut client = assert_ok!(Client::with_transport("http://h/api/", "items", transport.clone()));

    assert_ok!(client.send(Request::get()));

    assert_eq!(transport.calls()[0].url, "http://h/api/items");
    assert_eq!(client.full_uri(), "http://h/api/items");
}

#[test]
fn test_body_uses_request_encoding() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "Items");

    let mut request = assert_ok!(Request::builder()
        .method(Method::Post)
        .content_type("text/plain; charset=iso-8859-1")
        .encoding(TextEncoding::Latin1)
        .build());
    request.set_body("café");
    assert_ok!(client.send(request));

    assert_eq!(transport.calls()[0].body, vec![b'c', b'a', b'f', 0xE9]);
}

#[test]
fn test_error_body_falls_back_to_request_encoding() {
    let transport = ScriptedTransport::always(Step::Fail {
        status: 500,
        body: "oops".to_string(),
    });
    let mut client = client_over(&transport, "Items");

    let request = assert_ok!(Request::builder()
        .method(Method::Post)
        .content_type("text/plain")
        .encoding(TextEncoding::Latin1)
        .max_retries(0)
        .build());
    let response = assert_ok!(client.send(request));

    assert_eq!(response.raw_response(), "oops");
    assert_eq!(response.encoding(), TextEncoding::Latin1);
    assert_eq!(response.status_text(), "Internal Server Error");
}

#[test]
fn test_response_charset_wins() {
    let transport = ScriptedTransport::always(Step::ok_with_type(
        "{}",
        "application/json; charset=utf-16le",
    ));
    let mut client = client_over(&transport, "Items");

    let response = assert_ok!(client.send(Request::get()));
    assert_eq!(response.encoding(), TextEncoding::Utf16Le);
    assert_eq!(response.content_type(), Some("application/json; charset=utf-16le"));
}

#[test]
fn test_timeout_is_passed_per_attempt() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "Items");

    let request = assert_ok!(Request::builder().method(Method::Get).timeout_secs(7).build());
    assert_ok!(client.send(request));

    assert_eq!(transport.calls()[0].timeout, Duration::from_secs(7));
}

#[test]
fn test_retry_delay_spaces_attempts() {
    let transport = ScriptedTransport::always(Step::Disconnect);
    let mut client = client_over(&transport, "Items");

    let request = assert_ok!(Request::builder()
        .method(Method::Get)
        .max_retries(2)
        .retry_delay(Duration::from_millis(40))
        .build());
    assert_ok!(client.send(request));

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(pair[1].dispatched_at - pair[0].dispatched_at >= Duration::from_millis(40));
    }
}

#[test]
fn test_abort_fails_the_attempt_and_retries() {
    let transport = ScriptedTransport::new([Step::Hang, Step::ok("after abort")]);
    let mut client = client_over(&transport, "Items");
    let abort = client.abort_handle();

    let aborter = std::thread::spawn(move || {
        while !abort.is_in_flight() {
            std::thread::sleep(Duration::from_millis(2));
        }
        abort.abort()
    });

    let response = assert_ok!(client.send(get_with_retries(1)));
    assert!(aborter.join().unwrap());

    assert_eq!(response.attempts(), 2);
    assert_eq!(response.raw_response(), "after abort");
    assert!(client.log().warnings().contains("aborted"));
    assert!(!client.abort());
}

#[test]
fn test_abort_on_last_attempt_is_reported() {
    let transport = ScriptedTransport::always(Step::Hang);
    let mut client = client_over(&transport, "Items");
    let abort = client.abort_handle();

    let aborter = std::thread::spawn(move || {
        while !abort.abort() {
            std::thread::sleep(Duration::from_millis(2));
        }
    });

    let response = assert_ok!(client.send(get_with_retries(0)));
    aborter.join().unwrap();

    assert_eq!(response.log().fault().unwrap().kind(), FaultKind::Aborted);
}

#[tokio::test]
async fn test_async_matches_blocking() {
    let transport = ScriptedTransport::new([Step::fail(502), Step::ok("async")]);
    let mut client = client_over(&transport, "Items");

    let response = assert_ok!(client.send_async(get_with_retries(3)).await);

    assert!(response.is_success());
    assert_eq!(response.raw_response(), "async");
    assert_eq!(response.attempts(), 2);
    assert_eq!(client.log().warning_entries().len(), 1);
}

#[tokio::test]
async fn test_async_configuration_error() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "");

    let err = assert_err!(client.send_async(Request::get()).await);
    assert!(matches!(err, ConfigurationError::BlankUriParameters));
    assert_eq!(transport.opened(), 0);
}

#[test]
fn test_continuation_runs_on_delivery_context() {
    let transport = ScriptedTransport::new([Step::Disconnect, Step::ok("later")]);
    let mut client = client_over(&transport, "Items");

    let events = Arc::new(Mutex::new(Vec::<String>::new()));
    let (hold, release) = (events.clone(), events.clone());
    client.set_progress_hooks(
        ProgressHooks::new()
            .on_hold(move || hold.lock().push("hold".to_string()))
            .on_release(move || release.lock().push("release".to_string())),
    );

    let (context, mut pump) = ChannelContext::new();
    let delivered = events.clone();
    let delivered_on = Arc::new(Mutex::new(None));
    let thread_slot = delivered_on.clone();

    assert_ok!(client.send_with_continuation(get_with_retries(2), Arc::new(context), move |response| {
        *thread_slot.lock() = Some(std::thread::current().id());
        delivered
            .lock()
            .push(format!("done {} {}", response.attempts(), response.raw_response()));
    }));

    assert_eq!(events.lock().as_slice(), ["hold"]);
    assert!(pump.run_next_blocking());

    assert_eq!(events.lock().as_slice(), ["hold", "release", "done 2 later"]);
    assert_eq!(*delivered_on.lock(), Some(std::thread::current().id()));
    assert_eq!(client.log().warning_entries().len(), 1);
}

#[test]
fn test_continuation_configuration_error_is_immediate() {
    let transport = ScriptedTransport::always(Step::ok(""));
    let mut client = client_over(&transport, "");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let (context, mut pump) = ChannelContext::new();
    let err = assert_err!(client.send_with_continuation(Request::get(), Arc::new(context), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(matches!(err, ConfigurationError::BlankUriParameters));
    assert_eq!(pump.run_pending(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn attempts_never_exceed_budget(max_retries in 0u8..6, status in prop::sample::select(vec![400u16, 404, 500, 503])) {
        let transport = ScriptedTransport::always(Step::fail(status));
        let mut client = client_over(&transport, "Items");

        let response = client.send(get_with_retries(max_retries)).unwrap();

        prop_assert_eq!(transport.opened(), usize::from(max_retries) + 1);
        prop_assert_eq!(response.attempts(), u32::from(max_retries) + 1);
        prop_assert!(response.log().has_errors());
    }

    #[test]
    fn first_success_stops_retrying(failures in 0usize..5) {
        let mut steps: Vec<Step> = (0..failures).map(|_| Step::Disconnect).collect();
        steps.push(Step::ok("ok"));
        let transport = ScriptedTransport::new(steps);
        let mut client = client_over(&transport, "Items");

        let response = client.send(get_with_retries(5)).unwrap();

        prop_assert!(response.is_success());
        prop_assert_eq!(transport.opened(), failures + 1);
    }
}
