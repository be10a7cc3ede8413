//! Tests for the hub scheduler driving a non-blocking cache backend over a
//! real socket: completion delivery, pipelined ordering, timeout reaping,
//! late-reply discard, cancellation, and connection-level failure.

mod common;
mod tracing_util;

use std::time::{Duration, Instant};

use common::{spawn_cache_server, LineCacheClient, ServerAction};
use switchyard::backends::cache::CacheStepper;
use switchyard::hub::{Hub, HandlerId};
use switchyard::protocol::{
    CacheReply, CacheReplyKind, DeliveryMode, ErrorKind, NativeStatus, Outcome, Request,
    RequestState, Target, Value,
};
use switchyard::runtime_config::RuntimeConfig;
use tracing_util::TestTracing;

fn cache_hub(script: Vec<ServerAction>) -> (Hub, HandlerId) {
    let addr = spawn_cache_server(script);
    let client = LineCacheClient::connect(addr).expect("connect to cache server");
    let mut hub = Hub::new(RuntimeConfig::default()).expect("create hub");
    let handler = hub
        .register(Box::new(CacheStepper::new(client)))
        .expect("register handler");
    (hub, handler)
}

/// Drive the hub for `window`, collecting everything it delivers.
fn drive(hub: &mut Hub, window: Duration) -> Vec<Request> {
    let give_up = Instant::now() + window;
    let mut delivered = Vec::new();
    while Instant::now() < give_up {
        delivered.extend(hub.step().expect("step"));
    }
    delivered
}

#[test]
fn test_cache_request_completes_with_status_value() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![ServerAction::Reply("+OK")]);

    let request = Request::new(Target::Cache).with_timeout(Duration::from_secs(2));
    let invoke_id = hub
        .submit(handler, request, b"SET greeting hello".to_vec())
        .expect("submit");

    let done = hub
        .wait_for(invoke_id, Duration::from_secs(2))
        .expect("step")
        .expect("request completes");
    assert_eq!(done.state(), RequestState::Completed);
    assert_eq!(done.invoke_id(), Some(invoke_id));
    match done.result() {
        Some(Outcome::Value(Value::Cache(CacheReply::Status(status)))) => {
            assert_eq!(status, "OK")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_pipelined_requests_complete_in_submission_order() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![
        ServerAction::Reply(":1"),
        ServerAction::Reply("$abc"),
        ServerAction::Reply("_"),
    ]);

    let invokes: Vec<_> = ["INCR n", "GET k", "GET missing"]
        .iter()
        .map(|cmd| {
            let request = Request::new(Target::Cache).with_timeout(Duration::from_secs(2));
            hub.submit(handler, request, cmd.as_bytes().to_vec())
                .expect("submit")
        })
        .collect();

    let mut done = Vec::new();
    let give_up = Instant::now() + Duration::from_secs(2);
    while done.len() < 3 && Instant::now() < give_up {
        done.extend(hub.step().expect("step"));
    }
    assert_eq!(done.len(), 3);

    // Per-handler delivery order matches backend completion order, which the
    // pipelined protocol ties to submission order.
    for (request, invoke_id) in done.iter().zip(&invokes) {
        assert_eq!(request.invoke_id(), Some(*invoke_id));
        assert_eq!(request.state(), RequestState::Completed);
    }
    match done[0].result() {
        Some(Outcome::Value(Value::Cache(CacheReply::Integer(1)))) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    match done[2].result() {
        Some(Outcome::Value(Value::Cache(CacheReply::Nil))) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_array_reply_round_trips() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![ServerAction::Reply("*2\n$alpha\n$beta")]);

    let request = Request::new(Target::Cache).with_timeout(Duration::from_secs(2));
    let invoke_id = hub
        .submit(handler, request, b"LRANGE items 0 -1".to_vec())
        .expect("submit");

    let done = hub
        .wait_for(invoke_id, Duration::from_secs(2))
        .expect("step")
        .expect("request completes");
    match done.result() {
        Some(Outcome::Value(value)) => {
            assert_eq!(value.content_type(), "array");
            match value {
                Value::Cache(CacheReply::Array(items)) => {
                    assert_eq!(items.len(), 2);
                    assert_eq!(items[0].kind(), CacheReplyKind::String);
                    assert_eq!(items[1], CacheReply::Data(b"beta".to_vec()));
                }
                other => panic!("unexpected value: {:?}", other),
            }
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_cache_error_reply_fails_the_request() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) =
        cache_hub(vec![ServerAction::Reply("-WRONGTYPE operation against a key")]);

    let request = Request::new(Target::Cache).with_timeout(Duration::from_secs(2));
    let invoke_id = hub
        .submit(handler, request, b"LPUSH scalar x".to_vec())
        .expect("submit");

    let done = hub
        .wait_for(invoke_id, Duration::from_secs(2))
        .expect("step")
        .expect("request fails");
    assert_eq!(done.state(), RequestState::Failed);
    match done.result() {
        Some(Outcome::Error(err)) => {
            assert_eq!(err.kind(), ErrorKind::Backend);
            assert_eq!(err.target(), Target::Cache);
            assert_eq!(err.status(), Some(&NativeStatus::Cache("WRONGTYPE".to_string())));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_timeout_fires_and_late_reply_is_discarded() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![ServerAction::DelayedReply(400, "+OK")]);

    let started = Instant::now();
    let request = Request::new(Target::Cache).with_timeout(Duration::from_millis(120));
    let invoke_id = hub
        .submit(handler, request, b"GET slow".to_vec())
        .expect("submit");

    let done = hub
        .wait_for(invoke_id, Duration::from_secs(1))
        .expect("step")
        .expect("timeout delivered");
    // Delivered at the deadline, well before the server answers.
    assert!(started.elapsed() < Duration::from_millis(390));
    assert_eq!(done.state(), RequestState::TimedOut);
    match done.result() {
        Some(Outcome::Error(err)) => {
            assert_eq!(err.kind(), ErrorKind::Timeout);
            assert_eq!(err.target(), Target::Cache);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // The reply that eventually arrives must be dropped, not delivered.
    let extra = drive(&mut hub, Duration::from_millis(600));
    assert!(extra.is_empty());
    assert_eq!(hub.metrics().get_discarded(), 1);
    assert_eq!(hub.in_flight(), 0);
}

#[test]
fn test_cancelled_request_result_is_dropped() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![ServerAction::DelayedReply(150, "+OK")]);

    let request = Request::new(Target::Cache);
    let invoke_id = hub
        .submit(handler, request, b"SET k v".to_vec())
        .expect("submit");
    assert!(hub.cancel(invoke_id));

    let delivered = drive(&mut hub, Duration::from_millis(600));
    assert!(delivered.is_empty());
    // The completion fired (releasing backend bookkeeping) and was dropped.
    assert_eq!(hub.metrics().get_completed(), 1);
    assert_eq!(hub.in_flight(), 0);
}

#[test]
fn test_fire_and_forget_is_not_delivered() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![ServerAction::Reply("+OK")]);

    let request = Request::new(Target::Cache).with_mode(DeliveryMode::Post);
    hub.submit(handler, request, b"SET k v".to_vec())
        .expect("submit");

    let delivered = drive(&mut hub, Duration::from_millis(400));
    assert!(delivered.is_empty());
    assert_eq!(hub.metrics().get_completed(), 1);
    assert_eq!(hub.in_flight(), 0);
}

#[test]
fn test_connection_close_fails_in_flight_and_retires_handler() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![ServerAction::Close]);

    let request = Request::new(Target::Cache).with_timeout(Duration::from_secs(2));
    let invoke_id = hub
        .submit(handler, request, b"GET k".to_vec())
        .expect("submit");

    let done = hub
        .wait_for(invoke_id, Duration::from_secs(2))
        .expect("step")
        .expect("failure delivered");
    assert_eq!(done.state(), RequestState::Failed);
    match done.result() {
        Some(Outcome::Error(err)) => assert_eq!(err.kind(), ErrorKind::Connection),
        other => panic!("unexpected result: {:?}", other),
    }

    // The handler was retired with the dead connection.
    let request = Request::new(Target::Cache);
    assert!(hub.submit(handler, request, b"GET k".to_vec()).is_err());
}

#[test]
fn test_unregister_fails_in_flight_with_shutdown_error() {
    let _tracing = TestTracing::init();
    let (mut hub, handler) = cache_hub(vec![ServerAction::Ignore]);

    let request = Request::new(Target::Cache);
    let invoke_id = hub
        .submit(handler, request, b"GET k".to_vec())
        .expect("submit");

    hub.unregister(handler).expect("unregister");

    let done = hub
        .wait_for(invoke_id, Duration::from_millis(500))
        .expect("step")
        .expect("shutdown failure delivered");
    assert_eq!(done.state(), RequestState::Failed);
    match done.result() {
        Some(Outcome::Error(err)) => assert_eq!(err.kind(), ErrorKind::Shutdown),
        other => panic!("unexpected result: {:?}", other),
    }
}
