//! End-to-end scenarios: host loop on the test thread, native runtime on
//! worker threads, every call going through the bridge.
//!
//! Each scenario gets its own registry so the live-handle checks are exact
//! while tests run in parallel.

use std::future::Future;
use std::sync::Arc;

use bridge_fixtures::{host_greeter, FallibleMegaphone, Fixtures, Megaphone, MyError, MyRecord};
use core_async::task::spawn_local;
use core_async::time::{millis, sleep, Duration, Instant};
use core_bridge::{
    AbortController, Bridge, BridgeConfig, BridgeEvent, CallOptions, ErrorKind, EventStream,
    ForeignCallback, ForeignError, HandleRegistry, HostError, HostLoop, Operation,
    ResourceEvent, ResourceOptions,
};

fn fixtures() -> Fixtures {
    fixtures_with(BridgeConfig::builder().worker_threads(4).build().unwrap())
}

fn fixtures_with(config: BridgeConfig) -> Fixtures {
    let host = HostLoop::new();
    let bridge = Bridge::builder(config)
        .registry(Arc::new(HandleRegistry::new()))
        .host(Arc::new(host.handle()))
        .build()
        .unwrap();
    host.start();
    Fixtures::new(bridge)
}

fn check_remaining_futures(fixtures: &Fixtures) {
    let (native, foreign) = fixtures.remaining_handles();
    assert_eq!(native, 0, "Number of remaining futures should be zero");
    assert_eq!(foreign, 0, "Number of remaining foreign futures should be zero");
}

async fn measure<F: Future>(future: F, expected_ms: u64, tolerance_ms: u64) -> F::Output {
    let start = Instant::now();
    let output = future.await;
    let actual = start.elapsed();

    let low = Duration::from_millis(expected_ms.saturating_sub(tolerance_ms));
    let high = Duration::from_millis(expected_ms + tolerance_ms);
    assert!(
        actual >= low && actual <= high,
        "took {actual:?}, expected {expected_ms}ms ± {tolerance_ms}ms"
    );
    output
}

fn is_my_error_foo(error: &HostError) -> bool {
    error.instance_of("MyError.Foo") && error.is::<MyError>()
}

fn options(release_after_ms: u64, timeout_ms: u64) -> Option<ResourceOptions> {
    Some(ResourceOptions::new(release_after_ms, timeout_ms))
}

async fn until_held(fixtures: &Fixtures) {
    while !fixtures.shared_resource().is_held() {
        sleep(millis(1)).await;
    }
}

#[core_async::test]
async fn test_always_ready() {
    let fixtures = fixtures();
    assert!(fixtures.always_ready().await.unwrap());
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_new_my_record() {
    let fixtures = fixtures();
    let record = fixtures.new_my_record("my string", 42).await.unwrap();
    assert_eq!(
        record,
        MyRecord {
            a: "my string".to_string(),
            b: 42
        }
    );
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_void() {
    let fixtures = fixtures();
    measure(fixtures.void(), 0, 500).await.unwrap();
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_sleep() {
    let fixtures = fixtures();
    assert!(measure(fixtures.sleep(500), 500, 50).await.unwrap());
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_sync_greet() {
    let fixtures = fixtures();
    let greeting = measure(async { fixtures.greet("Hello") }, 0, 10).await;
    assert_eq!(greeting, "Hello, Hello!");
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_sequential_futures() {
    let fixtures = fixtures();
    measure(
        async {
            assert_eq!(fixtures.say_after(500, "Alice").await.unwrap(), "Hello, Alice!");
            assert_eq!(fixtures.say_after(500, "Bob").await.unwrap(), "Hello, Bob!");
        },
        1000,
        50,
    )
    .await;
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_concurrent_futures() {
    let fixtures = fixtures();
    let (alice, bob) = measure(
        async {
            let alice = fixtures.say_after(400, "Alice");
            let bob = fixtures.say_after(600, "Bob");
            futures::join!(alice, bob)
        },
        600,
        50,
    )
    .await;

    assert_eq!(alice.unwrap(), "Hello, Alice!");
    assert_eq!(bob.unwrap(), "Hello, Bob!");
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_async_methods() {
    let fixtures = fixtures();
    let megaphone = fixtures.new_megaphone();
    let hello_alice = measure(megaphone.say_after(500, "Alice"), 500, 50).await.unwrap();
    assert_eq!(hello_alice, "HELLO, ALICE!");
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_object_with_fallible_async_ctor() {
    let fixtures = fixtures();
    let error = FallibleMegaphone::create(fixtures.bridge()).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Construction);
    assert!(is_my_error_foo(&error));
    assert_eq!(error.operation(), "FallibleMegaphone.create");
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_async_function_returning_an_object() {
    let fixtures = fixtures();
    let megaphone = fixtures.async_new_megaphone().await.unwrap();
    assert_eq!(megaphone.fallible_me(false).await.unwrap(), 42);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_primary_async_constructor() {
    let fixtures = fixtures();
    let megaphone = Megaphone::create(fixtures.bridge()).await.unwrap();
    assert_eq!(megaphone.fallible_me(false).await.unwrap(), 42);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_secondary_async_constructor() {
    let fixtures = fixtures();
    let megaphone = Megaphone::secondary(fixtures.bridge()).await.unwrap();
    assert_eq!(megaphone.fallible_me(false).await.unwrap(), 42);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_fallible_function_which_does_not_throw() {
    let fixtures = fixtures();
    let result = measure(fixtures.fallible_me(false, CallOptions::none()), 0, 100)
        .await
        .unwrap();
    assert_eq!(result, 42);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_fallible_method_which_does_not_throw() {
    let fixtures = fixtures();
    let megaphone = fixtures.fallible_struct(false).await.unwrap();
    assert_eq!(megaphone.fallible_me(false).await.unwrap(), 42);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_fallible_method_which_does_not_throw_on_sync_object() {
    let fixtures = fixtures();
    let megaphone = fixtures.new_megaphone();
    let result = measure(megaphone.fallible_me(false), 0, 100).await.unwrap();
    assert_eq!(result, 42);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_fallible_function_which_does_throw() {
    let fixtures = fixtures();
    let error = measure(fixtures.fallible_me(true, CallOptions::none()), 0, 100)
        .await
        .unwrap_err();

    assert!(is_my_error_foo(&error));
    assert_eq!(error.kind(), ErrorKind::Operation);
    assert_eq!(error.downcast_ref::<MyError>(), Some(&MyError::Foo));
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_fallible_struct_which_does_throw() {
    let fixtures = fixtures();
    let error = fixtures.fallible_struct(true).await.unwrap_err();
    assert!(is_my_error_foo(&error));
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_fallible_method_which_does_throw() {
    let fixtures = fixtures();
    let megaphone = fixtures.new_megaphone();
    let error = measure(megaphone.fallible_me(true), 0, 100).await.unwrap_err();

    assert!(is_my_error_foo(&error));
    assert_eq!(error.operation(), "Megaphone.fallibleMe");
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_cancelled_before_it_starts() {
    let fixtures = fixtures();
    let controller = AbortController::new();
    controller.abort();

    let error = fixtures
        .fallible_me(true, CallOptions::with_signal(controller.signal()))
        .await
        .unwrap_err();

    assert_eq!(error.name(), "AbortError");
    assert_eq!(error.kind(), ErrorKind::Cancellation);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_cancelled_after_it_is_resolved() {
    let fixtures = fixtures();
    let controller = AbortController::new();
    let value = fixtures
        .fallible_me(false, CallOptions::with_signal(controller.signal()))
        .await
        .unwrap();
    assert_eq!(value, 42);

    controller.abort();
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_cancelled_after_it_is_rejected() {
    let fixtures = fixtures();
    let controller = AbortController::new();
    let error = fixtures
        .fallible_me(true, CallOptions::with_signal(controller.signal()))
        .await
        .unwrap_err();
    assert!(is_my_error_foo(&error));

    controller.abort();
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_lock_not_cancelled() {
    let fixtures = fixtures();
    let task1 = fixtures.use_shared_resource(options(100, 1000), CallOptions::none());
    let task2 = fixtures.use_shared_resource(options(0, 1000), CallOptions::none());

    let (first, second) = futures::join!(task1, task2);
    first.unwrap();
    second.unwrap();
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_lock_cancelled_from_host() {
    let fixtures = fixtures();
    let controller = AbortController::new();

    let task1 = spawn_local(fixtures.use_shared_resource(
        options(100_000, 100),
        CallOptions::with_signal(controller.signal()),
    ));
    let task2 = spawn_local(fixtures.use_shared_resource(options(0, 1000), CallOptions::none()));

    let aborter = controller.clone();
    let delay = spawn_local(async move {
        sleep(millis(500)).await;
        aborter.abort();
    });

    let (task1, task2, delay) = futures::join!(task1, task2, delay);
    delay.unwrap();

    let task1 = task1.unwrap();
    let task2 = task2.unwrap();
    assert!(
        task1.as_ref().is_err_and(HostError::is_cancellation),
        "only task1 should have failed: {task1:?}"
    );
    assert!(task2.is_ok(), "task2 should not have failed: {task2:?}");
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_lock_erroring_with_timeout() {
    let fixtures = fixtures();
    let task1 = fixtures.use_shared_resource(options(200, 100), CallOptions::none());
    until_held(&fixtures).await;

    let error = fixtures
        .use_shared_resource(options(1000, 100), CallOptions::none())
        .await
        .unwrap_err();
    assert!(error.instance_of("AsyncError.Timeout"));
    assert_eq!(error.kind(), ErrorKind::Timeout);

    task1.await.unwrap();
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_immediately_cancelled_releases_lock() {
    let fixtures = fixtures();
    let controller = AbortController::new();
    let shared = options(1000, 100);

    let task1 =
        fixtures.use_shared_resource(shared, CallOptions::with_signal(controller.signal()));
    controller.abort();
    let task2 = fixtures.use_shared_resource(shared, CallOptions::none());

    assert!(task1.await.unwrap_err().is_cancellation());
    task2.await.unwrap();
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_cancelled_waiter_never_holds() {
    let fixtures = fixtures();
    let mut stream = EventStream::new(fixtures.bridge().events().subscribe())
        .filter(|event| matches!(event, BridgeEvent::Resource(ResourceEvent::Acquired { .. })));
    let controller = AbortController::new();

    let holder = fixtures.use_shared_resource(options(300, 1000), CallOptions::none());
    let holder_handle = holder.handle();
    until_held(&fixtures).await;

    let waiter = fixtures.use_shared_resource(
        options(0, 2000),
        CallOptions::with_signal(controller.signal()),
    );
    let waiter_handle = waiter.handle();
    sleep(millis(50)).await;
    controller.abort();

    let error = waiter.await.unwrap_err();
    assert!(error.is_cancellation());
    assert_eq!(fixtures.shared_resource().holder(), Some(holder_handle));

    holder.await.unwrap();
    assert!(!fixtures.shared_resource().is_held());
    assert_eq!(fixtures.shared_resource().holder(), None);

    let holders: Vec<_> = stream
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            BridgeEvent::Resource(ResourceEvent::Acquired { holder, .. }) => holder,
            _ => None,
        })
        .collect();
    assert_eq!(holders, vec![holder_handle]);
    assert!(!holders.contains(&waiter_handle));
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_lock_falls_back_to_configured_options() {
    let config = BridgeConfig::builder()
        .worker_threads(2)
        .resource_options(ResourceOptions::new(300, 50))
        .build()
        .unwrap();
    let fixtures = fixtures_with(config);

    let task1 = fixtures.use_shared_resource(None, CallOptions::none());
    until_held(&fixtures).await;

    let error = measure(
        fixtures.use_shared_resource(None, CallOptions::none()),
        50,
        50,
    )
    .await
    .unwrap_err();
    assert!(error.instance_of("AsyncError.Timeout"));

    task1.await.unwrap();
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_hold_intervals_never_overlap() {
    let fixtures = fixtures();
    let mut stream = EventStream::new(fixtures.bridge().events().subscribe())
        .filter(|event| matches!(event, BridgeEvent::Resource(_)));

    let calls: Vec<_> = (0..5)
        .map(|_| fixtures.use_shared_resource(options(20, 1000), CallOptions::none()))
        .collect();
    for result in futures::future::join_all(calls).await {
        result.unwrap();
    }

    let mut held = false;
    let mut acquisitions = 0;
    for event in stream.drain() {
        match event {
            BridgeEvent::Resource(ResourceEvent::Acquired { holder, .. }) => {
                assert!(!held, "resource acquired while already held");
                assert!(holder.is_some());
                held = true;
                acquisitions += 1;
            }
            BridgeEvent::Resource(ResourceEvent::Released { .. }) => {
                assert!(held, "resource released while free");
                held = false;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(acquisitions, 5);
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_error_stack_traces() {
    let fixtures = fixtures();
    assert_eq!(fixtures.fallible_me(false, CallOptions::none()).await.unwrap(), 42);

    let error = fixtures
        .fallible_me(true, CallOptions::none())
        .await
        .unwrap_err();
    assert!(is_my_error_foo(&error));

    let stack = error.stack();
    assert!(stack.contains("fallibleMe"), "STACK does not contain fallibleMe: {stack}");
    assert!(stack.contains(file!()), "STACK does not contain the call site: {stack}");
    assert!(error.trail().contains("fallibleMe"));
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_foreign_callback() {
    let fixtures = fixtures();
    let greeting = measure(fixtures.say_after_with_host(&host_greeter(), 100, "Alice"), 100, 50)
        .await
        .unwrap();

    assert_eq!(greeting, "Hello, Alice!");
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_foreign_callback_rejection() {
    let fixtures = fixtures();
    let rude = ForeignCallback::new("rude", |who: String| async move {
        Err::<String, _>(ForeignError::Rejected(format!("not greeting {who}")))
    });

    let error = fixtures
        .say_after_with_host(&rude, 0, "Bob")
        .await
        .unwrap_err();

    assert!(error.instance_of("ForeignError"));
    assert!(error.message().contains("not greeting Bob"));
    check_remaining_futures(&fixtures);
}

#[core_async::test]
async fn test_cancelled_while_awaiting_host() {
    let fixtures = fixtures();
    let slow = ForeignCallback::new("slow", |who: String| async move {
        sleep(millis(5_000)).await;
        Ok::<_, ForeignError>(who)
    });

    let controller = AbortController::new();
    let bridge = fixtures.bridge();
    let greeting = bridge.call(
        Operation::function("sayAfterWithHost"),
        CallOptions::with_signal(controller.signal()),
        bridge.call_foreign(Operation::function("slow"), &slow, "Carol".to_string()),
    );

    sleep(millis(50)).await;
    assert_eq!(fixtures.remaining_handles(), (1, 1));
    controller.abort();

    assert!(greeting.await.unwrap_err().is_cancellation());
    check_remaining_futures(&fixtures);
}
