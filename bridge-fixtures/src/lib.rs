//! # Bridge Fixtures
//!
//! Small operations whose only purpose is to push calls through the bridge:
//! ready and sleeping futures, fallible functions and methods, async
//! constructors, a contended shared resource, and a call back into the host.
//!
//! Every async operation returns a [`Deferred`] and is `#[track_caller]`,
//! so error trails point at the test line that made the call.

use std::sync::Arc;

use core_async::time::{millis, sleep};
use core_bridge::{
    Bridge, CallOptions, Deferred, ErrorKind, ForeignCallback, ForeignError, HandleCategory,
    NativeError, Operation, ResourceOptions, SharedResource, TimeoutError,
};
use thiserror::Error;
use tracing::debug;

/// Name of the resource contended by [`Fixtures::use_shared_resource`].
pub const SHARED_RESOURCE: &str = "shared";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MyError {
    #[error("Foo happened")]
    Foo,
}

impl NativeError for MyError {
    fn type_name(&self) -> &'static str {
        match self {
            MyError::Foo => "MyError.Foo",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsyncError {
    #[error("Timed out waiting for '{0}'")]
    Timeout(String),
}

impl From<TimeoutError> for AsyncError {
    fn from(error: TimeoutError) -> Self {
        AsyncError::Timeout(error.resource)
    }
}

impl NativeError for AsyncError {
    fn type_name(&self) -> &'static str {
        match self {
            AsyncError::Timeout(_) => "AsyncError.Timeout",
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            AsyncError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyRecord {
    pub a: String,
    pub b: u32,
}

/// Greeting helper shared by functions and methods.
fn say(who: &str) -> String {
    format!("Hello, {who}!")
}

/// Object with async constructors and async methods.
#[derive(Debug)]
pub struct Megaphone {
    bridge: Bridge,
}

impl Megaphone {
    const NAME: &'static str = "Megaphone";

    /// Primary async constructor.
    #[track_caller]
    pub fn create(bridge: &Bridge) -> Deferred<Arc<Megaphone>> {
        let inner = bridge.clone();
        bridge.call_infallible(
            Operation::primary_constructor(Self::NAME),
            CallOptions::none(),
            async move { Arc::new(Megaphone { bridge: inner }) },
        )
    }

    #[track_caller]
    pub fn secondary(bridge: &Bridge) -> Deferred<Arc<Megaphone>> {
        let inner = bridge.clone();
        bridge.call_infallible(
            Operation::secondary_constructor(Self::NAME, "secondary"),
            CallOptions::none(),
            async move { Arc::new(Megaphone { bridge: inner }) },
        )
    }

    /// Like [`Fixtures::say_after`], but shouting.
    #[track_caller]
    pub fn say_after(&self, ms: u64, who: impl Into<String>) -> Deferred<String> {
        let who = who.into();
        self.bridge.call_infallible(
            Operation::method(Self::NAME, "sayAfter"),
            CallOptions::none(),
            async move {
                sleep(millis(ms)).await;
                say(&who).to_uppercase()
            },
        )
    }

    #[track_caller]
    pub fn fallible_me(&self, do_fail: bool) -> Deferred<u8> {
        self.bridge.call(
            Operation::method(Self::NAME, "fallibleMe"),
            CallOptions::none(),
            async move {
                if do_fail {
                    Err(MyError::Foo)
                } else {
                    Ok(42)
                }
            },
        )
    }
}

/// Object whose only constructor fails.
#[derive(Debug)]
pub struct FallibleMegaphone {
    _private: (),
}

impl FallibleMegaphone {
    #[track_caller]
    pub fn create(bridge: &Bridge) -> Deferred<FallibleMegaphone> {
        bridge.call(
            Operation::primary_constructor("FallibleMegaphone"),
            CallOptions::none(),
            async { Err::<FallibleMegaphone, _>(MyError::Foo) },
        )
    }
}

/// The fixture module: free functions plus the shared resource they contend on.
#[derive(Debug, Clone)]
pub struct Fixtures {
    bridge: Bridge,
    resource: SharedResource,
}

impl Fixtures {
    pub fn new(bridge: Bridge) -> Self {
        let resource = SharedResource::with_events(SHARED_RESOURCE, bridge.events().clone());
        debug!(?bridge, "fixtures initialized");
        Self { bridge, resource }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn shared_resource(&self) -> &SharedResource {
        &self.resource
    }

    /// Live (native, foreign) handles of this fixture's bridge.
    pub fn remaining_handles(&self) -> (usize, usize) {
        (
            self.bridge.live_handles(HandleCategory::Native),
            self.bridge.live_handles(HandleCategory::Foreign),
        )
    }

    #[track_caller]
    pub fn always_ready(&self) -> Deferred<bool> {
        self.bridge
            .call_infallible(Operation::function("alwaysReady"), CallOptions::none(), async {
                true
            })
    }

    #[track_caller]
    pub fn new_my_record(&self, a: impl Into<String>, b: u32) -> Deferred<MyRecord> {
        let a = a.into();
        self.bridge.call_infallible(
            Operation::function("newMyRecord"),
            CallOptions::none(),
            async move { MyRecord { a, b } },
        )
    }

    #[track_caller]
    pub fn void(&self) -> Deferred<()> {
        self.bridge
            .call_infallible(Operation::function("void"), CallOptions::none(), async {})
    }

    #[track_caller]
    pub fn sleep(&self, ms: u64) -> Deferred<bool> {
        self.bridge.call_infallible(
            Operation::function("sleep"),
            CallOptions::none(),
            async move {
                sleep(millis(ms)).await;
                true
            },
        )
    }

    /// Synchronous; never touches the bridge.
    pub fn greet(&self, who: &str) -> String {
        say(who)
    }

    #[track_caller]
    pub fn say_after(&self, ms: u64, who: impl Into<String>) -> Deferred<String> {
        let who = who.into();
        self.bridge.call_infallible(
            Operation::function("sayAfter"),
            CallOptions::none(),
            async move {
                sleep(millis(ms)).await;
                say(&who)
            },
        )
    }

    #[track_caller]
    pub fn fallible_me(&self, do_fail: bool, options: CallOptions) -> Deferred<u8> {
        self.bridge
            .call(Operation::function("fallibleMe"), options, async move {
                if do_fail {
                    Err(MyError::Foo)
                } else {
                    Ok(42)
                }
            })
    }

    #[track_caller]
    pub fn fallible_struct(&self, do_fail: bool) -> Deferred<Arc<Megaphone>> {
        let bridge = self.bridge.clone();
        self.bridge.call(
            Operation::function("fallibleStruct"),
            CallOptions::none(),
            async move {
                if do_fail {
                    Err(MyError::Foo)
                } else {
                    Ok(Arc::new(Megaphone { bridge }))
                }
            },
        )
    }

    /// Synchronous constructor.
    pub fn new_megaphone(&self) -> Arc<Megaphone> {
        Arc::new(Megaphone {
            bridge: self.bridge.clone(),
        })
    }

    #[track_caller]
    pub fn async_new_megaphone(&self) -> Deferred<Arc<Megaphone>> {
        let bridge = self.bridge.clone();
        self.bridge.call_infallible(
            Operation::function("asyncNewMegaphone"),
            CallOptions::none(),
            async move { Arc::new(Megaphone { bridge }) },
        )
    }

    /// Holds the shared resource for `releaseAfterMs`, failing with
    /// `AsyncError.Timeout` if it cannot be acquired within `timeoutMs`.
    ///
    /// Without explicit options the bridge's configured defaults apply.
    #[track_caller]
    pub fn use_shared_resource(
        &self,
        options: Option<ResourceOptions>,
        call_options: CallOptions,
    ) -> Deferred<()> {
        let options = options.unwrap_or(self.bridge.config().resource_options);
        let resource = self.resource.clone();
        self.bridge.call(
            Operation::function("useSharedResource"),
            call_options,
            async move { resource.hold(options).await.map_err(AsyncError::from) },
        )
    }

    /// Waits `ms` natively, then asks the host's `greeter` for the greeting.
    #[track_caller]
    pub fn say_after_with_host(
        &self,
        greeter: &ForeignCallback<String, String>,
        ms: u64,
        who: impl Into<String>,
    ) -> Deferred<String> {
        let who = who.into();
        let greeting = self
            .bridge
            .call_foreign(Operation::function(greeter.name()), greeter, who);
        self.bridge.call(
            Operation::function("sayAfterWithHost"),
            CallOptions::none(),
            async move {
                sleep(millis(ms)).await;
                greeting.await
            },
        )
    }
}

/// Host callback that greets like [`Fixtures::say_after`].
pub fn host_greeter() -> ForeignCallback<String, String> {
    ForeignCallback::new("greeter", |who: String| async move {
        Ok::<_, ForeignError>(say(&who))
    })
}
