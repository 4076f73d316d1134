//! Fire-and-forget JSON POSTs to a local Traktor API receiver, over a
//! pluggable transport with an in-memory mock for deterministic tests.

pub mod adapter;
pub mod config;
pub mod events;
pub mod mock;
pub mod sender;

pub use reqwest::Method;

pub use adapter::{
    ReqwestTransport, RestBytes, RestError, RestErrorKind, RestFuture, RestRequest, RestResponse,
    RestResult, RestTransport, RestTransportState,
};
pub use config::{ApiConfig, DEFAULT_BASE_URL};
pub use events::{FxEvent, FxName, FxParam, RangeKind, ValueRange};
pub use mock::{MockBehavior, MockBehaviorPlan, MockResponse, MockRestAdapter, MockRestStateSnapshot};
pub use sender::{SendError, SendHandle, Sender};
