//! Fire-and-forget JSON POSTs against the configured API base URL.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use serde::Serialize;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, warn};

use crate::adapter::{
    ReqwestTransport, RestError, RestRequest, RestResponse, RestResult, RestTransport,
    SharedRestTransport,
};
use crate::config::ApiConfig;
use crate::events::{FxEvent, endpoints};

/// Failures that happen before anything touches the network.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to serialize payload for endpoint {endpoint:?}: {source}")]
    Serialize {
        endpoint: String,
        #[source]
        source: sonic_rs::Error,
    },
    #[error("no tokio runtime available to carry request to {url}")]
    NoRuntime { url: String },
}

#[derive(Clone)]
pub struct Sender {
    config: Arc<ApiConfig>,
    transport: SharedRestTransport,
}

impl Sender {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }

    pub fn with_transport<T>(config: ApiConfig, transport: T) -> Self
    where
        T: RestTransport + 'static,
    {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Serializes `data` and POSTs it to `<base_url>/<endpoint>` without
    /// waiting for the response.
    ///
    /// Only serialization (and a missing runtime) can fail here. Transport
    /// failures and non-2xx statuses are logged and otherwise dropped.
    pub fn send<T>(&self, endpoint: &str, data: &T) -> Result<(), SendError>
    where
        T: Serialize + ?Sized,
    {
        self.dispatch(endpoint, data).map(drop)
    }

    /// Same request as [`Sender::send`], but hands back a [`SendHandle`] that
    /// resolves once the receiver answers. Dropping the handle detaches the
    /// request; it still runs to completion.
    pub fn dispatch<T>(&self, endpoint: &str, data: &T) -> Result<SendHandle, SendError>
    where
        T: Serialize + ?Sized,
    {
        let request = self.build_request(endpoint, data)?;
        let runtime = Handle::try_current().map_err(|_| SendError::NoRuntime {
            url: request.url.clone(),
        })?;

        let url = request.url.clone();
        debug!(url = %url, body_len = request.body().len(), "dispatching POST");

        let transport = Arc::clone(&self.transport);
        let task_url = url.clone();
        let task = runtime.spawn(async move {
            let result = transport.execute(request).await;
            match &result {
                Ok(response) if response.is_success() => {
                    debug!(url = %task_url, status = response.status(), "POST delivered");
                }
                Ok(response) => {
                    warn!(url = %task_url, status = response.status(), "POST rejected by receiver");
                }
                Err(err) => {
                    warn!(url = %task_url, error = %err, "POST failed");
                }
            }
            result
        });

        Ok(SendHandle { url, task })
    }

    /// Posts an FX-unit event to `fx/<unit>`.
    pub fn send_fx(&self, unit: u8, event: &FxEvent) -> Result<(), SendError> {
        self.send(&endpoints::fx(unit), event)
    }

    fn build_request<T>(&self, endpoint: &str, data: &T) -> Result<RestRequest, SendError>
    where
        T: Serialize + ?Sized,
    {
        let body = sonic_rs::to_vec(data).map_err(|source| SendError::Serialize {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let request = RestRequest::post_json_body(self.config.url_for(endpoint), body);
        Ok(match self.config.timeout() {
            Some(timeout) => request.with_timeout(timeout),
            None => request,
        })
    }
}

/// Completion handle for a dispatched POST.
#[derive(Debug)]
pub struct SendHandle {
    url: String,
    task: JoinHandle<RestResult<RestResponse>>,
}

impl SendHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for SendHandle {
    type Output = RestResult<RestResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let joined = match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(joined) => joined,
            Poll::Pending => return Poll::Pending,
        };
        Poll::Ready(match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(RestError::internal(format!(
                "request to {} was aborted",
                self.url
            ))),
            Err(err) => Err(RestError::internal(format!(
                "request task for {} panicked: {err}",
                self.url
            ))),
        })
    }
}
