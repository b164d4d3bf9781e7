//! Client side of the daemon protocol, with in-process fallback.
//!
//! The client first tries the daemon. Any transport failure (no socket,
//! refused, timeout, unreadable response) sends the same request through a
//! local [`HookService`] over the same on-disk state, so the caller cannot
//! tell which path served it except through [`CallOutcome::path`].

use crate::config::HookConfig;
use crate::errors::TransportError;
use crate::paths::Paths;
use crate::protocol::{
    HookParams, MAX_REQUEST_BYTES, MAX_RESPONSE_BYTES, Request, Response, method, read_frame,
    write_frame,
};
use crate::runner::CommandRunner;
use crate::service::{HookService, ServiceMode};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

/// Extra time allowed for a daemon response beyond the run timeout.
pub const RESPONSE_GRACE: Duration = Duration::from_secs(5);

/// Response deadline for methods that do not run a command.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivers one request and returns one response.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &Request,
        response_timeout: Duration,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// Unix domain socket transport.
#[derive(Debug, Clone)]
pub struct UnixTransport {
    socket_path: PathBuf,
    connect_timeout: Duration,
}

impl UnixTransport {
    pub fn new(socket_path: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            connect_timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Transport for UnixTransport {
    async fn send(
        &self,
        request: &Request,
        response_timeout: Duration,
    ) -> Result<Response, TransportError> {
        if !self.socket_path.exists() {
            return Err(TransportError::SocketNotFound {
                path: self.socket_path.clone(),
            });
        }

        let stream = timeout(self.connect_timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                timeout: self.connect_timeout,
            })??;
        let (reader, mut writer) = stream.into_split();

        write_frame(&mut writer, request, MAX_REQUEST_BYTES).await?;
        timeout(response_timeout, read_frame::<Response, _>(reader, MAX_RESPONSE_BYTES))
            .await
            .map_err(|_| TransportError::ResponseTimeout {
                timeout: response_timeout,
            })?
    }
}

/// Which path served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPath {
    Daemon,
    Fallback,
}

/// What the entrypoint turns into output and an exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub result: String,
    pub exit_code: i32,
    pub error: Option<String>,
    pub path: CallPath,
}

impl CallOutcome {
    fn from_response(response: Response, path: CallPath) -> Self {
        Self {
            result: response.result,
            exit_code: response.exit_code,
            error: response.error,
            path,
        }
    }
}

pub struct Client<T, R> {
    transport: Option<T>,
    fallback: HookService<R>,
}

impl<R: CommandRunner> Client<UnixTransport, R> {
    /// Client for the daemon configured in `config`, falling back to the
    /// stores under `paths`.
    pub fn from_config(config: HookConfig, paths: &Paths, runner: R) -> Self {
        let transport = (!config.general.no_daemon).then(|| {
            UnixTransport::new(config.socket_path(paths), config.general.connect_timeout)
        });
        let fallback = HookService::open(ServiceMode::Local, config, paths, runner);
        Self::new(transport, fallback)
    }
}

impl<T: Transport, R: CommandRunner> Client<T, R> {
    /// `transport == None` always uses the fallback.
    pub fn new(transport: Option<T>, fallback: HookService<R>) -> Self {
        Self {
            transport,
            fallback,
        }
    }

    pub async fn call(&self, request: &Request) -> CallOutcome {
        if let Some(transport) = &self.transport {
            match transport.send(request, self.response_timeout(request)).await {
                Ok(response) => return CallOutcome::from_response(response, CallPath::Daemon),
                Err(e) => debug!(method = %request.method, "Daemon unavailable, running locally: {}", e),
            }
        }
        let response = self.fallback.handle(request).await;
        CallOutcome::from_response(response, CallPath::Fallback)
    }

    fn response_timeout(&self, request: &Request) -> Duration {
        let Some(check) = method::check_for(&request.method) else {
            return CONTROL_TIMEOUT;
        };
        let run_timeout = request
            .parse_params::<HookParams>()
            .ok()
            .and_then(|params| params.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(self.fallback.config().check(check).timeout);
        run_timeout + RESPONSE_GRACE
    }
}
