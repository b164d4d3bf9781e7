//! Socket API: one request and one response per connection.

use anyhow::Result;
use lintgate_common::{
    CommandRunner, HookService, MAX_REQUEST_BYTES, MAX_RESPONSE_BYTES, Request, Response,
    TransportError, read_frame, write_frame,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How long a client may take to send its request.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Accept connections until `shutdown` resolves, then stop accepting and
/// wait for in-flight requests to finish.
pub async fn serve<R>(
    listener: UnixListener,
    service: Arc<HookService<R>>,
    shutdown: impl Future<Output = ()>,
) where
    R: CommandRunner + 'static,
{
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let service = service.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, service).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => warn!("Accept error: {}", e),
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    warn!("Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);
    if !connections.is_empty() {
        info!(in_flight = connections.len(), "Waiting for in-flight requests");
    }
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            warn!("Connection task failed: {}", e);
        }
    }
}

/// Read one request, dispatch it, write one response.
pub async fn handle_connection<R: CommandRunner>(
    stream: UnixStream,
    service: Arc<HookService<R>>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();

    let read = read_frame::<Request, _>(reader, MAX_REQUEST_BYTES);
    let request = match tokio::time::timeout(REQUEST_READ_TIMEOUT, read).await {
        Ok(Ok(request)) => request,
        Ok(Err(TransportError::Closed)) => {
            debug!("Client closed before sending a request");
            return Ok(());
        }
        Ok(Err(e @ (TransportError::Malformed(_) | TransportError::FrameTooLarge { .. }))) => {
            let response = Response::internal(format!("invalid request: {e}"));
            write_frame(&mut writer, &response, MAX_RESPONSE_BYTES).await?;
            return Ok(());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            debug!("Client sent no request within {:?}", REQUEST_READ_TIMEOUT);
            return Ok(());
        }
    };

    let response = service.handle(&request).await;
    debug!(method = %request.method, exit_code = response.exit_code, "Responding");
    write_frame(&mut writer, &response, MAX_RESPONSE_BYTES).await?;
    Ok(())
}
