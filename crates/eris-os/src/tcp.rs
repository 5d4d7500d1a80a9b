use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use eris::dispatch::Dispatcher;
use eris::frame::{self, MAX_REQUEST_SIZE, Request};

use eris_gpio::chip::Chip;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::state::ApiState;

// Every interface is listened to.
const DEFAULT_ADDRESS: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Default port of the line protocol.
pub const DEFAULT_PORT: u16 = 31215;

/// A server speaking the line protocol.
///
/// Each connection is served by its own task, with its own GPIO
/// reservations: they are released when the connection ends.
#[derive(Debug)]
pub struct Server<C: Chip> {
    // Listening address.
    address: Ipv4Addr,
    // Listening port.
    port: u16,
    // Line-protocol commands.
    dispatcher: Arc<Dispatcher<ApiState<C>>>,
    // Boot-time state, forked for each session.
    state: ApiState<C>,
}

impl<C: Chip> Server<C> {
    /// Creates a [`Server`] from a dispatcher and a state.
    #[must_use]
    pub fn new(dispatcher: Dispatcher<ApiState<C>>, state: ApiState<C>) -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            port: DEFAULT_PORT,
            dispatcher: Arc::new(dispatcher),
            state,
        }
    }

    /// Sets the server `IPv4` address.
    #[must_use]
    pub const fn address(mut self, address: Ipv4Addr) -> Self {
        self.address = address;
        self
    }

    /// Sets the server port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Transforms the server into a [`GracefulShutdownServer`].
    ///
    /// The [`Future`] passed as input manages the graceful shutdown of
    /// the server.
    #[must_use]
    #[inline]
    pub fn with_graceful_shutdown<F>(self, signal: F) -> GracefulShutdownServer<C, F>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        GracefulShutdownServer {
            server: self,
            signal,
        }
    }

    /// Runs the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to start.
    pub async fn run(self) -> Result<()> {
        self.with_graceful_shutdown(std::future::pending())
            .run()
            .await
    }
}

/// A server with graceful shutdown.
///
/// Once the signal completes, no more connections are accepted and the
/// running sessions are closed.
#[derive(Debug)]
pub struct GracefulShutdownServer<C: Chip, F> {
    // Server data.
    server: Server<C>,
    // Graceful shutdown signal.
    signal: F,
}

impl<C, F> GracefulShutdownServer<C, F>
where
    C: Chip,
    F: Future<Output = ()> + Send + 'static,
{
    /// Binds the configured address and runs the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to start.
    pub async fn run(self) -> Result<()> {
        let bind = SocketAddr::from((self.server.address, self.server.port));
        let listener = TcpListener::bind(bind).await?;

        self.serve(listener).await
    }

    /// Runs the server on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!(
            "Line protocol reachable at this address: {}",
            listener.local_addr()?
        );

        let Server {
            dispatcher, state, ..
        } = self.server;

        if dispatcher.is_empty() {
            warn!("No command is registered");
        } else {
            info!("{} command(s) available", dispatcher.len());
        }

        let signal = self.signal;
        tokio::pin!(signal);

        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                () = &mut signal => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "Session opened");
                        sessions.spawn(session(
                            stream,
                            peer,
                            Arc::clone(&dispatcher),
                            state.fork(),
                        ));
                    }
                    Err(e) => warn!("Unable to accept a connection: {e}"),
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        warn!("Session task failed: {e}");
                    }
                }
            }
        }

        info!("Shutting down the line protocol server");
        sessions.shutdown().await;

        Ok(())
    }
}

// Serves one connection until EOF, `BYE`/`QUIT` or an I/O error.
//
// The state is owned by the session: its reservations are dropped with it.
async fn session<C: Chip>(
    mut stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher<ApiState<C>>>,
    state: ApiState<C>,
) {
    let mut buffer = vec![0; MAX_REQUEST_SIZE];

    loop {
        let read = match stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                warn!(%peer, "Unable to read a request: {e}");
                break;
            }
        };

        let outcome = match frame::decode(&buffer[..read]) {
            Ok(Request::Close) => break,
            Ok(Request::Frame(frame)) => {
                debug!(%peer, command = frame.command(), "Request received");
                tokio::select! {
                    outcome = dispatcher.dispatch(state.clone(), frame) => outcome,
                    () = disconnected(&stream) => {
                        info!(%peer, "Peer left during a request");
                        break;
                    }
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = stream.write_all(&frame::encode(&outcome)).await {
            warn!(%peer, "Unable to send a reply: {e}");
            break;
        }
    }

    info!(%peer, "Session closed");
}

// Completes once the peer has closed the connection or the socket fails.
// Pipelined requests are left in the socket for the next read.
async fn disconnected(stream: &TcpStream) {
    let mut byte = [0; 1];
    match stream.peek(&mut byte).await {
        Ok(0) | Err(_) => {}
        Ok(_) => std::future::pending().await,
    }
}
