use super::connection::{Connection, Service};
use crate::config::ServerConfig;
use crate::router::RouteTable;
use crate::security::Authenticator;
use may::coroutine::{self, JoinHandle};
use may::net::{TcpListener, TcpStream};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// An HTTP/1.1 server over a route table.
///
/// ```rust,no_run
/// use webobj::content::ContentVariant;
/// use webobj::router::{Route, RouteTable};
/// use webobj::server::Server;
///
/// # fn main() -> anyhow::Result<()> {
/// let routes = RouteTable::new(vec![Route::prefix("/", ContentVariant::bytes("hi"))?]);
/// let handle = Server::new(routes).start()?;
/// println!("listening on {}", handle.local_addr());
/// handle.join().ok();
/// # Ok(())
/// # }
/// ```
pub struct Server {
    routes: RouteTable,
    authenticator: Option<Arc<dyn Authenticator>>,
    config: ServerConfig,
}

impl Server {
    /// Server with the default [`ServerConfig`] and no authenticator.
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes,
            authenticator: None,
            config: ServerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_authenticator<A: Authenticator + 'static>(mut self, authenticator: A) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and start accepting.
    ///
    /// The socket is bound before this returns, so with port `0` the chosen port is available
    /// from [`ServerHandle::local_addr`] straight away.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the port cannot be bound or the listener
    /// coroutine cannot be spawned.
    pub fn start(self) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.addr.as_str())?;
        let addr = listener.local_addr()?;
        let stack_size = self.config.stack_size;
        info!(
            addr = %addr,
            routes_count = self.routes.len(),
            stack_size = stack_size,
            max_request_line = self.config.max_request_line,
            authenticator = self.authenticator.is_some(),
            "Server listening"
        );
        let service = Arc::new(Service::new(self.routes, self.authenticator, self.config));

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (listener and an Arc'd service) and is
        // Send + 'static; the coroutine only ever blocks through may's own I/O.
        let handle = unsafe {
            coroutine::Builder::new()
                .name("webobj-listener".to_string())
                .stack_size(stack_size)
                .spawn(move || accept_loop(&listener, &service))
        }?;
        Ok(ServerHandle { addr, handle })
    }
}

fn accept_loop(listener: &TcpListener, service: &Arc<Service>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => spawn_connection(stream, Arc::clone(service)),
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
}

fn spawn_connection(stream: TcpStream, service: Arc<Service>) {
    let peer = stream.peer_addr().ok();
    if let Err(e) = stream.set_read_timeout(service.config.read_timeout()) {
        debug!(peer = ?peer, error = %e, "Failed to set read timeout");
    }
    if let Err(e) = stream.set_write_timeout(service.config.write_timeout()) {
        debug!(peer = ?peer, error = %e, "Failed to set write timeout");
    }
    let stack_size = service.config.stack_size;
    // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
    // The connection owns its stream and an Arc of the immutable service; nothing is
    // borrowed from the accept loop.
    let spawned = unsafe {
        coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || Connection::new(stream, service, peer).run())
    };
    if let Err(e) = spawned {
        error!(peer = ?peer, error = %e, "Failed to spawn connection coroutine");
    }
}

/// Handle to a running server
///
/// Provides methods for waiting until the server is ready, stopping it,
/// or joining the listener coroutine.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to accept connections
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if no connection succeeds within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if std::net::TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting connections.
    ///
    /// Cancels the listener coroutine and waits for it to finish. Connections already being
    /// served run until their peers disconnect.
    pub fn stop(self) {
        // SAFETY: Coroutine::cancel() is marked unsafe by the may runtime. The handle is
        // valid because we own it, and cancelling the accept loop is the intended shutdown.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
        info!(addr = %self.addr, "Server stopped");
    }

    /// Block until the listener coroutine finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener coroutine panicked.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
