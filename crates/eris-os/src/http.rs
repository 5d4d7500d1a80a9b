use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

use eris::dispatch::Dispatcher;
use eris::error::{Error as ApiError, Result as ApiResult};
use eris::frame::Arguments;
use eris::reply::Reply;
use eris::route::{HttpRoute, RestKind};

use eris_gpio::chip::Chip;

use tokio::net::TcpListener;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::state::ApiState;

// Every interface is listened to.
const DEFAULT_ADDRESS: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Default port of the HTTP interface.
pub const DEFAULT_PORT: u16 = 8080;

const UNKNOWN_ROUTE: &str = "Unknown route.";

// Shared by every request.
struct Context<C: Chip> {
    dispatcher: Dispatcher<ApiState<C>>,
    state: ApiState<C>,
}

/// A server exposing the commands bound to HTTP routes.
///
/// All requests share the same GPIO reservations.
#[derive(Debug)]
pub struct Server<C: Chip> {
    // Listening address.
    address: Ipv4Addr,
    // Listening port.
    port: u16,
    // Route-bound commands.
    dispatcher: Dispatcher<ApiState<C>>,
    // Shared state.
    state: ApiState<C>,
}

impl<C: Chip> Server<C> {
    /// Creates a [`Server`] from a dispatcher and a state.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher<ApiState<C>>, state: ApiState<C>) -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            port: DEFAULT_PORT,
            dispatcher,
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
/// Aside from the graceful shutdown functionality, it behaves the same as
/// [`Server`].
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
    /// Returns an error if the server fails while serving.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let dispatcher = &self.server.dispatcher;
        if dispatcher.is_empty() {
            warn!("No command is registered");
        } else {
            info!("{} command(s) available", dispatcher.len());
        }

        for route in dispatcher.routes() {
            info!("Server route: [{}, \"{}\"]", route.rest_kind, route.path);
        }

        let context = Arc::new(Context {
            dispatcher: self.server.dispatcher,
            state: self.server.state,
        });

        // Routes are matched ignoring the path case, so the dispatcher is
        // reached through the fallback.
        let router = Router::new()
            .fallback(handle::<C>)
            .with_state(context);

        info!(
            "Device reachable at this HTTP address: {}",
            listener.local_addr()?
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(self.signal)
            .await?;

        Ok(())
    }
}

async fn handle<C: Chip>(
    State(context): State<Arc<Context<C>>>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    debug!(%method, %uri, "Request received");

    let command = RestKind::from_method(method.as_str())
        .and_then(|rest_kind| context.dispatcher.lookup_route(rest_kind, uri.path()));
    let Some(command) = command else {
        return (StatusCode::NOT_FOUND, UNKNOWN_ROUTE).into_response();
    };

    let outcome = match command.http_route().map(|route| arguments(route, &query)) {
        Some(Ok(arguments)) => {
            context
                .dispatcher
                .run(command, context.state.clone(), arguments)
                .await
        }
        Some(Err(e)) => Err(e),
        None => Err(ApiError::unknown_resource(UNKNOWN_ROUTE)),
    };

    respond(outcome)
}

// Binds the declared parameters to arguments, in declaration order.
//
// The first missing parameter ends the list, unless another declared
// parameter follows it.
fn arguments(route: &HttpRoute, query: &[(String, String)]) -> ApiResult<Arguments> {
    let mut arguments = Arguments::new();
    let mut missing = None;

    for parameter in route.parameters {
        let value = query
            .iter()
            .find(|(name, _)| name == parameter)
            .map(|(_, value)| value);

        match (value, missing) {
            (Some(_), Some(missing)) => {
                return Err(ApiError::invalid_argument(format!(
                    "Missing `{missing}` parameter."
                )));
            }
            (Some(value), None) => arguments.push(value.clone()),
            (None, None) => missing = Some(*parameter),
            (None, Some(_)) => {}
        }
    }

    Ok(arguments)
}

fn respond(outcome: ApiResult<Reply>) -> Response {
    match outcome {
        Ok(reply) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            reply.into_bytes(),
        )
            .into_response(),
        Err(e) => {
            let status = StatusCode::from_u16(e.kind().http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, e.description().to_owned()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use eris::error::ErrorKind;
    use eris::route::HttpRoute;

    use eris_gpio::GpioManager;
    use eris_gpio::sim::SimChip;

    use reqwest::{Client, StatusCode};

    use serial_test::serial;

    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use crate::commands::rest;
    use crate::state::ApiState;

    use super::{Server, arguments};

    struct TestServer {
        chip: SimChip,
        address: SocketAddr,
        client: Client,
        stop: oneshot::Sender<()>,
    }

    impl TestServer {
        async fn start() -> Self {
            let chip = SimChip::new("sim0", ["LED", "BUTTON"]);
            let gpio = GpioManager::discover(vec![chip.clone()]).await;

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap();

            let (stop, stopped) = oneshot::channel::<()>();
            let server = Server::new(rest().unwrap(), ApiState::new(gpio))
                .with_graceful_shutdown(async move {
                    let _ = stopped.await;
                });
            tokio::spawn(server.serve(listener));

            Self {
                chip,
                address,
                client: Client::new(),
                stop,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{path}", self.address)
        }

        async fn get(&self, path: &str) -> (StatusCode, String) {
            let response = self.client.get(self.url(path)).send().await.unwrap();
            (response.status(), response.text().await.unwrap())
        }

        async fn put(&self, path: &str) -> (StatusCode, String) {
            let response = self.client.put(self.url(path)).send().await.unwrap();
            (response.status(), response.text().await.unwrap())
        }

        async fn delete(&self, path: &str) -> (StatusCode, String) {
            let response = self.client.delete(self.url(path)).send().await.unwrap();
            (response.status(), response.text().await.unwrap())
        }

        async fn post(&self, path: &str) -> (StatusCode, String) {
            let response = self.client.post(self.url(path)).send().await.unwrap();
            (response.status(), response.text().await.unwrap())
        }

        fn stop(self) {
            self.stop.send(()).unwrap();
        }
    }

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn declared_order() {
        let route = HttpRoute::get("/api/gpio").with_parameters(&["name", "direction", "value"]);

        let args = arguments(
            &route,
            &query(&[("value", "1"), ("direction", "out"), ("name", "LED"), ("x", "y")]),
        )
        .unwrap();
        assert_eq!(args.text(0).unwrap(), "LED");
        assert_eq!(args.text(1).unwrap(), "out");
        assert_eq!(args.text(2).unwrap(), "1");
    }

    #[test]
    fn trailing_missing_parameters() {
        let route = HttpRoute::get("/api/gpio").with_parameters(&["name", "direction", "value"]);

        let args = arguments(&route, &query(&[("name", "LED"), ("direction", "in")])).unwrap();
        assert_eq!(args.len(), 2);

        let args = arguments(&route, &query(&[])).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn missing_middle_parameter() {
        let route = HttpRoute::get("/api/gpio").with_parameters(&["name", "direction", "value"]);

        let error = arguments(&route, &query(&[("name", "LED"), ("value", "1")])).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert_eq!(error.description(), "Missing `direction` parameter.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[serial]
    async fn gpio_routes() {
        let server = TestServer::start().await;

        assert_eq!(
            server.get("/api/gpio/list").await,
            (StatusCode::OK, "LED BUTTON".into())
        );
        assert_eq!(
            server.get("/api/gpio?name=LED&direction=out&value=1").await,
            (StatusCode::OK, "Ok".into())
        );
        assert_eq!(server.chip.level("LED"), Some(true));

        assert_eq!(
            server.get("/API/GPIO/DIRECTION?name=led").await,
            (StatusCode::OK, "Output".into())
        );
        assert_eq!(
            server.put("/api/gpio/value?name=LED&value=0").await,
            (StatusCode::OK, "Ok".into())
        );
        assert_eq!(server.chip.level("LED"), Some(false));

        assert_eq!(
            server.get("/api/gpio/value?name=LED").await,
            (
                StatusCode::BAD_REQUEST,
                "This GPIO line is not readable.".into()
            )
        );
        assert_eq!(
            server.get("/api/gpio?name=LED&direction=in").await,
            (
                StatusCode::FORBIDDEN,
                "The GPIO line is already reserved.".into()
            )
        );
        assert_eq!(
            server.get("/api/gpio?name=LED&value=1").await,
            (
                StatusCode::BAD_REQUEST,
                "Missing `direction` parameter.".into()
            )
        );
        assert_eq!(
            server.get("/api/gpio?name=LED&direction=sideways").await,
            (StatusCode::BAD_REQUEST, "Invalid direction".into())
        );
        assert_eq!(
            server.delete("/api/gpio?name=GPIO99").await,
            (
                StatusCode::NOT_FOUND,
                "The GPIO name does not exist.".into()
            )
        );

        assert_eq!(
            server.delete("/api/gpio?name=LED").await,
            (StatusCode::OK, "Ok".into())
        );
        assert_eq!(server.chip.consumer("LED"), None);

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[serial]
    async fn unknown_and_unsupported_routes() {
        let server = TestServer::start().await;

        assert_eq!(
            server.get("/api/nothing").await,
            (StatusCode::NOT_FOUND, "Unknown route.".into())
        );
        // Known path, unknown method.
        assert_eq!(
            server.post("/api/gpio/list").await,
            (StatusCode::NOT_FOUND, "Unknown route.".into())
        );
        assert_eq!(
            server.post("/api/update/factory").await,
            (StatusCode::NOT_IMPLEMENTED, "Not implemented.".into())
        );

        let (status, index) = server.get("/api").await;
        assert_eq!(status, StatusCode::OK);
        assert!(index.contains("GET /api/gpio?name&direction&value - "));

        let (status, catalog) = server.get("/api/commands").await;
        assert_eq!(status, StatusCode::OK);
        let catalog: serde_json::Value = serde_json::from_str(&catalog).unwrap();
        assert!(catalog.as_array().is_some_and(|commands| !commands.is_empty()));

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[serial]
    async fn edge_waits_do_not_block_other_requests() {
        let server = TestServer::start().await;

        assert_eq!(
            server.get("/api/gpio?name=BUTTON&direction=in").await,
            (StatusCode::OK, "Ok".into())
        );

        let waiter = {
            let client = server.client.clone();
            let url = server.url("/api/gpio/edge?name=BUTTON&type=falling");
            tokio::spawn(async move {
                let response = client.get(url).send().await.unwrap();
                (response.status(), response.text().await.unwrap())
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            server.get("/api/gpio/list").await,
            (StatusCode::OK, "LED BUTTON".into())
        );
        assert!(!waiter.is_finished());

        server.chip.set_level("BUTTON", true);
        server.chip.set_level("BUTTON", false);

        assert_eq!(waiter.await.unwrap(), (StatusCode::OK, "Ok".into()));

        server.stop();
    }
}
