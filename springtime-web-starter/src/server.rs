//! Core server-related functionality.

use crate::config::WebServerConfig;
use axum::Router;
use hyper::Error as HyperError;
#[cfg(test)]
use mockall::automock;
use springtime_di::component_registry::conditional::unregistered_component;
use springtime_di::future::{BoxFuture, FutureExt};
use springtime_di::instance_provider::ErrorPtr;
use springtime_di::{component_alias, injectable, Component};
use springtime_web_route::mapping::RouteHandler;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

/// Errors related to running web servers.
#[derive(Error, Debug)]
pub enum WebServerError {
    #[error("Error binding server to {0}: {1}")]
    BindError(SocketAddr, #[source] HyperError),
    #[error("Error serving requests: {0}")]
    ServeError(#[source] HyperError),
    #[error("Server task failed: {0}")]
    TaskError(#[source] JoinError),
    #[error("Server is already running")]
    AlreadyStarted,
    #[error("Server is not running")]
    NotStarted,
}

/// Owned [WebServer]. Servers move between tasks, but are never shared.
pub type WebServerPtr = Box<dyn WebServer + Send>;

/// HTTP server able to serve bound route handlers.
#[cfg_attr(test, automock)]
pub trait WebServer {
    /// Port on which the server listens.
    fn port(&self) -> u16;

    fn set_port(&mut self, port: u16);

    /// Binds a handler at given path. Handlers already carry their method filters.
    fn bind_handler(&mut self, path: &str, handler: RouteHandler);

    /// Starts listening in the background. The server accepts connections when this returns.
    /// Requires a running tokio runtime.
    fn start(&mut self) -> Result<(), WebServerError>;

    /// Gracefully stops the server. The returned future completes when in-flight requests are
    /// finished.
    fn shutdown(&mut self) -> BoxFuture<'static, Result<(), WebServerError>>;
}

struct RunningServer {
    shutdown_sender: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), HyperError>>,
}

/// [WebServer] running an axum [Router] on all network interfaces.
#[derive(Default)]
pub struct AxumWebServer {
    port: u16,
    router: Router,
    local_addr: Option<SocketAddr>,
    running: Option<RunningServer>,
}

impl AxumWebServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Returns the address the server is bound to, if started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl WebServer for AxumWebServer {
    fn port(&self) -> u16 {
        self.port
    }

    fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    fn bind_handler(&mut self, path: &str, handler: RouteHandler) {
        self.router = std::mem::take(&mut self.router).route(path, handler);
    }

    fn start(&mut self) -> Result<(), WebServerError> {
        if self.running.is_some() {
            return Err(WebServerError::AlreadyStarted);
        }

        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        let server = axum::Server::try_bind(&address)
            .map_err(|error| WebServerError::BindError(address, error))?
            .serve(std::mem::take(&mut self.router).into_make_service());

        let local_addr = server.local_addr();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let handle = tokio::spawn(server.with_graceful_shutdown(async {
            // a dropped sender also means shutdown
            let _ = shutdown_receiver.await;
        }));

        info!(%local_addr, "Web server listening.");

        self.local_addr = Some(local_addr);
        self.running = Some(RunningServer {
            shutdown_sender,
            handle,
        });

        Ok(())
    }

    fn shutdown(&mut self) -> BoxFuture<'static, Result<(), WebServerError>> {
        let running = self.running.take();
        async move {
            let running = running.ok_or(WebServerError::NotStarted)?;
            if running.shutdown_sender.send(()).is_err() {
                debug!("Web server already finished before shutdown.");
            }

            running
                .handle
                .await
                .map_err(WebServerError::TaskError)?
                .map_err(WebServerError::ServeError)?;

            info!("Web server stopped.");
            Ok(())
        }
        .boxed()
    }
}

/// Trait for components responsible for creating web servers from [WebServerConfig]. Create a
/// component implementing this trait to override the default bootstrap.
#[injectable]
pub trait ServerBootstrap {
    /// Creates a new, not yet started, server.
    fn bootstrap_server(
        &self,
        config: &WebServerConfig,
    ) -> BoxFuture<'_, Result<WebServerPtr, ErrorPtr>>;
}

#[derive(Component)]
#[component(priority = -128, condition = "unregistered_component::<dyn ServerBootstrap + Send + Sync>")]
struct DefaultServerBootstrap;

#[component_alias]
impl ServerBootstrap for DefaultServerBootstrap {
    fn bootstrap_server(
        &self,
        config: &WebServerConfig,
    ) -> BoxFuture<'_, Result<WebServerPtr, ErrorPtr>> {
        let port = config.port;
        async move { Ok(Box::new(AxumWebServer::new(port)) as WebServerPtr) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::WebServerConfig;
    use crate::context::SpringtimeApplicationContext;
    use crate::server::{
        AxumWebServer, DefaultServerBootstrap, ServerBootstrap, WebServer, WebServerError,
        WebServerPtr,
    };
    use crate::starter::WebServerStarter;
    use axum::routing::get;
    use config::{Config, File, FileFormat};
    use portpicker::pick_unused_port;
    use springtime_web_route::mapping::WebMapping;
    use std::net::TcpListener;

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn should_serve_bound_handlers() {
        let port = pick_unused_port().unwrap();

        let mut server = AxumWebServer::new(0);
        server.set_port(port);
        server.bind_handler("/ping", get(|| async { "pong" }));
        server.start().unwrap();

        assert_eq!(server.local_addr().unwrap().port(), port);

        let body = reqwest::get(format!("http://127.0.0.1:{port}/ping"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "pong");

        server.shutdown().await.unwrap();
        assert!(reqwest::get(format!("http://127.0.0.1:{port}/ping"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn should_report_bind_errors() {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut server = AxumWebServer::new(port);
        assert!(matches!(
            server.start().unwrap_err(),
            WebServerError::BindError(..)
        ));
    }

    #[tokio::test]
    async fn should_not_shutdown_stopped_server() {
        let mut server = AxumWebServer::new(0);
        assert!(matches!(
            server.shutdown().await.unwrap_err(),
            WebServerError::NotStarted
        ));
    }

    #[tokio::test]
    async fn should_not_start_twice() {
        let mut server = AxumWebServer::new(0);
        server.start().unwrap();
        assert!(matches!(
            server.start().unwrap_err(),
            WebServerError::AlreadyStarted
        ));
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn should_bootstrap_server_from_config() {
        let port = pick_unused_port().unwrap();
        let config = Config::builder()
            .add_source(File::from_str(
                &format!(r#"{{ "web": {{ "server": {{ "port": {port} }} }} }}"#),
                FileFormat::Json,
            ))
            .build()
            .unwrap();
        let config = WebServerConfig::from_config(&config).unwrap();

        let server: WebServerPtr = DefaultServerBootstrap
            .bootstrap_server(&config)
            .await
            .unwrap();
        assert_eq!(server.port(), port);

        let mut mapping = WebMapping::new();
        mapping.get_mapping("/health", || async { "OK" });

        let mut starter = WebServerStarter::new(server, mapping);
        assert_send(&starter);

        starter
            .on_start_application(&SpringtimeApplicationContext::default())
            .unwrap();

        let response = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "OK");

        starter.on_stop_application().await.unwrap();
        assert!(reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .is_err());
    }
}
