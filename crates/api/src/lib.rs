mod alarm;
mod attachment;
mod calendar;
mod category;
mod error;
mod event;
mod ical;
mod shared;

use actix_web::{dev::Server, middleware, web, App, HttpServer};
use almanac_infra::AlmanacContext;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

pub use error::AlmanacError;

pub fn configure_server_api(cfg: &mut web::ServiceConfig) {
    alarm::configure_routes(cfg);
    attachment::configure_routes(cfg);
    calendar::configure_routes(cfg);
    category::configure_routes(cfg);
    event::configure_routes(cfg);
    ical::configure_routes(cfg);
}

pub struct Application {
    server: Server,
    port: u16,
}

impl Application {
    pub async fn new(context: AlmanacContext) -> Result<Self, std::io::Error> {
        let (server, port) = Application::configure_server(context).await?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    async fn configure_server(context: AlmanacContext) -> Result<(Server, u16), std::io::Error> {
        let port = context.config.port;
        let address = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();

        let server = HttpServer::new(move || {
            let ctx = context.clone();

            App::new()
                .wrap(middleware::Compress::default())
                .wrap(TracingLogger::default())
                .app_data(web::Data::new(ctx))
                .service(web::scope("/api/v1").configure(configure_server_api))
        })
        .listen(listener)?
        .workers(4)
        .run();

        Ok((server, port))
    }

    pub async fn start(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}
