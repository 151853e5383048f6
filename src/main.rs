use log::LevelFilter;

use server::HttpServer;

mod request;
mod response;
mod router;
mod routes;
mod server;
mod thread_pool;

use anyhow::Result;
use response::HttpResponse;

fn get_hello(_request_line: &str) -> Result<HttpResponse> {
    Ok(HttpResponse::html("<h1>Hello, World!</h1>"))
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .init();

    let server = HttpServer::bind("127.0.0.1:8080")?
        .workers(10)?
        .route("/hello", get_hello);

    server.run()
}
