//! Minimal wireline server: three canned answers.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -v http://localhost:42069/
//!   curl -v http://localhost:42069/yourproblem
//!   curl -v http://localhost:42069/myproblem
//!   curl -v -X POST http://localhost:42069/ -d 'hello'

use wireline::{Error, HandlerError, Request, ResponseWriter, Server, Status, default_headers};

const PORT: u16 = 42069;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let server = Server::port(PORT).start(handle).await?;
    tracing::info!(port = PORT, "press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    server.stop();
    tracing::info!("stopped accepting connections");
    Ok(())
}

// /yourproblem → 400, /myproblem → 500, anything else → 200
async fn handle(mut w: ResponseWriter, req: Request) -> Result<(), Error> {
    match req.target() {
        "/yourproblem" => {
            HandlerError::new(Status::BadRequest, "Your problem is not my problem\n")
                .write_to(&mut w)
                .await
        }
        "/myproblem" => HandlerError::new(Status::InternalServerError, "My bad\n").write_to(&mut w).await,
        _ => {
            let body = b"All good\n";
            w.write_status_line(Status::Ok).await?;
            w.write_headers(&default_headers(body.len())).await?;
            w.write_body(body).await
        }
    }
}
