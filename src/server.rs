use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument};

use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::db::Db;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let db = Db::new(Store::new());

    info!("Server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = listener.accept().await?;
        let db = db.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, db).await {
                error!(error = %e, "connection failed");
            }
        });
    }
}

#[instrument(name = "connection", skip(stream, db), fields(connection_id, client_address))]
async fn handle_connection(stream: TcpStream, db: Db) -> Result<(), Error> {
    let mut conn = Connection::new(stream);

    let span = tracing::Span::current();
    span.record("connection_id", conn.id.to_string());
    if let Some(address) = conn.client_address {
        span.record("client_address", address.to_string());
    }

    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {:?}", frame);

        let res = match Command::try_from(frame) {
            Ok(cmd) => cmd.exec(db.clone()).unwrap_or_else(|e| {
                error!("Command failed: {}", e);
                Frame::Error(format!("ERR {}", e))
            }),
            Err(e) => Frame::Error(e.to_string()),
        };

        debug!("Sending response to client: {:?}", res);
        conn.write_frame(&res).await?;
    }

    info!("Connection closed");
    Ok(())
}
