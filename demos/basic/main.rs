use gfs::logger::init_logger;
use gfs::{Cluster, GfsConfig, GfsResult};
use tracing::{error, info};

#[tokio::main]
async fn main() -> GfsResult<()> {
    init_logger("info");

    // Config path from the first argument, or the defaults.
    let config = match std::env::args().nth(1) {
        Some(path) => GfsConfig::from_json_file(path)?,
        None => GfsConfig::default(),
    };

    let cluster = Cluster::from_config(&config)?;
    let client = cluster.client();
    let path = "/usr/python/readme.txt";

    info!("Writing...");
    client.write(path, b"
        This file tells you all about python that you ever wanted to know.
        Not every README is as informative as this one, but we aim to please.
        Never yet has there been so much information in so little space.
        ")?;
    info!(exists = client.exists(path)?, "File exists?");
    info!("{}", String::from_utf8_lossy(&client.read(path)?));

    info!("Appending...");
    client.write_append(path, b"I'm a little sentence that just snuck in at the end.\n")?;
    info!("{}", String::from_utf8_lossy(&client.read(path)?));

    info!("Deleting...");
    client.delete(path)?;
    info!(exists = client.exists(path)?, "File exists?");

    info!("Testing errors...");
    if let Err(e) = client.read(path) {
        error!("This error should be returned: {e}");
    }
    if let Err(e) = client.write_append(path, b"foo") {
        error!("This error should be returned: {e}");
    }

    info!("Metadata dump...");
    let snapshot = cluster.dump_metadata()?;
    println!("{}", snapshot.to_json()?);

    Ok(())
}
