use std::time::Duration;
use tailreader::{Options, TailingReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::new()
        // wait for the file to appear, but only for 30 seconds
        .with_wait_for_file(true, Duration::from_secs(30))
        // give up if nothing new shows up for 60 seconds
        .with_idle_timeout(Duration::from_secs(60))
        .with_close_on_delete(true);
    let mut reader = TailingReader::with_options("/tmp/test/the-file-to-tail", options)?;

    // Waiting up front is optional; read() waits on its own as well.
    match reader.wait_for_file().await? {
        Some(size) => println!("File is there with {} bytes", size),
        None => return Ok(()),
    }

    let mut buf = vec![0u8; 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        print!("{}", String::from_utf8_lossy(&buf[..n]));
    }

    reader.close()?;
    Ok(())
}
