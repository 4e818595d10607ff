#![warn(clippy::all, clippy::pedantic)]

#[tokio::main]
async fn main() {
    if let Err(err) = war_watcher::run().await {
        eprintln!("fatal: {}", err);
        std::process::exit(1);
    }
}
