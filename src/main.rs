#[tokio::main]
async fn main() {
    if let Err(e) = odabnote_lib::run().await {
        eprintln!("odabnote: {e}");
        std::process::exit(1);
    }
}
