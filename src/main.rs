#[tokio::main]
async fn main() {
    if let Err(e) = medlab_lib::run().await {
        eprintln!("medlab: {e}");
        std::process::exit(1);
    }
}
