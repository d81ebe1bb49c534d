#[tokio::main]
async fn main() {
    if let Err(e) = pdf_renamer::run().await {
        eprintln!("pdf-renamer: {}", e);
        std::process::exit(1);
    }
}
