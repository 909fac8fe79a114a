use clap::Parser;
use webposto_mcp::config::Settings;

#[tokio::main]
async fn main() {
    let settings = Settings::parse();
    if let Err(err) = webposto_mcp::mcp::server::run_stdio(settings).await {
        eprintln!("webposto-mcp: {}", err);
        std::process::exit(1);
    }
}
