use clap::Parser;
use tracing_subscriber::EnvFilter;

use regex_harvester::service::ExtractionService;

#[derive(Parser, Debug)]
#[command(
    name = "regex-harvester",
    about = "Serves regex usage extraction for JavaScript/TypeScript files over a socket"
)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:7878
    listen_addr: String,

    /// Maximum number of connections served concurrently
    #[arg(default_value_t = 64)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    ExtractionService::new(args.listen_addr)
        .with_max_connections(args.concurrency)
        .run()
        .await
}
