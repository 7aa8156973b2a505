use registry_cleanup::cli::{Args, Runner};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,registry_cleanup=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse_args().with_env_fallbacks();
    init_tracing(args.verbose);

    let runner = Runner::new(args);
    if let Err(e) = runner.run().await {
        runner.output().error(&e.to_string());
        std::process::exit(1);
    }
}
