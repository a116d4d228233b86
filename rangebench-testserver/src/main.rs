use std::net::SocketAddr;

use rangebench_testserver::{TestObject, TestServerConfig, TestServerStats};
use tokio::net::TcpListener;

const DEFAULT_OBJECT_SIZE: u64 = 10 * 1024 * 1024;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut config = TestServerConfig {
        token_ttl_secs: 3600,
        ..TestServerConfig::default()
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--object" => {
                let spec = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--object requires <id>[:<size>]"))?;
                let (id, size) = match spec.split_once(':') {
                    Some((id, size)) => (id.parse()?, size.parse()?),
                    None => (spec.parse()?, DEFAULT_OBJECT_SIZE),
                };
                config.objects.insert(id, TestObject::new(size));
            }
            "--token" => {
                let token = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--token requires a value"))?;
                config.stream_token = Some(token);
            }
            "-h" | "--help" => {
                eprintln!(
                    "rangebench-testserver\n\nUSAGE:\n  rangebench-testserver [--bind 127.0.0.1:0] [--object <id>[:<size>]]... [--token <token>]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = rangebench_testserver::router(config, TestServerStats::default());

    println!("HTTP_URL=http://{addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
