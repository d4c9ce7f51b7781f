use std::error::Error;

use sse_bridge::stream::client::SseClient;

fn main() -> Result<(), Box<dyn Error>> {
    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/events".to_string());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = SseClient::new()?;
        let subscription = client.subscribe_with_errors(
            endpoint,
            |payload| println!("event: {payload}"),
            |err| eprintln!("stream error: {err}"),
        );

        tokio::signal::ctrl_c().await?;
        subscription.close();
        Ok::<(), Box<dyn Error>>(())
    })
}
