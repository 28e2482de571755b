use probe_http_core::{Client, ClientConfig, RequestOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // ---- 1) Configure the client -------------------------------------------------
    let config = ClientConfig::builder()
        .user_agent("probe-http-core-demo/0.1")
        .default_header("Accept", "*/*")
        .max_concurrency(10)
        .build()?;
    let client = Client::new(config)?;

    // ---- 2) Wire up observers ----------------------------------------------------
    client.on_complete(|response| {
        println!("[on_complete] {} -> {}", response.url, response.code);
    });
    client.on_new_cookies(|cookies, response| {
        println!(
            "[on_new_cookies] {} new cookie(s) from {}",
            cookies.len(),
            response.url
        );
    });

    // ---- 3) Queue a handful of requests -------------------------------------------
    for path in ["/", "/robots.txt", "/does-not-exist-xyz"] {
        let mut options = RequestOptions::default();
        options.update_cookies = true;
        client
            .get(&format!("https://example.com{path}"), options, None)
            .await?;
    }

    // ---- 4) Drain the burst and print statistics ----------------------------------
    client.run().await;
    for (name, value) in client.statistics() {
        println!("{name} = {value}");
    }

    Ok(())
}
