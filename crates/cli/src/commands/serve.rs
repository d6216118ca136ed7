//! `evoweb serve` — Start the HTTP server.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("EvoWeb Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Engine:    {} ({})", config.engine.backend, config.engine.model_id);

    evoweb_gateway::start(config).await?;

    Ok(())
}
