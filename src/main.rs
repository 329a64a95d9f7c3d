/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use clap::Parser;
use host_telemetry::{
    load_server_config, validate_server_config, ServerConfig, ServerConfigBuilder,
    ServiceContainer,
};
use std::error::Error;
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "host-telemetry", version, about)]
struct Opt {
    /// TOML config file; command line flags override its values
    #[arg(long, env = "HOST_TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (e.g. 0.0.0.0:3001)
    #[arg(long)]
    listen: Option<String>,

    /// Directory whose subdirectories are listed as models
    #[arg(long)]
    model_dir: Option<String>,

    /// Block device whose free space is reported
    #[arg(long)]
    disk_device: Option<String>,

    /// Port snapshot cache window in milliseconds
    #[arg(long)]
    cache_ttl_ms: Option<u64>,

    /// Timeout for each external command in seconds
    #[arg(long)]
    command_timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Report missing external tools and exit
    #[arg(long)]
    check: bool,
}

impl Opt {
    fn into_config(self) -> Result<ServerConfig, Box<dyn Error>> {
        let base = match &self.config {
            Some(path) => load_server_config(path)?,
            None => ServerConfig::default(),
        };

        let mut builder = ServerConfigBuilder::from_config(base);
        if let Some(listen) = self.listen {
            builder = builder.listen_addr(listen);
        }
        if let Some(dir) = self.model_dir {
            builder = builder.model_dir(dir);
        }
        if let Some(device) = self.disk_device {
            builder = builder.disk_device(device);
        }
        if let Some(ttl) = self.cache_ttl_ms {
            builder = builder.port_cache_ttl_ms(ttl);
        }
        if let Some(secs) = self.command_timeout {
            builder = builder.command_timeout_secs(secs);
        }
        if self.verbose {
            builder = builder.verbose(true);
        }

        let config = builder.build();
        validate_server_config(&config)?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {e}");
    }
    log::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::parse();
    let check_only = opt.check;
    let config = opt.into_config()?;

    init_logging(config.verbose);

    let container = ServiceContainer::new(config.clone());

    let missing = container.validate_dependencies().await?;
    if check_only {
        if missing.is_empty() {
            println!("All external tools are available");
        } else {
            println!("Missing external tools: {}", missing.join(", "));
        }
        return Ok(());
    }
    if !missing.is_empty() {
        log::warn!("missing external tools: {}", missing.join(", "));
    }

    // SAFETY: geteuid has no preconditions and cannot fail
    if unsafe { libc::geteuid() } != 0 {
        log::warn!("not running as root; netstat cannot attribute sockets owned by other users");
    }

    let app = container.create_router()?;
    let listener = TcpListener::bind(&config.listen_addr).await?;

    log::info!(
        "host-telemetry {} listening on http://{} (models: {}, port cache: {}ms)",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr,
        config.model_dir,
        config.port_cache_ttl_ms
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
