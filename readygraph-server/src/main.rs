// Copyright 2025 Readygraph (https://github.com/readygraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use clap::Parser;
use readygraph_server::{config::ServerConfig, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long, env = "READYGRAPH_HTTP_ADDR")]
    listen_addr: Option<String>,

    /// Subgraph cache directory (overrides config file)
    #[arg(long, env = "READYGRAPH_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Scoring checkpoint path (overrides config file)
    #[arg(long, env = "READYGRAPH_CHECKPOINT")]
    checkpoint: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config)?;

    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    if let Some(cache_dir) = args.cache_dir {
        config.cache.cache_dir = cache_dir;
    }
    if let Some(checkpoint) = args.checkpoint {
        config.model.checkpoint_path = checkpoint;
    }

    run_server(config).await
}
