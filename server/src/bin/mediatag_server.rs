#![deny(warnings)]

use {anyhow::Result, mediatag_server::Options, structopt::StructOpt, tracing::info};

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_timed();

    let options = Options::from_args();

    let pool = mediatag_server::open(&options.state_file).await?;

    info!("opened {}", options.state_file);

    mediatag_server::serve(pool, &options).await
}
