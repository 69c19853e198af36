use anyhow::Result;
use clap::Parser;

/// This program facilitates the creation of an SSH tunnel between Rescale jobs or Workstations.
///
/// It creates a temporary SSH keypair, uploads the temporary private key to Rescale job 1
/// (--job1) and adds the temporary public key to ~/.ssh/authorized_keys on Rescale job 2
/// (--job2). It then creates a shell script called ~/create_ssh_tunnel.sh on job 1 that
/// creates an SSH tunnel from job 1 to job 2.
#[derive(Parser, Debug)]
#[clap(name = "tunnel-maker", version)]
struct Cli {
    #[clap(flatten)]
    command: tunnel::cli::CreateTunnel,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .format_level(true)
        .format_module_path(false)
        .format_indent(Some(4))
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()?;

    let cli = Cli::parse();
    cli.command.run()?;

    log::info!("DONE");
    Ok(())
}
