//! Command-line interface for axebar.
//!
//! Polls the device once and manages the stored device address. Shares
//! the address file with the daemon, so changes here are picked up on the
//! daemon's next tick.

use std::env;

use anyhow::{Result, bail};

use axebar::config::{AddressSource, EnvOverride, FileAddressStore, MonitorConfig};
use axebar::device::{DeviceAddress, DeviceClient, StatusSource};
use axebar::status::{ConnectionState, DisplayStrings};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: axebar-cli <command>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  status [--json]       Poll the device once");
        eprintln!("  address               Show the configured device address");
        eprintln!("  set-address <host>    Store the device address");
        eprintln!("  clear-address         Forget the device address");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  AXEBAR_DEVICE         Device address, overrides the stored one");
        eprintln!("  AXEBAR_ADDRESS_FILE   Address file location");
        std::process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "status" => cmd_status(args.get(2).map(String::as_str) == Some("--json")).await?,
        "address" => cmd_address()?,
        "set-address" => match args.get(2) {
            Some(host) => cmd_set_address(host)?,
            None => bail!("set-address needs a host, e.g. 192.168.1.42"),
        },
        "clear-address" => cmd_clear_address()?,
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Poll the device once and print what the monitor would show.
async fn cmd_status(json: bool) -> Result<()> {
    let config = MonitorConfig::from_env()?;
    let addresses = EnvOverride::new(FileAddressStore::from_env_or_default()?);

    let state = match addresses.address().as_deref().and_then(DeviceAddress::parse) {
        Some(address) => {
            let client = DeviceClient::new(config.request_timeout)?;
            ConnectionState::from_outcome(client.fetch_status(&address).await)
        }
        None => ConnectionState::Unconfigured,
    };
    let display = DisplayStrings::from_state(&state, &config.thresholds, config.hashrate_divisor);

    if json {
        println!("{}", serde_json::to_string_pretty(&display)?);
        return Ok(());
    }

    println!("{}", display.status_line);
    println!("State:    {}", display.detail);
    if state.metrics().is_some() {
        println!("Model:    {}", display.model);
        println!("Hashrate: {} TH/s", display.hashrate);
        println!("ASIC:     {}", display.asic_temp);
        println!("VR:       {}", display.vr_temp);
        println!("Freq:     {}", display.frequency);
        println!("Voltage:  {}", display.core_voltage);
    }

    Ok(())
}

fn cmd_address() -> Result<()> {
    let store = FileAddressStore::from_env_or_default()?;
    match EnvOverride::new(store.clone()).address() {
        Some(address) => println!("{address}"),
        None => println!("(none)"),
    }
    println!("Stored in: {}", store.path().display());
    Ok(())
}

fn cmd_set_address(host: &str) -> Result<()> {
    if DeviceAddress::parse(host).is_none() {
        bail!("not a valid device address: {host:?}");
    }

    let store = FileAddressStore::from_env_or_default()?;
    store.set(Some(host))?;
    println!("Device address set to {}", host.trim());
    Ok(())
}

fn cmd_clear_address() -> Result<()> {
    let store = FileAddressStore::from_env_or_default()?;
    store.set(None)?;
    println!("Device address cleared");
    Ok(())
}
