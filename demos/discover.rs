//! Runs one discovery session and prints every paired pump it finds.
//!
//! The peripheral initiates pairing itself once it sees the advertised
//! SPP record, so all this program does is wait.

use std::sync::mpsc;
use std::time::Duration;

use pumplink::{BluetoothManager, Config};

fn main() -> pumplink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut manager = BluetoothManager::new(Config::default())?;
    println!("using adapter: {}", manager.adapter_name()?);
    println!("already paired: {:?}", manager.paired_addresses()?);

    let (stopped_tx, stopped_rx) = mpsc::channel();
    manager.start_discovery(
        "PumpLink",
        "pumplink",
        "SPP rendezvous channel",
        "123456",
        Duration::from_secs(60),
        move |reason| {
            let _ = stopped_tx.send(reason);
        },
        |address| println!("found paired pump: {}", address),
    )?;

    println!("discovering for 60 seconds, put the pump into pairing mode now");
    let reason = stopped_rx.recv().expect("discovery never reported a stop");
    println!("discovery finished: {}", reason);

    manager.shutdown();
    Ok(())
}
