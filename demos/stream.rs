//! Connects to an already paired pump and dumps whatever it sends.
//!
//! Usage: stream <bluetooth-address>

use pumplink::{Address, BluetoothManager, Config};

fn main() -> pumplink::Result<()> {
    tracing_subscriber::fmt().init();

    let address: Address = std::env::args()
        .nth(1)
        .expect("usage: stream <bluetooth-address>")
        .parse()
        .expect("invalid Bluetooth address");

    let mut manager = BluetoothManager::new(Config::default())?;
    let device = manager.device(address);

    device.connect()?;
    println!(
        "connected to {} on channel {}",
        device.address(),
        device.channel()
    );

    let mut buffer = [0u8; 512];
    loop {
        let read = device.receive(&mut buffer)?;
        if read == 0 {
            println!("pump closed the stream");
            break;
        }
        println!("received {:02X?}", &buffer[..read]);
    }

    device.disconnect();
    manager.shutdown();
    Ok(())
}
