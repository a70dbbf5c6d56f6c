//! Example: LE Scanning
//!
//! Takes over HCI device 0 through the user channel, scans for ten seconds
//! and prints every advertiser seen. Bring the device down first
//! (`hciconfig hci0 down`) and run with CAP_NET_ADMIN.

use hcilink::hci::ScanParameters;
use hcilink::{HciEngine, HciSocket};
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Opening HCI user channel for device 0...");
    let socket = HciSocket::open(0)?;
    let mut engine: HciEngine<HciSocket> = HciEngine::new(socket, (), ());

    engine.start()?;
    engine.init()?;
    if let Some(address) = engine.address() {
        println!("Controller address: {}", address);
    }

    engine.le_set_scan_parameters(&ScanParameters::default())?;
    engine.le_set_scan_enable(true, true)?;
    println!("Scanning for 10 seconds...");

    let start_time = Instant::now();
    while start_time.elapsed() < Duration::from_secs(10) {
        engine.poll()?;

        let report = *engine.advertising_report();
        if report.reported {
            println!(
                "{} ({:?}) RSSI {} dBm name {:?}",
                report.address,
                report.address_type,
                report.rssi,
                report.local_name()
            );
            engine.clear_advertising_report();
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    engine.le_set_scan_enable(false, false)?;
    println!("Stopped scanning");

    Ok(())
}
