/// WorldScan Terminal Demo - Scan a synthetic room, then review it
///
/// Runs a scripted depth-sensing session through the scan controller, stops
/// it, and hands the captured world map to the terminal review view.
/// Controls:
///   - WASD / Arrow Keys: Orbit the camera
///   - +/-: Zoom
///   - R/C: Rebuild / clear the review scene
///   - Q/ESC: Quit

use env_logger::Env;
use log::info;
use std::io;
use std::sync::mpsc;
use worldscan_core::{ReviewController, ScanController, ScanOptions};
use worldscan_terminal::{SimulatedSession, TerminalApp};

const SCAN_FRAMES: usize = 90;

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let (events, receiver) = mpsc::channel();
    let mut scanner = ScanController::new(SimulatedSession::new(events), ScanOptions::default());
    scanner.start();

    for _ in 0..SCAN_FRAMES {
        if !scanner.session_mut().step() {
            break;
        }
        scanner.drain(&receiver);
    }
    info!("scan produced {} mesh nodes", scanner.scene().len());

    let world_map = scanner.stop();
    std::thread::sleep(std::time::Duration::from_secs(1));

    let mut app = TerminalApp::new(ReviewController::new(world_map))?;
    app.run()?;

    println!("Thank you for using WorldScan!");
    Ok(())
}
