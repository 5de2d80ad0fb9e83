//! Minimal driver for the greeter bridge.
//!
//! Builds a bridge around the scripted guest, greets the name given on
//! the command line, and prints whatever the guest alerted.

use hostbridge::{greeter_bridge, BridgeConfig};

fn main() {
    let name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("World"));

    let mut bridge = greeter_bridge(BridgeConfig::default()).expect("bridge setup");
    bridge.greet(&name).expect("greet");

    for alert in bridge.alerts() {
        println!("{}", alert);
    }
}
