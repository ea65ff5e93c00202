pub mod progress;

use crate::sim::SimConfig;

pub fn print_banner(config: &SimConfig) {
    println!("macsim-rs");
    println!(
        "  protocol {} | {} stations x {} packets | slot {} ms | loss {:.0}%",
        config.protocol,
        config.stations,
        config.packets_per_station,
        config.interval_ms,
        config.loss_probability * 100.0
    );
}
