//! Command-line front end for the rustyblue stack.
//!
//! This binary is intentionally thin: HCI transport selection, CLI
//! argument parsing and bonding persistence are out of scope for the core
//! protocol engines and are left to the integrator.

fn main() {
    env_logger::init();
    log::info!("rustybluecli: core protocol engines live in the rustyblue library crate");
}
