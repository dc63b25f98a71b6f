//! Background daemon front end for the rustyblue stack.
//!
//! Process supervision, socket activation and registry glue are out of
//! scope for the core protocol engines (see SPEC_FULL.md) and are left to
//! the integrator.

fn main() {
    env_logger::init();
    log::info!("rustyblued: core protocol engines live in the rustyblue library crate");
}
