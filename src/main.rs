//! Bazaar Crafting Calculator
//!
//! Finds Hypixel SkyBlock recipes that are profitable to craft from bazaar
//! ingredients and sell back to the bazaar.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use bazaar_calculator::cli::{self, Cli};

fn main() -> Result<ExitCode> {
    cli::run(Cli::parse())
}
