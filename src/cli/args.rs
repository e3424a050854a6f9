use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    /// Input GDS layout.
    pub gds: PathBuf,

    /// Output SPICE netlist.
    pub spice: PathBuf,

    /// Path to TOML extraction configuration; the built-in sg13g2 profile is
    /// used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a debug GDS with one cell per extracted net.
    #[arg(long)]
    pub debug_gds: Option<PathBuf>,
}
