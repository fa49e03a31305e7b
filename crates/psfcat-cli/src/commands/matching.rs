use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use psfcat_core::catalog::Catalog;
use psfcat_core::consts::DEFAULT_MATCH_TOLERANCE;
use psfcat_core::crossmatch::{resolve_each, Resolution};

#[derive(Args)]
pub struct MatchArgs {
    /// Catalog whose rows are looked up (A)
    pub a: PathBuf,

    /// Catalog searched for partners (B)
    pub b: PathBuf,

    /// Per-axis tolerance in pixels
    #[arg(long, default_value_t = DEFAULT_MATCH_TOLERANCE)]
    pub tolerance: f64,

    /// Print every matched pair
    #[arg(long)]
    pub pairs: bool,
}

/// Cross-match two catalogs and report how A rows resolved against B.
pub fn run(args: &MatchArgs) -> Result<()> {
    let a = Catalog::load(&args.a)
        .with_context(|| format!("Failed to read catalog {}", args.a.display()))?;
    let b = Catalog::load(&args.b)
        .with_context(|| format!("Failed to read catalog {}", args.b.display()))?;

    let resolutions = resolve_each(a.rows(), b.rows(), args.tolerance);
    let mut unique = 0;
    let mut ambiguous = 0;
    let mut unmatched = 0;
    for (ia, res) in resolutions.iter().enumerate() {
        match res {
            Resolution::Unique(ib) => {
                unique += 1;
                if args.pairs {
                    println!("{:>8} {:>8}", a.rows()[ia].number, b.rows()[*ib].number);
                }
            }
            Resolution::Ambiguous(_) => ambiguous += 1,
            Resolution::Unmatched => unmatched += 1,
        }
    }

    println!(
        "\n{} rows of A against {} rows of B (tolerance {} px)",
        a.len(),
        b.len(),
        args.tolerance
    );
    println!("  Matched:   {unique}");
    println!("  Ambiguous: {ambiguous}");
    println!("  Unmatched: {unmatched}");
    Ok(())
}
