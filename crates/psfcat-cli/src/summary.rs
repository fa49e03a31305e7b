use console::Style;
use psfcat_core::pipeline::config::RunConfig;
use psfcat_core::pipeline::BatchSummary;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    flagged: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            flagged: Style::new().red().bold(),
        }
    }
}

pub fn print_run_summary(config: &RunConfig, units: usize) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("psfcat Run"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(10)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Units"),
        s.value.apply_to(units)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Work dir"),
        s.path.apply_to(config.work.display())
    );
    if config.blacklist.enabled {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Blacklist"),
            s.path.apply_to(config.blacklist_file().display())
        );
    } else {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Blacklist"),
            s.disabled.apply_to("disabled")
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Find stars"),
        enabled(&s, config.use_findstars)
    );
    if config.single_ccd {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Units/exp"),
            s.value.apply_to("first only")
        );
    }
    println!();

    let r = &config.refine;
    println!("  {}", s.header.apply_to("Refinement"));
    print_cut(&s, "Mag cut", r.mag_cut, |v| {
        format!("{v:.1} mag (median of {} brightest)", r.nbright_stars)
    });
    print_cut(&s, "Max mag", r.max_mag, |v| format!("{v:.1}"));
    if r.use_tapebumps {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Tapebumps"),
            s.method.apply_to(format!("{} x FWHM", r.tapebump_extra))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Tapebumps"),
            s.disabled.apply_to("disabled")
        );
    }
    print_cut(&s, "Reserve", r.reserve, |v| {
        format!("{:.0}%", v * 100.0)
    });
    println!();

    match &config.psf_fitter {
        Some(tool) => println!(
            "  {:<14}{}",
            s.header.apply_to("PSF fitter"),
            s.method.apply_to(tool)
        ),
        None => println!(
            "  {:<14}{}",
            s.header.apply_to("PSF fitter"),
            s.disabled.apply_to("none")
        ),
    }
    println!();
}

pub fn print_batch_report(summary: &BatchSummary) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Units"));
    for report in &summary.reports {
        let stars = report
            .artifacts
            .star_fwhm
            .map(|f| format!("{:>5} stars  FWHM {:.2}", report.artifacts.nstars, f.median))
            .unwrap_or_else(|| format!("{:>5} stars", report.artifacts.nstars));
        if report.flags.is_empty() {
            println!(
                "    {:<20}{}",
                s.label.apply_to(&report.root),
                s.value.apply_to(stars)
            );
        } else {
            println!(
                "    {:<20}{}  {}",
                s.label.apply_to(&report.root),
                s.value.apply_to(stars),
                s.flagged.apply_to(format!("flag {}", report.flags.bits()))
            );
        }
        if let Some(ref err) = report.error {
            println!("      {}", s.disabled.apply_to(err));
        }
    }
    println!();

    let flagged = summary.flagged().count();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Processed"),
        s.value.apply_to(summary.reports.len())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Flagged"),
        if flagged > 0 {
            s.flagged.apply_to(flagged)
        } else {
            s.value.apply_to(flagged)
        }
    );
    if !summary.skipped.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Skipped"),
            s.disabled.apply_to(summary.skipped.len())
        );
    }
    if let Some(ref path) = summary.blacklist {
        println!(
            "  {:<14}{} {}",
            s.label.apply_to("Blacklisted"),
            s.value.apply_to(summary.blacklisted),
            s.path.apply_to(path.display())
        );
    }
    println!();
}

fn enabled(s: &Styles, on: bool) -> console::StyledObject<&'static str> {
    if on {
        s.method.apply_to("enabled")
    } else {
        s.disabled.apply_to("disabled")
    }
}

fn print_cut(s: &Styles, label: &str, value: f64, describe: impl Fn(f64) -> String) {
    if value > 0.0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to(label),
            s.value.apply_to(describe(value))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to(label),
            s.disabled.apply_to("disabled")
        );
    }
}
