extern crate clap;
extern crate crossbeam;
extern crate env_logger;
#[macro_use]
extern crate failure;
extern crate image;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate mandelfield;
extern crate num;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use image::pnm::PNMEncoder;
use image::pnm::{PNMSubtype, SampleEncoding};
use image::ColorType;
use num::Complex;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use mandelfield::capability;
use mandelfield::{Field, Kernel, KernelVariant, Position, Session, SessionConfig};

mod bench;
mod colors;

use colors::Colorizer;

type Result<T> = std::result::Result<T, failure::Error>;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f32>> {
    match parse_pair(s, ',') {
        Some((re, im)) => Some(Complex { re, im }),
        None => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> std::result::Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> std::result::Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_name<T: FromStr>(s: &str, what: &str) -> std::result::Result<(), String> {
    match T::from_str(s) {
        Ok(_) => Ok(()),
        Err(_) => Err(format!("unknown {} `{}`", what, s)),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const CENTER: &str = "center";
const SPAN: &str = "span";
const ITERATIONS: &str = "iterations";
const KERNEL: &str = "kernel";
const COLORIZER: &str = "colorizer";
const WINDOW: &str = "window";
const VARIATION: &str = "variation";
const FRAMES: &str = "frames";
const SWITCH_EVERY: &str = "switch-every";
const PAN: &str = "pan";
const ZOOM: &str = "zoom";

fn viewport_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        Arg::with_name(SIZE)
            .long(SIZE)
            .short("s")
            .takes_value(true)
            .default_value("1024x768")
            .validator(|s| validate_pair::<usize>(&s, 'x', "Could not parse grid size"))
            .help("Grid size, WIDTHxHEIGHT"),
        Arg::with_name(CENTER)
            .long(CENTER)
            .short("c")
            .takes_value(true)
            .allow_hyphen_values(true)
            .default_value("0,0")
            .validator(|s| validate_pair::<f32>(&s, ',', "Could not parse center"))
            .help("Center of the view, RE,IM"),
        Arg::with_name(SPAN)
            .long(SPAN)
            .short("w")
            .takes_value(true)
            .default_value("2")
            .validator(|s| {
                validate_range(
                    &s,
                    std::f32::MIN_POSITIVE,
                    std::f32::MAX,
                    "Could not parse span",
                    "Span must be positive",
                )
            })
            .help("Width of the view along the real axis"),
        Arg::with_name(ITERATIONS)
            .long(ITERATIONS)
            .short("i")
            .takes_value(true)
            .default_value("256")
            .validator(|s| {
                validate_range(
                    &s,
                    0,
                    1_000_000,
                    "Could not parse iteration count",
                    "Iteration count must be between 0 and 1000000",
                )
            })
            .help("Iteration cap per point"),
        Arg::with_name(KERNEL)
            .long(KERNEL)
            .short("k")
            .takes_value(true)
            .validator(|s| validate_name::<KernelVariant>(&s, "kernel"))
            .help("Kernel to use; the best usable one if omitted"),
    ]
}

fn colorizer_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name(COLORIZER)
        .long(COLORIZER)
        .short("p")
        .takes_value(true)
        .default_value("grayscale")
        .possible_values(&colors::NAMES)
        .help("Palette for image output")
}

fn args<'a>() -> ArgMatches<'a> {
    App::new("mandelfield")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Escape-time Mandelbrot fields")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("kernels")
                .about("List kernels and whether they can fill a grid on this CPU")
                .args(&viewport_args()),
        )
        .subcommand(
            SubCommand::with_name("render")
                .about("Compute one field and write it as an image")
                .args(&viewport_args())
                .arg(colorizer_arg())
                .arg(
                    Arg::with_name(OUTPUT)
                        .required(true)
                        .long(OUTPUT)
                        .short("o")
                        .takes_value(true)
                        .help("Output file"),
                ),
        )
        .subcommand(
            SubCommand::with_name("bench")
                .about("Time passes until they are stable")
                .args(&viewport_args())
                .arg(
                    Arg::with_name(WINDOW)
                        .long(WINDOW)
                        .short("m")
                        .takes_value(true)
                        .default_value("32")
                        .validator(|s| {
                            validate_range(
                                &s,
                                2,
                                100_000,
                                "Could not parse window",
                                "Window must be at least 2",
                            )
                        })
                        .help("Number of timings to judge stability on"),
                )
                .arg(
                    Arg::with_name(VARIATION)
                        .long(VARIATION)
                        .short("v")
                        .takes_value(true)
                        .default_value("1.05")
                        .validator(|s| {
                            validate_range(
                                &s,
                                1.0,
                                std::f32::MAX,
                                "Could not parse variation",
                                "Variation must be a finite number of at least 1",
                            )
                        })
                        .help("Largest max/min timing ratio counted as stable"),
                ),
        )
        .subcommand(
            SubCommand::with_name("view")
                .about("Run a session headless at ~60 frames per second")
                .args(&viewport_args())
                .arg(colorizer_arg())
                .arg(
                    Arg::with_name(FRAMES)
                        .long(FRAMES)
                        .short("f")
                        .takes_value(true)
                        .default_value("120")
                        .validator(|s| {
                            validate_range(&s, 1u64, 1_000_000, "Could not parse frames", "Frames must be positive")
                        })
                        .help("Number of display frames to run"),
                )
                .arg(
                    Arg::with_name(SWITCH_EVERY)
                        .long(SWITCH_EVERY)
                        .takes_value(true)
                        .validator(|s| {
                            validate_range(&s, 1u64, 1_000_000, "Could not parse frame count", "Must be positive")
                        })
                        .help("Cycle to the next kernel every N frames"),
                )
                .arg(
                    Arg::with_name(PAN)
                        .long(PAN)
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("0,0")
                        .validator(|s| validate_pair::<f32>(&s, ',', "Could not parse pan"))
                        .help("Pan steps applied every frame, DX,DY"),
                )
                .arg(
                    Arg::with_name(ZOOM)
                        .long(ZOOM)
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("0")
                        .validator(|s| validate_range(&s, -8, 8, "Could not parse zoom", "Zoom must be between -8 and 8"))
                        .help("Zoom steps applied every frame; positive zooms in"),
                )
                .arg(
                    Arg::with_name(OUTPUT)
                        .long(OUTPUT)
                        .short("o")
                        .takes_value(true)
                        .help("Write the last frame to this file"),
                ),
        )
        .get_matches()
}

fn value<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| format_err!("missing --{}", name))
}

fn parsed<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    T::from_str(value(matches, name)?).map_err(|_| format_err!("could not parse --{}", name))
}

fn session_config(matches: &ArgMatches) -> Result<SessionConfig> {
    let (grid_width, grid_height) =
        parse_pair(value(matches, SIZE)?, 'x').ok_or_else(|| format_err!("Error parsing grid size"))?;
    let center = parse_complex(value(matches, CENTER)?).ok_or_else(|| format_err!("Error parsing center"))?;
    Ok(SessionConfig {
        grid_width,
        grid_height,
        max_iterations: parsed(matches, ITERATIONS)?,
        position: Position {
            center,
            span: parsed(matches, SPAN)?,
        },
        kernel: matches.value_of(KERNEL).map(String::from),
    })
}

fn write_image(outfile: &str, field: &Field, max_steps: u32, colorizer: Colorizer) -> Result<()> {
    let pixels = colorizer.paint(field.counts(), max_steps);
    let output = File::create(Path::new(outfile))?;
    let mut encoder = PNMEncoder::new(output).with_subtype(PNMSubtype::Pixmap(SampleEncoding::Binary));
    encoder.encode(
        &pixels[..],
        field.width() as u32,
        field.height() as u32,
        ColorType::RGB(8),
    )?;
    Ok(())
}

fn list_kernels(matches: &ArgMatches) -> Result<()> {
    let viewport = session_config(matches)?.viewport()?;
    let usable = capability::usable(&viewport);
    for kernel in KernelVariant::ALL.iter() {
        let status = match kernel.check(&viewport) {
            Ok(()) => "usable".to_string(),
            Err(e) => e.to_string(),
        };
        println!("{:<8} {} lanes  {}", kernel.name(), kernel.lanes(), status);
    }
    println!("{} of {} usable at this size", usable.len(), KernelVariant::ALL.len());
    Ok(())
}

fn render(matches: &ArgMatches) -> Result<()> {
    let config = session_config(matches)?;
    let viewport = config.viewport()?;
    let kernel = capability::select(config.kernel.as_ref().map(String::as_str), &viewport)?;
    let colorizer: Colorizer = value(matches, COLORIZER)?.parse()?;

    let field = kernel.compute(&viewport);
    info!("rendered {}x{} with kernel `{}`", field.width(), field.height(), kernel);
    write_image(value(matches, OUTPUT)?, &field, viewport.max_iterations(), colorizer)
}

fn benchmark(matches: &ArgMatches) -> Result<()> {
    let config = session_config(matches)?;
    let viewport = config.viewport()?;
    let kernel = capability::select(config.kernel.as_ref().map(String::as_str), &viewport)?;
    let window: usize = parsed(matches, WINDOW)?;
    let variation: f32 = parsed(matches, VARIATION)?;

    println!("Kernel: {}", kernel);
    println!("Measure window: {}", window);
    println!("Acceptable variation: {}", variation);

    let report = bench::run(&kernel, &viewport, window, variation);
    println!(
        "Done {} warmup runs and {} measurement runs",
        report.warmup, window
    );
    println!(
        "Time avg {:.4} ms, std dev {:.4} ms",
        report.mean, report.deviation
    );
    println!("Have {} outliers beyond 3 std dev", report.outliers);
    if report.outliers > window / 20 {
        println!("More than 5% of runs are outliers; the measurement is not trustworthy");
    }
    Ok(())
}

fn view(matches: &ArgMatches) -> Result<()> {
    let config = session_config(matches)?;
    let frames: u64 = parsed(matches, FRAMES)?;
    let switch_every: Option<u64> = match matches.value_of(SWITCH_EVERY) {
        Some(_) => Some(parsed(matches, SWITCH_EVERY)?),
        None => None,
    };
    let (dx, dy): (f32, f32) =
        parse_pair(value(matches, PAN)?, ',').ok_or_else(|| format_err!("Error parsing pan"))?;
    let zoom: i32 = parsed(matches, ZOOM)?;
    let colorizer: Colorizer = value(matches, COLORIZER)?.parse()?;

    let mut session = Session::start(&config)?;
    let ticker = crossbeam::channel::tick(Duration::from_millis(16));

    for frame_no in 1..=frames {
        ticker.recv()?;

        if dx != 0.0 || dy != 0.0 || zoom != 0 {
            let next = session.requested().panned(dx, dy).zoomed(zoom);
            if let Err(e) = session.request(next) {
                warn!("frame {}: staying put, {}", frame_no, e);
            }
        }
        if let Some(every) = switch_every {
            if frame_no % every == 0 {
                session.cycle()?;
            }
        }

        let kernel = session.kernel();
        let frame = session.frame();
        if let (true, Some(elapsed), Some(pos)) = (frame.fresh, frame.elapsed, frame.field.position()) {
            let ms = elapsed.as_secs_f32() * 1000.0;
            info!(
                "frame {:<5} {:>8.2} ms per pass, {:>7.2} fps  X {:<8.3} Y {:<8.3} S {:<8.3} kernel {}",
                frame_no,
                ms,
                1000.0 / ms,
                pos.center.re,
                pos.center.im,
                pos.span,
                kernel
            );
        }
    }

    if let Some(outfile) = matches.value_of(OUTPUT) {
        let max_steps = session.viewport().max_iterations();
        session.stop();
        write_image(outfile, session.frame().field, max_steps, colorizer)?;
    }
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("kernels", Some(sub)) => list_kernels(sub),
        ("render", Some(sub)) => render(sub),
        ("bench", Some(sub)) => benchmark(sub),
        ("view", Some(sub)) => view(sub),
        (other, _) => Err(format_err!("unknown command `{}`", other)),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("mandelfield: {}", e);
        for cause in e.iter_causes() {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
