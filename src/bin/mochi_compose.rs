//! Mochi Compose
//!
//! Builds a small demo scene (a desktop, two overlapping shadowed windows
//! and a color overlay band), renders one frame and writes the result:
//! the raw byte stream, the byte stream with escapes made visible, or a
//! JSON snapshot of the composed terminal surface.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use mochi_tui::core::{Attributes, Cell, Color, Rect, RenderFlags, Size};
use mochi_tui::{CapabilityTable, Compositor, OutputEngine, RenderConfig, Snapshot, SurfaceId};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut cols = 80usize;
    let mut rows = 24usize;
    let mut terminal: Option<String> = None;
    let mut config_file: Option<PathBuf> = None;
    let mut output_format = OutputFormat::Escaped;
    let mut show_help = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--cols" => {
                i += 1;
                if i < args.len() {
                    cols = args[i].parse().unwrap_or(80);
                }
            },
            "-r" | "--rows" => {
                i += 1;
                if i < args.len() {
                    rows = args[i].parse().unwrap_or(24);
                }
            },
            "-t" | "--terminal" => {
                i += 1;
                if i < args.len() {
                    terminal = Some(args[i].clone());
                }
            },
            "--config" => {
                i += 1;
                if i < args.len() {
                    config_file = Some(PathBuf::from(&args[i]));
                }
            },
            "--raw" => output_format = OutputFormat::Raw,
            "--escaped" => output_format = OutputFormat::Escaped,
            "-j" | "--json" => output_format = OutputFormat::Json,
            "-h" | "--help" => show_help = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return ExitCode::FAILURE;
            },
        }
        i += 1;
    }

    if show_help {
        print_help();
        return ExitCode::SUCCESS;
    }

    let mut config = match &config_file {
        Some(path) => match RenderConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error reading config '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            },
        },
        None => RenderConfig::load_or_default(),
    };
    if let Some(name) = terminal {
        config.terminal = name;
    }

    let caps = match CapabilityTable::load(&config.terminal) {
        Ok(caps) => caps,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };
    if let Err(e) = caps.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let size = Size::new(cols.max(20), rows.max(10));
    let mut compositor = Compositor::new(size);
    let focus = build_scene(&mut compositor);

    let mut engine = OutputEngine::new(Vec::new(), Arc::new(caps), &config, size);
    engine.apply_palette();
    engine.clear_terminal();
    compositor.update();
    let frame = engine
        .update_terminal(compositor.terminal_mut())
        .and_then(|()| {
            engine.place_cursor(compositor.input_cursor(focus));
            engine.restore_terminal()
        });
    if let Err(e) = frame {
        eprintln!("Render error: {}", e);
        return ExitCode::FAILURE;
    }
    let bytes = engine.into_writer();
    tracing::info!("Rendered {}x{} frame in {} bytes", size.width, size.height, bytes.len());

    let mut stdout = io::stdout().lock();
    let written = match output_format {
        OutputFormat::Raw => stdout.write_all(&bytes),
        OutputFormat::Escaped => writeln!(stdout, "{}", escape(&bytes)),
        OutputFormat::Json => match Snapshot::from_surface(compositor.terminal()).to_json() {
            Ok(json) => writeln!(stdout, "{}", json),
            Err(e) => {
                eprintln!("Error serializing snapshot: {}", e);
                return ExitCode::FAILURE;
            },
        },
    };
    if let Err(e) = written.and_then(|()| stdout.flush()) {
        eprintln!("Error writing output: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Populate the compositor. Returns the window holding the input cursor.
fn build_scene(compositor: &mut Compositor) -> SurfaceId {
    let size = compositor.size();
    compositor
        .desktop_mut()
        .fill(Cell::styled('░', Color::LIGHT_GRAY, Color::BLUE, Attributes::empty()));

    let shadow = Size::new(2, 1);
    let back = compositor.create_window(Rect::new(2, 1, 34, 7), shadow);
    if let Some(window) = compositor.surface_mut(back) {
        window.set_blank(Cell::blank(Color::BLACK, Color::LIGHT_GRAY));
        window.clear();
        draw_frame(window.width(), window.height(), |x, y, c| {
            window.write(x, y, Cell::styled(c, Color::WHITE, Color::LIGHT_GRAY, Attributes::BOLD));
        });
        window.set_color(Color::BLACK, Color::LIGHT_GRAY);
        window.set_cursor(2, 2);
        window.print_str("Layered rendering");
        window.set_cursor(2, 3);
        window.print_styled("漢字 wide glyphs", Color::RED, Color::LIGHT_GRAY, Attributes::empty());
        window.draw_shadow(Color::DARK_GRAY, Color::BLACK);
    }
    compositor.show(back);

    let front = compositor.create_window(Rect::new(24, 5, 36, 9), shadow);
    if let Some(window) = compositor.surface_mut(front) {
        window.set_blank(Cell::blank(Color::WHITE, Color::CYAN));
        window.clear();
        draw_frame(window.width(), window.height(), |x, y, c| {
            window.write(x, y, Cell::styled(c, Color::YELLOW, Color::CYAN, Attributes::empty()));
        });
        window.set_color(Color::WHITE, Color::CYAN);
        window.set_cursor(2, 2);
        window.print_str("Name: ");
        window.print_styled("mochi", Color::BLACK, Color::LIGHT_GRAY, Attributes::UNDERLINE);
        window.set_input_cursor(13, 2);
        window.draw_shadow(Color::DARK_GRAY, Color::BLACK);
    }
    compositor.show(front);

    let band = compositor.create_window(Rect::new(0, (size.height as i32) - 3, size.width, 1), Size::new(0, 0));
    if let Some(window) = compositor.surface_mut(band) {
        window.fill(Cell::blank(Color::YELLOW, Color::RED).with_flags(RenderFlags::COLOR_OVERLAY));
    }
    compositor.show(band);

    front
}

/// Box-drawing border around a `width` x `height` area
fn draw_frame(width: usize, height: usize, mut put: impl FnMut(usize, usize, char)) {
    if width < 2 || height < 2 {
        return;
    }
    for x in 1..width - 1 {
        put(x, 0, '─');
        put(x, height - 1, '─');
    }
    for y in 1..height - 1 {
        put(0, y, '│');
        put(width - 1, y, '│');
    }
    put(0, 0, '┌');
    put(width - 1, 0, '┐');
    put(0, height - 1, '└');
    put(width - 1, height - 1, '┘');
}

/// Byte stream with control characters spelled out
fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '\x1b' => out.push_str("\\e"),
                '\r' => out.push_str("\\r"),
                '\n' => out.push_str("\\n"),
                c if c.is_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
                c => out.push(c),
            }
        }
        for b in chunk.invalid() {
            out.push_str(&format!("\\x{:02x}", b));
        }
    }
    out
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Raw,
    Escaped,
    Json,
}

fn print_help() {
    println!("Mochi Compose");
    println!();
    println!("Usage: mochi-compose [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --cols <N>         Set terminal width (default: 80)");
    println!("  -r, --rows <N>         Set terminal height (default: 24)");
    println!("  -t, --terminal <NAME>  Capability preset or JSON table path");
    println!("      --config <PATH>    Read render configuration from PATH");
    println!("      --raw              Write the raw byte stream");
    println!("      --escaped          Write the byte stream with visible escapes (default)");
    println!("  -j, --json             Write a JSON snapshot of the composed screen");
    println!("  -h, --help             Show this help message");
    println!();
    println!("Examples:");
    println!("  mochi-compose --raw");
    println!("  mochi-compose -t vt100 -c 40 -r 12");
    println!("  mochi-compose --json > frame.json");
}
