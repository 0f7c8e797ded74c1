//! Compositor benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mochi_tui::core::{Attributes, Cell, Color, Point, Rect, RenderFlags, Size};
use mochi_tui::{Compositor, SurfaceId};

const SIZE: Size = Size { width: 80, height: 24 };

/// Desktop plus a handful of overlapping windows, one of them an overlay
fn scene() -> (Compositor, Vec<SurfaceId>) {
    let mut comp = Compositor::new(SIZE);
    comp.desktop_mut()
        .fill(Cell::styled('░', Color::LIGHT_GRAY, Color::BLUE, Attributes::empty()));

    let mut ids = Vec::new();
    for i in 0..6 {
        let rect = Rect::new(i * 8, i * 2, 30, 10);
        let id = comp.create_window(rect, Size::new(2, 1));
        if let Some(window) = comp.surface_mut(id) {
            window.fill(Cell::blank(Color::BLACK, Color::Indexed(i as u8 + 2)));
            window.set_cursor(1, 1);
            window.print_str("The quick brown fox jumps");
            window.draw_shadow(Color::DARK_GRAY, Color::BLACK);
        }
        comp.show(id);
        ids.push(id);
    }

    let band = comp.create_window(Rect::new(0, 12, 80, 2), Size::new(0, 0));
    if let Some(window) = comp.surface_mut(band) {
        window.fill(Cell::blank(Color::YELLOW, Color::RED).with_flags(RenderFlags::COLOR_OVERLAY));
    }
    comp.show(band);
    comp.update();
    (comp, ids)
}

fn bench_full_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositor");
    group.throughput(Throughput::Elements(SIZE.area() as u64));

    let (mut comp, _) = scene();
    group.bench_function("full_compose", |b| {
        b.iter(|| {
            comp.compose(black_box(Rect::from_size(SIZE)));
        })
    });

    group.finish();
}

fn bench_move_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositor");

    let (mut comp, ids) = scene();
    let mut step = 0;
    group.bench_function("move_window", |b| {
        b.iter(|| {
            step = (step + 1) % 40;
            comp.move_window(ids[2], Point::new(step, 6));
        })
    });

    group.finish();
}

fn bench_incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositor");

    let (mut comp, ids) = scene();
    let mut tick = 0u32;
    group.bench_function("update_one_line", |b| {
        b.iter(|| {
            tick = tick.wrapping_add(1);
            if let Some(window) = comp.surface_mut(ids[5]) {
                window.set_cursor(1, 3);
                window.print_str(&format!("tick {:08}", tick));
            }
            comp.update();
            black_box(comp.terminal().has_changes())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_full_compose,
    bench_move_window,
    bench_incremental_update
);

criterion_main!(benches);
