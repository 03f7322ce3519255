use egui::{Pos2, Rect, Vec2, pos2, vec2};

fn coord(value: f32) -> u32 {
    (value.round() as i32 as u32) & 0xffff
}

pub(super) fn pack_point(point: Pos2) -> u32 {
    (coord(point.x) << 16) | coord(point.y)
}

pub(super) fn pack_size(size: Vec2) -> u32 {
    (coord(size.x) << 16) | coord(size.y)
}

pub(super) fn unpack_point(word: u32) -> Pos2 {
    pos2((word >> 16) as f32, (word & 0xffff) as f32)
}

pub(super) fn unpack_rect(position: u32, size: u32) -> Rect {
    Rect::from_min_size(
        unpack_point(position),
        vec2((size >> 16) as f32, (size & 0xffff) as f32),
    )
}

/// Window hit-test: the right and bottom edges are outside.
pub(super) fn contains_half_open(rect: Rect, point: Pos2) -> bool {
    point.x >= rect.min.x && point.y >= rect.min.y && point.x < rect.max.x && point.y < rect.max.y
}

/// The no-position zone is inclusive. A zero-sized zone is no zone at all.
pub(super) fn zone_contains(zone: Option<Rect>, point: Pos2) -> bool {
    zone.is_some_and(|zone| !is_empty_zone(zone) && zone.contains(point))
}

pub(super) fn is_empty_zone(zone: Rect) -> bool {
    zone.width() <= 0.0 && zone.height() <= 0.0
}

pub(super) fn moved_beyond(from: Pos2, to: Pos2, threshold: f32) -> bool {
    (to.x - from.x).abs() >= threshold || (to.y - from.y).abs() >= threshold
}

fn initial_icon_coord(view_coord: f32, view_size: f32, pointer: f32, icon_size: f32) -> f32 {
    let half = (icon_size / 2.0).floor();

    if icon_size >= view_size {
        return view_coord + ((view_size - icon_size) / 2.0).floor();
    }
    if pointer - half <= view_coord {
        view_coord
    } else if pointer + half >= view_coord + view_size {
        view_coord + view_size - icon_size
    } else {
        pointer - half
    }
}

/// Drag icon placement at drag start: centered on the pointer, kept inside the dragged view.
pub(super) fn initial_icon_pos(view: Rect, pointer: Pos2, icon_size: Vec2) -> Pos2 {
    pos2(
        initial_icon_coord(view.min.x, view.width(), pointer.x, icon_size.x),
        initial_icon_coord(view.min.y, view.height(), pointer.y, icon_size.y),
    )
}

/// Intermediate icon positions for the slide-back animation, ending exactly at `to`.
pub(super) fn slide_path(from: Pos2, to: Pos2, max_steps: usize) -> Vec<Pos2> {
    let distance = (to - from).abs().max_elem();
    let steps = (distance.round() as usize).min(max_steps);
    if steps == 0 {
        return vec![to];
    }

    let delta = (to - from) / steps as f32;
    let mut path: Vec<Pos2> = (0..steps).map(|i| from + delta * i as f32).collect();
    path.push(to);
    path
}
