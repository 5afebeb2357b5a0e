// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A few frames of a tiny game loop driven through `proxima_positions`.
//!
//! Players walk right into a wall of crates; every frame the loop asks which players touch
//! a crate, which are near a coin, and pushes colliding players back out of the crates.
//!
//! Run:
//! - `RUST_LOG=proxima_positions=trace cargo run -p proxima_demos --example collision_frame`

use std::cell::Cell;
use std::rc::Rc;

use kurbo::{Point, Rect, Vec2};
use proxima_polygon::ConvexPolygon;
use proxima_positions::{
    ObjectHandle, ObjectId, PositionsConfig, SpatialQueryEngine, keep_only_objects_from_ids,
    object_ids_from_lists,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A game object with a rectangular hitbox.
#[derive(Debug)]
struct Sprite {
    id: ObjectId,
    kind: &'static str,
    bounds: Cell<Rect>,
}

impl Sprite {
    fn new(id: u64, kind: &'static str, rect: Rect) -> Rc<Self> {
        Rc::new(Self {
            id: ObjectId(id),
            kind,
            bounds: Cell::new(rect),
        })
    }

    fn shift(&self, delta: Vec2) {
        self.bounds.set(self.bounds.get() + delta);
    }
}

impl ObjectHandle for Sprite {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_tag(&self) -> &str {
        self.kind
    }

    fn position(&self) -> Point {
        self.bounds.get().origin()
    }

    fn center(&self) -> Point {
        self.bounds.get().center()
    }

    fn hitboxes(&self) -> Vec<ConvexPolygon> {
        vec![ConvexPolygon::from_rect(self.bounds.get())]
    }

    fn aabb(&self) -> Rect {
        self.bounds.get()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine = SpatialQueryEngine::with_config(PositionsConfig::default())?;

    let players: Vec<Rc<Sprite>> = (0..3_u32)
        .map(|i| {
            let row = 40.0 * f64::from(i);
            let rect = Rect::new(0.0, row, 16.0, row + 16.0);
            Sprite::new(u64::from(i), "Player", rect)
        })
        .collect();
    let crates: Vec<Rc<Sprite>> = (0..3_u32)
        .map(|i| {
            let row = 40.0 * f64::from(i);
            let rect = Rect::new(40.0, row, 60.0, row + 20.0);
            Sprite::new(10 + u64::from(i), "Crate", rect)
        })
        .collect();
    let coin = Sprite::new(100, "Coin", Rect::new(30.0, 85.0, 36.0, 91.0));

    for sprite in players.iter().chain(&crates).chain([&coin]) {
        engine.mark_object_as_created(Rc::clone(sprite));
    }

    for frame in 0..6 {
        for (speed, p) in (4_u8..).zip(&players) {
            p.shift(Vec2::new(f64::from(speed), 0.0));
            engine.mark_object_as_dirty(Rc::clone(p));
        }
        let stats = engine.update();
        info!(frame, ?stats, "frame start");

        let mut touching = object_ids_from_lists([players.as_slice()]);
        let mut obstacles = object_ids_from_lists([crates.as_slice()]);
        if engine.collision_test(&mut touching, &mut obstacles, false, true) {
            let mut colliding = players.clone();
            keep_only_objects_from_ids([&mut colliding], &touching);
            let names: Vec<u64> = colliding.iter().map(|p| p.id().0).collect();
            info!(frame, players = ?names, crates = obstacles.len(), "players hit a crate");
        }

        let mut near = object_ids_from_lists([players.as_slice()]);
        let mut coins = object_ids_from_lists([std::slice::from_ref(&coin)]);
        if engine.distance_test(&mut near, &mut coins, 8.0, false) {
            info!(frame, players = near.len(), "a player is next to the coin");
        }

        let pushers = object_ids_from_lists([players.as_slice()]);
        let walls = object_ids_from_lists([crates.as_slice()]);
        for separation in engine.separate_objects(&pushers, &walls, true) {
            if let Some(p) = players.iter().find(|p| p.id() == separation.object_id) {
                p.shift(separation.delta);
                info!(
                    frame,
                    player = %separation.object_id,
                    delta = ?separation.delta,
                    "pushed back"
                );
            }
        }
    }

    let counters = engine.counters();
    info!(
        types = counters.type_index_count,
        objects = counters.object_position_count,
        "done"
    );
    Ok(())
}
