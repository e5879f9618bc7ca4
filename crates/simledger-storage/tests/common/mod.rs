//! Toroidal Life-grid fixture shared by the integration tests.
#![allow(dead_code)]

use simledger_core::{AgentView, EntityView, ModelView, Value};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_db_path(prefix: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    path.push(format!(
        "{prefix}-{}-{}.duckdb",
        std::process::id(),
        timestamp
    ));
    path
}

pub struct LifeCell {
    pub id: i64,
    pub x: i64,
    pub y: i64,
    pub alive: bool,
}

impl EntityView for LifeCell {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "isAlive" => Some(self.alive.into()),
            "x" => Some(self.x.into()),
            "y" => Some(self.y.into()),
            _ => None,
        }
    }
}

impl AgentView for LifeCell {
    fn agent_id(&self) -> i64 {
        self.id
    }
}

/// Conway's Game of Life on a grid whose edges wrap around. The step
/// counter is incremented before any collection happens, matching the
/// scheduler convention the collector stamps rows against.
pub struct LifeGrid {
    width: i64,
    height: i64,
    steps: u64,
    cells: Vec<LifeCell>,
}

impl LifeGrid {
    pub fn new(width: i64, height: i64) -> Self {
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(LifeCell {
                    id: y * width + x,
                    x,
                    y,
                    // Deterministic seed: one vertical line, a blinker on
                    // small grids.
                    alive: x == width / 2,
                });
            }
        }
        Self {
            width,
            height,
            steps: 0,
            cells,
        }
    }

    pub fn step(&mut self) {
        let next: Vec<bool> = self
            .cells
            .iter()
            .map(|cell| {
                let neighbors = self.alive_neighbors(cell.x, cell.y);
                if cell.alive {
                    neighbors == 2 || neighbors == 3
                } else {
                    neighbors == 3
                }
            })
            .collect();
        for (cell, alive) in self.cells.iter_mut().zip(next) {
            cell.alive = alive;
        }
        self.steps += 1;
    }

    pub fn alive_count(&self) -> i64 {
        self.cells.iter().filter(|cell| cell.alive).count() as i64
    }

    fn alive_neighbors(&self, x: i64, y: i64) -> usize {
        let mut count = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = (x + dx).rem_euclid(self.width);
                let ny = (y + dy).rem_euclid(self.height);
                if self.cells[(ny * self.width + nx) as usize].alive {
                    count += 1;
                }
            }
        }
        count
    }
}

impl EntityView for LifeGrid {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "population" => Some((self.cells.len() as i64).into()),
            "aliveAgents" => Some(self.alive_count().into()),
            _ => None,
        }
    }
}

impl ModelView for LifeGrid {
    type Agent = LifeCell;

    fn completed_steps(&self) -> u64 {
        self.steps
    }

    fn agents(&self) -> impl Iterator<Item = &LifeCell> {
        self.cells.iter()
    }
}
