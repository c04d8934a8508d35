// Copyright 2020 Zachary Stewart
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ship layouts for the standard two-player game: five ships on a 10x10 grid.
//!
//! The server is the authority on placement. [`Fleet`] only catches the obvious
//! mistakes (off the board, overlapping) before a layout is sent.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width and height of the board.
pub const BOARD_SIZE: i32 = 10;

/// A cell on the board.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Check if the cell lies on the board.
    pub fn in_bounds(self) -> bool {
        (0..BOARD_SIZE).contains(&self.row) && (0..BOARD_SIZE).contains(&self.col)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// Ship types of the standard game.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipKind {
    /// Carrier: length 5.
    Carrier,
    /// Battleship: length 4.
    Battleship,
    /// Cruiser: length 3.
    Cruiser,
    /// Submarine: length 3.
    Submarine,
    /// Destroyer: length 2.
    Destroyer,
}

impl ShipKind {
    /// Every ship in the fleet, largest first.
    pub const ALL: &'static [ShipKind] = &[
        ShipKind::Carrier,
        ShipKind::Battleship,
        ShipKind::Cruiser,
        ShipKind::Submarine,
        ShipKind::Destroyer,
    ];

    /// Number of cells this ship covers.
    pub fn len(self) -> usize {
        match self {
            ShipKind::Carrier => 5,
            ShipKind::Battleship => 4,
            ShipKind::Cruiser => 3,
            ShipKind::Submarine => 3,
            ShipKind::Destroyer => 2,
        }
    }

    /// Name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            ShipKind::Carrier => "carrier",
            ShipKind::Battleship => "battleship",
            ShipKind::Cruiser => "cruiser",
            ShipKind::Submarine => "submarine",
            ShipKind::Destroyer => "destroyer",
        }
    }
}

impl fmt::Display for ShipKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Direction a ship extends in from its starting cell.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Orientation {
    /// Towards row 0.
    Up,
    Down,
    /// Towards column 0.
    Left,
    Right,
}

impl Orientation {
    fn step(self) -> (i32, i32) {
        match self {
            Orientation::Up => (-1, 0),
            Orientation::Down => (1, 0),
            Orientation::Left => (0, -1),
            Orientation::Right => (0, 1),
        }
    }
}

/// One ship and the cells it covers, as sent in `place_ships`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipPlacement {
    #[serde(rename = "type")]
    pub kind: ShipKind,
    pub cells: Vec<Coord>,
}

impl ShipPlacement {
    /// Lay the ship in a straight line from `start` along `dir`.
    pub fn line(kind: ShipKind, start: Coord, dir: Orientation) -> Self {
        let (dr, dc) = dir.step();
        let cells = (0..kind.len() as i32)
            .map(|i| Coord::new(start.row + dr * i, start.col + dc * i))
            .collect();
        Self { kind, cells }
    }
}

/// Reason why a ship could not be placed at a given position.
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum CannotPlaceReason {
    /// The ship would extend past the edge of the board.
    #[error("insufficient space for the ship at the specified position")]
    InsufficientSpace,
    /// The space selected overlaps a ship that was already placed.
    #[error("the specified position was already occupied")]
    AlreadyOccupied,
}

/// Ship layout being assembled before it is sent to the server.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    placements: BTreeMap<ShipKind, ShipPlacement>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a ship, replacing its previous placement if there was one.
    pub fn place(
        &mut self,
        kind: ShipKind,
        start: Coord,
        dir: Orientation,
    ) -> Result<(), CannotPlaceReason> {
        let placement = ShipPlacement::line(kind, start, dir);
        if !placement.cells.iter().all(|cell| cell.in_bounds()) {
            return Err(CannotPlaceReason::InsufficientSpace);
        }
        let overlaps = self
            .placements
            .values()
            .filter(|other| other.kind != kind)
            .flat_map(|other| other.cells.iter())
            .any(|cell| placement.cells.contains(cell));
        if overlaps {
            return Err(CannotPlaceReason::AlreadyOccupied);
        }
        self.placements.insert(kind, placement);
        Ok(())
    }

    /// Clear the placement of a ship. Return true if the ship was previously placed.
    pub fn unplace(&mut self, kind: ShipKind) -> bool {
        self.placements.remove(&kind).is_some()
    }

    /// Clear every placement.
    pub fn clear(&mut self) {
        self.placements.clear();
    }

    /// Ships which still need to be placed.
    pub fn pending(&self) -> impl '_ + Iterator<Item = ShipKind> {
        ShipKind::ALL
            .iter()
            .copied()
            .filter(move |kind| !self.placements.contains_key(kind))
    }

    /// True once every ship has a placement.
    pub fn is_complete(&self) -> bool {
        self.pending().next().is_none()
    }

    /// The placements in fleet order.
    pub fn placements(&self) -> Vec<ShipPlacement> {
        self.placements.values().cloned().collect()
    }

    /// The ship covering `cell`, if any.
    pub fn ship_at(&self, cell: Coord) -> Option<ShipKind> {
        self.placements
            .values()
            .find(|p| p.cells.contains(&cell))
            .map(|p| p.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_follows_orientation() {
        let start = Coord::new(5, 5);
        let up = ShipPlacement::line(ShipKind::Cruiser, start, Orientation::Up);
        assert_eq!(up.cells, vec![Coord::new(5, 5), Coord::new(4, 5), Coord::new(3, 5)]);
        let down = ShipPlacement::line(ShipKind::Destroyer, start, Orientation::Down);
        assert_eq!(down.cells, vec![Coord::new(5, 5), Coord::new(6, 5)]);
        let left = ShipPlacement::line(ShipKind::Destroyer, start, Orientation::Left);
        assert_eq!(left.cells, vec![Coord::new(5, 5), Coord::new(5, 4)]);
        let right = ShipPlacement::line(ShipKind::Carrier, start, Orientation::Right);
        assert_eq!(right.cells.len(), 5);
        assert_eq!(right.cells[4], Coord::new(5, 9));
        assert_eq!(right.cells[0], start);
    }

    #[test]
    fn fleet_rejects_out_of_bounds_and_overlap() {
        let mut fleet = Fleet::new();
        assert_eq!(
            fleet.place(ShipKind::Carrier, Coord::new(0, 7), Orientation::Right),
            Err(CannotPlaceReason::InsufficientSpace)
        );
        fleet
            .place(ShipKind::Carrier, Coord::new(0, 0), Orientation::Right)
            .unwrap();
        assert_eq!(
            fleet.place(ShipKind::Destroyer, Coord::new(0, 4), Orientation::Down),
            Err(CannotPlaceReason::AlreadyOccupied)
        );
        // Moving a ship onto its own old cells is fine.
        fleet
            .place(ShipKind::Carrier, Coord::new(0, 1), Orientation::Right)
            .unwrap();
        assert_eq!(fleet.ship_at(Coord::new(0, 0)), None);
        assert_eq!(fleet.ship_at(Coord::new(0, 5)), Some(ShipKind::Carrier));
    }

    #[test]
    fn fleet_tracks_pending_ships() {
        let mut fleet = Fleet::new();
        assert_eq!(fleet.pending().count(), 5);
        for (row, &kind) in ShipKind::ALL.iter().enumerate() {
            fleet
                .place(kind, Coord::new(row as i32 * 2, 0), Orientation::Right)
                .unwrap();
        }
        assert!(fleet.is_complete());
        assert_eq!(fleet.placements().len(), 5);
        assert!(fleet.unplace(ShipKind::Submarine));
        assert!(!fleet.unplace(ShipKind::Submarine));
        assert_eq!(fleet.pending().collect::<Vec<_>>(), vec![ShipKind::Submarine]);
        fleet.clear();
        assert_eq!(fleet.pending().count(), 5);
    }
}
