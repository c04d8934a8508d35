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

//! Parsing of the commands typed at the match prompt.

use once_cell::sync::Lazy;
use regex::Regex;

use webships::protocol::{Coord, Orientation, ShipKind, BOARD_SIZE};

pub const HELP: &str = "Available Commands:
    place <ship> <row>,<col> <dir>  place the ship at the given cell, extending in the given direction.
        Possible directions are \"up\", \"down\", \"left\", and \"right\". See below for ships.
    unplace <ship>                  clear the placement of the specified ship.
        Additionally \"all\" may be specified to clear all placements.
    ships                           show your board and the ships left to place.
    deploy                          send your ship placements to the server.
    fire <row>,<col>                fire at a cell on the opponent's board.
    status                          show the state of the match.
    help                            show this message.
    quit                            leave the match.

Available Ships:
    \"carrier\" (\"cv\")
    \"battleship\" (\"bb\")
    \"cruiser\" (\"cl\")
    \"submarine\" (\"ss\")
    \"destroyer\" (\"dd\")";

/// A command entered at the match prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Place(ShipKind, Coord, Orientation),
    /// Clear one ship, or all of them when `None`.
    Unplace(Option<ShipKind>),
    Ships,
    Deploy,
    Fire(Coord),
    Status,
    Help,
    Quit,
}

static PLACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?x)(?:place|put)\s+
        (?P<ship>\w+)\s+
        (?:(?:at|on|to|->|=>)\s+)?
        (?P<row>[0-9]+)(?:\s*,\s*|\s+)(?P<col>[0-9]+)\s+
        (?P<dir>\w+)$",
    )
    .unwrap()
});
static UNPLACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?x)(?:un-?place|remove)\s+
        (?P<ship>\w+)$",
    )
    .unwrap()
});
static FIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?x)(?:fire|shoot)\s+
        (?:at\s+)?
        (?P<row>[0-9]+)(?:\s*,\s*|\s+)(?P<col>[0-9]+)$",
    )
    .unwrap()
});

/// Parse one line of input. On failure, returns a message for the player.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim().to_ascii_lowercase();
    match line.as_str() {
        "?" | "help" | "h" => return Ok(Command::Help),
        "ships" | "board" | "fleet" => return Ok(Command::Ships),
        "deploy" | "done" | "ready" => return Ok(Command::Deploy),
        "status" | "s" => return Ok(Command::Status),
        "quit" | "exit" | "q" => return Ok(Command::Quit),
        "clear" => return Ok(Command::Unplace(None)),
        _ => {}
    }
    if let Some(captures) = PLACE.captures(&line) {
        let ship = parse_ship(&captures["ship"]).ok_or_else(|| {
            format!(
                "invalid ship: {}, choose \"carrier\", \"battleship\", \"cruiser\", \"submarine\", or \"destroyer\"",
                &captures["ship"]
            )
        })?;
        let row = parse_index("row", &captures["row"])?;
        let col = parse_index("col", &captures["col"])?;
        let dir = match &captures["dir"] {
            "up" | "north" | "u" | "n" => Orientation::Up,
            "down" | "south" | "d" | "s" => Orientation::Down,
            "left" | "west" | "l" | "w" => Orientation::Left,
            "right" | "east" | "r" | "e" => Orientation::Right,
            other => {
                return Err(format!(
                    "invalid direction {}, choose \"up\", \"down\", \"left\", or \"right\"",
                    other
                ))
            }
        };
        Ok(Command::Place(ship, Coord::new(row, col), dir))
    } else if let Some(captures) = UNPLACE.captures(&line) {
        match &captures["ship"] {
            "all" => Ok(Command::Unplace(None)),
            other => match parse_ship(other) {
                Some(ship) => Ok(Command::Unplace(Some(ship))),
                None => Err(format!(
                    "invalid ship: {}, choose \"carrier\", \"battleship\", \"cruiser\", \"submarine\", \"destroyer\", or \"all\"",
                    other
                )),
            },
        }
    } else if let Some(captures) = FIRE.captures(&line) {
        let row = parse_index("row", &captures["row"])?;
        let col = parse_index("col", &captures["col"])?;
        Ok(Command::Fire(Coord::new(row, col)))
    } else {
        Err(format!("Invalid command \"{}\". Use '?' for help", line))
    }
}

fn parse_ship(name: &str) -> Option<ShipKind> {
    Some(match name {
        "cv" | "carrier" => ShipKind::Carrier,
        "bb" | "battleship" => ShipKind::Battleship,
        "ca" | "cl" | "cruiser" => ShipKind::Cruiser,
        "ss" | "sub" | "submarine" => ShipKind::Submarine,
        "dd" | "destroyer" => ShipKind::Destroyer,
        _ => return None,
    })
}

fn parse_index(what: &str, text: &str) -> Result<i32, String> {
    match text.parse::<i32>() {
        Ok(value) if (0..BOARD_SIZE).contains(&value) => Ok(value),
        _ => Err(format!(
            "{} must be in range [0,{}], got {}",
            what,
            BOARD_SIZE - 1,
            text
        )),
    }
}
