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

use std::{
    env, fmt,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{anyhow, Context};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use webships::{
    protocol::{CannotPlaceReason, Coord, Fleet, ShipKind, ShotOutcome, BOARD_SIZE},
    realtime::RealtimeError,
    Bootstrapper, ClientConfig, Connectivity, FileStore, MatchPhase, RealtimeClient,
    SessionCredential, SessionNotice,
};

use crate::prompt::Command;

mod prompt;

/// Name of the session file kept in the temp dir when `--session-file` is not given.
const SESSION_FILE: &str = "webships-session.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let no_watch = || {
        Arg::with_name("no_watch")
            .long("no-watch")
            .help("only set up the session, don't connect to the match")
    };
    let matches = App::new("Battleship")
        .version("1.0")
        .author("Zachary Stewart <zachary@zstewart.com>")
        .about("Command line client for online battleship matches.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("api_url")
                .long("api-url")
                .value_name("URL")
                .help("base address of the game server's HTTP API")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ws_url")
                .long("ws-url")
                .value_name("URL")
                .help("address of the game server's streaming endpoint")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("session_file")
                .long("session-file")
                .value_name("PATH")
                .help("where the session credential is kept between runs")
                .takes_value(true),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("create a new match and print its join code")
                .arg(no_watch()),
        )
        .subcommand(
            SubCommand::with_name("join")
                .about("join a match by its code")
                .arg(
                    Arg::with_name("code")
                        .value_name("CODE")
                        .help("join code shared by the match creator")
                        .required(true),
                )
                .arg(no_watch()),
        )
        .subcommand(SubCommand::with_name("watch").about("reconnect to the stored match"))
        .get_matches();

    let config = load_config(&matches)?;
    let store = FileStore::new(
        matches
            .value_of("session_file")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join(SESSION_FILE)),
    );
    debug!(
        api = %config.api_url,
        ws = %config.ws_url,
        session_file = %store.path().display(),
        "starting"
    );

    let (credential, watch) = match matches.subcommand() {
        ("create", Some(sub)) => {
            let bootstrapper = Bootstrapper::new(config.clone(), &store);
            let credential = bootstrapper.create_game().await?;
            println!("Game created: {}", credential.game_id);
            println!("You are {}.", credential.player_id);
            if let Some(code) = &credential.join_code {
                println!("Join code: {} (share it with your opponent)", code);
            }
            (credential, !sub.is_present("no_watch"))
        }
        ("join", Some(sub)) => {
            let code = sub.value_of("code").unwrap_or_default();
            let bootstrapper = Bootstrapper::new(config.clone(), &store);
            let credential = bootstrapper.join_game(code).await?;
            println!("Joined game {}.", credential.game_id);
            println!("You are {}.", credential.player_id);
            (credential, !sub.is_present("no_watch"))
        }
        ("watch", _) => {
            let credential = SessionCredential::load(&store).ok_or_else(|| {
                anyhow!(
                    "no stored session in {}; create or join a game first",
                    store.path().display()
                )
            })?;
            (credential, true)
        }
        _ => unreachable!(),
    };

    if watch {
        play(&config, &credential).await?;
    }
    Ok(())
}

/// Addresses from the environment, overridden by any given on the command line.
fn load_config(matches: &ArgMatches) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = matches.value_of("api_url") {
        config = config.with_api_url(url)?;
    }
    if let Some(url) = matches.value_of("ws_url") {
        config = config.with_ws_url(url)?;
    }
    Ok(config)
}

/// Run the match prompt until the player quits, stdin ends, or the connection closes.
async fn play(config: &ClientConfig, credential: &SessionCredential) -> anyhow::Result<()> {
    let (client, mut notices) = RealtimeClient::for_session(config, credential)
        .context("cannot connect to the match")?;
    let mut fleet = Fleet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!();
    println!("Type help or ? for commands.");
    show_prompt()?;
    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Some(notice) => {
                    let disconnected =
                        notice == SessionNotice::Connectivity(Connectivity::Disconnected);
                    show_notice(&client, credential, &notice);
                    if disconnected {
                        break;
                    }
                    show_prompt()?;
                }
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => show_prompt()?,
                Some(line) => {
                    match prompt::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(cmd) => run_command(&client, credential, &mut fleet, cmd),
                        Err(msg) => println!("{}", msg),
                    }
                    show_prompt()?;
                }
                None => {
                    println!();
                    break;
                }
            },
        }
    }
    client.shutdown().await;
    Ok(())
}

fn run_command(
    client: &RealtimeClient,
    credential: &SessionCredential,
    fleet: &mut Fleet,
    cmd: Command,
) {
    let view = client.view();
    match cmd {
        Command::Place(ship, start, dir) => match fleet.place(ship, start, dir) {
            Ok(()) => show_fleet(fleet),
            Err(CannotPlaceReason::AlreadyOccupied) => {
                println!("Invalid placement: overlaps existing ship.");
            }
            Err(CannotPlaceReason::InsufficientSpace) => {
                println!("Invalid placement: not enough space on the board.");
            }
        },
        Command::Unplace(Some(ship)) => {
            if !fleet.unplace(ship) {
                println!("The {} is not placed.", ship);
            }
        }
        Command::Unplace(None) => fleet.clear(),
        Command::Ships => show_fleet(fleet),
        Command::Deploy if !fleet.is_complete() => {
            println!("You must place all your ships first!");
        }
        Command::Deploy if view.phase != MatchPhase::Placing => {
            println!("Ships can only be deployed while placing ({}).", view.phase);
        }
        Command::Deploy => {
            report_send(client.place_ships(fleet.placements()), "Ships deployed.");
        }
        Command::Fire(_) if view.phase != MatchPhase::Active => {
            println!("The match is not in progress ({}).", view.phase);
        }
        Command::Fire(coord) => {
            report_send(client.fire(coord), &format!("Firing at {}.", coord));
        }
        Command::Status => {
            println!("Game:         {}", credential.game_id);
            println!("Player:       {}", credential.player_id);
            if let Some(code) = &credential.join_code {
                println!("Join code:    {}", code);
            }
            println!("Connection:   {}", view.connectivity);
            println!("Phase:        {}", view.phase);
            println!("              {}", view.headline());
            if let Some(turn) = &view.turn {
                println!("Turn:         {}", PlayerName(turn, credential));
            }
            if let Some(winner) = &view.winner {
                println!("Winner:       {}", PlayerName(winner, credential));
            }
            if let Some(err) = &view.last_error {
                println!("Last error:   {}", err);
            }
        }
        Command::Help => println!("{}", prompt::HELP),
        Command::Quit => {}
    }
}

fn report_send(result: Result<(), RealtimeError>, ok: &str) {
    match result {
        Ok(()) => println!("{}", ok),
        Err(err) => println!("Could not send: {}.", err),
    }
}

fn show_notice(client: &RealtimeClient, credential: &SessionCredential, notice: &SessionNotice) {
    println!();
    match notice {
        SessionNotice::Connectivity(Connectivity::Idle) => {}
        SessionNotice::Connectivity(Connectivity::Connecting) => println!("Connecting..."),
        SessionNotice::Connectivity(Connectivity::Connected) => {
            println!("Connected. {}", client.view().headline());
        }
        SessionNotice::Connectivity(Connectivity::Disconnected) => {
            println!("Disconnected from the match.");
        }
        SessionNotice::PhaseChanged { .. } | SessionNotice::OpponentJoined => {
            println!("{}", client.view().headline());
        }
        SessionNotice::ShotResolved(shot) => {
            let outcome = match shot.outcome {
                ShotOutcome::Miss => "miss".to_owned(),
                ShotOutcome::Hit if shot.ship.is_empty() => "hit".to_owned(),
                ShotOutcome::Hit => format!("hit ({})", shot.ship),
                ShotOutcome::Sunk => format!("sunk the {}", shot.ship),
            };
            println!("Shot at {}: {}", shot.coord, outcome);
        }
        SessionNotice::TurnChanged(turn) if *turn == credential.player_id => {
            println!("Your turn.");
        }
        SessionNotice::TurnChanged(_) => println!("Opponent's turn."),
        SessionNotice::GameFinished { winner } if *winner == credential.player_id => {
            println!("You won!");
        }
        SessionNotice::GameFinished { .. } => println!("You lost."),
        SessionNotice::ServerError(msg) => println!("Server error: {}", msg),
    }
}

fn show_prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

/// Print the board and the ships still to be placed.
fn show_fleet(fleet: &Fleet) {
    let mut pending = fleet.pending();
    match pending.next() {
        None => println!("All ships placed, type deploy to send them"),
        Some(first) => {
            print!("Remaining ships to place: {}", first);
            for ship in pending {
                print!(", {}", ship);
            }
            println!();
        }
    }
    println!("Your current board setup:");
    show_board(fleet);
}

/// Show the board by printing the grid, rows down and columns across.
fn show_board(fleet: &Fleet) {
    print!("   ");
    for col in 0..BOARD_SIZE {
        print!("{:^4}", col);
    }
    println!();
    for row in 0..BOARD_SIZE {
        print!("{:>2} ", row);
        for col in 0..BOARD_SIZE {
            match fleet.ship_at(Coord::new(row, col)) {
                Some(ship) => print!("{:^4}", ShipAbbreviation(ship)),
                None => print!("{:^4}", "~~"),
            }
        }
        println!();
    }
}

/// Display helper that prints the ship's type abbreviation
struct ShipAbbreviation(ShipKind);

impl fmt::Display for ShipAbbreviation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(match self.0 {
            ShipKind::Carrier => "cv",
            ShipKind::Battleship => "bb",
            ShipKind::Cruiser => "cl",
            ShipKind::Submarine => "ss",
            ShipKind::Destroyer => "dd",
        })
    }
}

/// Display helper naming a player relative to the local one.
struct PlayerName<'a>(&'a str, &'a SessionCredential);

impl fmt::Display for PlayerName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 == self.1.player_id {
            write!(f, "{} (you)", self.0)
        } else {
            write!(f, "{} (opponent)", self.0)
        }
    }
}
