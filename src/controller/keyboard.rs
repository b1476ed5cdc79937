// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{io, str::FromStr, thread};

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use super::Event;
use crate::synth::{key_for_char, Waveform};

const DOWN: &str = "down";
const UP: &str = "up";
const WAVE: &str = "wave";
const QUIT: &str = "quit";

/// A controller that plays notes from typed commands. A terminal can't report
/// key releases, so presses and releases are separate commands.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses one line of input. Unrecognized input yields no events.
    fn parse(input: &str) -> Vec<Event> {
        let mut words = input.split_whitespace();
        let command = words.next().unwrap_or_default().to_lowercase();
        let arguments: Vec<&str> = words.collect();
        // Keys may be typed together or separated by spaces.
        let keys = arguments.concat();

        match command.as_str() {
            DOWN if !keys.is_empty() => keys
                .chars()
                .map(|c| Event::KeyDown(key_for_char(c)))
                .collect(),
            UP if !keys.is_empty() => keys
                .chars()
                .map(|c| Event::KeyUp(key_for_char(c)))
                .collect(),
            WAVE => {
                let waveform = match arguments.as_slice() {
                    [name] => Waveform::from_str(name),
                    _ => Err(format!("Expected one waveform, got: {}", arguments.join(" "))),
                };
                match waveform {
                    Ok(waveform) => vec![Event::Waveform(waveform)],
                    Err(e) => {
                        warn!(err = %e, "Unrecognized waveform");
                        vec![]
                    }
                }
            }
            QUIT => vec![Event::Quit],
            _ => {
                warn!(input = input.trim(), "Unrecognized input");
                vec![]
            }
        }
    }

    /// Prompts for and handles a single line. Returns false once the input has
    /// ended or a quit was sent.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <keys>, {} <keys>, {} sine|square, {}): ",
            DOWN, UP, WAVE, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let events = Driver::parse(&input);
        let quit = events.contains(&Event::Quit);
        for event in events {
            events_tx
                .send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(!quit)
    }
}

impl super::Driver for Driver {
    fn monitor_events(
        &self,
        events_tx: Sender<Event>,
    ) -> thread::JoinHandle<Result<(), io::Error>> {
        thread::spawn(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}
