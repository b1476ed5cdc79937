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
use std::{io, sync::Arc, thread};

use crossbeam_channel::Sender;
use tracing::{debug, error, info, span, Level};

use crate::{
    session::AudioSession,
    synth::{KeyId, Waveform},
};

pub mod keyboard;

/// Shell events that drive the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A key was pressed.
    KeyDown(KeyId),

    /// A key was released.
    KeyUp(KeyId),

    /// Switches every note to the given waveform.
    Waveform(Waveform),

    /// Ends the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    /// Starts watching for input, sending events until the input ends or a
    /// quit event has been sent.
    fn monitor_events(
        &self,
        events_tx: Sender<Event>,
    ) -> thread::JoinHandle<Result<(), io::Error>>;
}

/// Routes driver events into a session.
pub struct Controller {
    handle: thread::JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(session: Arc<AudioSession>, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: thread::spawn(move || Controller::trigger_events(session, driver)),
        }
    }

    /// Join will block until the controller finishes.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }

    fn trigger_events(session: Arc<AudioSession>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let join_handle = driver.monitor_events(events_tx);
        info!("Controller started.");

        let mut quit = false;
        for event in events_rx.iter() {
            debug!(event = ?event, "Received event.");
            match event {
                Event::KeyDown(key) => session.key_down(key),
                Event::KeyUp(key) => session.key_up(key),
                Event::Waveform(waveform) => session.select_waveform(waveform),
                Event::Quit => {
                    quit = true;
                    break;
                }
            }
        }

        info!("Controller closing.");
        // After a quit the driver may still be blocked on input, so it's left
        // to finish on its own.
        if quit {
            return;
        }
        match join_handle.join() {
            Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
            Err(_) => error!("Event monitor panicked"),
            Ok(Ok(())) => {}
        }
    }
}

#[cfg(test)]
mod test {
    use std::{io, sync::Arc, thread};

    use crossbeam_channel::Sender;

    use crate::{
        audio::{mock, BlockLayout, EngineConfig},
        session::AudioSession,
        synth::{key_for_char, Waveform},
    };

    use super::{Controller, Driver, Event};

    /// Sends a fixed list of events.
    struct TestDriver {
        events: Vec<Event>,
    }

    impl Driver for TestDriver {
        fn monitor_events(
            &self,
            events_tx: Sender<Event>,
        ) -> thread::JoinHandle<Result<(), io::Error>> {
            let events = self.events.clone();
            thread::spawn(move || {
                for event in events {
                    events_tx
                        .send(event)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
                Ok(())
            })
        }
    }

    fn running_session() -> (Arc<AudioSession>, mock::Host) {
        let host = mock::Host::new(vec!["mock".into()]);
        let session = Arc::new(AudioSession::new(
            Arc::new(host.clone()),
            EngineConfig {
                layout: BlockLayout::new(4, 64),
                ..EngineConfig::default()
            },
            Waveform::Sine,
        ));
        session.start().unwrap();
        (session, host)
    }

    #[test]
    fn test_controller_applies_events() {
        let (session, _host) = running_session();
        let driver = TestDriver {
            events: vec![
                Event::KeyDown(key_for_char('z')),
                Event::KeyDown(key_for_char('n')),
                Event::KeyDown(key_for_char('q')),
                Event::KeyUp(key_for_char('n')),
                Event::Waveform(Waveform::Square),
            ],
        };

        Controller::new(session.clone(), Arc::new(driver))
            .join()
            .unwrap();

        assert_eq!(
            session.active_notes(),
            vec![key_for_char('q'), key_for_char('z')]
        );
        assert_eq!(session.waveform(), Waveform::Square);
        session.stop();
    }

    #[test]
    fn test_controller_stops_at_quit() {
        let (session, _host) = running_session();
        let driver = TestDriver {
            events: vec![
                Event::KeyDown(key_for_char('z')),
                Event::Quit,
                Event::KeyDown(key_for_char('x')),
            ],
        };

        Controller::new(session.clone(), Arc::new(driver))
            .join()
            .unwrap();

        assert_eq!(session.active_notes(), vec![key_for_char('z')]);
        session.stop();
    }
}
