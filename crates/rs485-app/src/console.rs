//! Interactive front end over a [`Session`].
//!
//! Stdin is read on its own thread so the main loop can wait on typed lines
//! and session events at the same time.

use anyhow::{bail, Result};
use crossbeam_channel::{select, unbounded, Receiver};
use rs485_core::{list_ports, LinkConfig, Session, SessionError, SessionState};
use std::io::BufRead;
use std::time::Duration;

const HELP: &str = "\
commands:
  <text>        send <text> as one line and wait for the reply
  /connect      open the port
  /disconnect   close the port
  /toggle       connect or disconnect
  /ports        list serial ports
  /log          print the whole session log
  /help         show this help
  /quit         leave";

pub fn run(cfg: LinkConfig) -> Result<()> {
    let session = Session::spawn();
    let input = spawn_stdin_reader();
    let mut seen = 0;

    println!("{HELP}");
    print_new(&session, &mut seen);
    report(session.connect(cfg.clone()))?;

    loop {
        select! {
            recv(input) -> line => match line {
                Ok(line) => {
                    if !handle_line(&session, &cfg, line.trim_end())? {
                        break;
                    }
                }
                Err(_) => {
                    drain(&session, &mut seen);
                    break;
                }
            },
            recv(session.events()) -> event => match event {
                Ok(event) => log::debug!("session event: {event:?}"),
                Err(_) => bail!("session worker stopped"),
            },
        }
        print_new(&session, &mut seen);
    }
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Returns `false` when the user asked to leave.
fn handle_line(session: &Session, cfg: &LinkConfig, line: &str) -> Result<bool> {
    match line {
        "" => {}
        "/quit" | "/exit" => return Ok(false),
        "/connect" => report(session.connect(cfg.clone()))?,
        "/disconnect" => report(session.disconnect())?,
        "/toggle" => report(session.toggle(cfg.clone()))?,
        "/log" => print!("{}", session.log_text()),
        "/ports" => {
            for port in list_ports() {
                println!("{}", port.label());
            }
        }
        "/help" => println!("{HELP}"),
        other if other.starts_with('/') => println!("unknown command {other}, try /help"),
        command => report(session.send(command))?,
    }
    Ok(true)
}

fn report(result: Result<(), SessionError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(SessionError::Busy) => {
            println!("busy: wait for the current operation to finish");
            Ok(())
        }
        Err(e @ SessionError::WorkerGone) => Err(e.into()),
    }
}

fn print_new(session: &Session, seen: &mut u64) {
    let log = session.log();
    for entry in log.since(*seen) {
        println!("{}", entry.render());
    }
    *seen = log.total();
}

/// Input ended; let an in-flight connect or send finish before leaving.
fn drain(session: &Session, seen: &mut u64) {
    while matches!(
        session.state(),
        SessionState::Connecting | SessionState::Busy
    ) {
        if session.events().recv_timeout(Duration::from_secs(5)).is_err() {
            break;
        }
        print_new(session, seen);
    }
    print_new(session, seen);
}
